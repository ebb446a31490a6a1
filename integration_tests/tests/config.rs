mod common;

use std::sync::Arc;

use bracket_core::{
    build_bracket_app, load_bracket_config_from_env, reload_bracket_config, BracketConfig,
    BracketConfigError, BracketConfigHandle, BracketTables, Faction, RangeConfig, ResetHooks,
    SocialFacts,
};
use common::{fast_config, Harness};

fn build(config: BracketConfig) -> Result<bevy::prelude::App, BracketConfigError> {
    build_bracket_app(Arc::new(config), SocialFacts::default(), ResetHooks::default())
}

#[test]
fn env_override_points_at_the_fixture() {
    common::ensure_test_config();
    let (config, metadata) = load_bracket_config_from_env();

    assert!(metadata
        .path()
        .is_some_and(|path| path.ends_with("test_bracket_config.json")));
    assert_eq!(config.num_ranges, 4);
    assert_eq!(config.check_frequency_secs, 1);
    assert_eq!(config.seed, 4242);
    assert_eq!(config.ranges(Faction::Horde)[0].pct, 40);
    // Unlisted keys keep their defaults.
    assert!(config.ignore_friend_listed);

    let app = build_bracket_app(config, SocialFacts::default(), ResetHooks::default())
        .expect("fixture is valid");
    let tables = app.world.resource::<BracketTables>();
    assert_eq!(tables.table(Faction::Alliance).percents(), vec![25, 25, 25, 25]);
    assert_eq!(tables.table(Faction::Horde).percents(), vec![40, 20, 20, 20]);
}

#[test]
fn synced_factions_with_different_bounds_are_fatal() {
    let mut config = BracketConfig {
        sync_factions: true,
        ..fast_config(&[(1, 40, 50), (41, 80, 50)])
    };
    config.horde_ranges[0] = RangeConfig::new(1, 39, 50);

    let err = build(config).err().expect("mismatch rejected");
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        BracketConfigError::SyncedBoundsMismatch { index: 0, .. }
    ));
}

#[test]
fn range_count_mismatch_is_rejected_but_not_fatal() {
    let config = BracketConfig {
        num_ranges: 3,
        ..fast_config(&[(1, 40, 50), (41, 80, 50)])
    };
    let err = build(config).err().expect("count mismatch rejected");
    assert!(!err.is_fatal());
}

#[test]
fn short_percent_sums_are_topped_up_and_out_of_bounds_ranges_deactivated() {
    let config = BracketConfig {
        max_level: 60,
        ..fast_config(&[(1, 20, 30), (21, 40, 30), (41, 60, 30), (61, 80, 40)])
    };
    let app = build(config).expect("valid");
    let tables = app.world.resource::<BracketTables>();
    let percents = tables.table(Faction::Alliance).percents();
    assert_eq!(percents, vec![34, 33, 33, 0]);
    assert!(!tables.table(Faction::Alliance).brackets()[3].is_active());
}

#[test]
fn reload_swaps_tables_and_keeps_old_ones_on_error() {
    let mut harness = Harness::new(fast_config(&[(1, 40, 50), (41, 80, 50)]));
    harness.spawn_bots(Faction::Alliance, 10, 10);

    reload_bracket_config(
        &mut harness.app,
        Arc::new(fast_config(&[(1, 40, 20), (41, 80, 80)])),
    )
    .expect("reload accepted");
    assert_eq!(harness.percents(Faction::Alliance), vec![20, 80]);

    harness.tick();
    assert_eq!(harness.distribution(Faction::Alliance), vec![2, 8]);

    let mut bad = BracketConfig {
        sync_factions: true,
        ..fast_config(&[(1, 40, 50), (41, 80, 50)])
    };
    bad.horde_ranges[1] = RangeConfig::new(42, 80, 50);
    let err = reload_bracket_config(&mut harness.app, Arc::new(bad)).expect_err("rejected");
    assert!(err.is_fatal());
    assert_eq!(harness.percents(Faction::Alliance), vec![20, 80]);
    assert!(!harness
        .app
        .world
        .resource::<BracketConfigHandle>()
        .config()
        .sync_factions);
}

#[test]
fn disabled_config_leaves_the_population_alone() {
    let config = BracketConfig {
        enabled: false,
        ..fast_config(&[(1, 40, 0), (41, 80, 100)])
    };
    let mut harness = Harness::new(config);
    let bots = harness.spawn_bots(Faction::Horde, 5, 10);

    for _ in 0..5 {
        harness.tick();
    }

    assert!(bots.iter().all(|&entity| harness.level_of(entity) == 10));
    assert_eq!(harness.metrics().cycles, 0);
    assert!(harness.queue().is_empty());
}
