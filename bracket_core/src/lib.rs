//! Bot level bracket balancer.
//!
//! Keeps the level distribution of server-controlled characters close to a
//! per-faction target. Each host tick runs, in order: pending reset drain,
//! guild index refresh, full reconciliation cycle; each is gated by its own
//! timer so most ticks do nothing.

pub mod bracket_config;
pub mod brackets;
pub mod census;
mod components;
pub mod dynamic;
pub mod exclusion;
mod faction;
pub mod metrics;
pub mod pending;
pub mod reconcile;
pub mod reset;
mod resources;
pub mod safety;
pub mod systems;

use std::sync::Arc;

use bevy::prelude::*;

pub use bracket_config::{
    load_bracket_config_from_env, BracketConfig, BracketConfigError, BracketConfigHandle,
    BracketConfigMetadata, RangeConfig,
};
pub use brackets::{Bracket, BracketTables, FactionBracketTable};
pub use components::{
    Activity, ActivityFlags, Agent, AgentBundle, AgentId, CharacterClass, Controller, GroupId,
    GuildId, Level, Presence, DEATH_KNIGHT_FLOOR,
};
pub use exclusion::{
    ExcludedNames, FriendFlaggedSet, GuildRealPlayerIndex, SharedSocialFacts, SocialFactSource,
    SocialFacts, StaticSocialFacts,
};
pub use faction::{Faction, PerFaction};
pub use metrics::BracketMetrics;
pub use pending::{PendingResetEntry, PendingResetQueue};
pub use reset::{HookCall, Notifier, Rerandomizer, ResetHooks, ResetRecorder, RESET_MESSAGE};
pub use resources::{BracketRng, BracketTick, BracketTimers, TickDelta, TimerKind};

/// Construct a Bevy [`App`] running the bracket pipeline.
///
/// Fails when the config violates its structural contract, including a
/// synced-faction bound mismatch; callers treat that as fatal.
pub fn build_bracket_app(
    config: Arc<BracketConfig>,
    facts: SocialFacts,
    hooks: ResetHooks,
) -> Result<App, BracketConfigError> {
    let tables = BracketTables::from_config(&config)?;
    let mut app = App::new();

    app.insert_resource(ExcludedNames::from_config(&config))
        .insert_resource(BracketRng::from_seed(config.seed))
        .insert_resource(BracketConfigHandle::new(config))
        .insert_resource(tables)
        .insert_resource(facts)
        .insert_resource(hooks)
        .init_resource::<PendingResetQueue>()
        .init_resource::<GuildRealPlayerIndex>()
        .init_resource::<FriendFlaggedSet>()
        .init_resource::<BracketTimers>()
        .init_resource::<TickDelta>()
        .init_resource::<BracketTick>()
        .init_resource::<BracketMetrics>()
        .add_plugins(MinimalPlugins)
        .add_systems(Startup, systems::initialize_brackets)
        .add_systems(
            Update,
            (
                systems::advance_timers,
                systems::drain_pending_resets,
                systems::refresh_guild_index,
                systems::run_reconciliation_cycle,
            )
                .chain(),
        );

    Ok(app)
}

/// Host callback: account `diff_ms` of elapsed time and run one update.
pub fn run_tick(app: &mut App, diff_ms: u32) {
    app.world.resource_mut::<TickDelta>().0 = diff_ms;
    app.update();
}

/// Swap in a new config and rebuild the bracket tables.
///
/// Pending entries survive; they name a faction and bracket index and are
/// checked against the new tables when drained.
pub fn reload_bracket_config(
    app: &mut App,
    config: Arc<BracketConfig>,
) -> Result<(), BracketConfigError> {
    let tables = BracketTables::from_config(&config)?;
    tables.log_summary(config.verbosity());
    app.world.insert_resource(tables);
    app.world
        .insert_resource(ExcludedNames::from_config(&config));
    app.world
        .resource_mut::<BracketConfigHandle>()
        .replace(config);
    Ok(())
}
