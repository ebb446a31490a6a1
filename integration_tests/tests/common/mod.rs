#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use bevy::prelude::*;
use bracket_core::{
    build_bracket_app, run_tick, Activity, Agent, AgentBundle, AgentId, BracketConfig,
    BracketMetrics, BracketTables, CharacterClass, Controller, Faction, Level,
    PendingResetQueue, RangeConfig, ResetHooks, ResetRecorder, SocialFacts,
};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_bracket_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test bracket config at {}",
            config_path.display()
        );

        std::env::set_var("BRACKET_CONFIG_PATH", &config_path);
    });
}

/// Both factions share `ranges`; every timer fires on a one second tick.
pub fn fast_config(ranges: &[(u8, u8, u32)]) -> BracketConfig {
    BracketConfig {
        check_frequency_secs: 1,
        flagged_check_frequency_secs: 1,
        guild_refresh_frequency_secs: 1,
        seed: 99,
        ..BracketConfig::default()
    }
    .with_ranges(
        ranges
            .iter()
            .map(|&(lower, upper, pct)| RangeConfig::new(lower, upper, pct))
            .collect(),
    )
}

/// Like [`fast_config`] but the full cycle never comes due, so only drains run.
pub fn drain_only_config(ranges: &[(u8, u8, u32)]) -> BracketConfig {
    BracketConfig {
        check_frequency_secs: 3_600,
        ..fast_config(ranges)
    }
}

pub struct Harness {
    pub app: App,
    pub recorder: ResetRecorder,
    next_id: u64,
}

impl Harness {
    pub fn new(config: BracketConfig) -> Self {
        Self::with_facts(config, SocialFacts::default())
    }

    pub fn with_facts(config: BracketConfig, facts: SocialFacts) -> Self {
        let recorder = ResetRecorder::default();
        let app = build_bracket_app(Arc::new(config), facts, ResetHooks::recording(&recorder))
            .expect("test config is valid");
        Self {
            app,
            recorder,
            next_id: 1,
        }
    }

    pub fn next_agent(&mut self, faction: Faction) -> Agent {
        let id = self.next_id;
        self.next_id += 1;
        Agent {
            id: AgentId(id),
            name: format!("Bot{id}"),
            class: CharacterClass::Warrior,
            faction,
            controller: Controller::RandomBot,
            guild: None,
        }
    }

    pub fn spawn(&mut self, agent: Agent, level: u8, activity: Activity) -> Entity {
        self.app
            .world
            .spawn(AgentBundle::new(agent, level).with_activity(activity))
            .id()
    }

    pub fn spawn_bots(&mut self, faction: Faction, count: usize, level: u8) -> Vec<Entity> {
        (0..count)
            .map(|_| {
                let agent = self.next_agent(faction);
                self.spawn(agent, level, Activity::idle())
            })
            .collect()
    }

    pub fn tick(&mut self) {
        run_tick(&mut self.app, 1_000);
    }

    pub fn level_of(&self, entity: Entity) -> u8 {
        self.app
            .world
            .get::<Level>(entity)
            .map(|level| level.value)
            .expect("agent has a level")
    }

    /// Managed agents of `faction` counted per bracket of the live tables.
    pub fn distribution(&mut self, faction: Faction) -> Vec<u32> {
        let tables = self.app.world.resource::<BracketTables>().clone();
        let table = tables.table(faction);
        let mut counts = vec![0; table.len()];
        let mut query = self.app.world.query::<(&Agent, &Level)>();
        for (agent, level) in query.iter(&self.app.world) {
            if agent.faction != faction || !agent.controller.is_managed() {
                continue;
            }
            if let Some(index) = table.resolve(level.value) {
                counts[index] += 1;
            }
        }
        counts
    }

    pub fn queue(&self) -> &PendingResetQueue {
        self.app.world.resource::<PendingResetQueue>()
    }

    pub fn queue_mut(&mut self) -> Mut<'_, PendingResetQueue> {
        self.app.world.resource_mut::<PendingResetQueue>()
    }

    pub fn metrics(&self) -> &BracketMetrics {
        self.app.world.resource::<BracketMetrics>()
    }

    pub fn percents(&self, faction: Faction) -> Vec<u32> {
        self.app
            .world
            .resource::<BracketTables>()
            .table(faction)
            .percents()
    }
}
