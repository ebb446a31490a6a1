use bevy::prelude::*;

use crate::{
    census::CensusReport,
    faction::{Faction, PerFaction},
    pending::DrainSummary,
};

/// Running totals across cycles and drains.
#[derive(Resource, Default, Debug, Clone)]
pub struct BracketMetrics {
    pub cycles: u64,
    pub drains: u64,
    pub guild_refreshes: u64,
    pub immediate_resets: u64,
    pub deferred_flags: u64,
    pub drained_resets: u64,
    pub discarded_entries: u64,
    pub expired_entries: u64,
    pub refused_resets: u64,
    /// Host tick on which the last full cycle ran.
    pub last_cycle_tick: u64,
    pub last_actual: PerFaction<Vec<u32>>,
    pub last_desired: PerFaction<Vec<u32>>,
    pub last_managed: PerFaction<u32>,
    pub last_drain: DrainSummary,
}

impl BracketMetrics {
    pub fn record_census(
        &mut self,
        faction: Faction,
        report: &CensusReport,
        desired: &[u32],
    ) {
        let census = &report.factions[faction];
        self.last_actual[faction] = census.actual.clone();
        self.last_desired[faction] = desired.to_vec();
        self.last_managed[faction] = census.total;
    }

    pub fn record_drain(&mut self, summary: DrainSummary) {
        self.drains += 1;
        self.drained_resets += summary.reset as u64;
        self.discarded_entries += summary.discarded as u64;
        self.expired_entries += summary.expired as u64;
        self.refused_resets += summary.refused as u64;
        self.last_drain = summary;
    }

    pub fn total_resets(&self) -> u64 {
        self.immediate_resets + self.drained_resets
    }
}
