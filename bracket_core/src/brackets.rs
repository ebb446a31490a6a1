use bevy::prelude::Resource;

use crate::{
    bracket_config::{BracketConfig, BracketConfigError, LogVerbosity, RangeConfig},
    components::CharacterClass,
    faction::{Faction, PerFaction},
};

/// Contiguous inclusive level range with its target population share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub lower: u8,
    pub upper: u8,
    pub desired_percent: u32,
}

impl Bracket {
    pub fn is_active(&self) -> bool {
        self.lower <= self.upper
    }

    pub fn contains(&self, level: u8) -> bool {
        self.is_active() && level >= self.lower && level <= self.upper
    }

    /// Distance from `level` to the closest bound, zero inside the bracket.
    pub fn distance_to(&self, level: u8) -> u8 {
        if self.contains(level) {
            0
        } else {
            level.abs_diff(self.lower).min(level.abs_diff(self.upper))
        }
    }

    pub fn accepts(&self, class: CharacterClass) -> bool {
        self.is_active() && class.can_reach(self.upper)
    }
}

impl From<&RangeConfig> for Bracket {
    fn from(range: &RangeConfig) -> Self {
        Self {
            lower: range.lower,
            upper: range.upper,
            desired_percent: range.pct,
        }
    }
}

/// What clamp-and-balance did to one faction table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceOutcome {
    pub active: usize,
    pub deactivated: usize,
    pub original_sum: u32,
    pub balanced_sum: u32,
}

impl BalanceOutcome {
    pub fn was_adjusted(&self) -> bool {
        self.original_sum != self.balanced_sum
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactionBracketTable {
    brackets: Vec<Bracket>,
}

impl FactionBracketTable {
    pub fn new(brackets: Vec<Bracket>) -> Self {
        Self { brackets }
    }

    pub fn from_ranges(ranges: &[RangeConfig]) -> Self {
        Self::new(ranges.iter().map(Bracket::from).collect())
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    pub fn get(&self, index: usize) -> Option<&Bracket> {
        self.brackets.get(index)
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.brackets.iter().filter(|b| b.is_active()).count()
    }

    pub fn active_percent_sum(&self) -> u32 {
        self.brackets
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.desired_percent)
            .sum()
    }

    /// Clamp bounds into `[min_level, max_level]`, zero inactive brackets and
    /// raise active shares round-robin until they total 100.
    ///
    /// Shares are never lowered. A table with no active bracket is left
    /// unbalanced.
    pub fn clamp_and_balance(&mut self, min_level: u8, max_level: u8) -> BalanceOutcome {
        let mut outcome = BalanceOutcome::default();
        for bracket in self.brackets.iter_mut() {
            bracket.lower = bracket.lower.max(min_level);
            bracket.upper = bracket.upper.min(max_level);
            if bracket.is_active() {
                outcome.active += 1;
            } else {
                bracket.desired_percent = 0;
                outcome.deactivated += 1;
            }
        }

        outcome.original_sum = self.active_percent_sum();
        outcome.balanced_sum = outcome.original_sum;
        if outcome.active == 0 {
            return outcome;
        }

        while outcome.balanced_sum < 100 {
            for bracket in self.brackets.iter_mut().filter(|b| b.is_active()) {
                if outcome.balanced_sum >= 100 {
                    break;
                }
                bracket.desired_percent += 1;
                outcome.balanced_sum += 1;
            }
        }
        outcome
    }

    /// Index of the active bracket containing `level`, first match wins.
    pub fn resolve(&self, level: u8) -> Option<usize> {
        self.brackets.iter().position(|b| b.contains(level))
    }

    /// Active bracket whose nearest bound is closest to `level`, restricted to
    /// brackets `class` may occupy. Ties go to the lowest index.
    pub fn nearest(&self, level: u8, class: CharacterClass) -> Option<usize> {
        let mut best: Option<(usize, u8)> = None;
        for (index, bracket) in self.brackets.iter().enumerate() {
            if !bracket.accepts(class) {
                continue;
            }
            let distance = bracket.distance_to(level);
            match best {
                Some((_, current)) if current <= distance => {}
                _ => best = Some((index, distance)),
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn percents(&self) -> Vec<u32> {
        self.brackets.iter().map(|b| b.desired_percent).collect()
    }

    /// Overwrite shares, forcing inactive brackets to zero.
    pub fn set_percents(&mut self, percents: &[u32]) {
        for (bracket, pct) in self.brackets.iter_mut().zip(percents) {
            bracket.desired_percent = if bracket.is_active() { *pct } else { 0 };
        }
    }

    /// `round(pct / 100 * total)` per bracket.
    pub fn desired_counts(&self, total: u32) -> Vec<u32> {
        self.brackets
            .iter()
            .map(|b| {
                if b.is_active() {
                    ((f64::from(b.desired_percent) / 100.0) * f64::from(total)).round() as u32
                } else {
                    0
                }
            })
            .collect()
    }
}

/// Per-faction bracket tables built from one config load.
#[derive(Resource, Debug, Clone, Default)]
pub struct BracketTables {
    tables: PerFaction<FactionBracketTable>,
    synced: bool,
}

impl BracketTables {
    /// Validate the config, then build and balance both tables.
    pub fn from_config(config: &BracketConfig) -> Result<Self, BracketConfigError> {
        config.validate()?;
        let mut tables = PerFaction::from_fn(|faction| {
            FactionBracketTable::from_ranges(config.ranges(faction))
        });
        let verbosity = config.verbosity();
        for (faction, table) in tables.iter_mut() {
            let outcome = table.clamp_and_balance(config.min_level, config.max_level);
            report_balance(faction, &outcome, verbosity);
        }
        Ok(Self {
            tables,
            synced: config.sync_factions,
        })
    }

    pub fn new(alliance: FactionBracketTable, horde: FactionBracketTable, synced: bool) -> Self {
        Self {
            tables: PerFaction::new(alliance, horde),
            synced,
        }
    }

    pub fn table(&self, faction: Faction) -> &FactionBracketTable {
        &self.tables[faction]
    }

    pub fn table_mut(&mut self, faction: Faction) -> &mut FactionBracketTable {
        &mut self.tables[faction]
    }

    pub fn tables_mut(&mut self) -> &mut PerFaction<FactionBracketTable> {
        &mut self.tables
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn log_summary(&self, verbosity: LogVerbosity) {
        if !verbosity.summaries() {
            return;
        }
        for (faction, table) in self.tables.iter() {
            for (index, bracket) in table.brackets().iter().enumerate() {
                tracing::info!(
                    target: "level_brackets::config",
                    %faction,
                    range = index + 1,
                    lower = bracket.lower,
                    upper = bracket.upper,
                    desired_pct = bracket.desired_percent,
                    active = bracket.is_active(),
                    "brackets.loaded"
                );
            }
        }
    }
}

fn report_balance(faction: Faction, outcome: &BalanceOutcome, verbosity: LogVerbosity) {
    if outcome.active == 0 {
        tracing::warn!(
            target: "level_brackets::config",
            %faction,
            "brackets.no_active_range; faction left unmanaged"
        );
        return;
    }
    if outcome.was_adjusted() {
        tracing::warn!(
            target: "level_brackets::config",
            %faction,
            original_sum = outcome.original_sum,
            balanced_sum = outcome.balanced_sum,
            "brackets.percent_sum_adjusted"
        );
    } else if outcome.balanced_sum > 100 {
        tracing::warn!(
            target: "level_brackets::config",
            %faction,
            sum = outcome.balanced_sum,
            "brackets.percent_sum_exceeds_100"
        );
    }
    if outcome.deactivated > 0 && verbosity.summaries() {
        tracing::info!(
            target: "level_brackets::config",
            %faction,
            deactivated = outcome.deactivated,
            "brackets.ranges_outside_level_bounds"
        );
    }
}
