//! Desired shares derived from where human players currently are.
//!
//! Each active bracket weighs `1 + k * ln(1 + humans) / total_humans`, so an
//! empty server spreads bots evenly and crowded brackets attract more bots
//! with diminishing returns.

use crate::{
    brackets::{BracketTables, FactionBracketTable},
    components::{Agent, Level, Presence},
    faction::{Faction, PerFaction},
};

/// Online humans per faction and bracket.
pub fn count_real_players<'a>(
    characters: impl IntoIterator<Item = (&'a Agent, &'a Level, &'a Presence)>,
    tables: &BracketTables,
) -> PerFaction<Vec<u32>> {
    let mut counts = PerFaction::from_fn(|faction| vec![0u32; tables.table(faction).len()]);
    for (agent, level, presence) in characters {
        if !agent.controller.is_human() || !presence.is_valid() {
            continue;
        }
        if let Some(index) = tables.table(agent.faction).resolve(level.value) {
            counts[agent.faction][index] += 1;
        }
    }
    counts
}

pub fn bracket_weights(table: &FactionBracketTable, real_counts: &[u32], real_player_weight: f64) -> Vec<f64> {
    let total_real: u32 = real_counts.iter().sum();
    let scale = if total_real > 0 {
        1.0 / f64::from(total_real)
    } else {
        1.0
    };
    table
        .brackets()
        .iter()
        .enumerate()
        .map(|(index, bracket)| {
            if !bracket.is_active() {
                return 0.0;
            }
            let humans = real_counts.get(index).copied().unwrap_or(0);
            1.0 + real_player_weight * scale * f64::from(humans).ln_1p()
        })
        .collect()
}

/// Turn weights into integer shares summing to exactly 100.
///
/// Rounding shortfalls go to positive-weight brackets in index order;
/// overshoot is taken back from the highest index down, never below 1.
pub fn normalize_weights(weights: &[f64]) -> Vec<u32> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return vec![0; weights.len()];
    }
    let mut percents: Vec<u32> = weights
        .iter()
        .map(|w| {
            if *w > 0.0 {
                (100.0 * w / total).round() as u32
            } else {
                0
            }
        })
        .collect();

    let mut sum: u32 = percents.iter().sum();
    while sum < 100 {
        for (pct, _) in percents.iter_mut().zip(weights).filter(|(_, w)| **w > 0.0) {
            if sum >= 100 {
                break;
            }
            *pct += 1;
            sum += 1;
        }
    }
    while sum > 100 {
        let before = sum;
        for (pct, _) in percents
            .iter_mut()
            .zip(weights)
            .rev()
            .filter(|(pct, w)| **w > 0.0 && **pct > 1)
        {
            if sum <= 100 {
                break;
            }
            *pct -= 1;
            sum -= 1;
        }
        if sum == before {
            break;
        }
    }
    percents
}

/// Replace every table's shares with weights derived from `real_counts`.
///
/// In synced mode both tables receive the weights computed from the
/// cross-faction totals.
pub fn apply_dynamic_distribution(
    tables: &mut BracketTables,
    real_counts: &PerFaction<Vec<u32>>,
    real_player_weight: f64,
) -> PerFaction<Vec<f64>> {
    let weights = if tables.is_synced() {
        let alliance = &real_counts[Faction::Alliance];
        let horde = &real_counts[Faction::Horde];
        let combined: Vec<u32> = alliance
            .iter()
            .zip(horde.iter())
            .map(|(a, h)| a + h)
            .collect();
        let shared = bracket_weights(
            tables.table(Faction::Alliance),
            &combined,
            real_player_weight,
        );
        PerFaction::new(shared.clone(), shared)
    } else {
        PerFaction::from_fn(|faction| {
            bracket_weights(tables.table(faction), &real_counts[faction], real_player_weight)
        })
    };

    for (faction, table) in tables.tables_mut().iter_mut() {
        if table.active_count() == 0 {
            continue;
        }
        table.set_percents(&normalize_weights(&weights[faction]));
    }
    weights
}
