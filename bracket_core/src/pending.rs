//! Deferred level resets.
//!
//! Entries are validated when drained, never when queued: an agent may log
//! out, die, join a human's group or a human's guild in between.

use std::collections::{HashSet, VecDeque};

use bevy::prelude::Resource;

use crate::{
    brackets::BracketTables,
    components::{Activity, Agent, AgentId, Presence},
    exclusion::{ExclusionOracle, ExclusionReason},
    faction::Faction,
    safety::{unsafe_reason, HumanGroups, UnsafeReason},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingResetEntry {
    pub agent: AgentId,
    pub faction: Faction,
    pub target: usize,
    /// Drains that found the agent unsafe.
    pub attempts: u32,
}

/// Insertion-ordered queue holding at most one entry per agent.
#[derive(Resource, Debug, Clone, Default)]
pub struct PendingResetQueue {
    entries: VecDeque<PendingResetEntry>,
    queued: HashSet<AgentId>,
}

impl PendingResetQueue {
    /// Queue a reset unless the agent already has one. Returns whether an
    /// entry was added.
    pub fn enqueue(&mut self, agent: AgentId, faction: Faction, target: usize) -> bool {
        if !self.queued.insert(agent) {
            return false;
        }
        self.entries.push_back(PendingResetEntry {
            agent,
            faction,
            target,
            attempts: 0,
        });
        true
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.queued.contains(&agent)
    }

    pub fn get(&self, agent: AgentId) -> Option<&PendingResetEntry> {
        if !self.contains(agent) {
            return None;
        }
        self.entries.iter().find(|entry| entry.agent == agent)
    }

    pub fn remove(&mut self, agent: AgentId) -> Option<PendingResetEntry> {
        if !self.queued.remove(&agent) {
            return None;
        }
        let position = self.entries.iter().position(|entry| entry.agent == agent)?;
        self.entries.remove(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingResetEntry> {
        self.entries.iter()
    }

    /// Detach up to `limit` entries from the front (0 takes everything).
    pub fn take_batch(&mut self, limit: usize) -> Vec<PendingResetEntry> {
        let count = if limit == 0 {
            self.entries.len()
        } else {
            limit.min(self.entries.len())
        };
        let batch: Vec<_> = self.entries.drain(..count).collect();
        for entry in &batch {
            self.queued.remove(&entry.agent);
        }
        batch
    }

    /// Put an attempted entry back at the tail.
    pub fn requeue(&mut self, entry: PendingResetEntry) {
        if self.queued.insert(entry.agent) {
            self.entries.push_back(entry);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Missing,
    LeftWorld,
    Excluded(ExclusionReason),
    FactionChanged,
    BracketUnavailable,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::Missing => "missing",
            DiscardReason::LeftWorld => "left_world",
            DiscardReason::Excluded(reason) => reason.as_str(),
            DiscardReason::FactionChanged => "faction_changed",
            DiscardReason::BracketUnavailable => "bracket_unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainVerdict {
    Discard(DiscardReason),
    Keep(UnsafeReason),
    Reset,
}

/// Live state of a queued agent at drain time.
#[derive(Debug, Clone, Copy)]
pub struct DrainCandidate<'a> {
    pub agent: &'a Agent,
    pub presence: &'a Presence,
    pub activity: &'a Activity,
}

/// Re-validate one entry: existence and session, then exclusions, then the
/// target bracket, then safety.
pub fn evaluate_entry(
    entry: &PendingResetEntry,
    candidate: Option<DrainCandidate<'_>>,
    oracle: &ExclusionOracle<'_>,
    tables: &BracketTables,
    human_groups: &HumanGroups,
) -> DrainVerdict {
    let Some(candidate) = candidate else {
        return DrainVerdict::Discard(DiscardReason::Missing);
    };
    if !candidate.presence.is_valid() {
        return DrainVerdict::Discard(DiscardReason::LeftWorld);
    }
    if let Some(reason) = oracle.check(candidate.agent) {
        return DrainVerdict::Discard(DiscardReason::Excluded(reason));
    }
    if candidate.agent.faction != entry.faction {
        return DrainVerdict::Discard(DiscardReason::FactionChanged);
    }
    let target_ok = tables
        .table(entry.faction)
        .get(entry.target)
        .is_some_and(|bracket| bracket.is_active());
    if !target_ok {
        return DrainVerdict::Discard(DiscardReason::BracketUnavailable);
    }
    match unsafe_reason(candidate.presence, candidate.activity, human_groups) {
        Some(reason) => DrainVerdict::Keep(reason),
        None => DrainVerdict::Reset,
    }
}

/// Counters for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub attempted: usize,
    pub reset: usize,
    pub refused: usize,
    pub kept: usize,
    pub expired: usize,
    pub discarded: usize,
    pub remaining: usize,
}
