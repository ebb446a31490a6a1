use bevy::prelude::*;
use rand::{rngs::SmallRng, SeedableRng};

/// Milliseconds elapsed since the previous host tick.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickDelta(pub u32);

/// Total host ticks observed.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketTick(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    PendingDrain,
    GuildRefresh,
    FullCycle,
}

/// Independent elapsed-time accumulators for the three cadences.
#[derive(Resource, Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketTimers {
    pending_drain_ms: u64,
    guild_refresh_ms: u64,
    full_cycle_ms: u64,
}

impl BracketTimers {
    pub fn advance(&mut self, delta_ms: u32) {
        let delta = u64::from(delta_ms);
        self.pending_drain_ms = self.pending_drain_ms.saturating_add(delta);
        self.guild_refresh_ms = self.guild_refresh_ms.saturating_add(delta);
        self.full_cycle_ms = self.full_cycle_ms.saturating_add(delta);
    }

    pub fn elapsed(&self, kind: TimerKind) -> u64 {
        match kind {
            TimerKind::PendingDrain => self.pending_drain_ms,
            TimerKind::GuildRefresh => self.guild_refresh_ms,
            TimerKind::FullCycle => self.full_cycle_ms,
        }
    }

    /// Fire and reset the accumulator once `interval_ms` has elapsed.
    pub fn take_due(&mut self, kind: TimerKind, interval_ms: u64) -> bool {
        let slot = match kind {
            TimerKind::PendingDrain => &mut self.pending_drain_ms,
            TimerKind::GuildRefresh => &mut self.guild_refresh_ms,
            TimerKind::FullCycle => &mut self.full_cycle_ms,
        };
        if *slot < interval_ms {
            return false;
        }
        *slot = 0;
        true
    }
}

/// Random source for level rolls.
#[derive(Resource, Debug, Clone)]
pub struct BracketRng(pub SmallRng);

impl BracketRng {
    pub fn from_seed(seed: u64) -> Self {
        if seed == 0 {
            Self(SmallRng::from_entropy())
        } else {
            Self(SmallRng::seed_from_u64(seed ^ 0xB4AC_4E75))
        }
    }
}
