use std::sync::{Arc, Mutex};

use bevy::prelude::Resource;
use rand::{rngs::SmallRng, Rng};

use crate::{
    bracket_config::LogVerbosity,
    brackets::Bracket,
    components::{Activity, ActivityFlags, Agent, AgentId, CharacterClass, Level},
};

pub const RESET_MESSAGE: &str = "[level-brackets] Your level has been reset.";

/// Re-rolls gear, talents and stats for a character's new level.
pub trait Rerandomizer: Send + Sync {
    fn rerandomize(&self, agent: &Agent, level: u8);
}

/// Fire-and-forget chat message to a character.
pub trait Notifier: Send + Sync {
    fn notify(&self, agent: &Agent, message: &str);
}

/// Host collaborators invoked by a level reset.
#[derive(Resource)]
pub struct ResetHooks {
    pub rerandomizer: Box<dyn Rerandomizer>,
    pub notifier: Box<dyn Notifier>,
}

impl ResetHooks {
    pub fn new(rerandomizer: impl Rerandomizer + 'static, notifier: impl Notifier + 'static) -> Self {
        Self {
            rerandomizer: Box::new(rerandomizer),
            notifier: Box::new(notifier),
        }
    }

    /// Both hooks backed by one recorder.
    pub fn recording(recorder: &ResetRecorder) -> Self {
        Self::new(recorder.clone(), recorder.clone())
    }
}

impl Default for ResetHooks {
    fn default() -> Self {
        Self::new(NoopHooks, NoopHooks)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl Rerandomizer for NoopHooks {
    fn rerandomize(&self, _agent: &Agent, _level: u8) {}
}

impl Notifier for NoopHooks {
    fn notify(&self, _agent: &Agent, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookCall {
    Rerandomize { agent: AgentId, level: u8 },
    Notify { agent: AgentId, message: String },
}

/// Records every hook invocation, for hosts that replay them later and for tests.
#[derive(Debug, Clone, Default)]
pub struct ResetRecorder(Arc<Mutex<Vec<HookCall>>>);

impl ResetRecorder {
    pub fn calls(&self) -> Vec<HookCall> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn rerandomized(&self) -> Vec<(AgentId, u8)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HookCall::Rerandomize { agent, level } => Some((agent, level)),
                HookCall::Notify { .. } => None,
            })
            .collect()
    }

    fn push(&self, call: HookCall) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

impl Rerandomizer for ResetRecorder {
    fn rerandomize(&self, agent: &Agent, level: u8) {
        self.push(HookCall::Rerandomize {
            agent: agent.id,
            level,
        });
    }
}

impl Notifier for ResetRecorder {
    fn notify(&self, agent: &Agent, message: &str) {
        self.push(HookCall::Notify {
            agent: agent.id,
            message: message.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Applied { from: u8, to: u8 },
    /// The bracket tops out below the class floor.
    Refused,
}

/// Uniform level inside `bracket`, lifted to the class floor.
pub fn roll_level(bracket: &Bracket, class: CharacterClass, rng: &mut SmallRng) -> Option<u8> {
    if !bracket.is_active() {
        return None;
    }
    let lower = match class.hard_floor() {
        Some(floor) if bracket.upper < floor => return None,
        Some(floor) => bracket.lower.max(floor),
        None => bracket.lower,
    };
    Some(rng.gen_range(lower..=bracket.upper))
}

/// Move one agent into `bracket`.
///
/// Callers must invoke this at most once per decision; every call rolls a
/// fresh level.
pub fn apply_level_reset(
    agent: &Agent,
    level: &mut Level,
    activity: &mut Activity,
    bracket: &Bracket,
    rng: &mut SmallRng,
    hooks: &ResetHooks,
    verbosity: LogVerbosity,
) -> ResetOutcome {
    let Some(new_level) = roll_level(bracket, agent.class, rng) else {
        tracing::warn!(
            target: "level_brackets::reset",
            agent = %agent.id,
            name = %agent.name,
            class = agent.class.display_label(),
            lower = bracket.lower,
            upper = bracket.upper,
            "reset.refused.unreachable_range"
        );
        return ResetOutcome::Refused;
    };

    activity.flags.remove(ActivityFlags::MOUNTED);
    let from = level.value;
    level.value = new_level;
    level.xp = 0;
    hooks.rerandomizer.rerandomize(agent, new_level);
    hooks.notifier.notify(agent, RESET_MESSAGE);

    if verbosity.per_agent() {
        tracing::info!(
            target: "level_brackets::reset",
            agent = %agent.id,
            name = %agent.name,
            class = agent.class.display_label(),
            from,
            to = new_level,
            lower = bracket.lower,
            upper = bracket.upper,
            "reset.applied"
        );
    }
    ResetOutcome::Applied { from, to: new_level }
}
