use std::fmt;

use bevy::prelude::*;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::faction::Faction;

/// Minimum level a Death Knight may ever hold.
pub const DEATH_KNIGHT_FLOOR: u8 = 55;

/// Stable character identity, independent of the ECS entity holding it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Who drives a character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Controller {
    Human,
    /// Server-spawned bot owned by the random bot pool. Only these are managed.
    RandomBot,
    /// Bot logged in alongside a human account.
    AltBot,
}

impl Controller {
    pub fn is_human(self) -> bool {
        matches!(self, Controller::Human)
    }

    pub fn is_managed(self) -> bool {
        matches!(self, Controller::RandomBot)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Warrior,
    Paladin,
    Hunter,
    Rogue,
    Priest,
    DeathKnight,
    Shaman,
    Mage,
    Warlock,
    Druid,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 10] = [
        CharacterClass::Warrior,
        CharacterClass::Paladin,
        CharacterClass::Hunter,
        CharacterClass::Rogue,
        CharacterClass::Priest,
        CharacterClass::DeathKnight,
        CharacterClass::Shaman,
        CharacterClass::Mage,
        CharacterClass::Warlock,
        CharacterClass::Druid,
    ];

    /// Level below which this class can never be placed.
    pub fn hard_floor(self) -> Option<u8> {
        match self {
            CharacterClass::DeathKnight => Some(DEATH_KNIGHT_FLOOR),
            _ => None,
        }
    }

    /// Whether a bracket topping out at `upper` holds any level legal for this class.
    pub fn can_reach(self, upper: u8) -> bool {
        self.hard_floor().map_or(true, |floor| upper >= floor)
    }

    pub fn display_label(self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Paladin => "Paladin",
            CharacterClass::Hunter => "Hunter",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Priest => "Priest",
            CharacterClass::DeathKnight => "Death Knight",
            CharacterClass::Shaman => "Shaman",
            CharacterClass::Mage => "Mage",
            CharacterClass::Warlock => "Warlock",
            CharacterClass::Druid => "Druid",
        }
    }
}

/// Identity and allegiance of a character in the world.
#[derive(Component, Debug, Clone)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub class: CharacterClass,
    pub faction: Faction,
    pub controller: Controller,
    pub guild: Option<GuildId>,
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub value: u8,
    pub xp: u32,
}

impl Level {
    pub fn new(value: u8) -> Self {
        Self { value, xp: 0 }
    }
}

/// Session plumbing as seen by the engine.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub in_world: bool,
    pub logging_out: bool,
}

impl Presence {
    pub fn online() -> Self {
        Self {
            in_world: true,
            logging_out: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.in_world && !self.logging_out
    }
}

impl Default for Presence {
    fn default() -> Self {
        Self::online()
    }
}

bitflags! {
    /// Transient activity state flags maintained by the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ActivityFlags: u16 {
        const DEAD = 1 << 0;
        const IN_COMBAT = 1 << 1;
        const IN_INSTANCE = 1 << 2;
        const IN_QUEUE = 1 << 3;
        const FLYING = 1 << 4;
        const MOUNTED = 1 << 5;
    }
}

#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pub flags: ActivityFlags,
    pub group: Option<GroupId>,
}

impl Activity {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn with(flags: ActivityFlags) -> Self {
        Self { flags, group: None }
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }
}

/// Convenience bundle for hosts spawning characters.
#[derive(Bundle, Debug, Clone)]
pub struct AgentBundle {
    pub agent: Agent,
    pub level: Level,
    pub presence: Presence,
    pub activity: Activity,
}

impl AgentBundle {
    pub fn new(agent: Agent, level: u8) -> Self {
        Self {
            agent,
            level: Level::new(level),
            presence: Presence::online(),
            activity: Activity::idle(),
        }
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = presence;
        self
    }
}
