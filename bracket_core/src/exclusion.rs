//! Decides which agents are exempt from bracket management.
//!
//! The oracle only reads snapshots that are rebuilt at fixed points of the
//! cycle; ground truth lives behind [`SocialFactSource`].

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use bevy::prelude::Resource;

use crate::{
    bracket_config::BracketConfig,
    components::{Agent, AgentId, GuildId},
};

/// Bulk source of guild and friend facts, typically backed by the character database.
pub trait SocialFactSource: Send + Sync {
    /// Every known guild mapped to whether it has at least one human member.
    fn guild_real_player_index(&self) -> HashMap<GuildId, bool>;

    /// Characters that appear on some human's friend list.
    fn friend_flagged_characters(&self) -> HashSet<AgentId>;
}

#[derive(Resource)]
pub struct SocialFacts(pub Box<dyn SocialFactSource>);

impl SocialFacts {
    pub fn new(source: impl SocialFactSource + 'static) -> Self {
        Self(Box::new(source))
    }
}

impl Default for SocialFacts {
    fn default() -> Self {
        Self::new(StaticSocialFacts::default())
    }
}

/// Fixed facts, useful for hosts without a database.
#[derive(Debug, Clone, Default)]
pub struct StaticSocialFacts {
    pub guilds: HashMap<GuildId, bool>,
    pub friends: HashSet<AgentId>,
}

impl SocialFactSource for StaticSocialFacts {
    fn guild_real_player_index(&self) -> HashMap<GuildId, bool> {
        self.guilds.clone()
    }

    fn friend_flagged_characters(&self) -> HashSet<AgentId> {
        self.friends.clone()
    }
}

/// Facts the host keeps mutating after handing a clone to the engine.
#[derive(Debug, Clone, Default)]
pub struct SharedSocialFacts(Arc<RwLock<StaticSocialFacts>>);

impl SharedSocialFacts {
    pub fn update(&self, apply: impl FnOnce(&mut StaticSocialFacts)) {
        let mut guard = self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut guard);
    }
}

impl SocialFactSource for SharedSocialFacts {
    fn guild_real_player_index(&self) -> HashMap<GuildId, bool> {
        let guard = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.guild_real_player_index()
    }

    fn friend_flagged_characters(&self) -> HashSet<AgentId> {
        let guard = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.friend_flagged_characters()
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct GuildRealPlayerIndex {
    guilds: HashMap<GuildId, bool>,
}

impl GuildRealPlayerIndex {
    pub fn rebuild(&mut self, source: &dyn SocialFactSource) {
        self.guilds = source.guild_real_player_index();
    }

    pub fn has_real_player(&self, guild: GuildId) -> bool {
        self.guilds.get(&guild).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct FriendFlaggedSet {
    characters: HashSet<AgentId>,
}

impl FriendFlaggedSet {
    pub fn rebuild(&mut self, source: &dyn SocialFactSource) {
        self.characters = source.friend_flagged_characters();
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.characters.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// Lower-cased character names that are never managed.
#[derive(Resource, Debug, Clone, Default)]
pub struct ExcludedNames(pub HashSet<String>);

impl ExcludedNames {
    pub fn from_config(config: &BracketConfig) -> Self {
        Self(config.excluded_name_set())
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.0.is_empty() && self.0.contains(&name.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionReason {
    Denylisted,
    GuildWithRealPlayer,
    FriendListed,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::Denylisted => "denylisted",
            ExclusionReason::GuildWithRealPlayer => "guild_with_real_player",
            ExclusionReason::FriendListed => "friend_listed",
        }
    }
}

/// Borrowed view over the exclusion snapshots for one pass.
#[derive(Clone, Copy)]
pub struct ExclusionOracle<'a> {
    pub names: &'a ExcludedNames,
    pub guilds: &'a GuildRealPlayerIndex,
    pub friends: &'a FriendFlaggedSet,
    pub ignore_guild_with_real_player: bool,
    pub ignore_friend_listed: bool,
}

impl<'a> ExclusionOracle<'a> {
    pub fn new(
        config: &BracketConfig,
        names: &'a ExcludedNames,
        guilds: &'a GuildRealPlayerIndex,
        friends: &'a FriendFlaggedSet,
    ) -> Self {
        Self {
            names,
            guilds,
            friends,
            ignore_guild_with_real_player: config.ignore_guild_with_real_player,
            ignore_friend_listed: config.ignore_friend_listed,
        }
    }

    /// First matching reason, checked as denylist, guild, friend list.
    pub fn check(&self, agent: &Agent) -> Option<ExclusionReason> {
        if self.names.contains(&agent.name) {
            return Some(ExclusionReason::Denylisted);
        }
        if self.ignore_guild_with_real_player
            && agent
                .guild
                .is_some_and(|guild| self.guilds.has_real_player(guild))
        {
            return Some(ExclusionReason::GuildWithRealPlayer);
        }
        if self.ignore_friend_listed && self.friends.contains(agent.id) {
            return Some(ExclusionReason::FriendListed);
        }
        None
    }

    pub fn is_excluded(&self, agent: &Agent) -> bool {
        self.check(agent).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{CharacterClass, Controller},
        faction::Faction,
    };

    fn agent(id: u64, name: &str, guild: Option<u32>) -> Agent {
        Agent {
            id: AgentId(id),
            name: name.to_string(),
            class: CharacterClass::Mage,
            faction: Faction::Alliance,
            controller: Controller::RandomBot,
            guild: guild.map(GuildId),
        }
    }

    fn facts() -> StaticSocialFacts {
        let mut facts = StaticSocialFacts::default();
        facts.guilds.insert(GuildId(1), true);
        facts.guilds.insert(GuildId(2), false);
        facts.friends.insert(AgentId(30));
        facts
    }

    #[test]
    fn reasons_are_checked_in_order() {
        let config = BracketConfig {
            excluded_names: "Botty".to_string(),
            ..BracketConfig::default()
        };
        let names = ExcludedNames::from_config(&config);
        let mut guilds = GuildRealPlayerIndex::default();
        let mut friends = FriendFlaggedSet::default();
        guilds.rebuild(&facts());
        friends.rebuild(&facts());
        let oracle = ExclusionOracle::new(&config, &names, &guilds, &friends);

        assert_eq!(
            oracle.check(&agent(30, "botty", Some(1))),
            Some(ExclusionReason::Denylisted)
        );
        assert_eq!(
            oracle.check(&agent(30, "other", Some(1))),
            Some(ExclusionReason::GuildWithRealPlayer)
        );
        assert_eq!(
            oracle.check(&agent(30, "other", Some(2))),
            Some(ExclusionReason::FriendListed)
        );
        assert_eq!(oracle.check(&agent(31, "other", Some(2))), None);
        assert_eq!(oracle.check(&agent(31, "other", Some(99))), None);
    }

    #[test]
    fn toggles_disable_guild_and_friend_checks() {
        let config = BracketConfig {
            ignore_guild_with_real_player: false,
            ignore_friend_listed: false,
            ..BracketConfig::default()
        };
        let names = ExcludedNames::from_config(&config);
        let mut guilds = GuildRealPlayerIndex::default();
        let mut friends = FriendFlaggedSet::default();
        guilds.rebuild(&facts());
        friends.rebuild(&facts());
        let oracle = ExclusionOracle::new(&config, &names, &guilds, &friends);
        assert!(!oracle.is_excluded(&agent(30, "other", Some(1))));
    }

    #[test]
    fn shared_facts_reflect_host_updates() {
        let shared = SharedSocialFacts::default();
        let mut friends = FriendFlaggedSet::default();
        friends.rebuild(&shared);
        assert!(friends.is_empty());
        shared.update(|facts| {
            facts.friends.insert(AgentId(5));
        });
        friends.rebuild(&shared);
        assert!(friends.contains(AgentId(5)));
    }
}
