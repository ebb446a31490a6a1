use bevy::prelude::Entity;

use crate::{
    bracket_config::LogVerbosity,
    brackets::BracketTables,
    components::{Agent, AgentId, CharacterClass, Level, Presence},
    exclusion::{ExclusionOracle, ExclusionReason},
    faction::PerFaction,
    pending::PendingResetQueue,
};

/// A managed agent sitting in a bracket this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketMember {
    pub entity: Entity,
    pub agent: AgentId,
    pub class: CharacterClass,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactionCensus {
    pub actual: Vec<u32>,
    pub members: Vec<Vec<BracketMember>>,
    /// Managed agents, including those outside every bracket.
    pub total: u32,
    pub unresolved: u32,
    pub excluded: u32,
    /// Agents already waiting on a reset, counted but not offered as members.
    pub pending: u32,
    /// `(current, target)` bracket pairs of those pending agents.
    pub in_flight: Vec<(usize, usize)>,
}

impl FactionCensus {
    fn with_brackets(count: usize) -> Self {
        Self {
            actual: vec![0; count],
            members: vec![Vec::new(); count],
            ..Self::default()
        }
    }

    /// Counts as they will stand once every queued move lands.
    pub fn projected_actual(&self) -> Vec<u32> {
        let mut projected = self.actual.clone();
        for &(from, to) in &self.in_flight {
            if from < projected.len() && to < projected.len() && projected[from] > 0 {
                projected[from] -= 1;
                projected[to] += 1;
            }
        }
        projected
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusReport {
    pub factions: PerFaction<FactionCensus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInWorld,
    NotManaged,
    Excluded(ExclusionReason),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotInWorld => "not_in_world",
            SkipReason::NotManaged => "not_managed",
            SkipReason::Excluded(reason) => reason.as_str(),
        }
    }
}

/// Why an agent does not take part in this cycle, if it doesn't.
pub fn skip_reason(
    agent: &Agent,
    presence: &Presence,
    oracle: &ExclusionOracle<'_>,
) -> Option<SkipReason> {
    if !presence.is_valid() {
        return Some(SkipReason::NotInWorld);
    }
    if !agent.controller.is_managed() {
        return Some(SkipReason::NotManaged);
    }
    oracle.check(agent).map(SkipReason::Excluded)
}

/// Classify every managed agent into its faction's brackets.
///
/// Agents outside every bracket are queued for a reset into the nearest one
/// they may occupy and are left out of the per-bracket counts.
pub fn take_census<'a>(
    agents: impl IntoIterator<Item = (Entity, &'a Agent, &'a Level, &'a Presence)>,
    tables: &BracketTables,
    oracle: &ExclusionOracle<'_>,
    queue: &mut PendingResetQueue,
    verbosity: LogVerbosity,
) -> CensusReport {
    let mut report = CensusReport {
        factions: PerFaction::from_fn(|faction| {
            FactionCensus::with_brackets(tables.table(faction).len())
        }),
    };

    for (entity, agent, level, presence) in agents {
        match skip_reason(agent, presence, oracle) {
            None => {}
            Some(SkipReason::Excluded(reason)) => {
                report.factions[agent.faction].excluded += 1;
                let dropped = queue.remove(agent.id).is_some();
                if verbosity.per_agent() {
                    tracing::info!(
                        target: "level_brackets::census",
                        agent = %agent.id,
                        name = %agent.name,
                        reason = reason.as_str(),
                        dropped_pending = dropped,
                        "census.agent.excluded"
                    );
                }
                continue;
            }
            Some(reason) => {
                if verbosity.per_agent() {
                    tracing::info!(
                        target: "level_brackets::census",
                        agent = %agent.id,
                        reason = reason.as_str(),
                        "census.agent.skipped"
                    );
                }
                continue;
            }
        }

        let table = tables.table(agent.faction);
        let census = &mut report.factions[agent.faction];
        census.total += 1;

        if let Some(index) = table.resolve(level.value) {
            census.actual[index] += 1;
            if let Some(entry) = queue.get(agent.id) {
                census.pending += 1;
                if entry.faction == agent.faction && entry.target != index {
                    census.in_flight.push((index, entry.target));
                }
            } else {
                census.members[index].push(BracketMember {
                    entity,
                    agent: agent.id,
                    class: agent.class,
                });
            }
            continue;
        }

        census.unresolved += 1;
        match table.nearest(level.value, agent.class) {
            Some(target) => {
                let queued = queue.enqueue(agent.id, agent.faction, target);
                if verbosity.per_agent() {
                    tracing::info!(
                        target: "level_brackets::census",
                        agent = %agent.id,
                        name = %agent.name,
                        level = level.value,
                        target_range = target + 1,
                        newly_flagged = queued,
                        "census.agent.unresolved"
                    );
                }
            }
            None => {
                tracing::warn!(
                    target: "level_brackets::census",
                    agent = %agent.id,
                    name = %agent.name,
                    level = level.value,
                    class = agent.class.display_label(),
                    "census.agent.no_reachable_range"
                );
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bracket_config::{BracketConfig, RangeConfig},
        components::{Controller, GuildId},
        exclusion::{ExcludedNames, FriendFlaggedSet, GuildRealPlayerIndex, StaticSocialFacts},
        faction::Faction,
    };

    struct Row {
        entity: Entity,
        agent: Agent,
        level: Level,
        presence: Presence,
    }

    fn row(id: u64, faction: Faction, level: u8, controller: Controller) -> Row {
        Row {
            entity: Entity::from_raw(id as u32),
            agent: Agent {
                id: AgentId(id),
                name: format!("bot{id}"),
                class: CharacterClass::Warrior,
                faction,
                controller,
                guild: None,
            },
            level: Level::new(level),
            presence: Presence::online(),
        }
    }

    fn run(rows: &[Row], config: &BracketConfig, queue: &mut PendingResetQueue) -> CensusReport {
        run_with(rows, config, queue, &GuildRealPlayerIndex::default())
    }

    fn run_with(
        rows: &[Row],
        config: &BracketConfig,
        queue: &mut PendingResetQueue,
        guilds: &GuildRealPlayerIndex,
    ) -> CensusReport {
        let tables = BracketTables::from_config(config).expect("tables");
        let names = ExcludedNames::from_config(config);
        let friends = FriendFlaggedSet::default();
        let oracle = ExclusionOracle::new(config, &names, guilds, &friends);
        take_census(
            rows.iter()
                .map(|r| (r.entity, &r.agent, &r.level, &r.presence)),
            &tables,
            &oracle,
            queue,
            LogVerbosity::default(),
        )
    }

    fn gap_config() -> BracketConfig {
        BracketConfig::default().with_ranges(vec![
            RangeConfig::new(1, 40, 50),
            RangeConfig::new(50, 80, 50),
        ])
    }

    #[test]
    fn counts_managed_agents_per_faction_and_bracket() {
        let rows = vec![
            row(1, Faction::Alliance, 5, Controller::RandomBot),
            row(2, Faction::Alliance, 75, Controller::RandomBot),
            row(3, Faction::Horde, 12, Controller::RandomBot),
            row(4, Faction::Horde, 12, Controller::Human),
            row(5, Faction::Horde, 12, Controller::AltBot),
        ];
        let mut queue = PendingResetQueue::default();
        let report = run(&rows, &BracketConfig::default(), &mut queue);
        let alliance = &report.factions[Faction::Alliance];
        assert_eq!(alliance.total, 2);
        assert_eq!(alliance.actual[0], 1);
        assert_eq!(alliance.actual[7], 1);
        let horde = &report.factions[Faction::Horde];
        assert_eq!(horde.total, 1);
        assert_eq!(horde.actual[1], 1);
        assert_eq!(horde.members[1][0].agent, AgentId(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn gap_levels_are_flagged_for_the_nearest_bracket_once() {
        let rows = vec![row(9, Faction::Alliance, 45, Controller::RandomBot)];
        let mut queue = PendingResetQueue::default();
        let config = gap_config();
        let report = run(&rows, &config, &mut queue);
        let alliance = &report.factions[Faction::Alliance];
        assert_eq!(alliance.actual, vec![0, 0]);
        assert_eq!(alliance.total, 1);
        assert_eq!(alliance.unresolved, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(AgentId(9)).map(|e| e.target), Some(0));

        run(&rows, &config, &mut queue);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn skip_reasons_name_why_an_agent_sits_out() {
        let config = BracketConfig::default();
        let names = ExcludedNames::from_config(&config);
        let guilds = GuildRealPlayerIndex::default();
        let friends = FriendFlaggedSet::default();
        let oracle = ExclusionOracle::new(&config, &names, &guilds, &friends);

        let human = row(1, Faction::Horde, 30, Controller::Human);
        let reason = skip_reason(&human.agent, &human.presence, &oracle);
        assert_eq!(reason, Some(SkipReason::NotManaged));
        assert_eq!(reason.map(|r| r.as_str()), Some("not_managed"));

        let mut away = row(2, Faction::Horde, 30, Controller::RandomBot);
        away.presence.logging_out = true;
        let reason = skip_reason(&away.agent, &away.presence, &oracle);
        assert_eq!(reason.map(|r| r.as_str()), Some("not_in_world"));

        let bot = row(3, Faction::Horde, 30, Controller::RandomBot);
        assert_eq!(skip_reason(&bot.agent, &bot.presence, &oracle), None);
    }

    #[test]
    fn offline_agents_are_ignored() {
        let mut offline = row(1, Faction::Horde, 30, Controller::RandomBot);
        offline.presence.in_world = false;
        let mut queue = PendingResetQueue::default();
        let report = run(&[offline], &BracketConfig::default(), &mut queue);
        assert_eq!(report.factions[Faction::Horde].total, 0);
    }

    #[test]
    fn excluded_agents_never_become_members_and_lose_pending_entries() {
        let mut guilded = row(7, Faction::Alliance, 45, Controller::RandomBot);
        guilded.agent.guild = Some(GuildId(3));
        let rows = vec![guilded];
        let mut queue = PendingResetQueue::default();
        let config = gap_config();
        run(&rows, &config, &mut queue);
        assert!(queue.contains(AgentId(7)));

        let mut facts = StaticSocialFacts::default();
        facts.guilds.insert(GuildId(3), true);
        let mut guilds = GuildRealPlayerIndex::default();
        guilds.rebuild(&facts);
        let report = run_with(&rows, &config, &mut queue, &guilds);
        let alliance = &report.factions[Faction::Alliance];
        assert_eq!(alliance.excluded, 1);
        assert_eq!(alliance.total, 0);
        assert!(alliance.members.iter().all(|m| m.is_empty()));
        assert!(!queue.contains(AgentId(7)));
    }

    #[test]
    fn pending_agents_are_counted_but_not_offered() {
        let rows = vec![
            row(1, Faction::Horde, 3, Controller::RandomBot),
            row(2, Faction::Horde, 4, Controller::RandomBot),
        ];
        let mut queue = PendingResetQueue::default();
        queue.enqueue(AgentId(2), Faction::Horde, 5);
        let report = run(&rows, &BracketConfig::default(), &mut queue);
        let horde = &report.factions[Faction::Horde];
        assert_eq!(horde.actual[0], 2);
        assert_eq!(horde.pending, 1);
        assert_eq!(horde.members[0].len(), 1);
        assert_eq!(horde.members[0][0].agent, AgentId(1));
        assert_eq!(horde.in_flight, vec![(0, 5)]);
        let projected = horde.projected_actual();
        assert_eq!(projected[0], 1);
        assert_eq!(projected[5], 1);
    }
}
