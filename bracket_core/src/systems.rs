use std::collections::HashMap;

use bevy::{ecs::system::SystemParam, prelude::*};

use crate::{
    bracket_config::BracketConfigHandle,
    brackets::BracketTables,
    census::take_census,
    components::{Activity, Agent, AgentId, Level, Presence},
    dynamic::{apply_dynamic_distribution, count_real_players},
    exclusion::{
        ExcludedNames, ExclusionOracle, FriendFlaggedSet, GuildRealPlayerIndex, SocialFacts,
    },
    faction::Faction,
    metrics::BracketMetrics,
    pending::{evaluate_entry, DrainCandidate, DrainSummary, DrainVerdict, PendingResetQueue},
    reconcile::{plan_moves, Candidate, MoveKind, PlannedMove},
    reset::{apply_level_reset, ResetHooks, ResetOutcome},
    resources::{BracketRng, BracketTick, BracketTimers, TickDelta, TimerKind},
    safety::{is_safe, HumanGroups},
};

pub type AgentQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Agent,
        &'static mut Level,
        &'static Presence,
        &'static mut Activity,
    ),
>;

#[derive(SystemParam)]
pub struct DrainParams<'w, 's> {
    pub config: Res<'w, BracketConfigHandle>,
    pub tables: Res<'w, BracketTables>,
    pub queue: ResMut<'w, PendingResetQueue>,
    pub names: Res<'w, ExcludedNames>,
    pub guilds: Res<'w, GuildRealPlayerIndex>,
    pub friends: Res<'w, FriendFlaggedSet>,
    pub hooks: Res<'w, ResetHooks>,
    pub rng: ResMut<'w, BracketRng>,
    pub timers: ResMut<'w, BracketTimers>,
    pub metrics: ResMut<'w, BracketMetrics>,
    pub agents: AgentQuery<'w, 's>,
}

#[derive(SystemParam)]
pub struct CycleParams<'w, 's> {
    pub config: Res<'w, BracketConfigHandle>,
    pub tables: ResMut<'w, BracketTables>,
    pub queue: ResMut<'w, PendingResetQueue>,
    pub names: Res<'w, ExcludedNames>,
    pub guilds: Res<'w, GuildRealPlayerIndex>,
    pub friends: ResMut<'w, FriendFlaggedSet>,
    pub facts: Res<'w, SocialFacts>,
    pub hooks: Res<'w, ResetHooks>,
    pub rng: ResMut<'w, BracketRng>,
    pub timers: ResMut<'w, BracketTimers>,
    pub metrics: ResMut<'w, BracketMetrics>,
    pub tick: Res<'w, BracketTick>,
    pub agents: AgentQuery<'w, 's>,
}

/// Log the loaded tables and take the first guild snapshot.
pub fn initialize_brackets(
    config: Res<BracketConfigHandle>,
    tables: Res<BracketTables>,
    facts: Res<SocialFacts>,
    mut guilds: ResMut<GuildRealPlayerIndex>,
    mut metrics: ResMut<BracketMetrics>,
) {
    let cfg = config.config();
    let verbosity = cfg.verbosity();
    if verbosity.summaries() {
        tracing::info!(
            target: "level_brackets::config",
            enabled = cfg.enabled,
            check_frequency_secs = cfg.check_frequency_secs,
            flagged_check_frequency_secs = cfg.flagged_check_frequency_secs,
            dynamic = cfg.dynamic_distribution,
            synced = tables.is_synced(),
            "brackets.module_loaded"
        );
    }
    tables.log_summary(verbosity);
    guilds.rebuild(facts.0.as_ref());
    metrics.guild_refreshes += 1;
}

pub fn advance_timers(
    delta: Res<TickDelta>,
    mut tick: ResMut<BracketTick>,
    mut timers: ResMut<BracketTimers>,
) {
    tick.0 = tick.0.wrapping_add(1);
    timers.advance(delta.0);
}

/// Attempt a bounded batch of pending resets, re-validating each one.
pub fn drain_pending_resets(mut params: DrainParams) {
    let config = params.config.get();
    if !config.enabled
        || !params
            .timers
            .take_due(TimerKind::PendingDrain, config.flagged_interval_ms())
    {
        return;
    }
    if params.queue.is_empty() {
        return;
    }
    let verbosity = config.verbosity();

    let human_groups = HumanGroups::collect(
        params
            .agents
            .iter()
            .map(|(_, agent, _, _, activity)| (agent, activity)),
    );
    let by_id: HashMap<AgentId, Entity> = params
        .agents
        .iter()
        .map(|(entity, agent, ..)| (agent.id, entity))
        .collect();
    let oracle = ExclusionOracle::new(&config, &params.names, &params.guilds, &params.friends);

    let batch = params.queue.take_batch(config.flagged_process_limit);
    let mut summary = DrainSummary {
        attempted: batch.len(),
        ..DrainSummary::default()
    };

    for mut entry in batch {
        let entity = by_id.get(&entry.agent).copied();
        let verdict = {
            let candidate = entity
                .and_then(|entity| params.agents.get(entity).ok())
                .map(|(_, agent, _, presence, activity)| DrainCandidate {
                    agent,
                    presence,
                    activity,
                });
            evaluate_entry(&entry, candidate, &oracle, &params.tables, &human_groups)
        };

        match verdict {
            DrainVerdict::Discard(reason) => {
                summary.discarded += 1;
                if verbosity.per_agent() {
                    tracing::info!(
                        target: "level_brackets::pending",
                        agent = %entry.agent,
                        reason = reason.as_str(),
                        "pending.entry.discarded"
                    );
                }
            }
            DrainVerdict::Keep(reason) => {
                entry.attempts += 1;
                if config.flagged_max_attempts > 0 && entry.attempts >= config.flagged_max_attempts
                {
                    summary.expired += 1;
                    tracing::warn!(
                        target: "level_brackets::pending",
                        agent = %entry.agent,
                        attempts = entry.attempts,
                        reason = reason.as_str(),
                        "pending.entry.expired"
                    );
                } else {
                    summary.kept += 1;
                    if verbosity.per_agent() {
                        tracing::info!(
                            target: "level_brackets::pending",
                            agent = %entry.agent,
                            attempts = entry.attempts,
                            reason = reason.as_str(),
                            "pending.entry.deferred"
                        );
                    }
                    params.queue.requeue(entry);
                }
            }
            DrainVerdict::Reset => {
                let bracket = params.tables.table(entry.faction).get(entry.target).copied();
                let target = entity.and_then(|entity| params.agents.get_mut(entity).ok());
                let (Some(bracket), Some((_, agent, mut level, _, mut activity))) =
                    (bracket, target)
                else {
                    summary.discarded += 1;
                    continue;
                };
                match apply_level_reset(
                    agent,
                    &mut level,
                    &mut activity,
                    &bracket,
                    &mut params.rng.0,
                    &params.hooks,
                    verbosity,
                ) {
                    ResetOutcome::Applied { .. } => summary.reset += 1,
                    ResetOutcome::Refused => summary.refused += 1,
                }
            }
        }
    }

    summary.remaining = params.queue.len();
    if verbosity.summaries() {
        tracing::info!(
            target: "level_brackets::pending",
            attempted = summary.attempted,
            reset = summary.reset,
            kept = summary.kept,
            discarded = summary.discarded,
            expired = summary.expired,
            refused = summary.refused,
            remaining = summary.remaining,
            "pending.drain.summary"
        );
    }
    params.metrics.record_drain(summary);
}

pub fn refresh_guild_index(
    config: Res<BracketConfigHandle>,
    facts: Res<SocialFacts>,
    mut guilds: ResMut<GuildRealPlayerIndex>,
    mut timers: ResMut<BracketTimers>,
    mut metrics: ResMut<BracketMetrics>,
) {
    let cfg = config.config();
    if !cfg.enabled
        || !timers.take_due(TimerKind::GuildRefresh, cfg.guild_refresh_interval_ms())
    {
        return;
    }
    guilds.rebuild(facts.0.as_ref());
    metrics.guild_refreshes += 1;
    if cfg.verbosity().summaries() {
        tracing::info!(
            target: "level_brackets::exclusion",
            guilds = guilds.len(),
            "guild_index.refreshed"
        );
    }
}

/// Friend refresh, optional reweighting, census, then reconciliation.
pub fn run_reconciliation_cycle(mut params: CycleParams) {
    let config = params.config.get();
    if !config.enabled
        || !params
            .timers
            .take_due(TimerKind::FullCycle, config.check_interval_ms())
    {
        return;
    }
    let verbosity = config.verbosity();

    params.friends.rebuild(params.facts.0.as_ref());

    if config.dynamic_distribution {
        let real_counts = count_real_players(
            params
                .agents
                .iter()
                .map(|(_, agent, level, presence, _)| (agent, level, presence)),
            &params.tables,
        );
        apply_dynamic_distribution(&mut params.tables, &real_counts, config.real_player_weight);
        if verbosity.summaries() {
            for faction in Faction::ALL {
                tracing::info!(
                    target: "level_brackets::dynamic",
                    %faction,
                    humans = ?real_counts[faction],
                    percents = ?params.tables.table(faction).percents(),
                    "dynamic.percents.recomputed"
                );
            }
        }
    }

    let oracle = ExclusionOracle::new(&config, &params.names, &params.guilds, &params.friends);
    let report = take_census(
        params
            .agents
            .iter()
            .map(|(entity, agent, level, presence, _)| (entity, agent, level, presence)),
        &params.tables,
        &oracle,
        &mut params.queue,
        verbosity,
    );
    let human_groups = HumanGroups::collect(
        params
            .agents
            .iter()
            .map(|(_, agent, _, _, activity)| (agent, activity)),
    );

    let mut planned: Vec<(Faction, PlannedMove)> = Vec::new();
    for faction in Faction::ALL {
        let census = &report.factions[faction];
        let table = params.tables.table(faction);
        let desired = table.desired_counts(census.total);
        params.metrics.record_census(faction, &report, &desired);
        if census.total == 0 {
            continue;
        }

        if verbosity.summaries() {
            for (index, bracket) in table.brackets().iter().enumerate() {
                tracing::info!(
                    target: "level_brackets::census",
                    %faction,
                    range = index + 1,
                    lower = bracket.lower,
                    upper = bracket.upper,
                    desired = desired[index],
                    actual = census.actual[index],
                    "census.range.counts"
                );
            }
        }

        let candidates: Vec<Vec<Candidate>> = census
            .members
            .iter()
            .map(|members| {
                members
                    .iter()
                    .map(|member| Candidate {
                        member: *member,
                        safe: params
                            .agents
                            .get(member.entity)
                            .map(|(_, _, _, presence, activity)| {
                                is_safe(presence, activity, &human_groups)
                            })
                            .unwrap_or(false),
                    })
                    .collect()
            })
            .collect();

        let mut actual = census.projected_actual();
        let moves = plan_moves(table, &mut actual, &desired, &candidates);
        planned.extend(moves.into_iter().map(|planned_move| (faction, planned_move)));
    }

    for (faction, planned_move) in planned {
        let Some(bracket) = params.tables.table(faction).get(planned_move.to).copied() else {
            continue;
        };
        match planned_move.kind {
            MoveKind::Immediate => {
                let Ok((_, agent, mut level, _, mut activity)) =
                    params.agents.get_mut(planned_move.member.entity)
                else {
                    continue;
                };
                if verbosity.per_agent() {
                    tracing::info!(
                        target: "level_brackets::reconcile",
                        agent = %planned_move.member.agent,
                        %faction,
                        from_range = planned_move.from + 1,
                        to_range = planned_move.to + 1,
                        kind = planned_move.kind.as_str(),
                        "reconcile.move.immediate"
                    );
                }
                match apply_level_reset(
                    agent,
                    &mut level,
                    &mut activity,
                    &bracket,
                    &mut params.rng.0,
                    &params.hooks,
                    verbosity,
                ) {
                    ResetOutcome::Applied { .. } => params.metrics.immediate_resets += 1,
                    ResetOutcome::Refused => params.metrics.refused_resets += 1,
                }
            }
            MoveKind::Deferred => {
                let queued = params
                    .queue
                    .enqueue(planned_move.member.agent, faction, planned_move.to);
                if queued {
                    params.metrics.deferred_flags += 1;
                }
                if verbosity.per_agent() {
                    tracing::info!(
                        target: "level_brackets::reconcile",
                        agent = %planned_move.member.agent,
                        %faction,
                        from_range = planned_move.from + 1,
                        to_range = planned_move.to + 1,
                        kind = planned_move.kind.as_str(),
                        newly_flagged = queued,
                        "reconcile.move.deferred"
                    );
                }
            }
        }
    }

    params.metrics.cycles += 1;
    params.metrics.last_cycle_tick = params.tick.0;
    if verbosity.summaries() {
        tracing::info!(
            target: "level_brackets::reconcile",
            tick = params.tick.0,
            alliance_managed = report.factions[Faction::Alliance].total,
            horde_managed = report.factions[Faction::Horde].total,
            pending = params.queue.len(),
            "reconcile.cycle.complete"
        );
    }
}
