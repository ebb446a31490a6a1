use std::collections::HashSet;

use crate::components::{Activity, ActivityFlags, Agent, GroupId, Presence};

/// Groups that currently contain at least one human member.
///
/// Built fresh right before the decisions that use it.
#[derive(Debug, Clone, Default)]
pub struct HumanGroups(HashSet<GroupId>);

impl HumanGroups {
    pub fn collect<'a>(members: impl IntoIterator<Item = (&'a Agent, &'a Activity)>) -> Self {
        Self(
            members
                .into_iter()
                .filter(|(agent, _)| agent.controller.is_human())
                .filter_map(|(_, activity)| activity.group)
                .collect(),
        )
    }

    pub fn contains(&self, group: GroupId) -> bool {
        self.0.contains(&group)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsafeReason {
    NotInWorld,
    Dead,
    InCombat,
    InInstance,
    Queued,
    Flying,
    GroupedWithHuman,
}

impl UnsafeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnsafeReason::NotInWorld => "not_in_world",
            UnsafeReason::Dead => "dead",
            UnsafeReason::InCombat => "in_combat",
            UnsafeReason::InInstance => "in_instance",
            UnsafeReason::Queued => "queued",
            UnsafeReason::Flying => "flying",
            UnsafeReason::GroupedWithHuman => "grouped_with_human",
        }
    }
}

/// First reason the agent cannot be mutated right now, if any.
pub fn unsafe_reason(
    presence: &Presence,
    activity: &Activity,
    human_groups: &HumanGroups,
) -> Option<UnsafeReason> {
    if !presence.is_valid() {
        return Some(UnsafeReason::NotInWorld);
    }
    let flags = activity.flags;
    if flags.contains(ActivityFlags::DEAD) {
        return Some(UnsafeReason::Dead);
    }
    if flags.contains(ActivityFlags::IN_COMBAT) {
        return Some(UnsafeReason::InCombat);
    }
    if flags.contains(ActivityFlags::IN_INSTANCE) {
        return Some(UnsafeReason::InInstance);
    }
    if flags.contains(ActivityFlags::IN_QUEUE) {
        return Some(UnsafeReason::Queued);
    }
    if flags.contains(ActivityFlags::FLYING) {
        return Some(UnsafeReason::Flying);
    }
    if activity
        .group
        .is_some_and(|group| human_groups.contains(group))
    {
        return Some(UnsafeReason::GroupedWithHuman);
    }
    None
}

pub fn is_safe(presence: &Presence, activity: &Activity, human_groups: &HumanGroups) -> bool {
    unsafe_reason(presence, activity, human_groups).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{AgentId, CharacterClass, Controller},
        faction::Faction,
    };

    fn member(id: u64, controller: Controller, group: Option<u32>) -> (Agent, Activity) {
        let agent = Agent {
            id: AgentId(id),
            name: format!("char{id}"),
            class: CharacterClass::Priest,
            faction: Faction::Horde,
            controller,
            guild: None,
        };
        let activity = Activity {
            flags: ActivityFlags::empty(),
            group: group.map(GroupId),
        };
        (agent, activity)
    }

    #[test]
    fn idle_online_agent_is_safe() {
        let groups = HumanGroups::default();
        assert!(is_safe(&Presence::online(), &Activity::idle(), &groups));
    }

    #[test]
    fn each_activity_flag_blocks_mutation() {
        let groups = HumanGroups::default();
        let cases = [
            (ActivityFlags::DEAD, UnsafeReason::Dead),
            (ActivityFlags::IN_COMBAT, UnsafeReason::InCombat),
            (ActivityFlags::IN_INSTANCE, UnsafeReason::InInstance),
            (ActivityFlags::IN_QUEUE, UnsafeReason::Queued),
            (ActivityFlags::FLYING, UnsafeReason::Flying),
        ];
        for (flag, reason) in cases {
            assert_eq!(
                unsafe_reason(&Presence::online(), &Activity::with(flag), &groups),
                Some(reason)
            );
        }
        assert!(is_safe(
            &Presence::online(),
            &Activity::with(ActivityFlags::MOUNTED),
            &groups
        ));
    }

    #[test]
    fn logging_out_is_unsafe() {
        let presence = Presence {
            in_world: true,
            logging_out: true,
        };
        assert_eq!(
            unsafe_reason(&presence, &Activity::idle(), &HumanGroups::default()),
            Some(UnsafeReason::NotInWorld)
        );
    }

    #[test]
    fn groups_with_humans_block_mutation() {
        let roster = [
            member(1, Controller::Human, Some(7)),
            member(2, Controller::RandomBot, Some(7)),
            member(3, Controller::RandomBot, Some(8)),
            member(4, Controller::AltBot, Some(8)),
        ];
        let groups = HumanGroups::collect(roster.iter().map(|(a, b)| (a, b)));
        assert!(!is_safe(&Presence::online(), &roster[1].1, &groups));
        assert!(is_safe(&Presence::online(), &roster[2].1, &groups));
    }
}
