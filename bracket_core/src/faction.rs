use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One of the two disjoint populations that keep independent bracket tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Alliance,
    Horde,
}

impl Faction {
    pub const ALL: [Faction; 2] = [Faction::Alliance, Faction::Horde];

    pub fn index(self) -> usize {
        match self {
            Faction::Alliance => 0,
            Faction::Horde => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Faction::Alliance => "alliance",
            Faction::Horde => "horde",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size storage keyed by [`Faction`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerFaction<T> {
    slots: [T; 2],
}

impl<T> PerFaction<T> {
    pub fn new(alliance: T, horde: T) -> Self {
        Self {
            slots: [alliance, horde],
        }
    }

    pub fn from_fn(mut build: impl FnMut(Faction) -> T) -> Self {
        Self::new(build(Faction::Alliance), build(Faction::Horde))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Faction, &T)> {
        Faction::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Faction, &mut T)> {
        Faction::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<T> Index<Faction> for PerFaction<T> {
    type Output = T;

    fn index(&self, faction: Faction) -> &T {
        &self.slots[faction.index()]
    }
}

impl<T> IndexMut<Faction> for PerFaction<T> {
    fn index_mut(&mut self, faction: Faction) -> &mut T {
        &mut self.slots[faction.index()]
    }
}
