//! Core simulation engine for gridgym worlds.
//!
//! A world is a discrete grid populated by passive entities (walls, grass,
//! trees, fruit, water, pickups) and agents. [`WorldState::step`] activates
//! every live entity once per tick in a seeded random order and returns the
//! events that reward logic consumes.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

mod config;
mod disability;
mod entity;
mod event;
mod map;
mod reactions;
mod scenario;
mod world;

pub use config::WorldConfig;
pub use disability::{ActionKind, Blocker, DisabilityError, DisabilityRegistry, MoverClass};
pub use entity::{AgentBody, AgentRole, Entity, EntityKind, EntityTag, PerceptMeasure};
pub use event::{EntityRef, Event, Failure, Need, Outcome};
pub use gridgym_index::{NeighborhoodIndex, Position, Topology};
pub use map::{MapError, MapLayout, Placement, parse_map};
pub use scenario::{ObservationMode, Scenario};
pub use world::{RosterEntry, TickReport, WorldError, WorldState};

new_key_type! {
    /// Stable handle for entities backed by a generational slot map.
    pub struct EntityId;
}

/// Movement delta chosen by an agent for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction {
    pub dx: i32,
    pub dy: i32,
}

impl Direction {
    pub const STAY: Self = Self::new(0, 0);

    /// The Moore directions plus "stay", `dx` outer and `dy` inner.
    pub const ALL: [Self; 9] = [
        Self::new(-1, -1),
        Self::new(-1, 0),
        Self::new(-1, 1),
        Self::new(0, -1),
        Self::new(0, 0),
        Self::new(0, 1),
        Self::new(1, -1),
        Self::new(1, 0),
        Self::new(1, 1),
    ];

    #[must_use]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Direction for a discrete action index into [`Direction::ALL`].
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Index of this direction in [`Direction::ALL`], if it is a unit move.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        Self::ALL.iter().position(|candidate| *candidate == self)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dx, self.dy)
    }
}

/// Simulation tick counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Tick(pub u64);

impl Tick {
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_indices_round_trip() {
        for (idx, direction) in Direction::ALL.iter().enumerate() {
            assert_eq!(Direction::from_index(idx), Some(*direction));
            assert_eq!(direction.index(), Some(idx));
        }
        assert_eq!(Direction::STAY.index(), Some(4));
        assert!(Direction::from_index(9).is_none());
        assert!(Direction::new(2, 0).index().is_none());
    }

    #[test]
    fn tick_advances() {
        assert_eq!(Tick::zero().next().next(), Tick(2));
    }
}
