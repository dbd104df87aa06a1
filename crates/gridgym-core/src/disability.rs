//! Action-disability registry.
//!
//! A disability forbids a class of movers from performing an action into a
//! location. Entity blockers resolve their position at query time, so a
//! registration made by a moving agent follows it around the grid.

use crate::{EntityId, entity::EntityTag};
use gridgym_index::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Actions that may be disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Move,
}

impl ActionKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Move => "move",
        }
    }
}

/// Which movers a disability applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoverClass {
    /// Every agent, whatever its kind.
    Every,
    /// Only agents of the given kind.
    Only(EntityTag),
}

/// Location predicate of a disability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Blocker {
    /// The current cell of a live entity.
    Entity(EntityId),
    /// A fixed cell.
    Fixed(Position),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisabilityError {
    #[error("no '{action}' disability registered for {class:?} at {blocker:?}")]
    NotRegistered {
        class: MoverClass,
        action: &'static str,
        blocker: Blocker,
    },
}

/// Per-world table of `(mover class, action) -> blockers`.
#[derive(Debug, Clone, Default)]
pub struct DisabilityRegistry {
    table: HashMap<(MoverClass, ActionKind), Vec<Blocker>>,
}

impl DisabilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of registered blockers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn forbid(&mut self, class: MoverClass, action: ActionKind, blocker: Blocker) {
        self.table.entry((class, action)).or_default().push(blocker);
    }

    /// Removes exactly one matching registration.
    pub fn allow(
        &mut self,
        class: MoverClass,
        action: ActionKind,
        blocker: Blocker,
    ) -> Result<(), DisabilityError> {
        let missing = DisabilityError::NotRegistered {
            class,
            action: action.name(),
            blocker,
        };
        let Some(blockers) = self.table.get_mut(&(class, action)) else {
            return Err(missing);
        };
        let Some(slot) = blockers.iter().position(|b| *b == blocker) else {
            return Err(missing);
        };
        blockers.remove(slot);
        if blockers.is_empty() {
            self.table.remove(&(class, action));
        }
        Ok(())
    }

    /// Drops every registration whose blocker is `entity`, returning how many were removed.
    pub fn release(&mut self, entity: EntityId) -> usize {
        let mut removed = 0;
        self.table.retain(|_, blockers| {
            let before = blockers.len();
            blockers.retain(|b| *b != Blocker::Entity(entity));
            removed += before - blockers.len();
            !blockers.is_empty()
        });
        removed
    }

    /// Whether a mover of kind `tag` is forbidden from `action` into `target`.
    ///
    /// Both the class-wide and the kind-specific tables are consulted. The
    /// mover's own registrations never block it, and blockers whose entity
    /// can no longer be located never match.
    pub fn check<F>(
        &self,
        tag: EntityTag,
        mover: Option<EntityId>,
        action: ActionKind,
        target: Position,
        locate: F,
    ) -> bool
    where
        F: Fn(EntityId) -> Option<Position>,
    {
        [MoverClass::Every, MoverClass::Only(tag)]
            .iter()
            .filter_map(|class| self.table.get(&(*class, action)))
            .flatten()
            .any(|blocker| match *blocker {
                Blocker::Fixed(position) => position == target,
                Blocker::Entity(id) if Some(id) == mover => false,
                Blocker::Entity(id) => locate(id) == Some(target),
            })
    }
}
