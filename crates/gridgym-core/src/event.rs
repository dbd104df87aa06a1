use crate::{Direction, EntityId, entity::EntityTag};
use serde::{Deserialize, Serialize};

/// Snapshot of an entity's identity, valid even after it is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: EntityId,
    pub uid: u64,
    pub tag: EntityTag,
}

/// Why an attempted action did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Failure {
    /// The destination was disabled or off the grid.
    Blocked,
    /// A lumberjack tried to cut a tree stronger than itself.
    TooStrong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Need {
    Food,
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Failed(Failure),
    /// The actor interacted with another entity sharing its cell.
    Encountered(EntityRef),
    Moved(Direction),
    /// A reserve ran dry.
    Depleted(Need),
}

/// Something that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    pub actor: EntityRef,
    pub outcome: Outcome,
}

impl Event {
    #[must_use]
    pub const fn new(actor: EntityRef, outcome: Outcome) -> Self {
        Self { actor, outcome }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// The other party of an encounter, if any.
    #[must_use]
    pub const fn target(&self) -> Option<EntityRef> {
        match self.outcome {
            Outcome::Encountered(target) => Some(target),
            _ => None,
        }
    }
}
