use crate::{Direction, config::WorldConfig, disability::MoverClass};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of entity type names.
///
/// Ordering follows the type name so that per-type observations come out
/// sorted the same way regardless of how the world was populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityTag {
    Cheese,
    Diamond,
    Fruit,
    Gatherer,
    Grass,
    Lion,
    Lumberjack,
    Mouse,
    Ranger,
    Tree,
    Wall,
    Water,
}

impl EntityTag {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cheese => "Cheese",
            Self::Diamond => "Diamond",
            Self::Fruit => "Fruit",
            Self::Gatherer => "Gatherer",
            Self::Grass => "Grass",
            Self::Lion => "Lion",
            Self::Lumberjack => "Lumberjack",
            Self::Mouse => "Mouse",
            Self::Ranger => "Ranger",
            Self::Tree => "Tree",
            Self::Wall => "Wall",
            Self::Water => "Water",
        }
    }

    #[must_use]
    pub const fn is_agent(self) -> bool {
        matches!(
            self,
            Self::Gatherer | Self::Lion | Self::Lumberjack | Self::Mouse | Self::Ranger
        )
    }
}

impl PartialOrd for EntityTag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntityTag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name().cmp(other.name())
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an entity contributes to a percept cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerceptMeasure {
    /// Each matching entity adds one.
    Count,
    /// Each matching entity adds its strength.
    Strength,
}

/// Behaviour-specific state of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentRole {
    Mouse,
    Lumberjack { strength: u32 },
    Ranger,
    Lion,
    Gatherer { food: i32, water: i32 },
}

impl AgentRole {
    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        match self {
            Self::Mouse => EntityTag::Mouse,
            Self::Lumberjack { .. } => EntityTag::Lumberjack,
            Self::Ranger => EntityTag::Ranger,
            Self::Lion => EntityTag::Lion,
            Self::Gatherer { .. } => EntityTag::Gatherer,
        }
    }

    /// Entity types this agent perceives, in percept block order.
    #[must_use]
    pub const fn relevant_percepts(&self) -> &'static [(EntityTag, PerceptMeasure)] {
        match self {
            Self::Mouse => &[(EntityTag::Cheese, PerceptMeasure::Count)],
            Self::Lumberjack { .. } => &[
                (EntityTag::Lumberjack, PerceptMeasure::Strength),
                (EntityTag::Tree, PerceptMeasure::Strength),
            ],
            Self::Ranger | Self::Lion => &[
                (EntityTag::Wall, PerceptMeasure::Count),
                (EntityTag::Diamond, PerceptMeasure::Count),
                (EntityTag::Ranger, PerceptMeasure::Count),
                (EntityTag::Lion, PerceptMeasure::Count),
            ],
            Self::Gatherer { .. } => &[(EntityTag::Fruit, PerceptMeasure::Count)],
        }
    }

    /// Whether successful moves are reported as events.
    #[must_use]
    pub const fn reports_movement(&self) -> bool {
        matches!(self, Self::Gatherer { .. })
    }
}

/// Mutable state shared by every agent kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBody {
    pub role: AgentRole,
    /// Remaining move budget; `None` means unlimited.
    pub energy: Option<i32>,
    /// Action injected by an external controller, consumed on the next decide.
    pub next_action: Option<Direction>,
}

impl AgentBody {
    #[must_use]
    pub const fn new(role: AgentRole) -> Self {
        Self {
            role,
            energy: None,
            next_action: None,
        }
    }

    #[must_use]
    pub const fn with_energy(mut self, energy: i32) -> Self {
        self.energy = Some(energy);
        self
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.energy.is_some_and(|energy| energy <= 0)
    }
}

/// Data-bearing entity variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Wall,
    Grass { amount: i32 },
    Tree { strength: u32 },
    Fruit,
    Water { poison: f32 },
    Diamond,
    Cheese,
    Agent(AgentBody),
}

impl EntityKind {
    #[must_use]
    pub fn ranger(config: &WorldConfig) -> Self {
        Self::Agent(AgentBody::new(AgentRole::Ranger).with_energy(config.agent_energy))
    }

    #[must_use]
    pub fn lion(config: &WorldConfig) -> Self {
        Self::Agent(AgentBody::new(AgentRole::Lion).with_energy(config.agent_energy))
    }

    #[must_use]
    pub const fn lumberjack(strength: u32) -> Self {
        Self::Agent(AgentBody::new(AgentRole::Lumberjack { strength }))
    }

    #[must_use]
    pub const fn mouse() -> Self {
        Self::Agent(AgentBody::new(AgentRole::Mouse))
    }

    #[must_use]
    pub fn gatherer(config: &WorldConfig) -> Self {
        Self::Agent(AgentBody::new(AgentRole::Gatherer {
            food: config.gatherer_food,
            water: config.gatherer_water,
        }))
    }

    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        match self {
            Self::Wall => EntityTag::Wall,
            Self::Grass { .. } => EntityTag::Grass,
            Self::Tree { .. } => EntityTag::Tree,
            Self::Fruit => EntityTag::Fruit,
            Self::Water { .. } => EntityTag::Water,
            Self::Diamond => EntityTag::Diamond,
            Self::Cheese => EntityTag::Cheese,
            Self::Agent(body) => body.role.tag(),
        }
    }

    #[must_use]
    pub const fn agent(&self) -> Option<&AgentBody> {
        match self {
            Self::Agent(body) => Some(body),
            _ => None,
        }
    }

    #[must_use]
    pub fn agent_mut(&mut self) -> Option<&mut AgentBody> {
        match self {
            Self::Agent(body) => Some(body),
            _ => None,
        }
    }

    /// Mover class this entity forbids from entering its cell, if any.
    #[must_use]
    pub const fn blocks(&self) -> Option<MoverClass> {
        match self {
            Self::Wall => Some(MoverClass::Every),
            Self::Agent(AgentBody {
                role: AgentRole::Ranger,
                ..
            }) => Some(MoverClass::Only(EntityTag::Ranger)),
            Self::Agent(AgentBody {
                role: AgentRole::Lion,
                ..
            }) => Some(MoverClass::Only(EntityTag::Lion)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn strength(&self) -> Option<u32> {
        match self {
            Self::Tree { strength }
            | Self::Agent(AgentBody {
                role: AgentRole::Lumberjack { strength },
                ..
            }) => Some(*strength),
            _ => None,
        }
    }

    #[must_use]
    pub fn percept_value(&self, measure: PerceptMeasure) -> f32 {
        match measure {
            PerceptMeasure::Count => 1.0,
            PerceptMeasure::Strength => self.strength().unwrap_or(1) as f32,
        }
    }

    /// Glyph used by the text renderer.
    #[must_use]
    pub fn symbol(&self) -> char {
        match self {
            Self::Wall => '█',
            Self::Grass { amount } => match *amount {
                a if a > 20 => '░',
                a if a > 10 => '▒',
                a if a > 0 => '▓',
                _ => ' ',
            },
            Self::Tree { strength } => char::from_digit(*strength, 10).unwrap_or('T'),
            Self::Fruit => 'σ',
            Self::Water { poison } => match *poison {
                p if p < 5.0 => '░',
                p if p < 15.0 => '▒',
                _ => '▓',
            },
            Self::Diamond => '♦',
            Self::Cheese => '♠',
            Self::Agent(body) => match body.role {
                AgentRole::Ranger => '☻',
                AgentRole::Lion => 'Ω',
                AgentRole::Lumberjack { strength } if strength >= 2 => '☻',
                AgentRole::Lumberjack { .. } | AgentRole::Mouse | AgentRole::Gatherer { .. } => {
                    '☺'
                }
            },
        }
    }
}

/// Entity record stored in the world arena. Position lives in the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    uid: u64,
    pub kind: EntityKind,
}

impl Entity {
    /// Wraps a kind under a world-assigned uid. Worlds hand out uids in creation order.
    #[must_use]
    pub const fn new(uid: u64, kind: EntityKind) -> Self {
        Self { uid, kind }
    }

    /// Identifier unique within the world, never reused.
    #[must_use]
    pub const fn uid(&self) -> u64 {
        self.uid
    }

    /// Type tag shared by every entity of this kind.
    #[must_use]
    pub const fn tag(&self) -> EntityTag {
        self.kind.tag()
    }

    /// Whether this entity acts on its own each tick.
    #[must_use]
    pub const fn is_agent(&self) -> bool {
        matches!(self.kind, EntityKind::Agent(_))
    }
}
