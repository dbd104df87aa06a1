use crate::{
    Direction, EntityId, Tick,
    config::WorldConfig,
    disability::{ActionKind, Blocker, DisabilityError, DisabilityRegistry, MoverClass},
    entity::{AgentBody, Entity, EntityKind, EntityTag},
    event::{EntityRef, Event},
    map::{MapError, MapLayout, parse_map},
    scenario::Scenario,
};
use gridgym_index::{IndexError, NeighborhoodIndex, OccupancyGrid, Position};
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Disability(#[from] DisabilityError),
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("{0} is not an agent")]
    NotAnAgent(EntityTag),
    #[error("{0} does not perceive any entity type")]
    NoRelevantEntities(EntityTag),
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
}

/// Creation record kept for every entity, including destroyed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: EntityId,
    pub uid: u64,
    pub tag: EntityTag,
}

impl RosterEntry {
    #[must_use]
    pub const fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            uid: self.uid,
            tag: self.tag,
        }
    }
}

/// Result of a single [`WorldState::step`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: Tick,
    pub terminated: bool,
    pub events: Vec<Event>,
}

/// The simulation world: grid, entity arena, scheduler and disabilities.
#[derive(Debug)]
pub struct WorldState {
    pub(crate) config: WorldConfig,
    pub(crate) scenario: Option<Scenario>,
    pub(crate) tick: Tick,
    pub(crate) rng: SmallRng,
    pub(crate) grid: OccupancyGrid<EntityId>,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    pub(crate) roster: Vec<RosterEntry>,
    pub(crate) schedule: Vec<EntityId>,
    pub(crate) disabilities: DisabilityRegistry,
    pub(crate) live_counts: BTreeMap<EntityTag, usize>,
    pub(crate) events: Vec<Event>,
    pub(crate) console: VecDeque<String>,
    pub(crate) terminated: bool,
}

impl WorldState {
    /// Creates an empty world of the given size.
    pub fn new(width: u32, height: u32, config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let grid = OccupancyGrid::new(width, height, config.topology)?;
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            scenario: None,
            tick: Tick::zero(),
            rng,
            grid,
            entities: SlotMap::with_key(),
            roster: Vec::new(),
            schedule: Vec::new(),
            disabilities: DisabilityRegistry::new(),
            live_counts: BTreeMap::new(),
            events: Vec::new(),
            console: VecDeque::new(),
            terminated: false,
        })
    }

    /// Builds a populated world from a parsed layout.
    ///
    /// Every symbol is resolved before the first entity is created.
    pub fn from_layout(
        layout: &MapLayout,
        scenario: Scenario,
        config: WorldConfig,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let resolved = layout.resolve(scenario, &config)?;
        let mut world = Self::new(layout.width(), layout.height(), config)?;
        world.scenario = Some(scenario);
        for (kind, position) in resolved {
            world.add_entity(kind, position)?;
        }
        info!(
            scenario = scenario.name(),
            width = layout.width(),
            height = layout.height(),
            entities = world.entities.len(),
            "world loaded"
        );
        Ok(world)
    }

    /// Parses map text and builds the world it describes.
    pub fn from_map(
        text: &str,
        scenario: Scenario,
        config: WorldConfig,
    ) -> Result<Self, WorldError> {
        let layout = parse_map(text)?;
        Self::from_layout(&layout, scenario, config)
    }

    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Scenario whose symbol table built this world; `None` for hand-built worlds.
    #[must_use]
    pub const fn scenario(&self) -> Option<Scenario> {
        self.scenario
    }

    /// Ticks completed so far.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.grid.width()
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Spatial index of every live entity.
    #[must_use]
    pub const fn grid(&self) -> &OccupancyGrid<EntityId> {
        &self.grid
    }

    /// Movement and action restrictions currently in force.
    #[must_use]
    pub const fn disabilities(&self) -> &DisabilityRegistry {
        &self.disabilities
    }

    /// Once set, stays set for the rest of the episode.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Events emitted during the most recent tick.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Rolling trace lines, oldest first.
    pub fn console(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.console.iter().map(String::as_str)
    }

    /// Every entity ever created, in creation order.
    #[must_use]
    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// Roster entries of agents, in creation order, destroyed ones included.
    pub fn agents(&self) -> impl Iterator<Item = &RosterEntry> {
        self.roster.iter().filter(|entry| entry.tag.is_agent())
    }

    /// Live entity behind `id`; `None` once destroyed.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Agent body behind `id`, if it is a live agent.
    #[must_use]
    pub fn agent(&self, id: EntityId) -> Option<&AgentBody> {
        self.entities.get(id).and_then(|entity| entity.kind.agent())
    }

    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Arena key of the entity created under `uid`. The key may be stale.
    #[must_use]
    pub fn entity_by_uid(&self, uid: u64) -> Option<EntityId> {
        self.roster
            .iter()
            .find(|entry| entry.uid == uid)
            .map(|entry| entry.id)
    }

    /// Current cell, or `None` once destroyed.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<Position> {
        self.grid.position_of(id)
    }

    /// Occupants of a cell in arrival order. Off-grid cells are empty.
    #[must_use]
    pub fn occupants(&self, position: Position) -> &[EntityId] {
        self.grid.occupants(position)
    }

    /// Number of live entities with the given tag.
    #[must_use]
    pub fn count(&self, tag: EntityTag) -> usize {
        self.live_counts.get(&tag).copied().unwrap_or(0)
    }

    /// Entities not yet destroyed.
    #[must_use]
    pub fn live_entities(&self) -> usize {
        self.entities.len()
    }

    /// Glyph drawn for a live entity.
    #[must_use]
    pub fn render_symbol(&self, id: EntityId) -> Option<char> {
        self.entities.get(id).map(|entity| entity.kind.symbol())
    }

    /// Places a new entity, registering any disability it imposes.
    pub fn add_entity(&mut self, kind: EntityKind, position: Position) -> Result<EntityId, WorldError> {
        let position = self
            .grid
            .normalize(position)
            .ok_or(IndexError::OutOfBounds(position))?;
        let uid = self.roster.len() as u64;
        let tag = kind.tag();
        let blocks = kind.blocks();
        let id = self.entities.insert(Entity::new(uid, kind));
        if let Err(err) = self.grid.place(id, position) {
            self.entities.remove(id);
            return Err(err.into());
        }
        self.schedule.push(id);
        self.roster.push(RosterEntry { id, uid, tag });
        *self.live_counts.entry(tag).or_default() += 1;
        if let Some(class) = blocks {
            self.disabilities
                .forbid(class, ActionKind::Move, Blocker::Entity(id));
        }
        debug!(uid, kind = tag.name(), %position, "entity added");
        Ok(id)
    }

    /// Removes an entity from the grid, the schedule and the arena together.
    pub fn destroy_entity(&mut self, id: EntityId) -> Result<Entity, WorldError> {
        let entity = self.entities.remove(id).ok_or(WorldError::UnknownEntity(id))?;
        self.grid.remove(id)?;
        self.schedule.retain(|scheduled| *scheduled != id);
        let released = self.disabilities.release(id);
        let tag = entity.tag();
        let remaining = self.live_counts.entry(tag).or_default();
        *remaining = remaining.saturating_sub(1);
        let remaining = *remaining;
        debug!(uid = entity.uid(), kind = tag.name(), released, "entity destroyed");

        if tag == EntityTag::Tree && remaining == 0 {
            self.trace_world("All trees have been cut! End of game.");
            self.terminate();
        }
        Ok(entity)
    }

    /// Registers an extra disability, for example a fenced cell.
    pub fn forbid(&mut self, class: MoverClass, action: ActionKind, blocker: Blocker) {
        self.disabilities.forbid(class, action, blocker);
    }

    pub fn allow(
        &mut self,
        class: MoverClass,
        action: ActionKind,
        blocker: Blocker,
    ) -> Result<(), WorldError> {
        Ok(self.disabilities.allow(class, action, blocker)?)
    }

    /// Whether `mover` may not perform `action` into `target`.
    #[must_use]
    pub fn is_forbidden(&self, mover: EntityId, action: ActionKind, target: Position) -> bool {
        let Some(entity) = self.entities.get(mover) else {
            return true;
        };
        self.disabilities
            .check(entity.tag(), Some(mover), action, target, |id| {
                self.grid.position_of(id)
            })
    }

    /// Injects the action an agent takes on its next activation.
    pub fn set_next_action(&mut self, id: EntityId, action: Direction) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(WorldError::UnknownEntity(id))?;
        let tag = entity.tag();
        let body = entity.kind.agent_mut().ok_or(WorldError::NotAnAgent(tag))?;
        body.next_action = Some(action);
        Ok(())
    }

    /// Sets the termination flag. It is never cleared.
    pub fn terminate(&mut self) {
        if !self.terminated {
            info!(tick = self.tick.0, "world terminated");
        }
        self.terminated = true;
    }

    /// Local percept of an agent using the configured radius.
    pub fn perceive(&self, id: EntityId) -> Result<Vec<f32>, WorldError> {
        self.perceive_within(id, self.config.perception_radius)
    }

    /// Percept vector: one block per relevant type, each block holding one
    /// value per cell of the `(2r+1)^2` window (`dx` outer, `dy` inner).
    /// A destroyed agent perceives nothing.
    pub fn perceive_within(&self, id: EntityId, radius: u32) -> Result<Vec<f32>, WorldError> {
        let Some(entity) = self.entities.get(id) else {
            return Ok(Vec::new());
        };
        let Some(center) = self.grid.position_of(id) else {
            return Ok(Vec::new());
        };
        let body = entity
            .kind
            .agent()
            .ok_or(WorldError::NotAnAgent(entity.tag()))?;
        let relevant = body.role.relevant_percepts();
        if relevant.is_empty() {
            return Err(WorldError::NoRelevantEntities(entity.tag()));
        }

        let reach = self.grid.reach(radius)?;
        let side = 2 * reach.unsigned_abs() as usize + 1;
        let window = side * side;
        let mut percepts = vec![0.0; relevant.len() * window];
        let offsets = (-reach..=reach).flat_map(|dx| (-reach..=reach).map(move |dy| (dx, dy)));
        for (cell, (dx, dy)) in offsets.enumerate() {
            let Some(position) = self.grid.normalize(center.offset(dx, dy)?) else {
                continue;
            };
            for occupant in self.grid.occupants(position) {
                let Some(other) = self.entities.get(*occupant) else {
                    continue;
                };
                for (block, (tag, measure)) in relevant.iter().enumerate() {
                    if other.tag() == *tag {
                        percepts[block * window + cell] += other.kind.percept_value(*measure);
                    }
                }
            }
        }
        Ok(percepts)
    }

    /// Per-type occupancy counts over the whole grid, keyed by type name.
    ///
    /// Every type that was ever present gets a vector of `width * height`
    /// entries indexed `y * width + x`.
    #[must_use]
    pub fn positions(&self) -> BTreeMap<&'static str, Vec<u32>> {
        let mut blocks = BTreeMap::new();
        for entry in &self.roster {
            let block = blocks
                .entry(entry.tag.name())
                .or_insert_with(|| vec![0; self.grid.cell_count()]);
            if let Some(index) = self
                .grid
                .position_of(entry.id)
                .and_then(|position| self.grid.cell_index(position))
            {
                block[index] += 1;
            }
        }
        blocks
    }

    /// [`WorldState::positions`] concatenated in type-name order.
    #[must_use]
    pub fn flat_positions(&self) -> Vec<u32> {
        self.positions().into_values().flatten().collect()
    }

    pub(crate) fn entity_ref(&self, id: EntityId) -> Option<EntityRef> {
        self.entities.get(id).map(|entity| EntityRef {
            id,
            uid: entity.uid(),
            tag: entity.tag(),
        })
    }

    pub(crate) fn trace_entity(&mut self, id: EntityId, text: &str) {
        let Some(entity) = self.entity_ref(id) else {
            return;
        };
        debug!(tick = self.tick.0, uid = entity.uid, kind = entity.tag.name(), "{text}");
        self.push_console(format!("{} {} > {text}", entity.tag, entity.uid));
    }

    pub(crate) fn trace_world(&mut self, text: &str) {
        info!(tick = self.tick.0, "{text}");
        self.push_console(format!(">>>>>>> {text}"));
    }

    fn push_console(&mut self, line: String) {
        self.console.push_back(line);
        while self.console.len() > self.config.console_capacity {
            self.console.pop_front();
        }
    }
}
