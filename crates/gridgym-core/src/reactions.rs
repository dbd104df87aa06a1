//! Tick pipeline: activation order, agent decide/move/react, passive growth.

use crate::{
    Direction, EntityId,
    disability::ActionKind,
    entity::{AgentRole, EntityKind, EntityTag},
    event::{EntityRef, Event, Failure, Need, Outcome},
    world::{TickReport, WorldState},
};
use gridgym_index::{NeighborhoodIndex, Position};
use rand::{Rng, seq::SliceRandom};
use smallvec::SmallVec;
use tracing::{trace, warn};

impl WorldState {
    /// Advances the world by one tick.
    ///
    /// Every entity scheduled at the start of the tick is activated once in a
    /// freshly shuffled order. Entities destroyed earlier in the tick are
    /// skipped; entities spawned during the tick wait for the next one.
    pub fn step(&mut self) -> TickReport {
        self.events.clear();
        let mut order = self.schedule.clone();
        order.shuffle(&mut self.rng);
        for id in order {
            self.activate(id);
        }
        self.tick = self.tick.next();
        trace!(
            tick = self.tick.0,
            events = self.events.len(),
            terminated = self.terminated,
            "tick complete"
        );
        TickReport {
            tick: self.tick,
            terminated: self.terminated,
            events: self.events.clone(),
        }
    }

    fn activate(&mut self, id: EntityId) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        if entity.is_agent() {
            self.step_agent(id);
        } else {
            self.step_passive(id);
        }
    }

    fn step_agent(&mut self, id: EntityId) {
        let Some(body) = self.agent(id) else {
            return;
        };
        if body.is_exhausted() {
            self.trace_entity(id, "I'm exhausted");
            self.terminate();
            return;
        }
        let action = self.decide(id);
        self.trace_entity(id, &format!("next action {action}"));
        self.attempt_move(id, action);
        self.react(id);
    }

    /// Consumes an injected action or falls back to a uniform random one.
    fn decide(&mut self, id: EntityId) -> Direction {
        let preset = self
            .entities
            .get_mut(id)
            .and_then(|entity| entity.kind.agent_mut())
            .and_then(|body| body.next_action.take());
        preset.unwrap_or_else(|| Direction::ALL[self.rng.random_range(0..Direction::ALL.len())])
    }

    fn attempt_move(&mut self, id: EntityId, action: Direction) {
        let Some(origin) = self.grid.position_of(id) else {
            return;
        };
        let target = origin
            .offset(action.dx, action.dy)
            .ok()
            .and_then(|moved| self.grid.normalize(moved))
            .filter(|target| !self.is_forbidden(id, ActionKind::Move, *target));

        let mut reports_movement = false;
        if let Some(body) = self
            .entities
            .get_mut(id)
            .and_then(|entity| entity.kind.agent_mut())
        {
            reports_movement = body.role.reports_movement();
            if let Some(energy) = body.energy.as_mut() {
                *energy -= 1;
            }
        }

        match target {
            Some(target) => match self.grid.relocate(id, target) {
                Ok(_) if reports_movement => self.emit(id, Outcome::Moved(action)),
                Ok(_) => {}
                Err(err) => warn!(%err, "relocation failed"),
            },
            None => {
                self.emit(id, Outcome::Failed(Failure::Blocked));
                self.trace_entity(id, "action 'move' failed");
            }
        }
    }

    /// Applies interaction rules against every other occupant of the agent's cell.
    fn react(&mut self, id: EntityId) {
        let Some(here) = self.grid.position_of(id) else {
            return;
        };
        let others: SmallVec<[EntityId; 4]> = self
            .grid
            .occupants(here)
            .iter()
            .copied()
            .filter(|other| *other != id)
            .collect();

        for other in others {
            let Some(role) = self.agent(id).map(|body| body.role.clone()) else {
                return;
            };
            let Some(target) = self.entity_ref(other) else {
                continue;
            };
            match (role, target.tag) {
                (AgentRole::Ranger | AgentRole::Lion, EntityTag::Grass) => self.trample(other),
                (AgentRole::Ranger, EntityTag::Diamond) => {
                    self.emit(id, Outcome::Encountered(target));
                    self.trace_entity(id, "I've found the diamond!");
                    self.consume(other);
                    self.terminate();
                }
                (AgentRole::Lion, EntityTag::Ranger) => {
                    self.emit(id, Outcome::Encountered(target));
                    self.trace_entity(id, "I've found a ranger... GNAM!");
                    self.consume(other);
                    self.terminate();
                }
                (AgentRole::Mouse, EntityTag::Cheese) => {
                    self.emit(id, Outcome::Encountered(target));
                    self.trace_entity(id, "I've found the cheese!");
                    self.consume(other);
                    self.terminate();
                }
                (AgentRole::Lumberjack { strength }, EntityTag::Tree) => {
                    self.cut(id, strength, target);
                }
                (AgentRole::Gatherer { .. }, EntityTag::Fruit) => {
                    let nourishment = self.config.fruit_nourishment;
                    self.adjust_reserves(id, nourishment, 0);
                    self.emit(id, Outcome::Encountered(target));
                    self.trace_entity(id, "I've found a fruit!");
                    self.consume(other);
                }
                (AgentRole::Gatherer { .. }, EntityTag::Water) => {
                    let quench = self.config.water_quench;
                    let dose = self.config.water_poison_per_drink;
                    self.adjust_reserves(id, 0, quench);
                    if let Some(EntityKind::Water { poison }) =
                        self.entities.get_mut(other).map(|entity| &mut entity.kind)
                    {
                        *poison += dose;
                    }
                    self.emit(id, Outcome::Encountered(target));
                    self.trace_entity(id, "I've found water!");
                }
                _ => {}
            }
        }

        self.metabolize(id);
    }

    fn cut(&mut self, id: EntityId, strength: u32, tree: EntityRef) {
        let tree_strength = self
            .entities
            .get(tree.id)
            .and_then(|entity| entity.kind.strength())
            .unwrap_or(0);
        if tree_strength <= strength {
            self.emit(id, Outcome::Encountered(tree));
            self.trace_entity(id, "I've found a tree... I cut it!");
            self.consume(tree.id);
        } else {
            self.emit(id, Outcome::Failed(Failure::TooStrong));
            self.trace_entity(id, "I've found a tree... but that's too big for me!");
        }
    }

    fn trample(&mut self, grass: EntityId) {
        let trample = self.config.grass_trample;
        if let Some(EntityKind::Grass { amount }) =
            self.entities.get_mut(grass).map(|entity| &mut entity.kind)
        {
            *amount = (*amount - trample).max(0);
        }
    }

    fn adjust_reserves(&mut self, id: EntityId, food_delta: i32, water_delta: i32) {
        if let Some(body) = self
            .entities
            .get_mut(id)
            .and_then(|entity| entity.kind.agent_mut())
            && let AgentRole::Gatherer { food, water } = &mut body.role
        {
            *food += food_delta;
            *water += water_delta;
        }
    }

    /// Burns reserves and raises depletion events once a reserve runs dry.
    fn metabolize(&mut self, id: EntityId) {
        let metabolism = self.config.gatherer_metabolism;
        if metabolism == 0 {
            return;
        }
        let Some(AgentRole::Gatherer { food, water }) = self.agent(id).map(|body| &body.role)
        else {
            return;
        };
        let (food, water) = (*food - metabolism, *water - metabolism);
        self.adjust_reserves(id, -metabolism, -metabolism);
        if food <= 0 {
            self.emit(id, Outcome::Depleted(Need::Food));
            self.trace_entity(id, "I've starved");
            self.terminate();
        }
        if water <= 0 {
            self.emit(id, Outcome::Depleted(Need::Water));
            self.trace_entity(id, "I've shrivelled");
            self.terminate();
        }
    }

    fn consume(&mut self, id: EntityId) {
        if let Err(err) = self.destroy_entity(id) {
            warn!(%err, "failed to destroy consumed entity");
        }
    }

    fn emit(&mut self, id: EntityId, outcome: Outcome) {
        if let Some(actor) = self.entity_ref(id) {
            self.events.push(Event::new(actor, outcome));
        }
    }

    fn step_passive(&mut self, id: EntityId) {
        let grass_max = self.config.grass_max;
        let growth = self.config.grass_growth;
        let decay = self.config.water_poison_decay;
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        let seeds = match &mut entity.kind {
            EntityKind::Grass { amount } => {
                if *amount <= grass_max {
                    *amount += growth;
                }
                false
            }
            EntityKind::Water { poison } => {
                if *poison > 0.0 {
                    *poison = (*poison - decay).max(0.0);
                }
                false
            }
            EntityKind::Fruit => true,
            _ => false,
        };
        if seeds {
            self.seed_fruit(id);
        }
    }

    /// Fruit near clean water may seed an empty neighbouring cell.
    ///
    /// Probability is `rate * (water - poison / 10) * fruits^2`, clamped to 1,
    /// where `fruits` counts this fruit and its neighbours.
    fn seed_fruit(&mut self, id: EntityId) {
        if self.config.fruit_spawn_rate <= 0.0 {
            return;
        }
        let Some(center) = self.grid.position_of(id) else {
            return;
        };
        let mut fruits = 1_u32;
        let mut water = 0_u32;
        let mut poison = 0.0_f32;
        let mut empty: SmallVec<[Position; 8]> = SmallVec::new();
        let cells = match self.grid.neighborhood(center, 1, false) {
            Ok(cells) => cells,
            Err(err) => {
                warn!(%err, "fruit has no neighbourhood");
                return;
            }
        };
        for cell in cells {
            let occupants = self.grid.occupants(cell);
            if occupants.is_empty() {
                empty.push(cell);
            }
            for occupant in occupants {
                match self.entities.get(*occupant).map(|entity| &entity.kind) {
                    Some(EntityKind::Fruit) => fruits += 1,
                    Some(EntityKind::Water { poison: level }) => {
                        water += 1;
                        poison += level;
                    }
                    _ => {}
                }
            }
        }
        let fertility = water as f32 - (poison / 10.0).round();
        if empty.is_empty() || fertility <= 0.0 {
            return;
        }
        let chance = (self.config.fruit_spawn_rate * fertility * (fruits * fruits) as f32).min(1.0);
        if self.rng.random::<f32>() >= chance {
            return;
        }
        let cell = empty[self.rng.random_range(0..empty.len())];
        match self.add_entity(EntityKind::Fruit, cell) {
            Ok(_) => self.trace_entity(id, &format!("a new fruit grows at {cell}")),
            Err(err) => warn!(%err, "failed to seed fruit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Direction, EntityKind, EntityTag, Failure, Need, Outcome, Position, Topology,
        WorldConfig, WorldState,
    };

    fn config() -> WorldConfig {
        WorldConfig {
            rng_seed: Some(42),
            topology: Topology::Bounded,
            ..WorldConfig::default()
        }
    }

    fn world(width: u32, height: u32) -> WorldState {
        WorldState::new(width, height, config()).expect("world")
    }

    #[test]
    fn walls_block_movement_and_emit_failure() {
        let mut world = world(3, 1);
        world
            .add_entity(EntityKind::Wall, Position::new(1, 0))
            .expect("wall");
        let mouse = world
            .add_entity(EntityKind::mouse(), Position::new(0, 0))
            .expect("mouse");
        world
            .set_next_action(mouse, Direction::new(1, 0))
            .expect("mouse is an agent");

        let report = world.step();
        assert_eq!(world.position(mouse), Some(Position::new(0, 0)));
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].actor.id, mouse);
        assert_eq!(report.events[0].outcome, Outcome::Failed(Failure::Blocked));
        assert!(world.console().any(|line| line == "Mouse 1 > action 'move' failed"));
    }

    #[test]
    fn bounded_edges_block_moves() {
        let mut world = world(2, 2);
        let mouse = world
            .add_entity(EntityKind::mouse(), Position::new(0, 0))
            .expect("mouse");
        world
            .set_next_action(mouse, Direction::new(-1, 0))
            .expect("agent");
        let report = world.step();
        assert!(report.events[0].is_failure());
        assert_eq!(world.position(mouse), Some(Position::new(0, 0)));
    }

    #[test]
    fn toroidal_moves_wrap() {
        let mut world = WorldState::new(
            3,
            3,
            WorldConfig {
                rng_seed: Some(1),
                ..WorldConfig::default()
            },
        )
        .expect("world");
        let mouse = world
            .add_entity(EntityKind::mouse(), Position::new(0, 0))
            .expect("mouse");
        world
            .set_next_action(mouse, Direction::new(-1, -1))
            .expect("agent");
        world.step();
        assert_eq!(world.position(mouse), Some(Position::new(2, 2)));
    }

    #[test]
    fn rangers_block_rangers_but_not_themselves() {
        let mut world = world(2, 1);
        let cfg = world.config().clone();
        let mover = world
            .add_entity(EntityKind::ranger(&cfg), Position::new(0, 0))
            .expect("ranger");
        let sitter = world
            .add_entity(EntityKind::ranger(&cfg), Position::new(1, 0))
            .expect("ranger");
        world
            .set_next_action(mover, Direction::new(1, 0))
            .expect("agent");
        world.set_next_action(sitter, Direction::STAY).expect("agent");

        let report = world.step();
        assert_eq!(world.position(mover), Some(Position::new(0, 0)));
        assert_eq!(world.position(sitter), Some(Position::new(1, 0)));
        let failures: Vec<_> = report.events.iter().filter(|e| e.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].actor.id, mover);
        // energy is spent on every attempt
        assert_eq!(world.agent(mover).and_then(|a| a.energy), Some(998));
        assert_eq!(world.agent(sitter).and_then(|a| a.energy), Some(998));
    }

    #[test]
    fn lion_eats_ranger_and_ends_the_world() {
        let mut world = world(2, 1);
        let cfg = world.config().clone();
        let lion = world
            .add_entity(EntityKind::lion(&cfg), Position::new(0, 0))
            .expect("lion");
        let ranger = world
            .add_entity(EntityKind::ranger(&cfg), Position::new(1, 0))
            .expect("ranger");
        world
            .set_next_action(lion, Direction::new(1, 0))
            .expect("agent");
        world.set_next_action(ranger, Direction::STAY).expect("agent");

        let report = world.step();
        assert!(report.terminated);
        assert!(!world.is_alive(ranger));
        assert_eq!(world.count(EntityTag::Ranger), 0);
        assert_eq!(world.disabilities().len(), 1);
        let meal = report
            .events
            .iter()
            .find_map(|event| event.target().filter(|_| event.actor.id == lion))
            .expect("lion reports its meal");
        assert_eq!(meal.tag, EntityTag::Ranger);
        assert!(world.perceive(ranger).expect("destroyed agents perceive").is_empty());
    }

    #[test]
    fn ranger_picks_up_diamond() {
        let mut world = world(2, 1);
        let cfg = world.config().clone();
        let ranger = world
            .add_entity(EntityKind::ranger(&cfg), Position::new(0, 0))
            .expect("ranger");
        world
            .add_entity(EntityKind::Diamond, Position::new(1, 0))
            .expect("diamond");
        world
            .set_next_action(ranger, Direction::new(1, 0))
            .expect("agent");

        let report = world.step();
        assert!(report.terminated);
        assert_eq!(world.count(EntityTag::Diamond), 0);
        assert_eq!(report.events[0].target().map(|t| t.tag), Some(EntityTag::Diamond));
    }

    #[test]
    fn mouse_finds_cheese() {
        let mut world = world(3, 3);
        let mouse = world
            .add_entity(EntityKind::mouse(), Position::new(1, 1))
            .expect("mouse");
        world
            .add_entity(EntityKind::Cheese, Position::new(2, 2))
            .expect("cheese");
        world
            .set_next_action(mouse, Direction::new(1, 1))
            .expect("agent");

        let report = world.step();
        assert!(report.terminated);
        assert_eq!(report.events.len(), 1);
        assert!(matches!(
            report.events[0].outcome,
            Outcome::Encountered(target) if target.tag == EntityTag::Cheese
        ));
        assert_eq!(world.occupants(Position::new(2, 2)), &[mouse]);
    }

    #[test]
    fn lumberjack_strength_decides_the_cut() {
        let mut world = world(3, 1);
        let weak = world
            .add_entity(EntityKind::lumberjack(1), Position::new(0, 0))
            .expect("weak");
        let tree = world
            .add_entity(EntityKind::Tree { strength: 2 }, Position::new(1, 0))
            .expect("tree");
        world.set_next_action(weak, Direction::new(1, 0)).expect("agent");

        let report = world.step();
        assert_eq!(report.events[0].outcome, Outcome::Failed(Failure::TooStrong));
        assert!(world.is_alive(tree));
        assert!(!report.terminated);

        let strong = world
            .add_entity(EntityKind::lumberjack(2), Position::new(2, 0))
            .expect("strong");
        world.set_next_action(weak, Direction::new(-1, 0)).expect("agent");
        world
            .set_next_action(strong, Direction::new(-1, 0))
            .expect("agent");
        let report = world.step();
        assert!(!world.is_alive(tree));
        assert!(report.terminated);
        assert!(report.events.iter().any(|e| e.actor.id == strong
            && e.target().is_some_and(|t| t.tag == EntityTag::Tree)));
    }

    #[test]
    fn grass_grows_to_its_cap() {
        let mut world = world(1, 1);
        let grass = world
            .add_entity(EntityKind::Grass { amount: 30 }, Position::new(0, 0))
            .expect("grass");
        world.step();
        world.step();
        assert_eq!(
            world.entity(grass).map(|e| e.kind.clone()),
            Some(EntityKind::Grass { amount: 31 })
        );
    }

    #[test]
    fn animals_trample_grass() {
        let mut world = world(1, 1);
        let cfg = world.config().clone();
        let grass = world
            .add_entity(EntityKind::Grass { amount: 3 }, Position::new(0, 0))
            .expect("grass");
        let ranger = world
            .add_entity(EntityKind::ranger(&cfg), Position::new(0, 0))
            .expect("ranger");
        world.set_next_action(ranger, Direction::STAY).expect("agent");
        world.step();
        let Some(EntityKind::Grass { amount }) = world.entity(grass).map(|e| e.kind.clone())
        else {
            panic!("grass survives trampling");
        };
        assert!(amount <= 1, "trampled grass should be nearly gone, got {amount}");
    }

    #[test]
    fn gatherer_drinks_and_poisons_water() {
        let mut world = world(1, 1);
        let water = world
            .add_entity(EntityKind::Water { poison: 0.0 }, Position::new(0, 0))
            .expect("water");
        let cfg = world.config().clone();
        let gatherer = world
            .add_entity(EntityKind::gatherer(&cfg), Position::new(0, 0))
            .expect("gatherer");
        world.set_next_action(gatherer, Direction::STAY).expect("agent");

        let report = world.step();
        let outcomes: Vec<_> = report.events.iter().map(|e| e.outcome).collect();
        assert_eq!(outcomes[0], Outcome::Moved(Direction::STAY));
        assert!(matches!(outcomes[1], Outcome::Encountered(t) if t.tag == EntityTag::Water));
        let Some(EntityKind::Water { poison }) = world.entity(water).map(|e| e.kind.clone())
        else {
            panic!("water is never consumed");
        };
        assert!((9.0..=10.0).contains(&poison), "unexpected poison {poison}");
        let reserves = world.agent(gatherer).map(|a| a.role.clone());
        assert_eq!(
            reserves,
            Some(crate::AgentRole::Gatherer {
                food: cfg.gatherer_food - 1,
                water: cfg.gatherer_water + cfg.water_quench - 1,
            })
        );
    }

    #[test]
    fn starving_gatherer_ends_the_world() {
        let mut world = WorldState::new(
            2,
            2,
            WorldConfig {
                gatherer_food: 1,
                ..config()
            },
        )
        .expect("world");
        let cfg = world.config().clone();
        world
            .add_entity(EntityKind::gatherer(&cfg), Position::new(0, 0))
            .expect("gatherer");
        let report = world.step();
        assert!(report.terminated);
        assert!(
            report
                .events
                .iter()
                .any(|e| e.outcome == Outcome::Depleted(Need::Food))
        );
    }

    #[test]
    fn exhaustion_terminates_and_stays_terminated() {
        let mut world = WorldState::new(
            2,
            2,
            WorldConfig {
                agent_energy: 1,
                ..config()
            },
        )
        .expect("world");
        let cfg = world.config().clone();
        world
            .add_entity(EntityKind::lion(&cfg), Position::new(0, 0))
            .expect("lion");
        assert!(!world.step().terminated);
        assert!(world.step().terminated);
        for _ in 0..3 {
            assert!(world.step().terminated);
            assert!(world.is_terminated());
        }
    }

    #[test]
    fn water_poison_decays_to_zero() {
        let mut world = world(1, 1);
        let water = world
            .add_entity(EntityKind::Water { poison: 0.15 }, Position::new(0, 0))
            .expect("water");
        world.step();
        world.step();
        assert_eq!(
            world.entity(water).map(|e| e.kind.clone()),
            Some(EntityKind::Water { poison: 0.0 })
        );
    }

    #[test]
    fn spawned_fruit_waits_for_the_next_tick() {
        let mut world = WorldState::new(
            5,
            5,
            WorldConfig {
                fruit_spawn_rate: 1.0,
                ..config()
            },
        )
        .expect("world");
        world
            .add_entity(EntityKind::Fruit, Position::new(2, 2))
            .expect("fruit");
        world
            .add_entity(EntityKind::Water { poison: 0.0 }, Position::new(2, 1))
            .expect("water");

        world.step();
        assert_eq!(world.count(EntityTag::Fruit), 2);
        assert_eq!(world.schedule.len(), 3);
    }
}
