use gridgym_core::{
    EntityTag, MapError, NeighborhoodIndex, Position, Scenario, Topology, WorldConfig,
    WorldError, WorldState,
};

const FOREST: &str = "|-----|\n|2  2 |\n|1   2|\n|  ☺  |\n|1 ☻  |\n| 1   |\n|-----|\n";

fn seeded(seed: u64) -> WorldConfig {
    WorldConfig {
        rng_seed: Some(seed),
        ..WorldConfig::default()
    }
}

fn assert_occupancy_consistent(world: &WorldState) {
    let mut seen = 0;
    for (position, occupants) in world.grid().iter_cells() {
        for id in occupants {
            assert!(world.is_alive(*id), "dead entity {id:?} still on the grid");
            assert_eq!(world.position(*id), Some(position));
            seen += 1;
        }
    }
    assert_eq!(seen, world.live_entities());
}

#[test]
fn forest_map_loads_at_literal_positions() {
    let world = WorldState::from_map(FOREST, Scenario::Lumberjack, seeded(1)).expect("forest");
    assert_eq!((world.width(), world.height()), (5, 5));
    assert_eq!(world.grid().cell_count(), 25);

    let strong_trees = world
        .roster()
        .iter()
        .filter(|entry| {
            world
                .entity(entry.id)
                .is_some_and(|e| e.tag() == EntityTag::Tree && e.kind.strength() == Some(2))
        })
        .count();
    assert_eq!(strong_trees, 3);

    let weak: Vec<_> = world
        .agents()
        .filter(|entry| world.entity(entry.id).is_some_and(|e| e.kind.strength() == Some(1)))
        .collect();
    assert_eq!(weak.len(), 1);
    assert_eq!(world.position(weak[0].id), Some(Position::new(2, 2)));
    assert_eq!(world.render_symbol(weak[0].id), Some('☺'));
}

#[test]
fn unknown_symbols_fail_before_any_entity_exists() {
    let err = WorldState::from_map(FOREST, Scenario::Goal, seeded(1))
        .expect_err("trees are not goal symbols");
    assert!(matches!(
        err,
        WorldError::Map(MapError::UnknownSymbol { symbol: '2', .. })
    ));
}

#[test]
fn malformed_maps_are_rejected() {
    let err = WorldState::from_map("|---|\n| ☺ |\n", Scenario::Goal, seeded(1))
        .expect_err("missing bottom border");
    assert!(matches!(err, WorldError::Map(MapError::Dimensions(_))));
}

#[test]
fn occupancy_stays_consistent_while_stepping() {
    for scenario in Scenario::ALL {
        let mut world =
            WorldState::from_map(scenario.default_map(), scenario, seeded(9)).expect("map");
        for _ in 0..200 {
            world.step();
            assert_occupancy_consistent(&world);
        }
    }
}

#[test]
fn walls_and_rangers_are_never_entered_illegally() {
    let mut world =
        WorldState::from_map(Scenario::Zzt.default_map(), Scenario::Zzt, seeded(5)).expect("zzt");
    for _ in 0..300 {
        world.step();
        for (_, occupants) in world.grid().iter_cells() {
            let tags: Vec<_> = occupants
                .iter()
                .filter_map(|id| world.entity(*id).map(|e| e.tag()))
                .collect();
            let walls = tags.iter().filter(|t| **t == EntityTag::Wall).count();
            let rangers = tags.iter().filter(|t| **t == EntityTag::Ranger).count();
            let lions = tags.iter().filter(|t| **t == EntityTag::Lion).count();
            if walls > 0 {
                assert_eq!(walls + rangers + lions, walls, "an agent walked into a wall");
            }
            assert!(rangers <= 1);
            assert!(lions <= 1);
        }
        if world.is_terminated() {
            break;
        }
    }
}

#[test]
fn percepts_have_one_block_per_relevant_type() {
    for (scenario, blocks) in [(Scenario::Lumberjack, 2), (Scenario::Zzt, 4), (Scenario::Goal, 1)] {
        let mut world =
            WorldState::from_map(scenario.default_map(), scenario, seeded(2)).expect("map");
        for _ in 0..10 {
            let agents: Vec<_> = world.agents().map(|entry| entry.id).collect();
            for agent in agents {
                let percept = world.perceive(agent).expect("agents perceive");
                if world.is_alive(agent) {
                    assert_eq!(percept.len(), 9 * blocks);
                } else {
                    assert!(percept.is_empty());
                }
            }
            world.step();
        }
    }
}

#[test]
fn lumberjack_percept_sums_strength() {
    let map = "|---|\n|2☻ |\n|   |\n|---|\n";
    let world = WorldState::from_map(
        map,
        Scenario::Lumberjack,
        WorldConfig {
            topology: Topology::Bounded,
            ..seeded(1)
        },
    )
    .expect("map");
    let strong = world.agents().next().expect("one lumberjack").id;
    let percept = world.perceive(strong).expect("percept");
    // lumberjack block: itself at the centre
    assert_eq!(percept[4], 2.0);
    // tree block: strength-2 tree at dx = -1, dy = 0
    assert_eq!(percept[9 + 1], 2.0);
    assert_eq!(percept.iter().sum::<f32>(), 4.0);
}

#[test]
fn bounded_percepts_ignore_off_grid_cells() {
    let map = "|--|\n|☺♠|\n|--|\n";
    let bounded = WorldState::from_map(
        map,
        Scenario::Goal,
        WorldConfig {
            topology: Topology::Bounded,
            ..seeded(1)
        },
    )
    .expect("map");
    let toroidal = WorldState::from_map(map, Scenario::Goal, seeded(1)).expect("map");
    let mouse = bounded.agents().next().expect("mouse").id;
    let bounded_sum: f32 = bounded.perceive(mouse).expect("percept").iter().sum();
    assert_eq!(bounded_sum, 1.0);

    let mouse = toroidal.agents().next().expect("mouse").id;
    let toroidal_sum: f32 = toroidal.perceive(mouse).expect("percept").iter().sum();
    assert!(toroidal_sum >= 1.0);
    let cells = toroidal
        .grid()
        .neighborhood(Position::new(0, 0), 1, true)
        .expect("cells");
    assert_eq!(cells.len(), 2);
}

#[test]
fn positions_are_sorted_and_row_major() {
    let world =
        WorldState::from_map(Scenario::Goal.default_map(), Scenario::Goal, seeded(1)).expect("goal");
    let positions = world.positions();
    let names: Vec<_> = positions.keys().copied().collect();
    assert_eq!(names, vec!["Cheese", "Mouse"]);
    let mouse = &positions["Mouse"];
    assert_eq!(mouse.len(), 200);
    // mouse sits on map row 2, column 16
    assert_eq!(mouse[2 * 20 + 16], 1);
    assert_eq!(mouse.iter().sum::<u32>(), 1);
    assert_eq!(positions["Cheese"][8 * 20 + 14], 1);

    let flat = world.flat_positions();
    assert_eq!(flat.len(), 400);
    assert_eq!(flat[200 + 2 * 20 + 16], 1);
}

#[test]
fn identically_seeded_worlds_evolve_identically() {
    for scenario in Scenario::ALL {
        let mut left =
            WorldState::from_map(scenario.default_map(), scenario, seeded(77)).expect("map");
        let mut right =
            WorldState::from_map(scenario.default_map(), scenario, seeded(77)).expect("map");
        for _ in 0..100 {
            assert_eq!(left.step(), right.step());
            assert_eq!(left.flat_positions(), right.flat_positions());
        }
    }
}

#[test]
fn termination_is_monotonic() {
    let map = "|--|\n|☺♠|\n|--|\n";
    let mut world = WorldState::from_map(map, Scenario::Goal, seeded(4)).expect("map");
    let mut terminated = false;
    for _ in 0..500 {
        let report = world.step();
        if terminated {
            assert!(report.terminated);
        }
        terminated = report.terminated;
    }
    assert!(terminated, "the mouse should find the cheese in a 2x1 world");
}
