use crate::world::WorldError;
use gridgym_index::Topology;
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

/// Static configuration for a gridgym world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Boundary behaviour applied to both movement and perception.
    pub topology: Topology,
    /// Maximum number of console lines retained by the world.
    pub console_capacity: usize,
    /// Chebyshev radius of the square window an agent perceives.
    pub perception_radius: u32,
    /// Energy budget of rangers and lions; one unit is spent per move attempt.
    pub agent_energy: i32,
    /// Grass keeps growing while its amount is at or below this value.
    pub grass_max: i32,
    pub grass_growth: i32,
    /// Amount removed from grass when an animal stands on it.
    pub grass_trample: i32,
    /// Poison removed from each water tile per tick.
    pub water_poison_decay: f32,
    /// Poison added to a water tile every time a gatherer drinks from it.
    pub water_poison_per_drink: f32,
    /// Starting food reserve of a gatherer.
    pub gatherer_food: i32,
    /// Starting water reserve of a gatherer.
    pub gatherer_water: i32,
    /// Food and water consumed by a gatherer each tick; 0 disables starvation.
    pub gatherer_metabolism: i32,
    pub fruit_nourishment: i32,
    pub water_quench: i32,
    /// Base probability that a fruit seeds a neighbouring empty cell per tick.
    pub fruit_spawn_rate: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,
            topology: Topology::Toroidal,
            console_capacity: 64,
            perception_radius: 1,
            agent_energy: 999,
            grass_max: 30,
            grass_growth: 1,
            grass_trample: 5,
            water_poison_decay: 0.1,
            water_poison_per_drink: 10.0,
            gatherer_food: 60,
            gatherer_water: 40,
            gatherer_metabolism: 1,
            fruit_nourishment: 10,
            water_quench: 5,
            fruit_spawn_rate: 0.02,
        }
    }
}

impl WorldConfig {
    /// Validates every tunable, returning the first violation found.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.console_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "console_capacity must be positive",
            ));
        }
        if self.perception_radius == 0 {
            return Err(WorldError::InvalidConfig(
                "perception_radius must be positive",
            ));
        }
        if self.agent_energy <= 0 {
            return Err(WorldError::InvalidConfig("agent_energy must be positive"));
        }
        if self.grass_max < 0 || self.grass_growth < 0 || self.grass_trample < 0 {
            return Err(WorldError::InvalidConfig(
                "grass parameters must be non-negative",
            ));
        }
        if !self.water_poison_decay.is_finite()
            || !self.water_poison_per_drink.is_finite()
            || self.water_poison_decay < 0.0
            || self.water_poison_per_drink < 0.0
        {
            return Err(WorldError::InvalidConfig(
                "water poison rates must be finite and non-negative",
            ));
        }
        if self.gatherer_food <= 0 || self.gatherer_water <= 0 {
            return Err(WorldError::InvalidConfig(
                "gatherer reserves must start positive",
            ));
        }
        if self.gatherer_metabolism < 0 || self.fruit_nourishment < 0 || self.water_quench < 0 {
            return Err(WorldError::InvalidConfig(
                "metabolism and nourishment must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.fruit_spawn_rate) {
            return Err(WorldError::InvalidConfig(
                "fruit_spawn_rate must lie in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Builds the world RNG, drawing a seed from entropy when none is configured.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}
