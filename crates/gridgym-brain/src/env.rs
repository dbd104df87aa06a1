//! Multi-agent environment wrapper over a [`WorldState`].
//!
//! Agents are addressed by the unique ids the world assigns while loading a
//! map. Every episode is rebuilt from the same layout, or from a random layout
//! with the same symbol counts, so those ids are stable across resets.

use crate::{
    EnvError,
    observation::marking_block,
    reward::{self, RewardScheme},
};
use gridgym_core::{
    Direction, MapLayout, ObservationMode, RosterEntry, Scenario, WorldConfig, WorldError,
    WorldState, parse_map,
};
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap};
use tracing::{debug, info, warn};

/// Keeps layout draws apart from the world's own random stream.
const LAYOUT_SEED_SALT: u64 = 0x5851_F42D_4C95_7F2D;

/// Everything needed to build and rebuild an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub scenario: Scenario,
    /// Map text; the scenario's default map when absent.
    pub map: Option<String>,
    pub world: WorldConfig,
    /// Episodes are truncated after this many steps.
    pub max_steps: Option<u32>,
    /// Scatter the map's symbols over fresh random cells every episode.
    pub random_layout: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::Goal,
            map: None,
            world: WorldConfig::default(),
            max_steps: Some(200),
            random_layout: false,
        }
    }
}

impl EnvConfig {
    #[must_use]
    pub fn for_scenario(scenario: Scenario) -> Self {
        Self {
            scenario,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if self.max_steps == Some(0) {
            return Err(EnvError::InvalidConfig("max_steps must be positive"));
        }
        self.world.validate()?;
        Ok(())
    }

    fn map_text(&self) -> &str {
        self.map
            .as_deref()
            .unwrap_or_else(|| self.scenario.default_map())
    }
}

/// The layout one episode is built from, drawn from `seed` when random.
fn episode_layout(
    template: &MapLayout,
    random: bool,
    seed: Option<u64>,
) -> Result<Cow<'_, MapLayout>, EnvError> {
    if !random {
        return Ok(Cow::Borrowed(template));
    }
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed ^ LAYOUT_SEED_SALT),
        None => SmallRng::seed_from_u64(rand::random()),
    };
    let layout = template.shuffled(&mut rng).map_err(WorldError::from)?;
    Ok(Cow::Owned(layout))
}

/// Per-agent info returned next to rewards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Outcome flags raised this step, such as `success` or `collided`.
    pub flags: BTreeMap<String, f32>,
    /// Agent statistics such as energy or strength.
    pub stats: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reset {
    pub observations: BTreeMap<u64, Vec<f32>>,
    pub info: BTreeMap<u64, AgentInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub observations: BTreeMap<u64, Vec<f32>>,
    pub rewards: BTreeMap<u64, f32>,
    pub terminated: bool,
    pub truncated: bool,
    pub info: BTreeMap<u64, AgentInfo>,
}

impl Transition {
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

pub struct GridEnv {
    config: EnvConfig,
    layout: MapLayout,
    world: WorldState,
    rewards: Box<dyn RewardScheme>,
    agents: Vec<RosterEntry>,
    steps: u32,
    episode: u64,
}

impl std::fmt::Debug for GridEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridEnv")
            .field("scenario", &self.config.scenario)
            .field("rewards", &self.rewards.name())
            .field("agents", &self.agents.len())
            .field("steps", &self.steps)
            .field("episode", &self.episode)
            .finish_non_exhaustive()
    }
}

impl GridEnv {
    /// Parses the map and builds the first episode's world.
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        config.validate()?;
        let layout = parse_map(config.map_text()).map_err(WorldError::from)?;
        let world = WorldState::from_layout(
            &*episode_layout(&layout, config.random_layout, config.world.rng_seed)?,
            config.scenario,
            config.world.clone(),
        )?;
        let agents: Vec<_> = world.agents().copied().collect();
        if agents.is_empty() {
            return Err(EnvError::InvalidConfig("map places no agents"));
        }
        Ok(Self {
            rewards: reward::for_scenario(config.scenario),
            config,
            layout,
            world,
            agents,
            steps: 0,
            episode: 0,
        })
    }

    /// Replaces the scenario's default reward scheme.
    #[must_use]
    pub fn with_rewards(mut self, rewards: Box<dyn RewardScheme>) -> Self {
        self.rewards = rewards;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EnvConfig {
        &self.config
    }

    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    #[must_use]
    pub fn reward_scheme(&self) -> &dyn RewardScheme {
        self.rewards.as_ref()
    }

    #[must_use]
    pub fn agents(&self) -> &[RosterEntry] {
        &self.agents
    }

    #[must_use]
    pub fn agent_uids(&self) -> Vec<u64> {
        self.agents.iter().map(|agent| agent.uid).collect()
    }

    #[must_use]
    pub const fn steps(&self) -> u32 {
        self.steps
    }

    /// Episodes started so far.
    #[must_use]
    pub const fn episode(&self) -> u64 {
        self.episode
    }

    #[must_use]
    pub const fn observation_mode(&self) -> ObservationMode {
        self.config.scenario.observation_mode()
    }

    /// Starts a fresh episode from the original layout.
    ///
    /// A seeded configuration is offset by the episode number so episodes
    /// differ while staying reproducible.
    pub fn reset(&mut self) -> Result<Reset, EnvError> {
        let mut world_config = self.config.world.clone();
        world_config.rng_seed = world_config
            .rng_seed
            .map(|seed| seed.wrapping_add(self.episode));
        let layout = episode_layout(
            &self.layout,
            self.config.random_layout,
            world_config.rng_seed,
        )?;
        self.world = WorldState::from_layout(&layout, self.config.scenario, world_config)?;
        self.agents = self.world.agents().copied().collect();
        self.steps = 0;
        self.episode += 1;
        debug!(episode = self.episode, agents = self.agents.len(), "episode reset");

        let mut observations = BTreeMap::new();
        let mut info = BTreeMap::new();
        for agent in &self.agents {
            observations.insert(agent.uid, self.observe(agent)?);
            info.insert(
                agent.uid,
                AgentInfo {
                    flags: BTreeMap::new(),
                    stats: self.rewards.describe(&self.world, agent),
                },
            );
        }
        Ok(Reset { observations, info })
    }

    /// Applies one action index per agent uid and advances the world a tick.
    ///
    /// Agents without an entry act on their own. Actions for destroyed agents
    /// are ignored.
    pub fn step(&mut self, actions: &BTreeMap<u64, usize>) -> Result<Transition, EnvError> {
        let mut resolved = Vec::with_capacity(actions.len());
        for (&uid, &action) in actions {
            let Some(agent) = self.agents.iter().find(|agent| agent.uid == uid) else {
                warn!(uid, "action for unknown agent");
                return Err(EnvError::UnknownAgent(uid));
            };
            let direction =
                Direction::from_index(action).ok_or(EnvError::InvalidAction { uid, action })?;
            resolved.push((agent.id, direction));
        }
        for (id, direction) in resolved {
            if self.world.is_alive(id) {
                self.world.set_next_action(id, direction)?;
            }
        }

        let report = self.world.step();
        self.steps += 1;
        let feedback = self.rewards.evaluate(&self.world, &self.agents, &report.events);
        let truncated = !report.terminated
            && self
                .config
                .max_steps
                .is_some_and(|limit| self.steps >= limit);

        let mut observations = BTreeMap::new();
        let mut rewards = BTreeMap::new();
        let mut info = BTreeMap::new();
        for agent in &self.agents {
            observations.insert(agent.uid, self.observe(agent)?);
            rewards.insert(agent.uid, feedback.reward(agent.uid));
            info.insert(
                agent.uid,
                AgentInfo {
                    flags: feedback.flags.get(&agent.uid).cloned().unwrap_or_default(),
                    stats: self.rewards.describe(&self.world, agent),
                },
            );
        }
        if report.terminated || truncated {
            info!(
                episode = self.episode,
                steps = self.steps,
                terminated = report.terminated,
                "episode finished"
            );
        }
        Ok(Transition {
            observations,
            rewards,
            terminated: report.terminated,
            truncated,
            info,
        })
    }

    /// Observation of one agent in the scenario's observation mode.
    pub fn observe(&self, agent: &RosterEntry) -> Result<Vec<f32>, EnvError> {
        Ok(match self.observation_mode() {
            ObservationMode::Positions => self
                .world
                .flat_positions()
                .into_iter()
                .map(|count| count as f32)
                .collect(),
            ObservationMode::Percepts => self.world.perceive(agent.id)?,
        })
    }

    /// Type name whose block marks an agent's cell in a position observation.
    pub fn observed_type(&self, observation: &[f32], uid: u64) -> Result<&'static str, EnvError> {
        let agent = self
            .agents
            .iter()
            .find(|agent| agent.uid == uid)
            .ok_or(EnvError::UnknownAgent(uid))?;
        let grid = self.world.grid();
        let cell = self
            .world
            .position(agent.id)
            .and_then(|position| grid.cell_index(position))
            .ok_or(EnvError::InconsistentObservation("agent is not on the grid"))?;
        let block = marking_block(observation, grid.cell_count(), cell)?;
        self.world
            .positions()
            .into_keys()
            .nth(block)
            .ok_or(EnvError::InconsistentObservation("more blocks than known types"))
    }
}
