//! One playable episode: an environment plus whatever drives its agents.

use anyhow::Result;
use gridgym_brain::{Brain, GridEnv, QTable, RandomBrain};
use gridgym_core::WorldState;
use rand::{SeedableRng, rngs::SmallRng};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub struct Session {
    env: GridEnv,
    brains: BTreeMap<u64, Box<dyn Brain>>,
    rng: SmallRng,
    observations: BTreeMap<u64, Vec<f32>>,
    returns: BTreeMap<u64, f32>,
    flags: BTreeMap<u64, Vec<String>>,
    done: bool,
}

impl Session {
    /// Starts the first episode. Agents without a q-table act randomly.
    pub fn new(mut env: GridEnv, mut tables: BTreeMap<u64, QTable>) -> Result<Self> {
        let rng = match env.config().world.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed.rotate_left(17)),
            None => SmallRng::seed_from_u64(rand::random()),
        };
        let brains: BTreeMap<u64, Box<dyn Brain>> = env
            .agent_uids()
            .into_iter()
            .map(|uid| {
                let brain: Box<dyn Brain> = match tables.remove(&uid) {
                    Some(table) => Box::new(table.into_policy()),
                    None => Box::new(RandomBrain),
                };
                debug!(uid, brain = brain.kind(), "agent brain assigned");
                (uid, brain)
            })
            .collect();
        for uid in tables.keys() {
            warn!(uid, "q-table names no agent of this environment");
        }
        let reset = env.reset()?;
        let returns = reset.observations.keys().map(|uid| (*uid, 0.0)).collect();
        Ok(Self {
            env,
            brains,
            rng,
            observations: reset.observations,
            returns,
            flags: BTreeMap::new(),
            done: false,
        })
    }

    #[must_use]
    pub const fn world(&self) -> &WorldState {
        self.env.world()
    }

    #[must_use]
    pub const fn env(&self) -> &GridEnv {
        &self.env
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Kind of brain driving each agent.
    #[must_use]
    pub fn brain_kinds(&self) -> BTreeMap<u64, &'static str> {
        self.brains
            .iter()
            .map(|(uid, brain)| (*uid, brain.kind()))
            .collect()
    }

    /// Reward accumulated by each agent this episode.
    #[must_use]
    pub fn returns(&self) -> &BTreeMap<u64, f32> {
        &self.returns
    }

    /// Info flags raised on the latest step.
    #[must_use]
    pub fn flags(&self) -> &BTreeMap<u64, Vec<String>> {
        &self.flags
    }

    /// Advances one tick unless the episode already ended.
    pub fn advance(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        let mut actions = BTreeMap::new();
        for (uid, brain) in &mut self.brains {
            if let Some(observation) = self.observations.get(uid) {
                actions.insert(*uid, brain.select_action(observation, &mut self.rng));
            }
        }
        let transition = self.env.step(&actions)?;
        for (uid, reward) in &transition.rewards {
            *self.returns.entry(*uid).or_default() += reward;
        }
        self.flags = transition
            .info
            .iter()
            .map(|(uid, info)| (*uid, info.flags.keys().cloned().collect()))
            .collect();
        self.done = transition.is_done();
        self.observations = transition.observations;
        if self.done {
            info!(
                tick = self.world().tick().0,
                terminated = transition.terminated,
                "episode over"
            );
        }
        Ok(true)
    }

    /// Throws the current episode away and starts the next one.
    pub fn restart(&mut self) -> Result<()> {
        let reset = self.env.reset()?;
        self.returns = reset.observations.keys().map(|uid| (*uid, 0.0)).collect();
        self.observations = reset.observations;
        self.flags.clear();
        self.done = false;
        debug!(episode = self.env.episode(), "session restarted");
        Ok(())
    }
}
