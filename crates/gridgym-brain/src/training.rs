//! Episode loop training one Q-learner per agent.

use crate::{Brain, EnvError, GridEnv, QLearningConfig, QLearningTrainer, QTable};
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Mixed into the world seed so learners do not replay the world's draws.
const LEARNER_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: u32,
    /// Hard cap on steps per episode, on top of the environment's own.
    pub max_steps: u32,
    pub q: QLearningConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::for_episodes(1_000)
    }
}

impl TrainingConfig {
    /// Defaults whose exploration reaches its floor halfway through.
    #[must_use]
    pub fn for_episodes(episodes: u32) -> Self {
        Self {
            episodes,
            max_steps: 500,
            q: QLearningConfig::for_episodes(episodes),
        }
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if self.episodes == 0 {
            return Err(EnvError::InvalidConfig("episodes must be positive"));
        }
        if self.max_steps == 0 {
            return Err(EnvError::InvalidConfig("max_steps must be positive"));
        }
        self.q.validate()
    }
}

/// Summary of one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub episode: u64,
    pub steps: u32,
    pub terminated: bool,
    /// Undiscounted reward sum per agent uid.
    pub returns: BTreeMap<u64, f32>,
    /// Exploration rate used during the episode.
    pub epsilon: f32,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub episodes: Vec<EpisodeStats>,
    pub trainers: BTreeMap<u64, QLearningTrainer>,
}

impl TrainingOutcome {
    #[must_use]
    pub fn q_tables(&self) -> BTreeMap<u64, QTable> {
        self.trainers
            .iter()
            .map(|(uid, trainer)| (*uid, trainer.q_table()))
            .collect()
    }

    /// Mean return of the last `window` episodes for one agent.
    #[must_use]
    pub fn recent_mean_return(&self, uid: u64, window: usize) -> Option<f32> {
        let recent: Vec<f32> = self
            .episodes
            .iter()
            .rev()
            .take(window)
            .filter_map(|stats| stats.returns.get(&uid).copied())
            .collect();
        if recent.is_empty() {
            return None;
        }
        Some(recent.iter().sum::<f32>() / recent.len() as f32)
    }
}

/// Trains an independent learner for every agent of the environment.
pub fn train(env: &mut GridEnv, config: &TrainingConfig) -> Result<TrainingOutcome, EnvError> {
    config.validate()?;
    let mut rng = match env.config().world.rng_seed {
        Some(seed) => SmallRng::seed_from_u64(seed ^ LEARNER_SEED_SALT),
        None => SmallRng::seed_from_u64(rand::random()),
    };
    let mut trainers = BTreeMap::new();
    for uid in env.agent_uids() {
        trainers.insert(uid, QLearningTrainer::new(config.q.clone())?);
    }
    info!(
        scenario = env.config().scenario.name(),
        agents = trainers.len(),
        brain = trainers.values().next().map_or("none", |trainer| trainer.kind()),
        episodes = config.episodes,
        "training started"
    );

    let mut episodes = Vec::with_capacity(config.episodes as usize);
    for _ in 0..config.episodes {
        let epsilon = trainers
            .values()
            .next()
            .map_or(config.q.initial_epsilon, QLearningTrainer::epsilon);
        let mut observations = env.reset()?.observations;
        let mut returns: BTreeMap<u64, f32> = trainers.keys().map(|uid| (*uid, 0.0)).collect();
        let mut steps = 0;
        let mut terminated = false;

        while steps < config.max_steps {
            let mut actions = BTreeMap::new();
            for (uid, trainer) in &trainers {
                let Some(observation) = observations.get(uid) else {
                    continue;
                };
                actions.insert(*uid, trainer.select_action(observation, &mut rng));
            }
            let transition = env.step(&actions)?;
            steps += 1;
            for (uid, action) in &actions {
                let (Some(trainer), Some(before), Some(after)) = (
                    trainers.get_mut(uid),
                    observations.get(uid),
                    transition.observations.get(uid),
                ) else {
                    continue;
                };
                let reward = transition.rewards.get(uid).copied().unwrap_or(0.0);
                trainer.update(before, *action, reward, transition.terminated, after)?;
                *returns.entry(*uid).or_default() += reward;
            }
            terminated = transition.terminated;
            let done = transition.is_done();
            observations = transition.observations;
            if done {
                break;
            }
        }

        for trainer in trainers.values_mut() {
            trainer.decay_epsilon();
        }
        let stats = EpisodeStats {
            episode: env.episode(),
            steps,
            terminated,
            returns,
            epsilon,
        };
        debug!(
            episode = stats.episode,
            steps = stats.steps,
            terminated = stats.terminated,
            epsilon = stats.epsilon,
            "episode trained"
        );
        episodes.push(stats);
    }

    info!(episodes = episodes.len(), "training finished");
    Ok(TrainingOutcome { episodes, trainers })
}
