//! Tabular Q-learning with epsilon-greedy exploration.

use crate::{ACTION_COUNT, Brain, EnvError, argmax};
use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

type StateKey = Vec<OrderedFloat<f32>>;

fn state_key(observation: &[f32]) -> StateKey {
    observation.iter().copied().map(OrderedFloat).collect()
}

/// Hyper-parameters of a [`QLearningTrainer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    pub learning_rate: f32,
    pub discount_factor: f32,
    pub initial_epsilon: f32,
    /// Subtracted from epsilon after every episode.
    pub epsilon_decay: f32,
    pub final_epsilon: f32,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            discount_factor: 0.95,
            initial_epsilon: 1.0,
            epsilon_decay: 0.002,
            final_epsilon: 0.1,
        }
    }
}

impl QLearningConfig {
    /// Defaults with exploration decaying to its floor over half the episodes.
    #[must_use]
    pub fn for_episodes(episodes: u32) -> Self {
        let defaults = Self::default();
        Self {
            epsilon_decay: defaults.initial_epsilon / (episodes.max(2) as f32 / 2.0),
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if !(0.0..=1.0).contains(&self.learning_rate) || self.learning_rate == 0.0 {
            return Err(EnvError::InvalidConfig("learning_rate must lie in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(EnvError::InvalidConfig("discount_factor must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.initial_epsilon)
            || !(0.0..=1.0).contains(&self.final_epsilon)
            || self.epsilon_decay < 0.0
        {
            return Err(EnvError::InvalidConfig(
                "epsilons must lie in [0, 1] and decay must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Learner owning one agent's state-action values.
#[derive(Debug, Clone)]
pub struct QLearningTrainer {
    config: QLearningConfig,
    epsilon: f32,
    q_values: HashMap<StateKey, [f32; ACTION_COUNT]>,
    training_error: Vec<f32>,
}

impl QLearningTrainer {
    pub fn new(config: QLearningConfig) -> Result<Self, EnvError> {
        config.validate()?;
        Ok(Self {
            epsilon: config.initial_epsilon,
            config,
            q_values: HashMap::new(),
            training_error: Vec::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &QLearningConfig {
        &self.config
    }

    #[must_use]
    pub const fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Temporal differences recorded by every update so far.
    #[must_use]
    pub fn training_error(&self) -> &[f32] {
        &self.training_error
    }

    #[must_use]
    pub fn states_seen(&self) -> usize {
        self.q_values.len()
    }

    #[must_use]
    pub fn values(&self, observation: &[f32]) -> [f32; ACTION_COUNT] {
        self.q_values
            .get(&state_key(observation))
            .copied()
            .unwrap_or([0.0; ACTION_COUNT])
    }

    #[must_use]
    pub fn greedy_action(&self, observation: &[f32]) -> usize {
        argmax(&self.values(observation))
    }

    /// Explores with probability epsilon, otherwise exploits.
    pub fn select_action(&self, observation: &[f32], rng: &mut dyn RngCore) -> usize {
        if rng.random::<f32>() < self.epsilon {
            rng.random_range(0..ACTION_COUNT)
        } else {
            self.greedy_action(observation)
        }
    }

    /// One TD(0) update; returns the temporal difference.
    pub fn update(
        &mut self,
        observation: &[f32],
        action: usize,
        reward: f32,
        terminated: bool,
        next_observation: &[f32],
    ) -> Result<f32, EnvError> {
        if action >= ACTION_COUNT {
            return Err(EnvError::ActionOutOfRange(action));
        }
        let future = if terminated {
            0.0
        } else {
            self.values(next_observation)
                .into_iter()
                .fold(f32::NEG_INFINITY, f32::max)
        };
        let entry = self
            .q_values
            .entry(state_key(observation))
            .or_insert([0.0; ACTION_COUNT]);
        let temporal_difference = reward + self.config.discount_factor * future - entry[action];
        entry[action] += self.config.learning_rate * temporal_difference;
        self.training_error.push(temporal_difference);
        Ok(temporal_difference)
    }

    pub fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon - self.config.epsilon_decay).max(self.config.final_epsilon);
    }

    /// Exportable snapshot of the learned values, sorted by state.
    #[must_use]
    pub fn q_table(&self) -> QTable {
        let mut entries: Vec<_> = self
            .q_values
            .iter()
            .map(|(state, values)| QTableEntry {
                state: state.iter().map(|v| v.into_inner()).collect(),
                values: values.to_vec(),
            })
            .collect();
        entries.sort_by(|a, b| state_key(&a.state).cmp(&state_key(&b.state)));
        QTable {
            actions: ACTION_COUNT,
            entries,
        }
    }
}

impl Brain for QLearningTrainer {
    fn kind(&self) -> &'static str {
        "q-learning"
    }

    fn select_action(&mut self, observation: &[f32], rng: &mut dyn RngCore) -> usize {
        QLearningTrainer::select_action(self, observation, rng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTableEntry {
    pub state: Vec<f32>,
    pub values: Vec<f32>,
}

/// Serializable state-action table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QTable {
    pub actions: usize,
    pub entries: Vec<QTableEntry>,
}

impl QTable {
    pub fn save_json(&self, path: &Path) -> Result<(), EnvError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self, EnvError> {
        let reader = BufReader::new(File::open(path)?);
        let table: Self = serde_json::from_reader(reader)?;
        table.validate()?;
        Ok(table)
    }

    /// Every row must hold one value per action.
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.actions != ACTION_COUNT
            || self.entries.iter().any(|entry| entry.values.len() != ACTION_COUNT)
        {
            return Err(EnvError::InvalidConfig("q-table action count mismatch"));
        }
        Ok(())
    }

    /// Greedy policy acting from this table.
    #[must_use]
    pub fn into_policy(self) -> GreedyPolicy {
        GreedyPolicy {
            lookup: self
                .entries
                .into_iter()
                .map(|entry| (state_key(&entry.state), entry.values))
                .collect(),
        }
    }
}

/// Acts greedily from a trained table, randomly in unseen states.
#[derive(Debug, Clone, Default)]
pub struct GreedyPolicy {
    lookup: HashMap<StateKey, Vec<f32>>,
}

impl Brain for GreedyPolicy {
    fn kind(&self) -> &'static str {
        "greedy"
    }

    fn select_action(&mut self, observation: &[f32], rng: &mut dyn RngCore) -> usize {
        match self.lookup.get(&state_key(observation)) {
            Some(values) => argmax(values),
            None => rng.random_range(0..ACTION_COUNT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    fn trainer() -> QLearningTrainer {
        QLearningTrainer::new(QLearningConfig {
            learning_rate: 0.5,
            discount_factor: 0.9,
            initial_epsilon: 0.0,
            epsilon_decay: 0.25,
            final_epsilon: 0.0,
        })
        .expect("valid config")
    }

    #[test]
    fn update_follows_the_td_rule() {
        let mut learner = trainer();
        let td = learner
            .update(&[1.0], 2, 10.0, false, &[2.0])
            .expect("update");
        assert_eq!(td, 10.0);
        assert_eq!(learner.values(&[1.0])[2], 5.0);

        // bootstrap from the next state's best value
        learner.update(&[2.0], 0, 4.0, false, &[1.0]).expect("update");
        assert_eq!(learner.values(&[2.0])[0], 0.5 * (4.0 + 0.9 * 5.0));

        // terminal transitions ignore the future
        let td = learner.update(&[3.0], 1, 1.0, true, &[1.0]).expect("update");
        assert_eq!(td, 1.0);
        assert_eq!(learner.training_error().len(), 3);
        assert!(matches!(
            learner.update(&[3.0], ACTION_COUNT, 1.0, true, &[1.0]),
            Err(EnvError::ActionOutOfRange(ACTION_COUNT))
        ));
    }

    #[test]
    fn greedy_selection_without_exploration() {
        let mut learner = trainer();
        learner.update(&[0.0], 7, 1.0, true, &[0.0]).expect("update");
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(learner.select_action(&[0.0], &mut rng), 7);
        }
    }

    #[test]
    fn epsilon_decays_to_its_floor() {
        let mut learner = QLearningTrainer::new(QLearningConfig {
            initial_epsilon: 1.0,
            epsilon_decay: 0.4,
            final_epsilon: 0.1,
            ..QLearningConfig::default()
        })
        .expect("valid");
        learner.decay_epsilon();
        assert!((learner.epsilon() - 0.6).abs() < 1e-6);
        learner.decay_epsilon();
        learner.decay_epsilon();
        assert_eq!(learner.epsilon(), 0.1);
    }

    #[test]
    fn rejects_bad_hyper_parameters() {
        let config = QLearningConfig {
            learning_rate: 0.0,
            ..QLearningConfig::default()
        };
        assert!(matches!(
            QLearningTrainer::new(config),
            Err(EnvError::InvalidConfig(_))
        ));
        assert!((QLearningConfig::for_episodes(1_000).epsilon_decay - 0.002).abs() < 1e-6);
    }

    #[test]
    fn exported_table_drives_a_greedy_policy() {
        let mut learner = trainer();
        learner.update(&[1.0, 0.0], 3, 2.0, true, &[0.0, 0.0]).expect("update");
        learner.update(&[0.0, 1.0], 5, 2.0, true, &[0.0, 0.0]).expect("update");
        let table = learner.q_table();
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[0].state, vec![0.0, 1.0]);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("q.json");
        table.save_json(&path).expect("save");
        let loaded = QTable::load_json(&path).expect("load");
        assert_eq!(loaded, table);

        let mut policy = loaded.into_policy();
        let mut rng = SmallRng::seed_from_u64(2);
        assert_eq!(policy.select_action(&[1.0, 0.0], &mut rng), 3);
        assert_eq!(policy.select_action(&[0.0, 1.0], &mut rng), 5);
        assert_eq!(policy.kind(), "greedy");
    }

    #[test]
    fn tables_with_short_rows_are_rejected() {
        let table = QTable {
            actions: ACTION_COUNT,
            entries: vec![QTableEntry {
                state: vec![1.0],
                values: vec![0.0; ACTION_COUNT - 1],
            }],
        };
        assert!(matches!(table.validate(), Err(EnvError::InvalidConfig(_))));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("short.json");
        table.save_json(&path).expect("save");
        assert!(QTable::load_json(&path).is_err());
    }
}
