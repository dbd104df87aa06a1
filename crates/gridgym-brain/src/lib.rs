//! Learning-side plumbing for gridgym: environments, rewards and brains.

use gridgym_core::{Direction, WorldError};
use rand::{Rng, RngCore};
use thiserror::Error;

pub mod env;
pub mod observation;
pub mod qlearning;
pub mod reward;
pub mod training;

pub use env::{AgentInfo, EnvConfig, GridEnv, Reset, Transition};
pub use observation::marking_block;
pub use qlearning::{GreedyPolicy, QLearningConfig, QLearningTrainer, QTable, QTableEntry};
pub use reward::{
    Feedback, GoalRewards, LumberjackRewards, RewardScheme, SacredWaterRewards, ValueDimension,
    ZztRewards,
};
pub use training::{EpisodeStats, TrainingConfig, TrainingOutcome, train};

/// Number of discrete actions: the Moore directions plus staying put.
pub const ACTION_COUNT: usize = Direction::ALL.len();

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("unknown agent {0}")]
    UnknownAgent(u64),
    #[error("action {action} is out of range for agent {uid}")]
    InvalidAction { uid: u64, action: usize },
    #[error("action index {0} is out of range")]
    ActionOutOfRange(usize),
    #[error("inconsistent observation: {0}")]
    InconsistentObservation(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Shared interface implemented by every action-selecting policy.
pub trait Brain {
    /// Immutable brain identifier (useful for analytics).
    fn kind(&self) -> &'static str;

    /// Choose an action index into [`Direction::ALL`] for an observation.
    fn select_action(&mut self, observation: &[f32], rng: &mut dyn RngCore) -> usize;
}

/// Uniformly random baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomBrain;

impl Brain for RandomBrain {
    fn kind(&self) -> &'static str {
        "random"
    }

    fn select_action(&mut self, _observation: &[f32], rng: &mut dyn RngCore) -> usize {
        rng.random_range(0..ACTION_COUNT)
    }
}

/// Index of the largest value, first one on ties.
pub(crate) fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (idx, value)| {
            if *value > best.1 { (idx, *value) } else { best }
        })
        .0
}
