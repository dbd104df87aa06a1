//! Reward schemes turning tick events into per-agent rewards and info flags.

use gridgym_core::{
    AgentRole, EntityTag, Event, Failure, Need, Outcome, RosterEntry, Scenario, WorldState,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rewards and info flags produced for one tick, keyed by agent uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub rewards: BTreeMap<u64, f32>,
    pub flags: BTreeMap<u64, BTreeMap<String, f32>>,
}

impl Feedback {
    pub fn set(&mut self, uid: u64, reward: f32) {
        self.rewards.insert(uid, reward);
    }

    pub fn add(&mut self, uid: u64, reward: f32) {
        *self.rewards.entry(uid).or_default() += reward;
    }

    pub fn flag(&mut self, uid: u64, name: &str) {
        self.flags
            .entry(uid)
            .or_default()
            .insert(name.to_owned(), 1.0);
    }

    #[must_use]
    pub fn reward(&self, uid: u64) -> f32 {
        self.rewards.get(&uid).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn has_flag(&self, uid: u64, name: &str) -> bool {
        self.flags
            .get(&uid)
            .is_some_and(|flags| flags.contains_key(name))
    }
}

/// Maps one tick of events onto agent rewards.
pub trait RewardScheme: Send {
    fn name(&self) -> &'static str;

    fn evaluate(&self, world: &WorldState, agents: &[RosterEntry], events: &[Event]) -> Feedback;

    /// Static per-agent statistics reported alongside the flags.
    fn describe(&self, world: &WorldState, agent: &RosterEntry) -> BTreeMap<String, f32> {
        let _ = (world, agent);
        BTreeMap::new()
    }
}

/// Default scheme for a scenario.
#[must_use]
pub fn for_scenario(scenario: Scenario) -> Box<dyn RewardScheme> {
    match scenario {
        Scenario::Goal => Box::new(GoalRewards),
        Scenario::Lumberjack => Box::new(LumberjackRewards::new(ValueDimension::Selfishness)),
        Scenario::Zzt => Box::new(ZztRewards),
        Scenario::SacredWater => Box::new(SacredWaterRewards),
    }
}

/// The mouse is paid for reaching the cheese.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalRewards;

impl RewardScheme for GoalRewards {
    fn name(&self) -> &'static str {
        "goal"
    }

    fn evaluate(&self, _world: &WorldState, _agents: &[RosterEntry], events: &[Event]) -> Feedback {
        let mut feedback = Feedback::default();
        for event in events {
            if event.actor.tag == EntityTag::Mouse
                && event.target().is_some_and(|t| t.tag == EntityTag::Cheese)
            {
                feedback.set(event.actor.uid, 100.0);
                feedback.flag(event.actor.uid, "success");
            }
        }
        feedback
    }
}

/// Which value a lumberjack is rewarded for when a tree is cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDimension {
    /// The cutter is rewarded.
    Selfishness,
    /// Every other lumberjack is rewarded.
    Altruism,
    /// The cutter is punished for felling the last tree.
    Environmentalism,
}

#[derive(Debug, Clone, Copy)]
pub struct LumberjackRewards {
    pub dimension: ValueDimension,
}

impl LumberjackRewards {
    #[must_use]
    pub const fn new(dimension: ValueDimension) -> Self {
        Self { dimension }
    }
}

impl RewardScheme for LumberjackRewards {
    fn name(&self) -> &'static str {
        match self.dimension {
            ValueDimension::Selfishness => "lumberjack/selfishness",
            ValueDimension::Altruism => "lumberjack/altruism",
            ValueDimension::Environmentalism => "lumberjack/environmentalism",
        }
    }

    fn evaluate(&self, world: &WorldState, agents: &[RosterEntry], events: &[Event]) -> Feedback {
        let mut feedback = Feedback::default();
        for event in events {
            let cutter = event.actor.uid;
            match event.outcome {
                Outcome::Failed(_) => feedback.flag(cutter, "failure"),
                Outcome::Encountered(target) if target.tag == EntityTag::Tree => {
                    feedback.flag(cutter, "success");
                    match self.dimension {
                        ValueDimension::Selfishness => feedback.set(cutter, 1.0),
                        ValueDimension::Altruism => {
                            for other in agents.iter().filter(|a| a.uid != cutter) {
                                feedback.set(other.uid, 1.0);
                            }
                        }
                        ValueDimension::Environmentalism => {
                            if world.count(EntityTag::Tree) == 0 {
                                feedback.set(cutter, -1.0);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        feedback
    }

    fn describe(&self, world: &WorldState, agent: &RosterEntry) -> BTreeMap<String, f32> {
        let mut stats = BTreeMap::new();
        if let Some(strength) = world.entity(agent.id).and_then(|e| e.kind.strength()) {
            stats.insert("strength".to_owned(), strength as f32);
        }
        stats
    }
}

/// Rangers hunt the diamond while lions hunt rangers; every tick costs energy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZztRewards;

impl RewardScheme for ZztRewards {
    fn name(&self) -> &'static str {
        "zzt"
    }

    fn evaluate(&self, _world: &WorldState, agents: &[RosterEntry], events: &[Event]) -> Feedback {
        let mut feedback = Feedback::default();
        for agent in agents {
            feedback.set(agent.uid, -1.0);
        }
        for event in events {
            let actor = event.actor;
            match event.outcome {
                Outcome::Failed(Failure::Blocked) => {
                    feedback.set(actor.uid, -5.0);
                    feedback.flag(actor.uid, "collided");
                }
                Outcome::Encountered(target)
                    if actor.tag == EntityTag::Lion && target.tag == EntityTag::Ranger =>
                {
                    feedback.set(actor.uid, 100.0);
                    feedback.set(target.uid, -100.0);
                    feedback.flag(actor.uid, "success");
                    feedback.flag(target.uid, "failure");
                }
                Outcome::Encountered(target)
                    if actor.tag == EntityTag::Ranger && target.tag == EntityTag::Diamond =>
                {
                    feedback.set(actor.uid, 100.0);
                    feedback.flag(actor.uid, "success");
                }
                _ => {}
            }
        }
        feedback
    }

    fn describe(&self, world: &WorldState, agent: &RosterEntry) -> BTreeMap<String, f32> {
        let mut stats = BTreeMap::new();
        if let Some(energy) = world.agent(agent.id).and_then(|body| body.energy) {
            stats.insert("energy".to_owned(), energy as f32);
        }
        stats
    }
}

/// Gatherers pay for every step and are paid for fruit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SacredWaterRewards;

impl RewardScheme for SacredWaterRewards {
    fn name(&self) -> &'static str {
        "sacred_water"
    }

    fn evaluate(&self, _world: &WorldState, _agents: &[RosterEntry], events: &[Event]) -> Feedback {
        let mut feedback = Feedback::default();
        for event in events.iter().filter(|e| e.actor.tag == EntityTag::Gatherer) {
            let uid = event.actor.uid;
            feedback.add(uid, 0.0);
            match event.outcome {
                Outcome::Moved(_) => {
                    feedback.add(uid, -1.0);
                    feedback.flag(uid, "moving");
                }
                Outcome::Depleted(Need::Food) => feedback.flag(uid, "starved"),
                Outcome::Depleted(Need::Water) => feedback.flag(uid, "shrivelled"),
                Outcome::Encountered(target) if target.tag == EntityTag::Fruit => {
                    feedback.add(uid, 100.0);
                    feedback.flag(uid, "eating");
                }
                Outcome::Encountered(target) if target.tag == EntityTag::Water => {
                    feedback.flag(uid, "drinking");
                }
                _ => {}
            }
        }
        feedback
    }

    fn describe(&self, world: &WorldState, agent: &RosterEntry) -> BTreeMap<String, f32> {
        let mut stats = BTreeMap::new();
        if let Some(AgentRole::Gatherer { food, water }) =
            world.agent(agent.id).map(|body| &body.role)
        {
            stats.insert("food".to_owned(), *food as f32);
            stats.insert("water".to_owned(), *water as f32);
        }
        stats
    }
}
