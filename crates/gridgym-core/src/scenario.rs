use crate::{
    config::WorldConfig,
    entity::{EntityKind, EntityTag},
    world::WorldError,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const GOAL_MAP: &str = "
|--------------------|
|                    |
|                    |
|                ☺   |
|                    |
|                    |
|                    |
|                    |
|                    |
|              ♠     |
|                    |
|--------------------|
";

const LUMBERJACK_MAP: &str = "
|-----|
|2  2 |
|1   2|
|  ☺  |
|1 ☻  |
| 1   |
|-----|
";

const ZZT_MAP: &str = "
|--------------------|
|                    |
|  ██████            |
|  █             ☺   |
|  █                 |
|  ██████            |
|  ░░░░░█    ████████|
|  ░░░░░█         Ω  |
|  ██████            |
|              ♦     |
|                    |
|--------------------|
";

const SACRED_WATER_MAP: &str = "
|--------------------|
|        σ           |
|                    |
| ░░░             ☺  |
|  ░░░               |
|          σ     σ   |
| σ                  |
|                 σ  |
|                    |
|     σσ░░░░         |
|    σ░░░░░░░░       |
|--------------------|
";

/// What an environment hands to its learners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationMode {
    /// The world-wide per-type position vector.
    Positions,
    /// Each agent's local percept vector.
    Percepts,
}

/// Built-in scenario families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Goal,
    Lumberjack,
    Zzt,
    SacredWater,
}

impl Scenario {
    pub const ALL: [Self; 4] = [Self::Goal, Self::Lumberjack, Self::Zzt, Self::SacredWater];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Lumberjack => "lumberjack",
            Self::Zzt => "zzt",
            Self::SacredWater => "sacred_water",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Goal => "the mouse and the cheese",
            Self::Lumberjack => "lumberjacks in the woods",
            Self::Zzt => "rangers, lions and a diamond",
            Self::SacredWater => "gatherers around the sacred water",
        }
    }

    #[must_use]
    pub const fn default_map(self) -> &'static str {
        match self {
            Self::Goal => GOAL_MAP,
            Self::Lumberjack => LUMBERJACK_MAP,
            Self::Zzt => ZZT_MAP,
            Self::SacredWater => SACRED_WATER_MAP,
        }
    }

    #[must_use]
    pub const fn observation_mode(self) -> ObservationMode {
        match self {
            Self::Goal | Self::SacredWater => ObservationMode::Positions,
            Self::Lumberjack | Self::Zzt => ObservationMode::Percepts,
        }
    }

    /// Symbols accepted by this scenario's map loader.
    #[must_use]
    pub const fn symbols(self) -> &'static [char] {
        match self {
            Self::Goal => &['☺', '♠'],
            Self::Lumberjack => &['☻', '☺', '1', '2'],
            Self::Zzt => &['☻', '☺', 'Ω', '█', '░', '▒', '▓', '♦'],
            Self::SacredWater => &['☺', 'σ', '░', '▒', '▓'],
        }
    }

    /// Agent kinds that appear in this scenario.
    #[must_use]
    pub const fn agent_tags(self) -> &'static [EntityTag] {
        match self {
            Self::Goal => &[EntityTag::Mouse],
            Self::Lumberjack => &[EntityTag::Lumberjack],
            Self::Zzt => &[EntityTag::Ranger, EntityTag::Lion],
            Self::SacredWater => &[EntityTag::Gatherer],
        }
    }

    /// Resolves a map symbol to the entity it constructs.
    #[must_use]
    pub fn entity_for(self, symbol: char, config: &WorldConfig) -> Option<EntityKind> {
        let kind = match (self, symbol) {
            (Self::Goal, '☺') => EntityKind::mouse(),
            (Self::Goal, '♠') => EntityKind::Cheese,

            (Self::Lumberjack, '☻') => EntityKind::lumberjack(2),
            (Self::Lumberjack, '☺') => EntityKind::lumberjack(1),
            (Self::Lumberjack, '1') => EntityKind::Tree { strength: 1 },
            (Self::Lumberjack, '2') => EntityKind::Tree { strength: 2 },

            (Self::Zzt, '☻' | '☺') => EntityKind::ranger(config),
            (Self::Zzt, 'Ω') => EntityKind::lion(config),
            (Self::Zzt, '█') => EntityKind::Wall,
            (Self::Zzt, '░') => EntityKind::Grass { amount: 25 },
            (Self::Zzt, '▒') => EntityKind::Grass { amount: 15 },
            (Self::Zzt, '▓') => EntityKind::Grass { amount: 5 },
            (Self::Zzt, '♦') => EntityKind::Diamond,

            (Self::SacredWater, '☺') => EntityKind::gatherer(config),
            (Self::SacredWater, 'σ') => EntityKind::Fruit,
            (Self::SacredWater, '░') => EntityKind::Water { poison: 0.0 },
            (Self::SacredWater, '▒') => EntityKind::Water { poison: 10.0 },
            (Self::SacredWater, '▓') => EntityKind::Water { poison: 20.0 },
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == normalized)
            .ok_or_else(|| WorldError::UnknownScenario(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_symbol_resolves() {
        let config = WorldConfig::default();
        for scenario in Scenario::ALL {
            for symbol in scenario.symbols() {
                assert!(
                    scenario.entity_for(*symbol, &config).is_some(),
                    "{scenario} should accept '{symbol}'"
                );
            }
            assert!(scenario.entity_for('x', &config).is_none());
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("sacred-water".parse::<Scenario>().ok(), Some(Scenario::SacredWater));
        assert_eq!("ZZT".parse::<Scenario>().ok(), Some(Scenario::Zzt));
        assert!(matches!(
            "chess".parse::<Scenario>(),
            Err(WorldError::UnknownScenario(_))
        ));
    }

    #[test]
    fn grass_symbols_map_to_amounts() {
        let config = WorldConfig::default();
        for symbol in ['░', '▒', '▓'] {
            let kind = Scenario::Zzt.entity_for(symbol, &config).expect("grass");
            assert_eq!(kind.symbol(), symbol);
        }
    }
}
