//! Text views of a [`WorldState`].
//!
//! The grid is drawn in the same bordered format the map loader parses, so a
//! rendered world can be fed straight back into [`WorldState::from_map`].

use gridgym_core::{Position, Scenario, Tick, WorldState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lines of the console shown under the grid.
pub const DEFAULT_CONSOLE_LINES: usize = 5;

/// Glyph shown for one cell: an agent wins over passive occupants, then the
/// first occupant, otherwise blank.
#[must_use]
pub fn cell_symbol(world: &WorldState, position: Position) -> char {
    let occupants = world.occupants(position);
    occupants
        .iter()
        .find(|id| world.entity(**id).is_some_and(|entity| entity.is_agent()))
        .or_else(|| occupants.first())
        .and_then(|id| world.render_symbol(*id))
        .unwrap_or(' ')
}

/// Rows of the bordered grid, borders included, without line breaks.
#[must_use]
pub fn grid_rows(world: &WorldState) -> Vec<String> {
    let border = format!("|{}|", "-".repeat(world.width() as usize));
    let mut rows = Vec::with_capacity(world.height() as usize + 2);
    rows.push(border.clone());
    for y in 0..world.height() as i32 {
        let mut row = String::with_capacity(world.width() as usize + 2);
        row.push('|');
        for x in 0..world.width() as i32 {
            row.push(cell_symbol(world, Position::new(x, y)));
        }
        row.push('|');
        rows.push(row);
    }
    rows.push(border);
    rows
}

/// The bordered grid as map text, one line per row.
#[must_use]
pub fn render_grid(world: &WorldState) -> String {
    let mut out = String::new();
    for row in grid_rows(world) {
        out.push_str(&row);
        out.push('\n');
    }
    out
}

/// Everything a frontend needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub title: String,
    pub tick: Tick,
    pub terminated: bool,
    pub grid: Vec<String>,
    /// Most recent console lines, newest first.
    pub console: Vec<String>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        let ended = if self.terminated { " (ended)" } else { "" };
        writeln!(f, "tick {}{ended}", self.tick.0)?;
        writeln!(f)?;
        for row in &self.grid {
            writeln!(f, "{row}")?;
        }
        writeln!(f)?;
        writeln!(f, ">>> console <<<")?;
        for line in &self.console {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Plain text renderer with a header, the grid, and the tail of the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRenderer {
    pub title: String,
    pub console_lines: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            title: "gridgym -- minimal grid worlds for reinforcement learning".to_string(),
            console_lines: DEFAULT_CONSOLE_LINES,
        }
    }
}

impl TextRenderer {
    #[must_use]
    pub fn for_scenario(scenario: Scenario) -> Self {
        Self {
            title: format!("gridgym -- {}", scenario.title()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn frame(&self, world: &WorldState) -> Frame {
        Frame {
            title: self.title.clone(),
            tick: world.tick(),
            terminated: world.is_terminated(),
            grid: grid_rows(world),
            console: world
                .console()
                .rev()
                .take(self.console_lines)
                .map(str::to_owned)
                .collect(),
        }
    }

    #[must_use]
    pub fn render(&self, world: &WorldState) -> String {
        self.frame(world).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridgym_core::{EntityKind, WorldConfig};

    #[test]
    fn agents_are_drawn_over_passive_entities() {
        let mut world = WorldState::new(2, 1, WorldConfig::default()).expect("world");
        world
            .add_entity(EntityKind::Cheese, Position::new(0, 0))
            .expect("cheese");
        world
            .add_entity(EntityKind::mouse(), Position::new(0, 0))
            .expect("mouse");
        assert_eq!(cell_symbol(&world, Position::new(0, 0)), '☺');
        assert_eq!(cell_symbol(&world, Position::new(1, 0)), ' ');
        assert_eq!(render_grid(&world), "|--|\n|☺ |\n|--|\n");
    }

    #[test]
    fn frame_lists_newest_console_lines_first() {
        let map = "|--|\n|☺♠|\n|--|\n";
        let mut world = WorldState::from_map(
            map,
            Scenario::Goal,
            WorldConfig {
                rng_seed: Some(3),
                ..WorldConfig::default()
            },
        )
        .expect("world");
        for _ in 0..4 {
            world.step();
        }
        let renderer = TextRenderer {
            console_lines: 2,
            ..TextRenderer::for_scenario(Scenario::Goal)
        };
        let frame = renderer.frame(&world);
        assert_eq!(frame.console.len(), 2);
        let newest = world.console().last().map(str::to_owned);
        assert_eq!(frame.console.first().cloned(), newest);
        assert_eq!(frame.grid.len(), 3);

        let text = renderer.render(&world);
        assert!(text.starts_with("gridgym -- the mouse and the cheese\n"));
        assert!(text.contains(">>> console <<<"));
    }

    #[test]
    fn frame_text_lays_out_header_grid_and_console() {
        let frame = Frame {
            title: "demo".to_string(),
            tick: Tick(7),
            terminated: true,
            grid: vec!["|-|".to_string(), "|☺|".to_string(), "|-|".to_string()],
            console: vec![">>>>>>> newest".to_string()],
        };
        assert_eq!(
            frame.to_string(),
            "demo\ntick 7 (ended)\n\n|-|\n|☺|\n|-|\n\n>>> console <<<\n>>>>>>> newest\n"
        );
    }
}
