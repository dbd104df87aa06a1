//! Bordered text map format.
//!
//! ```text
//! |-----|
//! |2  2 |
//! |  ☺  |
//! |-----|
//! ```
//!
//! Interior characters map one-to-one to cells; a blank means an empty cell.

use crate::{config::WorldConfig, entity::EntityKind, scenario::Scenario};
use gridgym_index::Position;
use rand::{RngCore, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("map is empty")]
    Empty,
    #[error("unexpected dimensions of the map: {0}")]
    Dimensions(&'static str),
    #[error("malformed border on line {line}")]
    Border { line: usize },
    #[error("unknown symbol '{symbol}' at row {row}, column {column}")]
    UnknownSymbol {
        symbol: char,
        row: usize,
        column: usize,
    },
}

/// A symbol at a cell, before it is resolved against a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub symbol: char,
    pub position: Position,
}

/// Parsed map: dimensions plus non-blank symbols in load order.
///
/// Parsed maps list placements row-major. Random layouts group them by
/// symbol in the order the counts were given, so entity uids line up across
/// layouts drawn from the same counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayout {
    width: u32,
    height: u32,
    placements: Vec<Placement>,
}

/// Parses the bordered text format. A single leading newline is ignored.
pub fn parse_map(text: &str) -> Result<MapLayout, MapError> {
    let mut chars: Vec<char> = text.chars().collect();
    if chars.first() == Some(&'\n') {
        chars.remove(0);
    }
    if chars.is_empty() {
        return Err(MapError::Empty);
    }
    let first_break = chars
        .iter()
        .position(|c| *c == '\n')
        .ok_or(MapError::Dimensions("missing line break"))?;
    if first_break <= 2 {
        return Err(MapError::Dimensions("width is zero"));
    }
    let width = first_break - 2;
    let stride = width + 3;
    if chars.len() % stride != 0 {
        return Err(MapError::Dimensions(
            "length is not a multiple of the row stride",
        ));
    }
    let rows = chars.len() / stride;
    if rows <= 2 {
        return Err(MapError::Dimensions("height is zero"));
    }

    let mut placements = Vec::new();
    for (line, row) in chars.chunks(stride).enumerate() {
        if row[0] != '|' || row[width + 1] != '|' || row[width + 2] != '\n' {
            return Err(MapError::Border { line });
        }
        let interior = &row[1..=width];
        if line == 0 || line == rows - 1 {
            if interior.iter().any(|c| *c != '-') {
                return Err(MapError::Border { line });
            }
            continue;
        }
        for (column, symbol) in interior.iter().enumerate() {
            if *symbol != ' ' {
                placements.push(Placement {
                    symbol: *symbol,
                    position: Position::new(column as i32, (line - 1) as i32),
                });
            }
        }
    }

    let width = u32::try_from(width).map_err(|_| MapError::Dimensions("width overflows"))?;
    let height =
        u32::try_from(rows - 2).map_err(|_| MapError::Dimensions("height overflows"))?;
    Ok(MapLayout {
        width,
        height,
        placements,
    })
}

impl MapLayout {
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Scatters `counts` symbols over distinct random cells.
    pub fn random(
        width: u32,
        height: u32,
        counts: &[(char, usize)],
        rng: &mut dyn RngCore,
    ) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::Dimensions("width and height must be non-zero"));
        }
        let wanted: usize = counts.iter().map(|(_, count)| count).sum();
        let mut cells: Vec<Position> = (0..height as i32)
            .flat_map(|y| (0..width as i32).map(move |x| Position::new(x, y)))
            .collect();
        if wanted > cells.len() {
            return Err(MapError::Dimensions("not enough cells for the requested entities"));
        }
        cells.shuffle(rng);
        let mut free = cells.into_iter();
        let placements: Vec<Placement> = counts
            .iter()
            .flat_map(|(symbol, count)| std::iter::repeat_n(*symbol, *count))
            .zip(free.by_ref())
            .map(|(symbol, position)| Placement { symbol, position })
            .collect();
        Ok(Self {
            width,
            height,
            placements,
        })
    }

    /// How often each symbol occurs, in order of first appearance.
    #[must_use]
    pub fn symbol_counts(&self) -> Vec<(char, usize)> {
        let mut counts: Vec<(char, usize)> = Vec::new();
        for placement in &self.placements {
            match counts.iter_mut().find(|(symbol, _)| *symbol == placement.symbol) {
                Some((_, count)) => *count += 1,
                None => counts.push((placement.symbol, 1)),
            }
        }
        counts
    }

    /// Same symbols scattered over random cells of a grid of the same size.
    pub fn shuffled(&self, rng: &mut dyn RngCore) -> Result<Self, MapError> {
        Self::random(self.width, self.height, &self.symbol_counts(), rng)
    }

    /// Resolves every symbol against a scenario's table.
    ///
    /// Fails on the first unknown symbol, before anything is constructed.
    pub fn resolve(
        &self,
        scenario: Scenario,
        config: &WorldConfig,
    ) -> Result<Vec<(EntityKind, Position)>, MapError> {
        self.placements
            .iter()
            .map(|placement| {
                scenario
                    .entity_for(placement.symbol, config)
                    .map(|kind| (kind, placement.position))
                    .ok_or(MapError::UnknownSymbol {
                        symbol: placement.symbol,
                        row: placement.position.y as usize,
                        column: placement.position.x as usize,
                    })
            })
            .collect()
    }
}

impl fmt::Display for MapLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border = "-".repeat(self.width as usize);
        writeln!(f, "|{border}|")?;
        let mut rows = vec![vec![' '; self.width as usize]; self.height as usize];
        for placement in &self.placements {
            rows[placement.position.y as usize][placement.position.x as usize] = placement.symbol;
        }
        for row in rows {
            let line: String = row.into_iter().collect();
            writeln!(f, "|{line}|")?;
        }
        writeln!(f, "|{border}|")
    }
}
