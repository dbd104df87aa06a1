//! Spatial indexing for discrete grid worlds: cell occupancy and Moore neighbourhoods.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// Errors emitted by grid index operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., zero width).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The requested cell does not exist under the grid topology.
    #[error("position {0} lies outside the grid")]
    OutOfBounds(Position),
    /// The occupant already sits in a cell; it must be moved, not placed again.
    #[error("occupant is already placed at {0}")]
    AlreadyPlaced(Position),
    /// The occupant has no cell.
    #[error("occupant is not placed on the grid")]
    NotPlaced,
    /// Translating a coordinate left the `i32` range.
    #[error("offset ({dx}, {dy}) from {from} overflows the coordinate range")]
    CoordinateOverflow { from: Position, dx: i32, dy: i32 },
    /// A neighbourhood radius wider than the grid itself.
    #[error("radius {0} exceeds the grid extent")]
    RadiusTooLarge(u32),
}

/// Integer cell coordinate. `x` is the column, `y` the row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by a delta without any wrapping or bounds handling.
    pub const fn offset(self, dx: i32, dy: i32) -> Result<Self, IndexError> {
        match (self.x.checked_add(dx), self.y.checked_add(dy)) {
            (Some(x), Some(y)) => Ok(Self { x, y }),
            _ => Err(IndexError::CoordinateOverflow { from: self, dx, dy }),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Edge behaviour of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Coordinates wrap modulo width/height.
    #[default]
    Toroidal,
    /// Coordinates outside `[0, width) x [0, height)` do not exist.
    Bounded,
}

/// Common behaviour exposed by neighbourhood indices.
pub trait NeighborhoodIndex {
    /// Map an arbitrary coordinate onto an existing cell, if the topology allows it.
    fn normalize(&self, position: Position) -> Option<Position>;

    /// Cells within Chebyshev distance `radius` of `center`, visited with `dx` in the
    /// outer loop and `dy` in the inner loop, each ranging `-radius..=radius`.
    /// Duplicate cells produced by wrapping on small grids are reported once.
    fn neighborhood(
        &self,
        center: Position,
        radius: u32,
        include_center: bool,
    ) -> Result<Vec<Position>, IndexError>;
}

/// Occupants of a single cell in insertion order.
pub type CellOccupants<K> = SmallVec<[K; 4]>;

/// Multi-occupancy grid: cell -> ordered occupants, occupant -> cell.
#[derive(Debug, Clone)]
pub struct OccupancyGrid<K> {
    width: u32,
    height: u32,
    topology: Topology,
    cells: Vec<CellOccupants<K>>,
    locations: HashMap<K, Position>,
}

impl<K> OccupancyGrid<K>
where
    K: Copy + Eq + Hash,
{
    /// Create an empty grid of `width * height` cells.
    pub fn new(width: u32, height: u32, topology: Topology) -> Result<Self, IndexError> {
        if width == 0 || height == 0 {
            return Err(IndexError::InvalidConfig("grid dimensions must be non-zero"));
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(IndexError::InvalidConfig("grid dimensions exceed coordinate range"));
        }
        let len = (width as usize) * (height as usize);
        Ok(Self {
            width,
            height,
            topology,
            cells: vec![CellOccupants::new(); len],
            locations: HashMap::new(),
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Signed reach of a window radius. Radii wider than the grid's larger
    /// side are rejected since they only revisit cells.
    pub fn reach(&self, radius: u32) -> Result<i32, IndexError> {
        if radius > self.width.max(self.height) {
            return Err(IndexError::RadiusTooLarge(radius));
        }
        i32::try_from(radius).map_err(|_| IndexError::RadiusTooLarge(radius))
    }

    #[must_use]
    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Number of addressable cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of placed occupants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether `position` is an in-range coordinate (no wrapping applied).
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.height
    }

    /// Row-major flat index of an in-range cell.
    #[must_use]
    pub fn cell_index(&self, position: Position) -> Option<usize> {
        self.contains(position).then(|| self.offset(position))
    }

    #[inline]
    fn offset(&self, position: Position) -> usize {
        (position.y as usize) * (self.width as usize) + (position.x as usize)
    }

    /// Insert an occupant into a cell. Fails if it is already placed anywhere.
    pub fn place(&mut self, key: K, position: Position) -> Result<Position, IndexError> {
        if let Some(existing) = self.locations.get(&key) {
            return Err(IndexError::AlreadyPlaced(*existing));
        }
        let target = self
            .normalize(position)
            .ok_or(IndexError::OutOfBounds(position))?;
        let idx = self.offset(target);
        self.cells[idx].push(key);
        self.locations.insert(key, target);
        Ok(target)
    }

    /// Move an occupant to another cell. No legality checks beyond topology.
    pub fn relocate(&mut self, key: K, position: Position) -> Result<Position, IndexError> {
        let current = *self.locations.get(&key).ok_or(IndexError::NotPlaced)?;
        let target = self
            .normalize(position)
            .ok_or(IndexError::OutOfBounds(position))?;
        if current == target {
            return Ok(target);
        }
        let from = self.offset(current);
        self.cells[from].retain(|occupant| *occupant != key);
        let to = self.offset(target);
        self.cells[to].push(key);
        self.locations.insert(key, target);
        Ok(target)
    }

    /// Delete an occupant from its cell, returning where it was.
    pub fn remove(&mut self, key: K) -> Result<Position, IndexError> {
        let position = self.locations.remove(&key).ok_or(IndexError::NotPlaced)?;
        let idx = self.offset(position);
        self.cells[idx].retain(|occupant| *occupant != key);
        Ok(position)
    }

    #[must_use]
    pub fn position_of(&self, key: K) -> Option<Position> {
        self.locations.get(&key).copied()
    }

    /// Exact lookup of a cell's occupants; no wraparound is applied.
    #[must_use]
    pub fn occupants(&self, position: Position) -> &[K] {
        match self.cell_index(position) {
            Some(idx) => &self.cells[idx],
            None => &[],
        }
    }

    /// Iterate all cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (Position, &[K])> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().map(move |(idx, occupants)| {
            let position = Position::new((idx % width) as i32, (idx / width) as i32);
            (position, occupants.as_slice())
        })
    }
}

impl<K> NeighborhoodIndex for OccupancyGrid<K>
where
    K: Copy + Eq + Hash,
{
    fn normalize(&self, position: Position) -> Option<Position> {
        match self.topology {
            Topology::Toroidal => Some(Position::new(
                position.x.rem_euclid(self.width as i32),
                position.y.rem_euclid(self.height as i32),
            )),
            Topology::Bounded => self.contains(position).then_some(position),
        }
    }

    fn neighborhood(
        &self,
        center: Position,
        radius: u32,
        include_center: bool,
    ) -> Result<Vec<Position>, IndexError> {
        let reach = self.reach(radius)?;
        let mut cells = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                if dx == 0 && dy == 0 && !include_center {
                    continue;
                }
                if let Some(cell) = self.normalize(center.offset(dx, dy)?)
                    && !cells.contains(&cell)
                {
                    cells.push(cell);
                }
            }
        }
        Ok(cells)
    }
}
