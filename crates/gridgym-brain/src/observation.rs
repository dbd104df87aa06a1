//! Reverse lookups over position observations.

use crate::EnvError;

/// Index of the first type block whose entry for `cell` is non-zero.
///
/// `flat` is a concatenation of equally sized per-type blocks, one value per
/// grid cell, as produced by [`gridgym_core::WorldState::flat_positions`].
pub fn marking_block(flat: &[f32], cell_count: usize, cell: usize) -> Result<usize, EnvError> {
    if cell_count == 0 {
        return Err(EnvError::InconsistentObservation("grid has no cells"));
    }
    if flat.len() % cell_count != 0 {
        return Err(EnvError::InconsistentObservation(
            "observation length is not a multiple of the cell count",
        ));
    }
    if cell >= cell_count {
        return Err(EnvError::InconsistentObservation("cell lies outside the grid"));
    }
    flat.chunks_exact(cell_count)
        .position(|block| block[cell] != 0.0)
        .ok_or(EnvError::InconsistentObservation("no type marks the cell"))
}
