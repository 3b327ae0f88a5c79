//! Mask buffering by binary disk dilation
//!
//! A cell becomes masked when a targeted cell lies within `radius` cells of
//! it (Euclidean distance between cell centres). The radius is the buffer
//! distance converted to cells and rounded up. No-data cells stay no-data
//! and never act as targets.

use crate::maybe_rayon::*;
use bare_earth_core::raster::{Neighborhood, Raster};
use bare_earth_core::{Algorithm, Error, Result};

use crate::classification::CLASS_NODATA;

/// Mask code of a cell that is removed from the surface
pub const MASKED: u8 = 1;
/// Mask code of a cell that is kept
pub const KEEP: u8 = 0;

/// Slack absorbing rounding in distance / cell size
const RADIUS_EPSILON: f64 = 1e-9;

/// Parameters for mask buffering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferParams {
    /// Buffer distance in map units (metres)
    pub distance: f64,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self { distance: 1.0 }
    }
}

/// Buffered mask and its bookkeeping
#[derive(Debug, Clone)]
pub struct BufferedMask {
    /// [`MASKED`] / [`KEEP`], [`CLASS_NODATA`] on no-data
    pub mask: Raster<u8>,
    /// Dilation radius actually used, in cells
    pub radius_cells: usize,
    pub masked_count: usize,
}

/// Convert a buffer distance to a cell radius, `ceil(distance / cell_size)`
pub fn radius_in_cells(distance: f64, cell_size: f64) -> Result<usize> {
    if !(distance.is_finite() && distance >= 0.0) {
        return Err(Error::invalid("buffer_distance", distance, "must be a non-negative number"));
    }
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(Error::invalid("cell_size", cell_size, "must be positive"));
    }
    if distance == 0.0 {
        return Ok(0);
    }
    Ok(((distance / cell_size) - RADIUS_EPSILON).ceil().max(1.0) as usize)
}

/// Dilate the targeted cells of a 0/1/255 grid by `distance` map units.
///
/// A zero distance returns the targets unchanged.
pub fn buffer_mask(targets: &Raster<u8>, distance: f64) -> Result<BufferedMask> {
    let radius = radius_in_cells(distance, targets.cell_size())?;
    let (rows, cols) = targets.shape();
    let data = targets.data();

    if radius == 0 {
        let masked_count = data.iter().filter(|&&v| v == MASKED).count();
        return Ok(BufferedMask {
            mask: targets.clone(),
            radius_cells: 0,
            masked_count,
        });
    }

    let offsets = Neighborhood::Disk(radius).offsets();

    let output: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![KEEP; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = data[(row, col)];
                if v == CLASS_NODATA || v == MASKED {
                    *out = v;
                    continue;
                }
                let hit = offsets.iter().any(|&(dr, dc)| {
                    Neighborhood::shift(row, col, dr, dc, rows, cols)
                        .is_some_and(|idx| data[idx] == MASKED)
                });
                if hit {
                    *out = MASKED;
                }
            }
            row_data
        })
        .collect();

    let masked_count = output.iter().filter(|&&v| v == MASKED).count();
    Ok(BufferedMask {
        mask: targets.derive(output, Some(CLASS_NODATA))?,
        radius_cells: radius,
        masked_count,
    })
}

/// Mask buffer algorithm
#[derive(Debug, Clone, Default)]
pub struct MaskBuffer;

impl Algorithm for MaskBuffer {
    type Input = Raster<u8>;
    type Output = BufferedMask;
    type Params = BufferParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "MaskBuffer"
    }

    fn description(&self) -> &'static str {
        "Binary disk dilation of the targeted non-ground cells"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        buffer_mask(&input, params.distance)
    }
}
