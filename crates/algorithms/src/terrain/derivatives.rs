//! 3x3 finite-difference derivatives with clamp-to-boundary windows.
//!
//! ```text
//! z1 z2 z3
//! z4 z5 z6
//! z7 z8 z9
//! ```
//!
//! At the grid edge the window is shifted inward so it lies fully inside
//! the grid, instead of padding with no-data. Derivatives are then taken
//! over the shifted window, which keeps planes exact everywhere. Along an
//! axis of length 2 only the first difference exists; along an axis of
//! length 1 both derivatives are zero.

use ndarray::Array2;
use crate::maybe_rayon::*;
use bare_earth_core::raster::Raster;
use bare_earth_core::Result;

/// Partial derivatives at one cell (Zevenbergen & Thorne 1987 notation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivatives {
    /// dz/dx, positive towards east
    pub p: f64,
    /// dz/dy, positive towards north
    pub q: f64,
    /// d²z/dx²
    pub r: f64,
    /// d²z/dxdy
    pub s: f64,
    /// d²z/dy²
    pub t: f64,
    /// Horn (1981) weighted dz/dx
    pub horn_x: f64,
    /// Horn (1981) weighted dz/dy
    pub horn_y: f64,
}

/// Grid indices of a 3-cell span along one axis and its width in cells
#[inline]
fn axis_span(i: usize, n: usize) -> ([usize; 3], usize) {
    match n {
        0 | 1 => ([0, 0, 0], 0),
        2 => ([0, 0, 1], 1),
        _ => {
            let lo = i.saturating_sub(1).min(n - 3);
            ([lo, lo + 1, lo + 2], 2)
        }
    }
}

/// Derivatives at (row, col), or `None` if the window touches no-data
pub fn derivatives_at(data: &Array2<f64>, row: usize, col: usize, dx: f64, dy: f64) -> Option<Derivatives> {
    let (rows, cols) = data.dim();
    let (ri, span_r) = axis_span(row, rows);
    let (ci, span_c) = axis_span(col, cols);

    let mut w = [[0.0_f64; 3]; 3];
    for (a, &r) in ri.iter().enumerate() {
        for (b, &c) in ci.iter().enumerate() {
            let z = data[(r, c)];
            if z.is_nan() {
                return None;
            }
            w[a][b] = z;
        }
    }

    let [[z1, z2, z3], [z4, z5, z6], [z7, z8, z9]] = w;
    let wx = span_c as f64 * dx;
    let wy = span_r as f64 * dy;

    let (p, horn_x) = if span_c == 0 {
        (0.0, 0.0)
    } else {
        ((z6 - z4) / wx, ((z3 + 2.0 * z6 + z9) - (z1 + 2.0 * z4 + z7)) / (4.0 * wx))
    };
    // Row index grows southwards
    let (q, horn_y) = if span_r == 0 {
        (0.0, 0.0)
    } else {
        ((z2 - z8) / wy, ((z1 + 2.0 * z2 + z3) - (z7 + 2.0 * z8 + z9)) / (4.0 * wy))
    };

    let r = if span_c == 2 { (z4 - 2.0 * z5 + z6) / (dx * dx) } else { 0.0 };
    let t = if span_r == 2 { (z2 - 2.0 * z5 + z8) / (dy * dy) } else { 0.0 };
    let s = if span_c == 0 || span_r == 0 {
        0.0
    } else {
        (z3 - z1 - z9 + z7) / (wx * wy)
    };

    Some(Derivatives { p, q, r, s, t, horn_x, horn_y })
}

/// Apply `f` to the derivatives of every valid cell, row-parallel.
///
/// Cells that are no-data, or whose window touches no-data, are NaN.
pub(crate) fn map_derivatives<F>(dem: &Raster<f64>, z_factor: f64, f: F) -> Result<Raster<f64>>
where
    F: Fn(&Derivatives) -> f64 + Sync + Send,
{
    let (rows, cols) = dem.shape();
    let gt = dem.transform();
    let dx = gt.pixel_width.abs() * z_factor;
    let dy = gt.pixel_height.abs() * z_factor;
    let data = dem.data();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                if let Some(d) = derivatives_at(data, row, col, dx, dy) {
                    *out = f(&d);
                }
            }
            row_data
        })
        .collect();

    dem.derive(output_data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(rows: usize, cols: usize, a: f64, b: f64) -> Array2<f64> {
        // z = a * col + b * row
        Array2::from_shape_fn((rows, cols), |(r, c)| a * c as f64 + b * r as f64)
    }

    #[test]
    fn test_plane_exact_at_corners_and_interior() {
        let data = plane(6, 7, 2.0, 3.0);
        for &(r, c) in &[(0, 0), (0, 6), (5, 0), (5, 6), (3, 3)] {
            let d = derivatives_at(&data, r, c, 1.0, 1.0).unwrap();
            assert!((d.p - 2.0).abs() < 1e-12, "p at ({}, {}) = {}", r, c, d.p);
            // z grows southwards so dz/dy (north positive) is negative
            assert!((d.q + 3.0).abs() < 1e-12, "q at ({}, {}) = {}", r, c, d.q);
            assert!((d.horn_x - 2.0).abs() < 1e-12);
            assert!(d.r.abs() < 1e-12 && d.s.abs() < 1e-12 && d.t.abs() < 1e-12);
        }
    }

    #[test]
    fn test_narrow_grids() {
        let data = plane(2, 5, 1.0, 4.0);
        let d = derivatives_at(&data, 1, 0, 1.0, 1.0).unwrap();
        assert!((d.q + 4.0).abs() < 1e-12);
        assert_eq!(d.t, 0.0);

        let single = plane(1, 5, 1.0, 0.0);
        let d = derivatives_at(&single, 0, 2, 1.0, 1.0).unwrap();
        assert_eq!(d.q, 0.0);
        assert!((d.p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_nodata_in_window() {
        let mut data = plane(5, 5, 1.0, 1.0);
        data[(0, 0)] = f64::NAN;
        assert!(derivatives_at(&data, 1, 1, 1.0, 1.0).is_none());
        // Corner window is shifted inward and still touches (0, 0)
        assert!(derivatives_at(&data, 0, 1, 1.0, 1.0).is_none());
        assert!(derivatives_at(&data, 3, 3, 1.0, 1.0).is_some());
    }
}
