//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up grids have zero rotation and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y, usually negative
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Geographic coordinates of a cell centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64 + 0.5;
        let row_f = row as f64 + 0.5;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Geographic coordinates of a cell's upper-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64;
        let row_f = row as f64;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Cell size in map units (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Check if this is a north-up image (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-10
            && self.col_rotation.abs() < 1e-10
            && self.pixel_height < 0.0
    }

    /// Whether two transforms describe the same grid placement
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        let a = self.to_gdal();
        let b = other.to_gdal();
        let tol = 1e-9 * self.cell_size().max(1.0);
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
    }

    /// Bounding box (min_x, min_y, max_x, max_y) for a grid of the given size
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
