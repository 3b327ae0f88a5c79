//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order together with
/// the transform, CRS and no-data sentinel of the source surface. Every grid
/// derived from a DSM is built with [`Raster::derive`] so the georeferencing
/// is carried over unchanged.
///
/// ```ignore
/// use bare_earth_core::Raster;
///
/// let mut dsm: Raster<f64> = Raster::filled(100, 100, 50.0);
/// dsm.set(10, 20, 72.5)?;
/// let z = dsm.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a zeroed raster with the same georeferencing but a different cell type
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Build a derived grid of the same shape and georeferencing from row-major data
    pub fn derive<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        let mut output = self.with_same_meta::<U>(rows, cols);
        output.set_nodata(nodata);
        *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(output)
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// No-data sentinel
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size in map units (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Geographic coordinates of a cell centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Whether `other` has identical shape, transform and CRS
    pub fn same_grid<U: RasterElement>(&self, other: &Raster<U>) -> bool {
        self.shape() == other.shape()
            && self.transform.approx_eq(other.transform())
            && self.crs.as_ref() == other.crs()
    }

    /// Fail with [`Error::SizeMismatch`] unless `other` has the same shape
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let (er, ec) = self.shape();
        let (ar, ac) = other.shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }

    // Value checks

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Number of cells holding valid data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Min, max, mean and standard deviation of the valid cells
    pub fn statistics(&self) -> RasterStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            let Some(v) = value.to_f64() else { continue };
            if !v.is_finite() {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v;
            sum_sq += v * v;
            count += 1;
        }

        if count == 0 {
            return RasterStatistics {
                min: None,
                max: None,
                mean: None,
                std_dev: None,
                valid_count: 0,
                nodata_count: self.len(),
            };
        }

        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);

        RasterStatistics {
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            std_dev: Some(variance.sqrt()),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

impl Raster<f64> {
    /// Copy with the declared sentinel replaced by NaN.
    ///
    /// The declared sentinel is kept as metadata so writers can restore it.
    pub fn with_nan_nodata(&self) -> Raster<f64> {
        let nodata = self.nodata;
        let mut out = self.clone();
        if nodata.is_some_and(|nd| !nd.is_nan()) {
            out.data_mut().mapv_inplace(|v| if v.is_nodata(nodata) { f64::NAN } else { v });
        }
        out
    }
}

/// Summary statistics of a raster's valid cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
