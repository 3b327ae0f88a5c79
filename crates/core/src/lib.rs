//! # Bare Earth Core
//!
//! Core types, traits and I/O shared by the bare-earth reconstruction stages.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid, NaN no-data for elevation grids
//! - `GeoTransform`: affine georeferencing
//! - `CRS`: coordinate reference system carried through every derived grid
//! - `Algorithm`: the uniform stage interface
//! - Native GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// A single processing stage.
///
/// Stages are pure: they read their input and return a new output without
/// touching the input grid.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling the stage
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Short stage name, used in logs and reports
    fn name(&self) -> &'static str;

    /// One-line description
    fn description(&self) -> &'static str;

    /// Run the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Run with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
