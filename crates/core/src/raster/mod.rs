//! Raster data structures and neighbourhoods

mod element;
mod geotransform;
mod grid;
mod neighborhood;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use neighborhood::Neighborhood;
