//! Reading and writing georeferenced grids

mod native;

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    write_mask_geotiff, write_mask_geotiff_to_buffer, GeoTiffOptions,
};
