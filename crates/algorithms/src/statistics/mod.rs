//! Statistics over metric grids

mod percentile;

pub use percentile::{metric_percentile, SortedSample};
