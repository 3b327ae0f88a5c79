//! Texture analysis for vegetation discrimination
//!
//! Local variance and entropy over a sliding odd window.

mod local;

pub use local::{local_texture, TextureGrids, TextureParams, TextureSource, ENTROPY_BINS};
