//! Mask morphology
//!
//! - **buffer**: disk dilation of the cells selected for removal, so the
//!   transition edges around buildings and canopy are removed with them

mod buffer;

pub use buffer::{buffer_mask, radius_in_cells, BufferParams, BufferedMask, MaskBuffer, KEEP, MASKED};
