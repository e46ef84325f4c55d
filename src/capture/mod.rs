//! Post-processing of captured images: timestamp overlay, format
//! conversion and the `last_image` convenience copy.

mod files;
mod overlay;

pub use files::{convert_to_tiff, copy_file, update_last_image};
pub use overlay::{annotate_timestamp, OverlayStyle};
