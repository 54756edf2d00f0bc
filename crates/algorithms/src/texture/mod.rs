//! Texture and structure operators
//!
//! - **Sobel**: gradient magnitude for edge detection
//! - **GLCM**: gray-level co-occurrence entropy over a whole tile

mod edge;
mod glcm;

pub use edge::{edge_mask, sobel_edge};
pub use glcm::{glcm_entropy, GlcmParams};
