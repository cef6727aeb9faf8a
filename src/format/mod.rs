//! Sample format conversion.
//!
//! Float samples in `[-1.0, 1.0]` coming out of the audio graph are reduced
//! to 16-bit signed integers before they leave the processing task.

mod quantize;

pub use quantize::{quantize_block, quantize_sample, to_le_bytes};
