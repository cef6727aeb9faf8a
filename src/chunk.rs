//! Quantized audio chunk handed to the audio hook.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::TargetId;

/// One accepted block of speech-gated, 16-bit audio.
///
/// Serializes to the audio hook payload:
/// `{sampleRate, channels, frames, buffer, ts, compressed, bitDepth}`.
///
/// Samples are `Arc`-wrapped so a chunk can be cloned into several consumers
/// without copying.
///
/// # Example
///
/// ```
/// use page_capture::{AudioChunk, TargetId};
/// use std::time::Duration;
///
/// let chunk = AudioChunk::new(TargetId::new("v"), vec![0i16; 2400], 24000, 1, 0.0);
/// assert_eq!(chunk.duration(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
    /// Session that produced the chunk. Not part of the hook payload.
    #[serde(skip)]
    pub target: TargetId,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of interleaved channels in `buffer`.
    pub channels: u16,

    /// Frames in the chunk (samples per channel).
    pub frames: usize,

    /// Quantized PCM samples.
    pub buffer: Arc<Vec<i16>>,

    /// Capture time in seconds since the controller's time origin.
    pub ts: f64,

    /// Always `true`: samples are quantized from float to integer.
    pub compressed: bool,

    /// Bits per sample in `buffer`.
    pub bit_depth: u16,
}

impl AudioChunk {
    /// Creates a 16-bit chunk; `frames` is derived from the sample count.
    pub fn new(target: TargetId, samples: Vec<i16>, sample_rate: u32, channels: u16, ts: f64) -> Self {
        let frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        Self {
            target,
            sample_rate,
            channels,
            frames,
            buffer: Arc::new(samples),
            ts,
            compressed: true,
            bit_depth: 16,
        }
    }

    /// Returns the playback duration of this chunk.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.sample_rate))
    }

    /// Returns `true` if this chunk contains no samples.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the samples as little-endian bytes, the layout of an
    /// `Int16Array` buffer.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        crate::format::to_le_bytes(&self.buffer)
    }
}
