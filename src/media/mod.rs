//! Media primitives consumed by the capture controller.
//!
//! The controller never talks to a browser directly. A [`MediaPlatform`]
//! hands it video elements, audio contexts and raster surfaces, each behind a
//! trait so the pipelines can run against a real page or against the
//! [`mock`] doubles.

pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::surface::RasterSurface;
use crate::{CaptureError, TargetId};

pub use mock::{MockAudioContext, MockPlatform, MockVideo};

/// How much media data an element has buffered (`HTMLMediaElement.readyState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadyState {
    /// No information about the media is available.
    #[default]
    HaveNothing = 0,
    /// Duration and dimensions are known.
    HaveMetadata = 1,
    /// Data for the current playback position is available.
    HaveCurrentData = 2,
    /// Data for the current position and at least the next frame.
    HaveFutureData = 3,
    /// Enough data to play through.
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Maps a raw `readyState` value; anything above 4 saturates.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::HaveNothing,
            1 => Self::HaveMetadata,
            2 => Self::HaveCurrentData,
            3 => Self::HaveFutureData,
            _ => Self::HaveEnoughData,
        }
    }

    /// Returns `true` once the current frame can be decoded and drawn.
    pub fn can_draw(self) -> bool {
        self >= Self::HaveCurrentData
    }
}

/// A decoded RGBA frame read from a video element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

impl RawFrame {
    /// Creates a frame filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgba: rgba.repeat(pixels),
        }
    }
}

/// A video element that can be captured.
pub trait MediaElement: Send + Sync {
    /// Stable identity used to key the capture session.
    fn id(&self) -> TargetId;

    /// Returns `true` while playback is paused.
    fn is_paused(&self) -> bool;

    /// Current buffering state.
    fn ready_state(&self) -> ReadyState;

    /// Native `(width, height)` of the video; `(0, 0)` before metadata loads.
    fn video_dimensions(&self) -> (u32, u32);

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    /// Makes the element audible and cross-origin readable (unmuted, full
    /// volume, anonymous CORS) so an audio graph can attach to it.
    fn prepare_for_capture(&self);

    /// Reads the frame at the current playback position, if one is decoded.
    fn read_frame(&self) -> Option<RawFrame>;
}

/// Lifecycle state of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextState {
    /// Created or suspended; no audio is rendered.
    Suspended,
    /// Rendering audio.
    Running,
    /// Released. A closed context cannot be resumed.
    Closed,
}

/// One render block delivered by the audio tap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBlock {
    /// Planar float samples, one `Vec` per input channel.
    pub channels: Vec<Vec<f32>>,
}

impl AudioBlock {
    /// Creates a single-channel block.
    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    /// The first channel, if the block has any input.
    pub fn first_channel(&self) -> Option<&[f32]> {
        self.channels.first().map(Vec::as_slice)
    }
}

/// The nodes wired between a media source and the context destination.
pub trait AudioGraph: Send + Sync {
    /// Disconnects every node of the graph. Safe to call more than once.
    fn disconnect(&mut self);
}

/// An installed audio tap: the graph handle plus the stream of raw blocks it
/// taps off the element's audio.
pub struct AudioTap {
    /// Render blocks as they are produced. Ends when the graph is torn down.
    pub blocks: mpsc::Receiver<AudioBlock>,
    /// Handle used to disconnect the graph on destroy.
    pub graph: Box<dyn AudioGraph>,
}

impl std::fmt::Debug for AudioTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTap").finish_non_exhaustive()
    }
}

/// An audio processing context (`AudioContext`).
#[async_trait]
pub trait AudioContext: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> ContextState;

    /// Starts rendering. Contexts may be created suspended by platform policy.
    async fn resume(&self) -> Result<(), CaptureError>;

    /// Pauses rendering, keeping the graph intact.
    async fn suspend(&self) -> Result<(), CaptureError>;

    /// Releases the context and its graph.
    async fn close(&self) -> Result<(), CaptureError>;

    /// Wires `element → tap → destination` so audio stays audible while
    /// blocks are copied into a channel of `capacity` entries.
    ///
    /// Returns [`CaptureError::CapabilityUnavailable`] when the platform has
    /// no off-thread processing support.
    async fn attach_tap(
        &self,
        element: Arc<dyn MediaElement>,
        capacity: usize,
    ) -> Result<AudioTap, CaptureError>;
}

/// Factory for everything a capture session needs from the page.
pub trait MediaPlatform: Send + Sync {
    /// The first video element in document order, if any.
    fn first_video(&self) -> Option<Arc<dyn MediaElement>>;

    /// Creates an audio context running at `sample_rate` with `channels`.
    fn create_audio_context(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Arc<dyn AudioContext>, CaptureError>;

    /// Creates an empty (0×0) offscreen raster surface.
    fn create_surface(&self) -> Box<dyn RasterSurface>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_from_raw() {
        assert_eq!(ReadyState::from_raw(0), ReadyState::HaveNothing);
        assert_eq!(ReadyState::from_raw(2), ReadyState::HaveCurrentData);
        assert_eq!(ReadyState::from_raw(9), ReadyState::HaveEnoughData);
    }

    #[test]
    fn test_ready_state_can_draw() {
        assert!(!ReadyState::HaveNothing.can_draw());
        assert!(!ReadyState::HaveMetadata.can_draw());
        assert!(ReadyState::HaveCurrentData.can_draw());
        assert!(ReadyState::HaveEnoughData.can_draw());
    }

    #[test]
    fn test_audio_block_first_channel() {
        assert_eq!(AudioBlock::default().first_channel(), None);
        let block = AudioBlock {
            channels: vec![vec![0.1], vec![0.2]],
        };
        assert_eq!(block.first_channel(), Some(&[0.1f32][..]));
    }

    #[test]
    fn test_raw_frame_solid() {
        let frame = RawFrame::solid(2, 3, [1, 2, 3, 4]);
        assert_eq!(frame.rgba.len(), 2 * 3 * 4);
        assert_eq!(&frame.rgba[4..8], &[1, 2, 3, 4]);
    }
}
