//! Configuration types for capture sessions.

use std::time::Duration;

use crate::{CaptureError, ImageFormat};

/// Audio pipeline settings.
///
/// The defaults are tuned for speech: 24kHz mono, 16-bit, with an energy gate
/// that holds open for a few blocks after speech ends.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate requested from the audio context, in Hz.
    ///
    /// Default: 24000
    pub sample_rate: u32,

    /// Channel count of the audio context and of emitted chunks. The
    /// processor keeps only the first channel, so only mono (1) is accepted.
    ///
    /// Default: 1
    pub channels: u16,

    /// Bit depth of emitted samples. Only 16 is produced.
    ///
    /// Default: 16
    pub bit_depth: u16,

    /// Gate output on voice activity. When `false` every block is emitted.
    ///
    /// Default: `true`
    pub enable_vad: bool,

    /// Energy threshold for voice activity (sum of absolute sample values).
    ///
    /// Default: 0.001
    pub vad_threshold: f32,

    /// Number of leading samples per block inspected by the gate.
    ///
    /// Default: 100
    pub vad_window: usize,

    /// Consecutive silent blocks tolerated before the gate closes.
    ///
    /// Default: 10
    pub silence_blocks: u32,

    /// Capacity of the block channels between the tap, the processor and
    /// delivery. Blocks are dropped (and counted) when a channel is full.
    ///
    /// Default: 64
    pub block_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            bit_depth: 16,
            enable_vad: true,
            vad_threshold: 0.001,
            vad_window: 100,
            silence_blocks: 10,
            block_capacity: 64,
        }
    }
}

/// Video pipeline settings.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Target still frames per second.
    ///
    /// Default: 1.0
    pub fps: f64,

    /// Scale applied to the native frame size before encoding.
    ///
    /// Default: 0.2
    pub scale: f64,

    /// Lossy encoder quality in `[0, 1]`.
    ///
    /// Default: 0.8
    pub quality: f32,

    /// Output image format.
    ///
    /// Default: [`ImageFormat::Jpeg`]
    pub format: ImageFormat,

    /// Period of the refresh-synchronized tick driving the sampler.
    ///
    /// Default: 16.667ms (60Hz display)
    pub refresh_interval: Duration,
}

impl VideoConfig {
    /// Interval between accepted samples, derived from [`fps`](Self::fps).
    ///
    /// Saturates to [`Duration::MAX`] when `fps` is too small to express;
    /// [`CaptureConfig::validate`] rejects such rates.
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.fps).unwrap_or(Duration::MAX)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: 1.0,
            scale: 0.2,
            quality: 0.8,
            format: ImageFormat::Jpeg,
            refresh_interval: Duration::from_micros(16_667),
        }
    }
}

/// Combined configuration for a [`CaptureController`](crate::CaptureController).
///
/// # Example
///
/// ```
/// use page_capture::{CaptureConfig, VideoConfig};
///
/// let config = CaptureConfig {
///     video: VideoConfig { fps: 2.0, ..Default::default() },
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    /// Audio pipeline settings.
    pub audio: AudioConfig,
    /// Video pipeline settings.
    pub video: VideoConfig,
}

impl CaptureConfig {
    /// Checks every value is within its usable range.
    pub fn validate(&self) -> Result<(), CaptureError> {
        let audio = &self.audio;
        let video = &self.video;

        if audio.sample_rate == 0 {
            return Err(CaptureError::invalid_config("audio.sample_rate must be > 0"));
        }
        if audio.channels != 1 {
            return Err(CaptureError::invalid_config(format!(
                "audio.channels {} unsupported (only mono)",
                audio.channels
            )));
        }
        if audio.bit_depth != 16 {
            return Err(CaptureError::invalid_config(format!(
                "audio.bit_depth {} unsupported (only 16)",
                audio.bit_depth
            )));
        }
        if !(audio.vad_threshold.is_finite() && audio.vad_threshold >= 0.0) {
            return Err(CaptureError::invalid_config(
                "audio.vad_threshold must be a finite, non-negative number",
            ));
        }
        if audio.block_capacity == 0 {
            return Err(CaptureError::invalid_config("audio.block_capacity must be > 0"));
        }
        if !(video.fps.is_finite() && video.fps > 0.0) {
            return Err(CaptureError::invalid_config("video.fps must be > 0"));
        }
        if Duration::try_from_secs_f64(1.0 / video.fps).is_err() {
            return Err(CaptureError::invalid_config(format!(
                "video.fps {} is too small to schedule",
                video.fps
            )));
        }
        if !(video.scale > 0.0 && video.scale <= 1.0) {
            return Err(CaptureError::invalid_config("video.scale must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&video.quality) {
            return Err(CaptureError::invalid_config("video.quality must be in [0, 1]"));
        }
        if video.refresh_interval.is_zero() {
            return Err(CaptureError::invalid_config(
                "video.refresh_interval must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_config_defaults() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.bit_depth, 16);
        assert!(config.enable_vad);
        assert!((config.vad_threshold - 0.001).abs() < f32::EPSILON);
        assert_eq!(config.vad_window, 100);
        assert_eq!(config.silence_blocks, 10);
    }

    #[test]
    fn test_video_config_defaults() {
        let config = VideoConfig::default();
        assert_eq!(config.sample_interval(), Duration::from_secs(1));
        assert!((config.scale - 0.2).abs() < f64::EPSILON);
        assert!((config.quality - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_sample_interval_follows_fps() {
        let config = VideoConfig {
            fps: 4.0,
            ..Default::default()
        };
        assert_eq!(config.sample_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_fps() {
        let mut config = CaptureConfig::default();
        config.video.fps = 0.0;
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_unschedulable_fps() {
        let mut config = CaptureConfig::default();
        config.video.fps = 1e-20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too small"));
        assert_eq!(config.video.sample_interval(), Duration::MAX);
    }

    #[test]
    fn test_rejects_non_mono_channels() {
        let mut config = CaptureConfig::default();
        config.audio.channels = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("only mono"));

        config.audio.channels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_scale_out_of_range() {
        let mut config = CaptureConfig::default();
        config.video.scale = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_16_bit_depth() {
        let mut config = CaptureConfig::default();
        config.audio.bit_depth = 8;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("only 16"));
    }
}
