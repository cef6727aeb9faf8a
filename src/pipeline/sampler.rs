//! Periodic still-frame sampling.
//!
//! The sampler is driven by a refresh-rate interval (about 60 ticks per
//! second) and thinned down to the configured frame rate by a [`FrameGate`].
//! Each accepted tick draws the current frame onto the session's raster
//! surface at reduced size and emits it as a base64 image.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::media::MediaElement;
use crate::session::{SessionState, SharedSurface};
use crate::surface::data_url_payload;
use crate::{
    CaptureError, CaptureEvent, EventCallback, FrameEncoding, Hooks, TargetId, VideoConfig,
    VideoFrame,
};

/// Thins a stream of refresh ticks down to one sample per interval.
///
/// The first tick is always accepted. After that a tick is accepted once at
/// least `interval` has passed since the last accepted tick, and the gate
/// re-arms from the accepted tick's time rather than from an ideal schedule.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use page_capture::FrameGate;
///
/// let mut gate = FrameGate::new(Duration::from_secs(1));
/// assert!(gate.should_sample(Duration::ZERO));
/// assert!(!gate.should_sample(Duration::from_millis(999)));
/// assert!(gate.should_sample(Duration::from_millis(1000)));
/// ```
#[derive(Debug, Clone)]
pub struct FrameGate {
    interval: Duration,
    last: Option<Duration>,
}

impl FrameGate {
    /// Creates a gate that accepts at most one tick per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Minimum spacing between accepted ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Decides whether the tick at `now` (time since some fixed origin)
    /// should sample a frame.
    pub fn should_sample(&mut self, now: Duration) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forgets the last accepted tick.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Target size for a `width`×`height` source scaled by `scale`, floored.
pub(crate) fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let scale_dim = |dim: u32| (f64::from(dim) * scale).floor().max(0.0) as u32;
    (scale_dim(width), scale_dim(height))
}

/// The per-session frame sampling task.
pub(crate) struct FrameSampler {
    target: TargetId,
    element: Arc<dyn MediaElement>,
    surface: SharedSurface,
    state: Arc<SessionState>,
    hooks: Hooks,
    config: VideoConfig,
    gate: FrameGate,
    origin: Instant,
    events: Option<EventCallback>,
}

impl FrameSampler {
    pub fn new(
        target: TargetId,
        element: Arc<dyn MediaElement>,
        surface: SharedSurface,
        state: Arc<SessionState>,
        hooks: Hooks,
        config: VideoConfig,
        events: Option<EventCallback>,
    ) -> Self {
        let gate = FrameGate::new(config.sample_interval());
        Self {
            target,
            element,
            surface,
            state,
            hooks,
            config,
            gate,
            origin: Instant::now(),
            events,
        }
    }

    /// Runs until the session is unregistered or the task is aborted.
    pub async fn run(mut self) {
        let mut ticks = tokio::time::interval(self.config.refresh_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;

            if !self.state.is_registered() {
                break;
            }

            if !self.gate.should_sample(self.origin.elapsed()) {
                continue;
            }

            match self.capture() {
                Ok(Some(frame)) => {
                    if self.hooks.emit_frame(frame) {
                        self.state.frames_emitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Ok(None) => {}
                Err(e) => self.drop_frame(&e),
            }
        }

        tracing::debug!(target_id = %self.target, "frame sampler finished");
    }

    /// Draws and encodes the current frame.
    ///
    /// Returns `Ok(None)` when the element has nothing drawable right now.
    fn capture(&self) -> Result<Option<VideoFrame>, CaptureError> {
        if !self.element.ready_state().can_draw() || self.element.is_paused() {
            return Ok(None);
        }

        let (original_width, original_height) = self.element.video_dimensions();
        if original_width == 0 || original_height == 0 {
            return Ok(None);
        }

        let (width, height) = scaled_dimensions(original_width, original_height, self.config.scale);
        if width == 0 || height == 0 {
            tracing::trace!(target_id = %self.target, original_width, original_height, "scaled frame has no area");
            return Ok(None);
        }

        let Some(raw) = self.element.read_frame() else {
            return Ok(None);
        };

        let url = {
            let mut surface = self.surface.lock();
            surface.resize(width, height);
            surface.draw(&raw)?;
            surface.to_data_url(self.config.format, self.config.quality)?
        };

        let data = data_url_payload(&url)
            .ok_or_else(|| CaptureError::encode_failed(format!("malformed data url: {url:.32}")))?;

        Ok(Some(VideoFrame {
            target: self.target.clone(),
            width,
            height,
            data: data.to_string(),
            ts: self.element.current_time(),
            format: self.config.format,
            encoding: FrameEncoding::Base64,
            original_width,
            original_height,
        }))
    }

    fn drop_frame(&self, error: &CaptureError) {
        self.state.frames_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(target_id = %self.target, error = %error, "frame dropped");

        if let Some(ref callback) = self.events {
            callback(CaptureEvent::FrameDropped {
                target: self.target.clone(),
                reason: error.to_string(),
            });
        }
    }
}
