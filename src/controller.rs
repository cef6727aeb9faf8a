//! Per-target capture sessions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::media::{AudioContext, MediaElement, MediaPlatform};
use crate::pipeline::{AudioDelivery, BlockProcessor, FrameSampler};
use crate::session::{AudioPath, Session, SessionState, SharedSurface};
use crate::{
    event_callback, CaptureConfig, CaptureError, CaptureEvent, EventCallback, Hooks,
    SessionStats, TargetId,
};

/// Owns one capture session per video target.
///
/// Each session runs an audio pipeline (tap → voice gate → 16-bit
/// quantization → audio hook) and a video pipeline (refresh ticks → frame
/// gate → downscale → JPEG → frame hook). Sessions are keyed by
/// [`TargetId`] and live until [`destroy`](Self::destroy).
///
/// Methods take `&mut self`; the controller is meant to be owned by one
/// task, typically the one reacting to watcher callbacks.
///
/// # Example
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), page_capture::CaptureError> {
/// use std::sync::Arc;
/// use page_capture::media::{MockPlatform, MockVideo};
/// use page_capture::{CaptureController, Hooks};
///
/// let platform = Arc::new(MockPlatform::new());
/// platform.add_video(Arc::new(MockVideo::new("player", 1280, 720)));
///
/// let mut controller = CaptureController::new(platform).with_hooks(Hooks::new());
/// let target = controller.start(None).await?;
/// assert!(controller.is_capturing(&target));
///
/// controller.destroy(&target).await;
/// assert!(!controller.is_capturing(&target));
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct CaptureController {
    platform: Arc<dyn MediaPlatform>,
    hooks: Hooks,
    config: CaptureConfig,
    event_callback: Option<EventCallback>,
    sessions: HashMap<TargetId, Session>,
    origin: Instant,
}

impl CaptureController {
    /// Creates a controller emitting through [`Hooks::global()`].
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self {
            platform,
            hooks: Hooks::global().clone(),
            config: CaptureConfig::default(),
            event_callback: None,
            sessions: HashMap::new(),
            origin: Instant::now(),
        }
    }

    /// Emits through `hooks` instead of the global registry.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the configuration used by sessions started afterwards.
    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a callback to receive runtime events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(CaptureEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// The hook registry sessions emit through.
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// The active configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Returns `true` if `target` has a session, running or stopped.
    pub fn is_capturing(&self, target: &TargetId) -> bool {
        self.sessions.contains_key(target)
    }

    /// Targets with a session, in no particular order.
    pub fn targets(&self) -> Vec<TargetId> {
        self.sessions.keys().cloned().collect()
    }

    /// Counters for `target`'s session.
    pub fn stats(&self, target: &TargetId) -> Option<SessionStats> {
        self.sessions.get(target).map(Session::stats)
    }

    /// Returns `true` if `target`'s session runs without audio.
    pub fn is_degraded(&self, target: &TargetId) -> bool {
        self.sessions.get(target).is_some_and(Session::is_degraded)
    }

    /// Starts capturing `target`, or the page's first video when `None`.
    ///
    /// Returns the id the session is keyed by. Starting a target that
    /// already has a session does nothing and returns its id. If the audio
    /// tap cannot be installed the session still starts, video-only.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidConfig`] if the configuration is out of range
    /// - [`CaptureError::NoTarget`] if no target was given and the page has
    ///   no video
    /// - [`CaptureError::AudioBackend`] if the audio context cannot be
    ///   created or resumed
    pub async fn start(
        &mut self,
        target: Option<Arc<dyn MediaElement>>,
    ) -> Result<TargetId, CaptureError> {
        self.config.validate()?;

        let element = match target {
            Some(element) => element,
            None => self.platform.first_video().ok_or(CaptureError::NoTarget)?,
        };
        let target = element.id();

        if self.sessions.contains_key(&target) {
            tracing::debug!(target_id = %target, "session already exists");
            return Ok(target);
        }

        element.prepare_for_capture();

        let audio = &self.config.audio;
        let context = self
            .platform
            .create_audio_context(audio.sample_rate, audio.channels)?;
        if let Err(e) = context.resume().await {
            if let Err(close_err) = context.close().await {
                tracing::warn!(target_id = %target, error = %close_err, "failed to close audio context");
            }
            return Err(e);
        }

        let state = Arc::new(SessionState::new());
        let audio_path = self.attach_audio(&target, &element, &context, &state).await;

        let surface: SharedSurface = Arc::new(Mutex::new(self.platform.create_surface()));
        let sampler = FrameSampler::new(
            target.clone(),
            Arc::clone(&element),
            Arc::clone(&surface),
            Arc::clone(&state),
            self.hooks.clone(),
            self.config.video.clone(),
            self.event_callback.clone(),
        );
        let sampler = tokio::spawn(sampler.run());

        let session = Session::new(target.clone(), context, audio_path, surface, sampler, state);
        let degraded = session.is_degraded();
        self.sessions.insert(target.clone(), session);

        tracing::info!(
            target_id = %target,
            sample_rate = audio.sample_rate,
            degraded,
            "capture started"
        );
        self.emit(CaptureEvent::SessionStarted {
            target: target.clone(),
            degraded,
        });

        Ok(target)
    }

    /// Installs the audio tap and spawns the processor and delivery tasks,
    /// falling back to video-only when the tap is unavailable.
    async fn attach_audio(
        &self,
        target: &TargetId,
        element: &Arc<dyn MediaElement>,
        context: &Arc<dyn AudioContext>,
        state: &Arc<SessionState>,
    ) -> AudioPath {
        let audio = &self.config.audio;

        match context.attach_tap(Arc::clone(element), audio.block_capacity).await {
            Ok(tap) => {
                let (port_tx, port_rx) = mpsc::channel(audio.block_capacity);
                let processor =
                    BlockProcessor::new(target.clone(), audio, port_tx, Arc::clone(state));
                let delivery = AudioDelivery::new(
                    target.clone(),
                    Arc::clone(element),
                    Arc::clone(state),
                    self.hooks.clone(),
                    audio.sample_rate,
                    self.origin,
                );

                AudioPath::Tapped {
                    graph: tap.graph,
                    processor: tokio::spawn(processor.run(tap.blocks)),
                    delivery: tokio::spawn(delivery.run(port_rx)),
                }
            }
            Err(e) => {
                tracing::warn!(target_id = %target, error = %e, "audio tap unavailable, capturing video only");
                self.emit(CaptureEvent::AudioDegraded {
                    target: target.clone(),
                    reason: e.to_string(),
                });

                if let Err(e) = context.suspend().await {
                    tracing::warn!(target_id = %target, error = %e, "failed to suspend audio context");
                }
                AudioPath::Degraded
            }
        }
    }

    /// Pauses `target`'s session, keeping its resources. Unknown targets
    /// and repeated calls are no-ops.
    ///
    /// A stopped session is resumed by `destroy` followed by `start`.
    pub async fn stop(&mut self, target: &TargetId) {
        let Some(session) = self.sessions.get_mut(target) else {
            tracing::debug!(target_id = %target, "stop: no session");
            return;
        };

        session.stop().await;
        tracing::info!(target_id = %target, "capture stopped");
        self.emit(CaptureEvent::SessionStopped {
            target: target.clone(),
        });
    }

    /// Releases `target`'s session and forgets it. Unknown targets are a
    /// no-op. Never fails; release errors are logged.
    pub async fn destroy(&mut self, target: &TargetId) {
        let Some(session) = self.sessions.remove(target) else {
            tracing::debug!(target_id = %target, "destroy: no session");
            return;
        };

        let stats = session.stats();
        session.release().await;
        tracing::info!(
            target_id = %target,
            audio_chunks = stats.audio_chunks_emitted,
            frames = stats.frames_emitted,
            "capture destroyed"
        );
        self.emit(CaptureEvent::SessionDestroyed {
            target: target.clone(),
        });
    }

    /// Stops every session.
    pub async fn stop_all(&mut self) {
        for target in self.targets() {
            self.stop(&target).await;
        }
    }

    /// Destroys every session.
    pub async fn destroy_all(&mut self) {
        for target in self.targets() {
            self.destroy(&target).await;
        }
    }

    fn emit(&self, event: CaptureEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

impl std::fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureController")
            .field("sessions", &self.sessions.len())
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MockPlatform, MockVideo};
    use crate::{AudioChunk, ContextState, VideoFrame};
    use std::time::Duration;

    struct Fixture {
        platform: Arc<MockPlatform>,
        video: Arc<MockVideo>,
        controller: CaptureController,
        audio: Arc<Mutex<Vec<AudioChunk>>>,
        frames: Arc<Mutex<Vec<VideoFrame>>>,
        events: Arc<Mutex<Vec<CaptureEvent>>>,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(MockPlatform::new());
        let video = Arc::new(MockVideo::new("player", 1280, 720));
        platform.add_video(Arc::clone(&video));

        let hooks = Hooks::new();
        let audio = Arc::new(Mutex::new(Vec::new()));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let (a, f, e) = (Arc::clone(&audio), Arc::clone(&frames), Arc::clone(&events));
        hooks.set_audio_hook(move |chunk| a.lock().push(chunk));
        hooks.set_frame_hook(move |frame| f.lock().push(frame));

        let controller = CaptureController::new(platform.clone())
            .with_hooks(hooks)
            .on_event(move |event| e.lock().push(event));

        Fixture {
            platform,
            video,
            controller,
            audio,
            frames,
            events,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_video_fails() {
        let platform = Arc::new(MockPlatform::new());
        let mut controller = CaptureController::new(platform).with_hooks(Hooks::new());
        let err = controller.start(None).await.unwrap_err();
        assert!(matches!(err, CaptureError::NoTarget));
        assert!(controller.targets().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_prepares_and_resumes() {
        let mut fx = fixture();
        let target = fx.controller.start(None).await.unwrap();

        assert_eq!(target, TargetId::new("player"));
        assert!(fx.video.is_prepared());
        let context = fx.platform.last_context().unwrap();
        assert_eq!(context.state(), ContextState::Running);
        assert_eq!(context.sample_rate(), 24_000);
        assert!(context.has_tap());
        assert!(!fx.controller.is_degraded(&target));
        assert!(matches!(
            fx.events.lock()[0],
            CaptureEvent::SessionStarted { degraded: false, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let mut fx = fixture();
        let first = fx.controller.start(None).await.unwrap();
        let element: Arc<dyn MediaElement> = fx.video.clone();
        let second = fx.controller.start(Some(element)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.platform.contexts().len(), 1);
        assert_eq!(fx.controller.targets().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_rejected() {
        let mut fx = fixture();
        let mut config = CaptureConfig::default();
        config.video.fps = 0.0;
        fx.controller = fx.controller.with_config(config);

        let err = fx.controller.start(None).await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig { .. }));
        assert!(fx.platform.contexts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unschedulable_fps_and_stereo_rejected() {
        let mut fx = fixture();
        let mut config = CaptureConfig::default();
        config.video.fps = 1e-20;
        fx.controller = fx.controller.with_config(config);
        let err = fx.controller.start(None).await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig { .. }));

        let mut config = CaptureConfig::default();
        config.audio.channels = 2;
        fx.controller = fx.controller.with_config(config);
        let err = fx.controller.start(None).await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig { .. }));

        assert!(fx.platform.contexts().is_empty());
        assert!(fx.controller.targets().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resume_closes_context() {
        let mut fx = fixture();
        fx.platform.set_fail_resume(true);

        let err = fx.controller.start(None).await.unwrap_err();
        assert!(matches!(err, CaptureError::AudioBackend(_)));
        assert_eq!(fx.platform.last_context().unwrap().state(), ContextState::Closed);
        assert!(fx.controller.targets().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speech_is_delivered_and_silence_gated() {
        let mut fx = fixture();
        fx.video.play();
        let target = fx.controller.start(None).await.unwrap();
        let context = fx.platform.last_context().unwrap();

        assert!(context.push_tone(0.5, 128));
        for _ in 0..12 {
            assert!(context.push_silence(128));
        }
        settle().await;

        let audio = fx.audio.lock();
        // One speech block plus ten blocks of hold-over
        assert_eq!(audio.len(), 11);
        assert_eq!(audio[0].frames, 128);
        assert_eq!(audio[0].buffer[0], 16384);
        assert_eq!(audio[1].buffer[0], 0);

        let stats = fx.controller.stats(&target).unwrap();
        assert_eq!(stats.audio_chunks_emitted, 11);
        assert_eq!(stats.audio_blocks_gated, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_video_emits_no_audio() {
        let mut fx = fixture();
        fx.controller.start(None).await.unwrap();
        let context = fx.platform.last_context().unwrap();

        assert!(context.push_tone(0.5, 128));
        settle().await;
        assert!(fx.audio.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_follow_playback() {
        let mut fx = fixture();
        fx.video.play();
        fx.video.set_current_time(42.0);
        fx.controller.start(None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;

        let frames = fx.frames.lock();
        assert_eq!(frames.len(), 3);
        assert_eq!((frames[0].width, frames[0].height), (256, 144));
        assert_eq!(frames[0].ts, 42.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_session_is_video_only() {
        let mut fx = fixture();
        fx.platform.set_tap_supported(false);
        fx.video.play();

        let target = fx.controller.start(None).await.unwrap();
        assert!(fx.controller.is_degraded(&target));

        let context = fx.platform.last_context().unwrap();
        assert_eq!(context.state(), ContextState::Suspended);
        assert!(!context.push_tone(0.5, 128));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.frames.lock().len(), 1);

        let events = fx.events.lock();
        assert!(matches!(events[0], CaptureEvent::AudioDegraded { .. }));
        assert!(matches!(
            events[1],
            CaptureEvent::SessionStarted { degraded: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_entry_and_halts_output() {
        let mut fx = fixture();
        fx.video.play();
        let target = fx.controller.start(None).await.unwrap();
        settle().await;
        let frames_before = fx.frames.lock().len();

        fx.controller.stop(&target).await;
        fx.controller.stop(&target).await;
        assert!(fx.controller.is_capturing(&target));

        let context = fx.platform.last_context().unwrap();
        assert_eq!(context.state(), ContextState::Suspended);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fx.frames.lock().len(), frames_before);
        assert!(fx.audio.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_releases_everything() {
        let mut fx = fixture();
        fx.video.play();
        let target = fx.controller.start(None).await.unwrap();

        fx.controller.destroy(&target).await;
        fx.controller.destroy(&target).await;
        assert!(!fx.controller.is_capturing(&target));
        assert!(fx.controller.stats(&target).is_none());

        let context = fx.platform.last_context().unwrap();
        assert_eq!(context.state(), ContextState::Closed);
        assert!(context.is_disconnected());

        let destroyed = fx
            .events
            .lock()
            .iter()
            .filter(|e| matches!(e, CaptureEvent::SessionDestroyed { .. }))
            .count();
        assert_eq!(destroyed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_then_start_builds_fresh_session() {
        let mut fx = fixture();
        fx.video.play();
        let target = fx.controller.start(None).await.unwrap();
        fx.controller.destroy(&target).await;

        let again = fx.controller.start(None).await.unwrap();
        assert_eq!(again, target);
        assert_eq!(fx.platform.contexts().len(), 2);
        assert_eq!(fx.platform.last_context().unwrap().state(), ContextState::Running);
        assert_eq!(fx.controller.stats(&target).unwrap(), SessionStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_after_stop_and_external_close() {
        let mut fx = fixture();
        let target = fx.controller.start(None).await.unwrap();
        fx.controller.stop(&target).await;

        // Context already released by someone else
        fx.platform.last_context().unwrap().close().await.unwrap();
        fx.controller.destroy(&target).await;
        assert!(fx.controller.targets().is_empty());
    }
}
