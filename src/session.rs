//! Per-target capture session state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::media::{AudioContext, AudioGraph, ContextState};
use crate::surface::RasterSurface;
use crate::TargetId;

/// Raster surface shared between a session and its frame sampler.
pub(crate) type SharedSurface = Arc<Mutex<Box<dyn RasterSurface>>>;

/// Counters for one capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Audio chunks handed to the audio hook.
    pub audio_chunks_emitted: u64,
    /// Blocks suppressed by the voice-activity gate.
    pub audio_blocks_gated: u64,
    /// Processed blocks dropped because the port was full.
    pub audio_blocks_dropped: u64,
    /// Frames handed to the frame hook.
    pub frames_emitted: u64,
    /// Sampled frames that failed to draw or encode.
    pub frames_dropped: u64,
}

/// State shared between a [`Session`] and its background tasks.
///
/// Tasks never touch the session map. They check `registered` (and, for
/// audio delivery, `audio_attached`) before acting and drop their work if
/// the session is gone.
pub(crate) struct SessionState {
    registered: AtomicBool,
    audio_attached: AtomicBool,
    pub audio_chunks_emitted: AtomicU64,
    pub audio_blocks_gated: AtomicU64,
    pub audio_blocks_dropped: AtomicU64,
    pub frames_emitted: AtomicU64,
    pub frames_dropped: AtomicU64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            registered: AtomicBool::new(true),
            audio_attached: AtomicBool::new(true),
            audio_chunks_emitted: AtomicU64::new(0),
            audio_blocks_gated: AtomicU64::new(0),
            audio_blocks_dropped: AtomicU64::new(0),
            frames_emitted: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn unregister(&self) {
        self.registered.store(false, Ordering::SeqCst);
    }

    /// `true` while audio chunks may be delivered.
    pub fn is_audio_attached(&self) -> bool {
        self.is_registered() && self.audio_attached.load(Ordering::SeqCst)
    }

    pub fn detach_audio(&self) {
        self.audio_attached.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            audio_chunks_emitted: self.audio_chunks_emitted.load(Ordering::SeqCst),
            audio_blocks_gated: self.audio_blocks_gated.load(Ordering::SeqCst),
            audio_blocks_dropped: self.audio_blocks_dropped.load(Ordering::SeqCst),
            frames_emitted: self.frames_emitted.load(Ordering::SeqCst),
            frames_dropped: self.frames_dropped.load(Ordering::SeqCst),
        }
    }
}

/// How a session's audio is wired.
pub(crate) enum AudioPath {
    /// The tap is installed; blocks flow processor → port → delivery.
    Tapped {
        graph: Box<dyn AudioGraph>,
        processor: JoinHandle<()>,
        delivery: JoinHandle<()>,
    },
    /// No tap could be installed. The context is suspended; video only.
    Degraded,
}

/// The resources held for one captured target.
///
/// Owned exclusively by the controller's session map.
pub(crate) struct Session {
    target: TargetId,
    context: Arc<dyn AudioContext>,
    audio: AudioPath,
    surface: SharedSurface,
    sampler: Option<JoinHandle<()>>,
    state: Arc<SessionState>,
}

impl Session {
    pub fn new(
        target: TargetId,
        context: Arc<dyn AudioContext>,
        audio: AudioPath,
        surface: SharedSurface,
        sampler: JoinHandle<()>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            target,
            context,
            audio,
            surface,
            sampler: Some(sampler),
            state,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.audio, AudioPath::Degraded)
    }

    pub fn stats(&self) -> SessionStats {
        self.state.stats()
    }

    /// Pauses capture but keeps every handle. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }

        if self.context.state() != ContextState::Closed {
            if let Err(e) = self.context.suspend().await {
                tracing::warn!(target_id = %self.target, error = %e, "failed to suspend audio context");
            }
        }

        self.state.detach_audio();
    }

    /// Tears down every resource. Never fails; errors are logged.
    pub async fn release(mut self) {
        self.state.unregister();
        self.state.detach_audio();

        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }

        if let AudioPath::Tapped {
            graph,
            processor,
            delivery,
        } = &mut self.audio
        {
            graph.disconnect();
            processor.abort();
            delivery.abort();
        }

        if self.context.state() != ContextState::Closed {
            if let Err(e) = self.context.close().await {
                tracing::warn!(target_id = %self.target, error = %e, "failed to close audio context");
            }
        }

        self.surface.lock().release();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Dropped without release() (e.g. controller dropped): stop the tasks
        self.state.unregister();
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
        if let AudioPath::Tapped {
            processor,
            delivery,
            ..
        } = &self.audio
        {
            processor.abort();
            delivery.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_new() {
        let state = SessionState::new();
        assert!(state.is_registered());
        assert!(state.is_audio_attached());
        assert_eq!(state.stats(), SessionStats::default());
    }

    #[test]
    fn test_detach_audio_keeps_registration() {
        let state = SessionState::new();
        state.detach_audio();
        assert!(state.is_registered());
        assert!(!state.is_audio_attached());
    }

    #[test]
    fn test_unregister_detaches_audio() {
        let state = SessionState::new();
        state.unregister();
        assert!(!state.is_audio_attached());
    }

    #[test]
    fn test_stats_snapshot() {
        let state = SessionState::new();
        state.frames_emitted.fetch_add(3, Ordering::SeqCst);
        state.audio_blocks_gated.fetch_add(2, Ordering::SeqCst);
        let stats = state.stats();
        assert_eq!(stats.frames_emitted, 3);
        assert_eq!(stats.audio_blocks_gated, 2);
    }
}
