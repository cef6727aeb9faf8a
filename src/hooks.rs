//! Hand-off points for captured audio and frames.
//!
//! Sessions emit every accepted [`AudioChunk`] and [`VideoFrame`] through a
//! [`Hooks`] registry. A hook slot that is empty is a silent no-op: capture
//! keeps running and the output is discarded.
//!
//! [`Hooks::global()`] is the process-wide registry used by default.
//! Controllers can be given their own registry with
//! [`CaptureController::with_hooks`](crate::CaptureController::with_hooks).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{AudioChunk, VideoFrame};

/// Receives every accepted audio chunk.
pub type AudioHook = Arc<dyn Fn(AudioChunk) + Send + Sync>;

/// Receives every accepted video frame.
pub type FrameHook = Arc<dyn Fn(VideoFrame) + Send + Sync>;

/// Dropped items between two `warn!` lines of a forwarding hook.
const DROP_LOG_INTERVAL: u64 = 100;

/// Counts items a forwarding hook dropped on a full channel.
#[derive(Debug, Default)]
struct DropCounter {
    dropped: AtomicU64,
}

impl DropCounter {
    /// Records one drop. Returns the running total when it should be logged:
    /// the first drop and every `DROP_LOG_INTERVAL`th after it.
    fn record(&self) -> Option<u64> {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        (total == 1 || total % DROP_LOG_INTERVAL == 0).then_some(total)
    }
}

#[derive(Default)]
struct HookSlots {
    audio: RwLock<Option<AudioHook>>,
    frame: RwLock<Option<FrameHook>>,
}

/// Registry of the audio and frame hooks.
///
/// Cloning is cheap and clones share the same slots, so a hook installed
/// after a session started is picked up on its next emission.
///
/// # Example
///
/// ```
/// use page_capture::Hooks;
///
/// let hooks = Hooks::new();
/// hooks.set_audio_hook(|chunk| println!("{} frames", chunk.frames));
/// assert!(hooks.has_audio_hook());
/// hooks.clear_audio_hook();
/// assert!(!hooks.has_audio_hook());
/// ```
#[derive(Clone, Default)]
pub struct Hooks {
    slots: Arc<HookSlots>,
}

impl Hooks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static Hooks {
        static GLOBAL: OnceLock<Hooks> = OnceLock::new();
        GLOBAL.get_or_init(Hooks::new)
    }

    /// Installs the audio hook, replacing any previous one.
    pub fn set_audio_hook<F>(&self, hook: F)
    where
        F: Fn(AudioChunk) + Send + Sync + 'static,
    {
        *self.slots.audio.write() = Some(Arc::new(hook));
    }

    /// Installs the frame hook, replacing any previous one.
    pub fn set_frame_hook<F>(&self, hook: F)
    where
        F: Fn(VideoFrame) + Send + Sync + 'static,
    {
        *self.slots.frame.write() = Some(Arc::new(hook));
    }

    /// Removes the audio hook.
    pub fn clear_audio_hook(&self) {
        self.slots.audio.write().take();
    }

    /// Removes the frame hook.
    pub fn clear_frame_hook(&self) {
        self.slots.frame.write().take();
    }

    /// Returns `true` if an audio hook is installed.
    pub fn has_audio_hook(&self) -> bool {
        self.slots.audio.read().is_some()
    }

    /// Returns `true` if a frame hook is installed.
    pub fn has_frame_hook(&self) -> bool {
        self.slots.frame.read().is_some()
    }

    /// Installs an audio hook that forwards chunks into a tokio channel.
    ///
    /// Hooks run on capture tasks and must not block, so a full channel drops
    /// the chunk. Drops are counted and logged at `warn` on the first and then
    /// every 100th. A closed channel drops silently.
    pub fn forward_audio(&self, sender: mpsc::Sender<AudioChunk>) {
        let drops = DropCounter::default();
        self.set_audio_hook(move |chunk| match sender.try_send(chunk) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(chunk)) => {
                if let Some(total) = drops.record() {
                    tracing::warn!(target_id = %chunk.target, dropped = total, "audio channel full, chunks dropped");
                }
            }
        });
    }

    /// Installs a frame hook that forwards frames into a tokio channel.
    ///
    /// Same drop policy as [`forward_audio`](Self::forward_audio).
    pub fn forward_frames(&self, sender: mpsc::Sender<VideoFrame>) {
        let drops = DropCounter::default();
        self.set_frame_hook(move |frame| match sender.try_send(frame) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(frame)) => {
                if let Some(total) = drops.record() {
                    tracing::warn!(target_id = %frame.target, dropped = total, "frame channel full, frames dropped");
                }
            }
        });
    }

    /// Emits a chunk. Returns `false` when no hook is installed.
    pub(crate) fn emit_audio(&self, chunk: AudioChunk) -> bool {
        // Clone out of the lock so a hook can replace itself.
        let hook = self.slots.audio.read().clone();
        match hook {
            Some(hook) => {
                hook(chunk);
                true
            }
            None => false,
        }
    }

    /// Emits a frame. Returns `false` when no hook is installed.
    pub(crate) fn emit_frame(&self, frame: VideoFrame) -> bool {
        let hook = self.slots.frame.read().clone();
        match hook {
            Some(hook) => {
                hook(frame);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("audio", &self.has_audio_hook())
            .field("frame", &self.has_frame_hook())
            .finish()
    }
}
