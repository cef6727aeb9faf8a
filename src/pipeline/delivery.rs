//! Delivery of processed audio to the audio hook.
//!
//! This is the receiving end of the port. Liveness and playback are checked
//! here, when a block is delivered, not when it is produced: a block
//! processed just before `stop` or a pause is dropped on arrival.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::media::MediaElement;
use crate::pipeline::processor::ProcessedBlock;
use crate::session::SessionState;
use crate::{AudioChunk, Hooks, TargetId};

pub(crate) struct AudioDelivery {
    target: TargetId,
    element: Arc<dyn MediaElement>,
    state: Arc<SessionState>,
    hooks: Hooks,
    sample_rate: u32,
    origin: Instant,
}

impl AudioDelivery {
    pub fn new(
        target: TargetId,
        element: Arc<dyn MediaElement>,
        state: Arc<SessionState>,
        hooks: Hooks,
        sample_rate: u32,
        origin: Instant,
    ) -> Self {
        Self {
            target,
            element,
            state,
            hooks,
            sample_rate,
            origin,
        }
    }

    /// Emits one block if the session is live and the element is playing.
    /// Returns `true` when the chunk reached a hook.
    pub fn deliver(&self, block: ProcessedBlock) -> bool {
        if !self.state.is_audio_attached() || self.element.is_paused() {
            return false;
        }

        let chunk = AudioChunk::new(
            self.target.clone(),
            block.samples,
            self.sample_rate,
            1,
            self.origin.elapsed().as_secs_f64(),
        );

        if !self.hooks.emit_audio(chunk) {
            return false;
        }

        let emitted = self.state.audio_chunks_emitted.fetch_add(1, Ordering::Relaxed) + 1;
        if emitted % 500 == 0 {
            tracing::debug!(target_id = %self.target, emitted, "audio chunks delivered");
        }
        true
    }

    pub async fn run(self, mut port: mpsc::Receiver<ProcessedBlock>) {
        while let Some(block) = port.recv().await {
            if !self.state.is_registered() {
                break;
            }
            self.deliver(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockVideo;
    use parking_lot::Mutex;

    fn setup() -> (AudioDelivery, Arc<MockVideo>, Arc<SessionState>, Arc<Mutex<Vec<AudioChunk>>>) {
        let video = Arc::new(MockVideo::new("v", 640, 360));
        video.play();
        let state = Arc::new(SessionState::new());
        let hooks = Hooks::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        hooks.set_audio_hook(move |chunk| sink.lock().push(chunk));

        let delivery = AudioDelivery::new(
            TargetId::new("v"),
            video.clone(),
            Arc::clone(&state),
            hooks,
            24_000,
            Instant::now(),
        );
        (delivery, video, state, received)
    }

    fn block() -> ProcessedBlock {
        ProcessedBlock {
            samples: vec![1, 2, 3, 4],
        }
    }

    #[tokio::test]
    async fn test_delivers_chunk_with_metadata() {
        let (delivery, _video, state, received) = setup();
        assert!(delivery.deliver(block()));

        let chunks = received.lock();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sample_rate, 24_000);
        assert_eq!(chunks[0].channels, 1);
        assert_eq!(chunks[0].frames, 4);
        assert!(chunks[0].compressed);
        assert_eq!(chunks[0].bit_depth, 16);
        assert_eq!(state.stats().audio_chunks_emitted, 1);
    }

    #[tokio::test]
    async fn test_paused_video_drops_block() {
        let (delivery, video, _state, received) = setup();
        video.pause();
        assert!(!delivery.deliver(block()));
        assert!(received.lock().is_empty());
    }

    #[tokio::test]
    async fn test_detached_handler_drops_block() {
        let (delivery, _video, state, received) = setup();
        state.detach_audio();
        assert!(!delivery.deliver(block()));
        assert!(received.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_unregistered() {
        let (delivery, _video, state, received) = setup();
        let (tx, rx) = mpsc::channel(4);
        tx.send(block()).await.unwrap();
        state.unregister();
        tx.send(block()).await.unwrap();

        delivery.run(rx).await;
        assert!(received.lock().is_empty());
    }
}
