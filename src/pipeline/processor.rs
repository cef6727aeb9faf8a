//! Off-thread audio processing stage.
//!
//! The processor owns its gate and buffers outright and talks to the rest of
//! the session only by sending immutable [`ProcessedBlock`]s through the
//! port. Sending never waits: a full port drops the block.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::format::quantize_block;
use crate::media::AudioBlock;
use crate::pipeline::VoiceGate;
use crate::session::SessionState;
use crate::{AudioConfig, TargetId};

/// A gated, quantized mono block on its way to delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcessedBlock {
    pub samples: Vec<i16>,
}

/// Runs the voice gate and quantizer over tapped blocks.
pub(crate) struct BlockProcessor {
    target: TargetId,
    gate: VoiceGate,
    port: mpsc::Sender<ProcessedBlock>,
    state: Arc<SessionState>,
}

impl BlockProcessor {
    pub fn new(
        target: TargetId,
        config: &AudioConfig,
        port: mpsc::Sender<ProcessedBlock>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            target,
            gate: VoiceGate::new(config),
            port,
            state,
        }
    }

    /// Gates and quantizes the first channel of `block`.
    ///
    /// Blocks with no input are skipped without touching the gate.
    pub fn process(&mut self, block: &AudioBlock) -> Option<ProcessedBlock> {
        let samples = block.first_channel().filter(|ch| !ch.is_empty())?;

        if !self.gate.accept(samples) {
            self.state.audio_blocks_gated.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        Some(ProcessedBlock {
            samples: quantize_block(samples),
        })
    }

    /// Processes blocks until the tap closes or delivery goes away.
    pub async fn run(mut self, mut blocks: mpsc::Receiver<AudioBlock>) {
        while let Some(block) = blocks.recv().await {
            let Some(processed) = self.process(&block) else {
                continue;
            };

            match self.port.try_send(processed) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let dropped = self.state.audio_blocks_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(target_id = %self.target, dropped = dropped + 1, "port full, block dropped");
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }

        tracing::debug!(target_id = %self.target, "audio processor finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(capacity: usize) -> (BlockProcessor, mpsc::Receiver<ProcessedBlock>, Arc<SessionState>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = Arc::new(SessionState::new());
        let processor = BlockProcessor::new(
            TargetId::new("v"),
            &AudioConfig::default(),
            tx,
            Arc::clone(&state),
        );
        (processor, rx, state)
    }

    #[test]
    fn test_quantizes_first_channel_only() {
        let (mut processor, _rx, _state) = processor(4);
        let block = AudioBlock {
            channels: vec![vec![0.5, -0.5], vec![1.0, 1.0]],
        };
        let processed = processor.process(&block).unwrap();
        assert_eq!(processed.samples, vec![16384, -16384]);
    }

    #[test]
    fn test_empty_blocks_are_skipped() {
        let (mut processor, _rx, state) = processor(4);
        assert!(processor.process(&AudioBlock::default()).is_none());
        assert!(processor.process(&AudioBlock::mono(vec![])).is_none());
        assert_eq!(state.stats().audio_blocks_gated, 0);
    }

    #[test]
    fn test_silence_is_gated_and_counted() {
        let (mut processor, _rx, state) = processor(4);
        assert!(processor.process(&AudioBlock::mono(vec![0.0; 128])).is_none());
        assert_eq!(state.stats().audio_blocks_gated, 1);
    }

    #[tokio::test]
    async fn test_run_forwards_and_drops_when_port_full() {
        let (processor, mut rx, state) = processor(1);
        let (tap_tx, tap_rx) = mpsc::channel(8);

        for _ in 0..3 {
            tap_tx.send(AudioBlock::mono(vec![0.2; 128])).await.unwrap();
        }
        drop(tap_tx);

        processor.run(tap_rx).await;

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
        assert_eq!(state.stats().audio_blocks_dropped, 2);
    }
}
