//! Energy-threshold voice-activity gate.

use crate::AudioConfig;

/// Decides which audio blocks are worth emitting.
///
/// The gate sums absolute sample values over the first `window` samples of
/// a block (stopping as soon as the threshold is crossed). A block above
/// the threshold opens the gate. Silent blocks keep it open until more than
/// `hold_blocks` of them arrive in a row, so the tail of an utterance is not
/// clipped. The gate starts closed.
///
/// # Example
///
/// ```
/// use page_capture::{AudioConfig, VoiceGate};
///
/// let mut gate = VoiceGate::new(&AudioConfig::default());
/// assert!(!gate.accept(&[0.0; 128]));
/// assert!(gate.accept(&[0.1; 128]));
/// assert!(gate.accept(&[0.0; 128])); // hold-over
/// ```
#[derive(Debug, Clone)]
pub struct VoiceGate {
    enabled: bool,
    threshold: f32,
    window: usize,
    hold_blocks: u32,
    silence_count: u32,
    active: bool,
}

impl VoiceGate {
    /// Creates a closed gate from the audio settings.
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            enabled: config.enable_vad,
            threshold: config.vad_threshold,
            window: config.vad_window,
            hold_blocks: config.silence_blocks,
            silence_count: 0,
            active: false,
        }
    }

    /// Energy estimate over the leading samples of `block`.
    ///
    /// Stops summing once the threshold is exceeded, so the result is only
    /// meaningful relative to the threshold.
    pub fn leading_energy(&self, block: &[f32]) -> f32 {
        let mut energy = 0.0f32;
        for &sample in block.iter().take(self.window) {
            energy += sample.abs();
            if energy > self.threshold {
                break;
            }
        }
        energy
    }

    /// Feeds one block through the gate. Returns `true` if it should be emitted.
    pub fn accept(&mut self, block: &[f32]) -> bool {
        if !self.enabled {
            return true;
        }

        if self.leading_energy(block) > self.threshold {
            self.silence_count = 0;
            self.active = true;
            return true;
        }

        self.silence_count = self.silence_count.saturating_add(1);
        if self.silence_count > self.hold_blocks {
            self.active = false;
        }
        self.active
    }

    /// Returns `true` while the gate is open.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Closes the gate and clears the silence counter.
    pub fn reset(&mut self) {
        self.silence_count = 0;
        self.active = false;
    }
}
