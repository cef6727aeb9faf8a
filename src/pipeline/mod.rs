//! Capture pipeline components.
//!
//! Audio runs as two tasks joined by a bounded channel (the "port"):
//!
//! ```text
//! AudioTap blocks → BlockProcessor (VoiceGate + quantize) ─port─→ AudioDelivery → audio hook
//! ```
//!
//! Video runs as one task driven by refresh ticks:
//!
//! ```text
//! refresh tick → FrameGate → FrameSampler (draw, encode) → frame hook
//! ```
//!
//! Every task checks the session's liveness before acting, so a tick or
//! message already in flight when a session is stopped or destroyed is
//! dropped silently.

mod delivery;
mod processor;
mod sampler;
mod vad;

pub(crate) use delivery::AudioDelivery;
pub(crate) use processor::BlockProcessor;
pub use sampler::FrameGate;
pub(crate) use sampler::FrameSampler;
pub use vad::VoiceGate;
