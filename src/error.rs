//! Error types for page-capture.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`CaptureError`]): Returned from the operation that failed
//! - **Recoverable events**: Runtime issues surfaced via [`EventCallback`](crate::EventCallback)
//!
//! Release operations (`stop`, `destroy`) never return errors. Failures while
//! tearing down a session are logged and swallowed.

/// Errors produced by the capture controller and lifecycle watcher.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No target was given and the page has no video element.
    #[error("no video element")]
    NoTarget,

    /// The off-thread audio processing stage cannot be installed.
    ///
    /// The controller recovers from this by running the session video-only.
    #[error("audio processing unavailable: {reason}")]
    CapabilityUnavailable {
        /// Why the capability is unavailable.
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Which value is wrong and why.
        reason: String,
    },

    /// The watcher's class name is empty or is not a single class token.
    #[error("invalid class name: {class_name:?}")]
    InvalidClassName {
        /// The rejected class name, as given.
        class_name: String,
    },

    /// An error from the audio backend (context creation, resume).
    #[error("audio backend error: {0}")]
    AudioBackend(String),

    /// Drawing a frame onto the raster surface failed.
    #[error("draw failed: {reason}")]
    DrawFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Encoding the raster surface to an image failed.
    #[error("encode failed: {reason}")]
    EncodeFailed {
        /// Description of what went wrong.
        reason: String,
    },
}

impl CaptureError {
    /// Creates a capability-unavailable error with the given reason.
    pub fn capability_unavailable(reason: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-config error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a draw-failed error with the given reason.
    pub fn draw_failed(reason: impl Into<String>) -> Self {
        Self::DrawFailed {
            reason: reason.into(),
        }
    }

    /// Creates an encode-failed error with the given reason.
    pub fn encode_failed(reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_target_display() {
        assert_eq!(CaptureError::NoTarget.to_string(), "no video element");
    }

    #[test]
    fn test_capability_unavailable() {
        let err = CaptureError::capability_unavailable("AudioWorklet missing");
        assert_eq!(
            err.to_string(),
            "audio processing unavailable: AudioWorklet missing"
        );
    }

    #[test]
    fn test_invalid_class_name_quotes_input() {
        let err = CaptureError::InvalidClassName {
            class_name: "a b".to_string(),
        };
        assert_eq!(err.to_string(), "invalid class name: \"a b\"");
    }

    #[test]
    fn test_encode_failed() {
        let err = CaptureError::encode_failed("zero-sized surface");
        assert!(err.to_string().contains("zero-sized surface"));
    }
}
