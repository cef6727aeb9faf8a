//! Runtime events for monitoring capture sessions.
//!
//! Events are non-fatal notifications. Sessions keep running after an event
//! is emitted; they exist for logging and metrics, not error handling.

use std::sync::Arc;

use crate::TargetId;

/// Runtime events emitted by the [`CaptureController`](crate::CaptureController).
///
/// # Example
///
/// ```
/// use page_capture::CaptureEvent;
///
/// fn handle_event(event: CaptureEvent) {
///     match event {
///         CaptureEvent::SessionStarted { target, degraded } => {
///             eprintln!("capturing {target} (video-only: {degraded})");
///         }
///         CaptureEvent::AudioDegraded { target, reason } => {
///             eprintln!("{target}: audio unavailable: {reason}");
///         }
///         CaptureEvent::SessionStopped { target } => eprintln!("{target} stopped"),
///         CaptureEvent::SessionDestroyed { target } => eprintln!("{target} destroyed"),
///         CaptureEvent::FrameDropped { target, reason } => {
///             eprintln!("{target}: frame dropped: {reason}");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A session was created for a target.
    SessionStarted {
        /// Target of the new session.
        target: TargetId,
        /// `true` when the session runs without the audio tap.
        degraded: bool,
    },

    /// The audio tap could not be installed; the session continues video-only.
    AudioDegraded {
        /// Affected target.
        target: TargetId,
        /// Why the tap was unavailable.
        reason: String,
    },

    /// A session was paused by `stop`.
    SessionStopped {
        /// Affected target.
        target: TargetId,
    },

    /// A session was released by `destroy`.
    SessionDestroyed {
        /// Affected target.
        target: TargetId,
    },

    /// A sampled frame could not be drawn or encoded.
    FrameDropped {
        /// Affected target.
        target: TargetId,
        /// Description of the failure.
        reason: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`CaptureController::on_event()`].
///
/// [`CaptureController::on_event()`]: crate::CaptureController::on_event
pub type EventCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use page_capture::{event_callback, CaptureEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(CaptureEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_debug() {
        let event = CaptureEvent::AudioDegraded {
            target: TargetId::new("v1"),
            reason: "no worklet".to_string(),
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("AudioDegraded"));
        assert!(debug.contains("no worklet"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(CaptureEvent::SessionStopped {
            target: TargetId::new("v1"),
        });
        assert!(called.load(Ordering::SeqCst));
    }
}
