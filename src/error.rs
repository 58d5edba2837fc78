//! Error type shared across the crate.

use thiserror::Error;

/// Errors raised by the frame tracker capability, configuration loading and
/// the frame worker.
///
/// Per-frame processing never hands these to its caller; they are logged and
/// the affected frame is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    /// No frame tracker backend could be created for this platform.
    #[error("frame tracker backend unavailable: {0}")]
    TrackerUnavailable(String),

    /// A single capability call failed.
    #[error("frame tracker call `{operation}` failed: {reason}")]
    TrackerCall {
        operation: &'static str,
        reason: String,
    },

    /// A handle that the backend does not know (already released or foreign).
    #[error("unknown tracker handle {0}")]
    UnknownHandle(u64),

    /// Frame buffer does not match its declared geometry.
    #[error("invalid frame: expected {expected} bytes, got {got}")]
    InvalidFrame { expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The frame worker thread has exited.
    #[error("frame worker stopped")]
    WorkerStopped,
}

impl FusionError {
    pub(crate) fn call(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::TrackerCall {
            operation,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = FusionError> = std::result::Result<T, E>;
