use thiserror::Error;

/// Errors surfaced by the capture core.
///
/// Start-time variants (`NoPermission`, `FocusDenied`, `HardwareUnavailable`,
/// `AlreadyActive`) are returned synchronously and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone permission not granted")]
    NoPermission,

    #[error("audio focus request denied")]
    FocusDenied,

    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("capture already active")]
    AlreadyActive,

    #[error("conversion failed: {0}")]
    InternalConversionError(String),

    #[error("session terminated by error: {0}")]
    SessionTerminatedByError(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("internal error: {0}")]
    Internal(String),
}
