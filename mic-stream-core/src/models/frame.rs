use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::error::CaptureError;
use super::state::{RecordingState, SessionEnd};

/// Transport-ready representation of one canonical block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedFrame {
    /// Little-endian PCM16 bytes.
    Binary(Vec<u8>),
    /// Base64 (standard alphabet, no wrapping) of the same bytes.
    Text(String),
}

impl EncodedFrame {
    /// The raw PCM bytes, decoding the text form if needed.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CaptureError> {
        match self {
            Self::Binary(bytes) => Ok(bytes.clone()),
            Self::Text(text) => STANDARD
                .decode(text)
                .map_err(|e| CaptureError::InternalConversionError(format!("invalid base64 frame: {}", e))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Binary(bytes) => bytes.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }
}

// Structured events always carry the text form.
impl Serialize for EncodedFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Binary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// One delivered block: `{ "data": ..., "amplitude": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFrameEvent {
    pub data: EncodedFrame,
    /// Normalized RMS in `[0.0, 1.0]`.
    pub amplitude: f32,
    #[serde(skip)]
    pub sequence: u64,
    #[serde(skip)]
    pub captured_at: DateTime<Utc>,
}

impl AudioFrameEvent {
    pub fn to_json(&self) -> Result<String, CaptureError> {
        serde_json::to_string(self)
            .map_err(|e| CaptureError::InternalConversionError(format!("failed to serialize frame: {}", e)))
    }
}

/// Lifecycle notification delivered to the subscriber alongside frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    StateChanged(RecordingState),
    Ended(SessionEnd),
}
