use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::config::TransportMode;
use crate::models::error::CaptureError;
use crate::models::frame::EncodedFrame;

/// Produces the two transport views of a canonical block.
///
/// The encoder does not pick a view; the caller passes the configured
/// `TransportMode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder;

impl FrameEncoder {
    /// Little-endian PCM16 bytes, two per sample.
    pub fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        data
    }

    /// Standard base64, no line wrapping.
    pub fn encode_text(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn decode_text(text: &str) -> Result<Vec<u8>, CaptureError> {
        STANDARD
            .decode(text)
            .map_err(|e| CaptureError::InternalConversionError(format!("invalid base64: {}", e)))
    }

    pub fn encode(&self, samples: &[i16], mode: TransportMode) -> EncodedFrame {
        let bytes = Self::pcm_bytes(samples);
        match mode {
            TransportMode::Binary => EncodedFrame::Binary(bytes),
            TransportMode::Text => EncodedFrame::Text(Self::encode_text(&bytes)),
        }
    }
}
