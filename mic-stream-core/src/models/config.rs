use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Canonical pipeline sample rate in Hz.
pub const CANONICAL_SAMPLE_RATE: u32 = 16_000;
/// Canonical pipeline channel count.
pub const CANONICAL_CHANNELS: u16 = 1;
/// Canonical pipeline bit depth.
pub const CANONICAL_BIT_DEPTH: u16 = 16;

/// How encoded frames leave the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Raw little-endian PCM bytes, for stream transports.
    Binary,
    /// Base64 text, for structured events.
    #[default]
    Text,
}

/// Configuration for a capture session.
///
/// Everything except `gain` is fixed once a session starts; gain is hot-swapped
/// through `Recorder::set_gain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target sample rate in Hz. Must be 16000.
    pub sample_rate: u32,

    /// Target channel count. Must be 1.
    pub channels: u16,

    /// Target bit depth. Must be 16.
    pub bit_depth: u16,

    /// Requested hardware buffer size in frames (default: 1024).
    pub buffer_frames: u32,

    /// Initial linear gain (default: 1.0).
    pub gain: f32,

    /// Frame transport representation (default: text).
    pub transport: TransportMode,

    /// Upper bound on how long `stop` waits for an in-flight block.
    pub stop_timeout_ms: u64,

    /// Capacity of the lifecycle message queue (focus events, stream failures).
    pub lifecycle_queue_capacity: usize,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate != CANONICAL_SAMPLE_RATE {
            return Err(CaptureError::InvalidConfiguration(format!(
                "unsupported target sample rate: {}",
                self.sample_rate
            )));
        }
        if self.channels != CANONICAL_CHANNELS {
            return Err(CaptureError::InvalidConfiguration(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        if self.bit_depth != CANONICAL_BIT_DEPTH {
            return Err(CaptureError::InvalidConfiguration(format!(
                "unsupported bit depth: {}",
                self.bit_depth
            )));
        }
        if self.buffer_frames == 0 {
            return Err(CaptureError::InvalidConfiguration("buffer size must be non-zero".into()));
        }
        if !(self.gain.is_finite() && self.gain > 0.0) {
            return Err(CaptureError::InvalidConfiguration(format!(
                "gain must be positive: {}",
                self.gain
            )));
        }
        if self.lifecycle_queue_capacity == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "lifecycle queue capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfiguration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::InvalidConfiguration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: CANONICAL_SAMPLE_RATE,
            channels: CANONICAL_CHANNELS,
            bit_depth: CANONICAL_BIT_DEPTH,
            buffer_frames: 1024,
            gain: 1.0,
            transport: TransportMode::Text,
            stop_timeout_ms: 250,
            lifecycle_queue_capacity: 32,
        }
    }
}
