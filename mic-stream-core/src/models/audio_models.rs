use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::{CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE};

/// Sample format delivered by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32,
    I16,
}

/// Interleaved samples as captured.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    /// Normalized floats, nominally in `[-1.0, 1.0]`.
    F32(Vec<f32>),
    /// Signed 16-bit integers.
    I16(Vec<i16>),
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(samples) => samples.len(),
            Self::I16(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Self::F32(_) => SampleFormat::F32,
            Self::I16(_) => SampleFormat::I16,
        }
    }

    /// Consume the buffer into normalized floats. Integer samples are scaled
    /// by `1 / 32767`, so canonical input quantizes back to itself.
    pub fn into_normalized(self) -> Vec<f32> {
        match self {
            Self::F32(samples) => samples,
            Self::I16(samples) => samples.into_iter().map(|s| s as f32 / 32767.0).collect(),
        }
    }
}

/// One hardware callback's worth of audio.
///
/// Moved through the pipeline by value; never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pub samples: SampleBuffer,
    pub channels: u16,
    pub sample_rate: u32,
    pub captured_at: DateTime<Utc>,
    /// Set when the hardware could not open the canonical format.
    pub conversion_required: bool,
}

impl AudioBlock {
    pub fn new(samples: SampleBuffer, channels: u16, sample_rate: u32) -> Self {
        let conversion_required = channels != CANONICAL_CHANNELS
            || sample_rate != CANONICAL_SAMPLE_RATE
            || samples.format() != SampleFormat::I16;
        Self {
            samples,
            channels,
            sample_rate,
            captured_at: Utc::now(),
            conversion_required,
        }
    }
}

/// Hardware format actually opened by a capture provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub conversion_required: bool,
}

impl NativeFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
            conversion_required: sample_rate != CANONICAL_SAMPLE_RATE
                || channels != CANONICAL_CHANNELS
                || sample_format != SampleFormat::I16,
        }
    }

    /// The canonical 16 kHz mono PCM16 format.
    pub fn canonical() -> Self {
        Self::new(CANONICAL_SAMPLE_RATE, CANONICAL_CHANNELS, SampleFormat::I16)
    }
}

/// An input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Counters for debugging the streaming pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineDiagnostics {
    pub blocks_received: u64,
    pub blocks_delivered: u64,
    /// The subscriber had not drained the previous frame.
    pub dropped_backpressure: u64,
    /// Subscribe/unsubscribe held the subscriber slot during delivery.
    pub dropped_contended: u64,
    pub dropped_conversion: u64,
    pub dropped_in_flight: u64,
    pub last_amplitude: f32,
    pub last_peak: f32,
}
