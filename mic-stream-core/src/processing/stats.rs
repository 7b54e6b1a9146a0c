use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::models::audio_models::PipelineDiagnostics;

/// Lock-free counters shared by the capture callback and readers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    blocks_received: AtomicU64,
    blocks_delivered: AtomicU64,
    dropped_backpressure: AtomicU64,
    dropped_contended: AtomicU64,
    dropped_conversion: AtomicU64,
    dropped_in_flight: AtomicU64,
    last_amplitude_bits: AtomicU32,
    last_peak_bits: AtomicU32,
}

impl PipelineStats {
    pub fn record_received(&self) {
        self.blocks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.blocks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure_drop(&self) {
        self.dropped_backpressure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_contended_drop(&self) {
        self.dropped_contended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion_drop(&self) {
        self.dropped_conversion.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_in_flight_drop(&self) {
        self.dropped_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_levels(&self, amplitude: f32, peak: f32) {
        self.last_amplitude_bits.store(amplitude.to_bits(), Ordering::Relaxed);
        self.last_peak_bits.store(peak.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineDiagnostics {
        PipelineDiagnostics {
            blocks_received: self.blocks_received.load(Ordering::Relaxed),
            blocks_delivered: self.blocks_delivered.load(Ordering::Relaxed),
            dropped_backpressure: self.dropped_backpressure.load(Ordering::Relaxed),
            dropped_contended: self.dropped_contended.load(Ordering::Relaxed),
            dropped_conversion: self.dropped_conversion.load(Ordering::Relaxed),
            dropped_in_flight: self.dropped_in_flight.load(Ordering::Relaxed),
            last_amplitude: f32::from_bits(self.last_amplitude_bits.load(Ordering::Relaxed)),
            last_peak: f32::from_bits(self.last_peak_bits.load(Ordering::Relaxed)),
        }
    }
}
