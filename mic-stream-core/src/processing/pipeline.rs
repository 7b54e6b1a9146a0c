use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::delivery::event_sink::{DeliveryOutcome, EventSink};
use crate::models::audio_models::{AudioBlock, SampleBuffer};
use crate::models::config::TransportMode;
use crate::models::error::CaptureError;
use crate::models::frame::AudioFrameEvent;
use crate::processing::converter::FormatConverter;
use crate::processing::encoder::FrameEncoder;
use crate::processing::gain::GainStage;
use crate::processing::loudness::LoudnessMeter;
use crate::processing::stats::PipelineStats;

/// Per-block processing chain run inline on the capture thread.
///
/// ```text
/// AudioBlock → GainStage → FormatConverter → LoudnessMeter → FrameEncoder → EventSink
/// ```
///
/// Canonical PCM16 blocks at unity gain skip gain and conversion.
pub struct BlockPipeline {
    gain: Arc<GainStage>,
    converter: FormatConverter,
    encoder: FrameEncoder,
    sink: Arc<EventSink>,
    transport: TransportMode,
    sequence: AtomicU64,
    stats: Arc<PipelineStats>,
}

impl BlockPipeline {
    pub fn new(
        gain: Arc<GainStage>,
        sink: Arc<EventSink>,
        transport: TransportMode,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            gain,
            converter: FormatConverter::new(),
            encoder: FrameEncoder,
            sink,
            transport,
            sequence: AtomicU64::new(0),
            stats,
        }
    }

    /// Process one block. A conversion failure drops the block without
    /// touching the sink.
    pub fn process(&self, block: AudioBlock) -> Result<DeliveryOutcome, CaptureError> {
        self.stats.record_received();

        let AudioBlock {
            samples,
            channels,
            sample_rate,
            captured_at,
            conversion_required,
        } = block;

        let pcm = match samples {
            SampleBuffer::I16(pcm) if !conversion_required && self.gain.get() == 1.0 => pcm,
            samples => {
                let mut normalized = samples.into_normalized();
                self.gain.apply(&mut normalized);
                match self.converter.to_canonical(normalized, channels, sample_rate) {
                    Ok(pcm) => pcm,
                    Err(e) => {
                        self.stats.record_conversion_drop();
                        log::trace!("Dropping block: {}", e);
                        return Err(e);
                    }
                }
            }
        };

        let amplitude = LoudnessMeter::rms(&pcm);
        self.stats.record_levels(amplitude, LoudnessMeter::peak(&pcm));

        let event = AudioFrameEvent {
            data: self.encoder.encode(&pcm, self.transport),
            amplitude,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            captured_at,
        };
        Ok(self.sink.deliver(event))
    }
}
