use crate::models::config::CANONICAL_SAMPLE_RATE;
use crate::models::error::CaptureError;

/// Converts normalized interleaved float audio to canonical 16 kHz mono PCM16.
///
/// Stages, each skipped when already in the target shape:
/// 1. downmix by averaging all channels per frame
/// 2. linear-interpolation resample, `out = round(in * target / source)` frames
/// 3. clamp to `[-1.0, 1.0]`, scale by 32767, round half away from zero
#[derive(Debug, Clone)]
pub struct FormatConverter {
    pub target_sample_rate: u32,
}

impl FormatConverter {
    pub fn new() -> Self {
        Self {
            target_sample_rate: CANONICAL_SAMPLE_RATE,
        }
    }

    /// Run the full conversion for one block.
    pub fn to_canonical(
        &self,
        samples: Vec<f32>,
        channels: u16,
        source_sample_rate: u32,
    ) -> Result<Vec<i16>, CaptureError> {
        if channels == 0 {
            return Err(CaptureError::InternalConversionError("zero channel count".into()));
        }
        if source_sample_rate == 0 {
            return Err(CaptureError::InternalConversionError("zero source sample rate".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(CaptureError::InternalConversionError(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        let mono = if channels > 1 {
            downmix_to_mono(&samples, channels as usize)
        } else {
            samples
        };
        let resampled = self.resample(mono, source_sample_rate);
        Ok(resampled.iter().map(|&s| quantize(s)).collect())
    }

    /// Linear interpolation resampling for mono audio.
    pub fn resample(&self, samples: Vec<f32>, source_sample_rate: u32) -> Vec<f32> {
        if source_sample_rate == self.target_sample_rate || samples.is_empty() {
            return samples;
        }

        let output_count = output_frames(samples.len(), source_sample_rate, self.target_sample_rate);
        let step = source_sample_rate as f64 / self.target_sample_rate as f64;
        let last = samples.len() - 1;

        let mut output = Vec::with_capacity(output_count);
        for i in 0..output_count {
            let position = i as f64 * step;
            let index = (position as usize).min(last);
            let fraction = (position - index as f64).clamp(0.0, 1.0) as f32;
            let next = samples[(index + 1).min(last)];
            output.push(samples[index] * (1.0 - fraction) + next * fraction);
        }
        output
    }
}

impl Default for FormatConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame count after resampling: `round(in_frames * target / source)`.
pub fn output_frames(in_frames: usize, source_rate: u32, target_rate: u32) -> usize {
    if source_rate == 0 {
        return 0;
    }
    (in_frames as f64 * target_rate as f64 / source_rate as f64).round() as usize
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Quantize one normalized sample to PCM16. NaN maps to silence.
pub fn quantize(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    // f32::round rounds half away from zero.
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
