/// Loudness metrics over canonical PCM16 blocks.
pub struct LoudnessMeter;

impl LoudnessMeter {
    /// Normalized RMS: `sqrt(mean(s^2)) / 32767`, clamped to `[0.0, 1.0]`.
    pub fn rms(samples: &[i16]) -> f32 {
        // Guard against 0/0 on empty blocks.
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_sq / samples.len() as f64).sqrt() / i16::MAX as f64;
        rms.clamp(0.0, 1.0) as f32
    }

    /// Peak absolute level, normalized and clamped like `rms`.
    pub fn peak(samples: &[i16]) -> f32 {
        let peak = samples.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0);
        (peak as f32 / i16::MAX as f32).clamp(0.0, 1.0)
    }
}
