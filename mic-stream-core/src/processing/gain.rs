use std::sync::atomic::{AtomicU32, Ordering};

/// Live-adjustable linear gain with hard clamping.
///
/// The gain is a single `f32` stored as bits in an `AtomicU32`, so the capture
/// callback reads it without locking. A new value applies from the next block.
#[derive(Debug)]
pub struct GainStage {
    gain_bits: AtomicU32,
}

impl GainStage {
    pub fn new(initial: f32) -> Self {
        let initial = if Self::is_valid(initial) { initial } else { 1.0 };
        Self {
            gain_bits: AtomicU32::new(initial.to_bits()),
        }
    }

    fn is_valid(value: f32) -> bool {
        value.is_finite() && value > 0.0
    }

    /// Replace the gain. Non-positive or non-finite values are ignored.
    pub fn set(&self, value: f32) -> bool {
        if !Self::is_valid(value) {
            log::warn!("Ignoring invalid gain {}", value);
            return false;
        }
        self.gain_bits.store(value.to_bits(), Ordering::Relaxed);
        true
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    /// Scale normalized samples in place and clamp to `[-1.0, 1.0]`.
    ///
    /// Returns the gain that was applied; it is read once per block.
    pub fn apply(&self, samples: &mut [f32]) -> f32 {
        let gain = self.get();
        for sample in samples.iter_mut() {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
        gain
    }
}

impl Default for GainStage {
    fn default() -> Self {
        Self::new(1.0)
    }
}
