use std::sync::Arc;

use crate::models::audio_models::{AudioBlock, AudioSource, NativeFormat};
use crate::models::error::CaptureError;

/// Callback invoked with each captured block, on the platform audio thread.
pub type AudioBlockCallback = Arc<dyn Fn(AudioBlock) + Send + Sync + 'static>;

/// Callback invoked when the running stream fails (device unplugged, read error).
pub type StreamErrorCallback = Arc<dyn Fn(CaptureError) + Send + Sync + 'static>;

/// Format the core asks the hardware for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_frames: u32,
}

/// Interface for platform-specific microphone sources.
///
/// Implemented by `CpalMicCapture` in `mic-stream-cpal`.
pub trait CaptureProvider: Send {
    /// Whether an input device is currently present.
    fn is_available(&self) -> bool;

    /// Open the hardware and begin delivering blocks via `on_block`.
    ///
    /// If `request` cannot be honored the provider opens the native format
    /// instead and reports it in the returned `NativeFormat`.
    fn start(
        &mut self,
        request: StreamRequest,
        on_block: AudioBlockCallback,
        on_error: StreamErrorCallback,
    ) -> Result<NativeFormat, CaptureError>;

    /// Stop delivering blocks and release the hardware. Idempotent.
    fn stop(&mut self);

    /// Information about the device backing this provider.
    fn device_info(&self) -> AudioSource;
}
