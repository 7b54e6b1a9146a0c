//! # mic-stream-core
//!
//! Platform-agnostic microphone streaming core.
//!
//! Captures blocks from a platform `CaptureProvider`, applies gain, converts to
//! canonical 16 kHz mono PCM16, meters loudness, encodes for transport, and
//! hands each frame to a single subscriber. A lifecycle state machine reacts to
//! permission, audio focus and keep-alive concerns. Platform backends (cpal,
//! or native mobile bindings) implement the traits and plug into `Recorder`.
//!
//! ## Architecture
//!
//! ```text
//! mic-stream-core (this crate)
//! ├── traits/       ← CaptureProvider, PermissionProvider, FocusManager, KeepAliveProvider
//! ├── models/       ← CaptureError, CaptureConfig, RecordingState, AudioBlock, AudioFrameEvent
//! ├── processing/   ← GainStage, FormatConverter, LoudnessMeter, FrameEncoder, BlockPipeline
//! ├── delivery/     ← EventSink, Subscription
//! └── session/      ← CaptureSession, LifecycleGuard, Recorder
//! ```

pub mod delivery;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use delivery::event_sink::{DeliveryOutcome, EventSink, Subscription};
pub use models::audio_models::{AudioBlock, AudioSource, NativeFormat, PipelineDiagnostics, SampleBuffer, SampleFormat};
pub use models::config::{CaptureConfig, TransportMode};
pub use models::error::CaptureError;
pub use models::frame::{AudioFrameEvent, EncodedFrame, SessionNotice};
pub use models::state::{FocusEvent, RecordingState, SessionEnd};
pub use processing::converter::FormatConverter;
pub use processing::encoder::FrameEncoder;
pub use processing::gain::GainStage;
pub use processing::loudness::LoudnessMeter;
pub use session::capture::{CaptureHandle, CaptureSession};
pub use session::lifecycle::{Collaborators, LifecycleGuard};
pub use session::recorder::Recorder;
pub use traits::capture_provider::{AudioBlockCallback, CaptureProvider, StreamErrorCallback, StreamRequest};
pub use traits::focus::{FocusEventSender, FocusManager, LifecycleMessage};
pub use traits::keep_alive::{KeepAliveGuard, KeepAliveProvider, KeepAliveToken};
pub use traits::permission::{PermissionProvider, PermissionStatus};
