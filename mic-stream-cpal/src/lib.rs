//! # mic-stream-cpal
//!
//! Desktop backend for mic-stream, built on cpal.
//!
//! Provides:
//! - `CpalMicCapture` - microphone capture via the host's default audio API
//! - `DeviceEnumerator` - input device listing and lookup
//! - `ProbePermission` - permission check by opening the device's config
//! - `ExclusiveFocus` / `ProcessKeepAlive` - desktop focus and keep-alive
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use mic_stream_core::{CaptureConfig, Collaborators, Recorder};
//! use mic_stream_cpal::{CpalMicCapture, ExclusiveFocus, ProbePermission, ProcessKeepAlive};
//!
//! let (focus, _relay) = ExclusiveFocus::new();
//! let collaborators = Collaborators {
//!     permission: Arc::new(ProbePermission::new()),
//!     focus: Box::new(focus),
//!     keep_alive: Arc::new(ProcessKeepAlive::new()),
//! };
//! let recorder = Recorder::spawn(CpalMicCapture::default_device(), collaborators, CaptureConfig::default())?;
//! let subscription = recorder.subscribe();
//! recorder.start_recording()?;
//! ```

pub mod cpal_mic;
pub mod device_enumerator;
pub mod permissions;
pub mod platform;

pub use cpal_mic::CpalMicCapture;
pub use device_enumerator::DeviceEnumerator;
pub use permissions::ProbePermission;
pub use platform::{ExclusiveFocus, FocusRelay, ProcessKeepAlive};
