//! Microphone permission check for hosts without a consent prompt.
//!
//! Desktop hosts expose no per-app consent dialog through cpal. Access is
//! treated as granted when the default input device can report its
//! configuration; mobile OS privacy denials surface there as errors.

use cpal::traits::DeviceTrait;

use mic_stream_core::traits::permission::{PermissionProvider, PermissionStatus};

use crate::device_enumerator::DeviceEnumerator;

#[derive(Debug, Default)]
pub struct ProbePermission {
    device_name: Option<String>,
}

impl ProbePermission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe a specific device instead of the default one.
    pub fn for_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }
}

impl PermissionProvider for ProbePermission {
    fn check(&self) -> PermissionStatus {
        let device = match DeviceEnumerator::new().find_input_device(self.device_name.as_deref()) {
            Ok(device) => device,
            Err(e) => {
                log::warn!("Microphone unavailable: {}", e);
                return PermissionStatus::Denied;
            }
        };
        match device.default_input_config() {
            Ok(_) => PermissionStatus::Granted,
            Err(e) => {
                log::warn!("Microphone access denied: {}", e);
                PermissionStatus::Denied
            }
        }
    }

    fn request(&self) -> PermissionStatus {
        // Nothing to prompt; re-probe in case the user changed settings.
        self.check()
    }
}
