//! Input device enumeration via the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};

use mic_stream_core::models::audio_models::AudioSource;
use mic_stream_core::models::error::CaptureError;

/// Input device enumerator for the platform's default audio host.
pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List input (microphone) devices. cpal exposes no stable device ID, so
    /// the name doubles as the ID.
    pub fn list_input_devices(&self) -> Result<Vec<AudioSource>, CaptureError> {
        let default_name = self.default_input_name();
        let devices = self
            .host
            .input_devices()
            .map_err(|e| CaptureError::HardwareUnavailable(format!("failed to enumerate devices: {}", e)))?;

        let mut sources = Vec::new();
        for device in devices {
            let name = match device.name() {
                Ok(name) => name,
                Err(e) => {
                    log::debug!("Skipping input device without a name: {}", e);
                    continue;
                }
            };
            sources.push(AudioSource {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            });
        }
        Ok(sources)
    }

    pub fn default_input_name(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    /// Resolve a device by name, or the default input device.
    pub fn find_input_device(&self, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
        let Some(name) = name else {
            return self
                .host
                .default_input_device()
                .ok_or_else(|| CaptureError::HardwareUnavailable("no default input device".into()));
        };

        let mut devices = self
            .host
            .input_devices()
            .map_err(|e| CaptureError::HardwareUnavailable(format!("failed to enumerate devices: {}", e)))?;
        devices
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::HardwareUnavailable(format!("input device not found: {}", name)))
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}
