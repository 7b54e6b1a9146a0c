//! cpal microphone capture provider.
//!
//! Opens an input stream on the default (or a named) device and delivers
//! blocks through the core's `AudioBlockCallback`. Prefers 16 kHz mono i16
//! and falls back to the device's default format.

use std::thread;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, SupportedBufferSize, SupportedStreamConfig};
use crossbeam_channel::{bounded, Sender};

use mic_stream_core::models::audio_models::{AudioBlock, AudioSource, NativeFormat, SampleBuffer, SampleFormat};
use mic_stream_core::models::error::CaptureError;
use mic_stream_core::traits::capture_provider::{
    AudioBlockCallback, CaptureProvider, StreamErrorCallback, StreamRequest,
};

use crate::device_enumerator::DeviceEnumerator;

/// A running stream: the thread that owns it and the channel that parks it.
struct StreamWorker {
    stop_tx: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// cpal microphone capture.
///
/// `cpal::Stream` is not `Send` on every host, so each stream lives on its own
/// thread: built and played there, then parked until `stop`.
pub struct CpalMicCapture {
    device_name: Option<String>,
    worker: Option<StreamWorker>,
}

impl CpalMicCapture {
    /// Capture from the system default microphone.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            worker: None,
        }
    }

    /// Capture from a specific microphone by name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            worker: None,
        }
    }
}

impl CaptureProvider for CpalMicCapture {
    fn is_available(&self) -> bool {
        DeviceEnumerator::new()
            .find_input_device(self.device_name.as_deref())
            .is_ok()
    }

    fn start(
        &mut self,
        request: StreamRequest,
        on_block: AudioBlockCallback,
        on_error: StreamErrorCallback,
    ) -> Result<NativeFormat, CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let (ready_tx, ready_rx) = bounded::<Result<NativeFormat, CaptureError>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let device_name = self.device_name.clone();

        let handle = thread::Builder::new()
            .name("cpal-mic-capture".into())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), request, on_block, on_error) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Returns on stop or when the provider is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| CaptureError::HardwareUnavailable(format!("failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                self.worker = Some(StreamWorker { stop_tx, handle });
                Ok(format)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::HardwareUnavailable("capture thread exited during setup".into()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }

    fn device_info(&self) -> AudioSource {
        let enumerator = DeviceEnumerator::new();
        let default_name = enumerator.default_input_name();
        let name = self
            .device_name
            .clone()
            .or_else(|| default_name.clone())
            .unwrap_or_else(|| "Default Microphone".into());
        AudioSource {
            id: name.clone(),
            is_default: self.device_name.is_none() || default_name.as_deref() == Some(name.as_str()),
            name,
        }
    }
}

impl Drop for CpalMicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pick the requested format if the device supports it, else its default.
fn choose_config(device: &cpal::Device, request: StreamRequest) -> Result<SupportedStreamConfig, CaptureError> {
    if let Ok(ranges) = device.supported_input_configs() {
        for range in ranges {
            if range.channels() == request.channels
                && range.sample_format() == cpal::SampleFormat::I16
                && range.min_sample_rate().0 <= request.sample_rate
                && request.sample_rate <= range.max_sample_rate().0
            {
                return Ok(range.with_sample_rate(SampleRate(request.sample_rate)));
            }
        }
    }
    device
        .default_input_config()
        .map_err(|e| CaptureError::HardwareUnavailable(format!("no usable input config: {}", e)))
}

fn buffer_size(supported: &SupportedStreamConfig, frames: u32) -> BufferSize {
    match supported.buffer_size() {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => BufferSize::Fixed(frames),
        _ => BufferSize::Default,
    }
}

fn error_handler(on_error: StreamErrorCallback) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        log::error!("Input stream error: {}", err);
        on_error(CaptureError::HardwareUnavailable(err.to_string()));
    }
}

/// Build and play the input stream. Runs on the capture thread.
fn open_stream(
    device_name: Option<&str>,
    request: StreamRequest,
    on_block: AudioBlockCallback,
    on_error: StreamErrorCallback,
) -> Result<(cpal::Stream, NativeFormat), CaptureError> {
    let device = DeviceEnumerator::new().find_input_device(device_name)?;
    let supported = choose_config(&device, request)?;

    let mut config = supported.config();
    config.buffer_size = buffer_size(&supported, request.buffer_frames);
    let channels = config.channels;
    let rate = config.sample_rate.0;

    let build_err =
        |e: cpal::BuildStreamError| CaptureError::HardwareUnavailable(format!("failed to build input stream: {}", e));

    let (stream, sample_format) = match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        on_block(AudioBlock::new(SampleBuffer::F32(data.to_vec()), channels, rate));
                    },
                    error_handler(on_error),
                    None,
                )
                .map_err(build_err)?;
            (stream, SampleFormat::F32)
        }
        cpal::SampleFormat::I16 => {
            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        on_block(AudioBlock::new(SampleBuffer::I16(data.to_vec()), channels, rate));
                    },
                    error_handler(on_error),
                    None,
                )
                .map_err(build_err)?;
            (stream, SampleFormat::I16)
        }
        cpal::SampleFormat::U16 => {
            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        let samples = data.iter().map(|&s| u16_to_i16(s)).collect();
                        on_block(AudioBlock::new(SampleBuffer::I16(samples), channels, rate));
                    },
                    error_handler(on_error),
                    None,
                )
                .map_err(build_err)?;
            (stream, SampleFormat::I16)
        }
        other => {
            return Err(CaptureError::HardwareUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| CaptureError::HardwareUnavailable(format!("failed to start input stream: {}", e)))?;

    let format = NativeFormat::new(rate, channels, sample_format);
    log::info!(
        "Opened input stream: {} Hz, {} ch, {:?}, buffer {:?}",
        rate,
        channels,
        sample_format,
        config.buffer_size
    );
    Ok((stream, format))
}

/// Re-center an unsigned sample around zero.
fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32768) as i16
}
