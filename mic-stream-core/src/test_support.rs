//! Scripted hardware and recording collaborators for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioBlock, AudioSource, NativeFormat};
use crate::models::error::CaptureError;
use crate::models::state::FocusEvent;
use crate::traits::capture_provider::{AudioBlockCallback, CaptureProvider, StreamErrorCallback, StreamRequest};
use crate::traits::focus::{FocusEventSender, FocusManager};
use crate::traits::keep_alive::{KeepAliveProvider, KeepAliveToken};
use crate::traits::permission::{PermissionProvider, PermissionStatus};

/// Shared view into a `ScriptedProvider`, kept by the test after the provider moves.
pub struct ProviderProbe {
    available: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_next_start: Mutex<Option<CaptureError>>,
    callbacks: Mutex<Option<(AudioBlockCallback, StreamErrorCallback)>>,
    native: Mutex<NativeFormat>,
}

impl ProviderProbe {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> bool {
        self.callbacks.lock().is_some()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_native_format(&self, format: NativeFormat) {
        *self.native.lock() = format;
    }

    pub fn fail_next_start(&self, error: CaptureError) {
        *self.fail_next_start.lock() = Some(error);
    }

    pub fn block_callback(&self) -> Option<AudioBlockCallback> {
        self.callbacks.lock().as_ref().map(|(on_block, _)| Arc::clone(on_block))
    }

    /// Deliver a block as the audio thread would. `false` if no stream is open.
    pub fn emit(&self, block: AudioBlock) -> bool {
        match self.block_callback() {
            Some(callback) => {
                callback(block);
                true
            }
            None => false,
        }
    }

    /// Report a mid-stream hardware failure.
    pub fn fail_stream(&self, reason: &str) -> bool {
        let on_error = self.callbacks.lock().as_ref().map(|(_, on_error)| Arc::clone(on_error));
        match on_error {
            Some(callback) => {
                callback(CaptureError::HardwareUnavailable(reason.into()));
                true
            }
            None => false,
        }
    }
}

pub struct ScriptedProvider {
    probe: Arc<ProviderProbe>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(ProviderProbe {
                available: AtomicBool::new(true),
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                fail_next_start: Mutex::new(None),
                callbacks: Mutex::new(None),
                native: Mutex::new(NativeFormat::canonical()),
            }),
        }
    }

    pub fn probe(&self) -> &Arc<ProviderProbe> {
        &self.probe
    }
}

impl CaptureProvider for ScriptedProvider {
    fn is_available(&self) -> bool {
        self.probe.available.load(Ordering::SeqCst)
    }

    fn start(
        &mut self,
        _request: StreamRequest,
        on_block: AudioBlockCallback,
        on_error: StreamErrorCallback,
    ) -> Result<NativeFormat, CaptureError> {
        if let Some(error) = self.probe.fail_next_start.lock().take() {
            return Err(error);
        }
        let mut callbacks = self.probe.callbacks.lock();
        assert!(callbacks.is_none(), "hardware stream opened twice");
        *callbacks = Some((on_block, on_error));
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(*self.probe.native.lock())
    }

    fn stop(&mut self) {
        if self.probe.callbacks.lock().take().is_some() {
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "scripted".into(),
            name: "Scripted Microphone".into(),
            is_default: true,
        }
    }
}

pub struct FixedPermission {
    status: PermissionStatus,
    on_request: PermissionStatus,
    pub requests: AtomicUsize,
}

impl FixedPermission {
    pub fn granted() -> Arc<Self> {
        Self::with(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    pub fn with(status: PermissionStatus, on_request: PermissionStatus) -> Arc<Self> {
        Arc::new(Self {
            status,
            on_request,
            requests: AtomicUsize::new(0),
        })
    }
}

impl PermissionProvider for FixedPermission {
    fn check(&self) -> PermissionStatus {
        self.status
    }

    fn request(&self) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.on_request
    }
}

#[derive(Default)]
pub struct FocusProbe {
    deny: AtomicBool,
    sender: Mutex<Option<FocusEventSender>>,
    pub requests: AtomicUsize,
    pub abandons: AtomicUsize,
}

impl FocusProbe {
    pub fn deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// Push a focus change as the platform would. `false` if focus is not held.
    pub fn send(&self, event: FocusEvent) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(event),
            None => false,
        }
    }

    pub fn sender(&self) -> Option<FocusEventSender> {
        self.sender.lock().clone()
    }
}

pub struct RecordingFocus {
    probe: Arc<FocusProbe>,
}

impl RecordingFocus {
    pub fn new() -> (Self, Arc<FocusProbe>) {
        let probe = Arc::new(FocusProbe::default());
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

impl FocusManager for RecordingFocus {
    fn request_focus(&mut self, events: FocusEventSender) -> bool {
        self.probe.requests.fetch_add(1, Ordering::SeqCst);
        if self.probe.deny.load(Ordering::SeqCst) {
            return false;
        }
        *self.probe.sender.lock() = Some(events);
        true
    }

    fn abandon_focus(&mut self) {
        self.probe.abandons.fetch_add(1, Ordering::SeqCst);
        self.probe.sender.lock().take();
    }
}

#[derive(Default)]
pub struct CountingKeepAlive {
    next_id: AtomicU64,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingKeepAlive {
    pub fn held(&self) -> usize {
        self.acquired.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

impl KeepAliveProvider for CountingKeepAlive {
    fn acquire(&self) -> KeepAliveToken {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        KeepAliveToken::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn release(&self, _token: KeepAliveToken) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
