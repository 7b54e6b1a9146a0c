use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::audio_models::NativeFormat;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::processing::pipeline::BlockPipeline;
use crate::processing::stats::PipelineStats;
use crate::traits::capture_provider::{AudioBlockCallback, CaptureProvider, StreamErrorCallback, StreamRequest};

/// Identifies one opened hardware stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle {
    pub session_id: Uuid,
    pub native_format: NativeFormat,
}

/// Admission gate between the audio thread and `stop`.
///
/// Admits at most one block at a time and, once closed, admits none. `stop`
/// closes the gate and waits for the admitted block to leave before the
/// hardware is released.
#[derive(Debug)]
struct CallbackGate {
    accepting: AtomicBool,
    busy: AtomicBool,
}

enum Rejected {
    Busy,
    Closed,
}

struct Admission<'a>(&'a CallbackGate);

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

impl CallbackGate {
    fn open() -> Self {
        Self {
            accepting: AtomicBool::new(true),
            busy: AtomicBool::new(false),
        }
    }

    fn enter(&self) -> Result<Admission<'_>, Rejected> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Rejected::Busy);
        }
        // SeqCst pairs with `close` + `wait_idle`: either stop sees us busy, or we see it closed.
        if !self.accepting.load(Ordering::SeqCst) {
            self.busy.store(false, Ordering::SeqCst);
            return Err(Rejected::Closed);
        }
        Ok(Admission(self))
    }

    fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.busy.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

/// Owns the microphone through a `CaptureProvider`.
///
/// Blocks delivered by the provider are run through the `BlockPipeline`
/// inline on the audio thread.
pub struct CaptureSession<P: CaptureProvider> {
    provider: P,
    active: Option<(CaptureHandle, Arc<CallbackGate>)>,
    stats: Arc<PipelineStats>,
}

impl<P: CaptureProvider> CaptureSession<P> {
    pub fn new(provider: P, stats: Arc<PipelineStats>) -> Self {
        Self {
            provider,
            active: None,
            stats,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn handle(&self) -> Option<&CaptureHandle> {
        self.active.as_ref().map(|(handle, _)| handle)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Open the hardware. Permission must already be granted.
    ///
    /// Fails with `AlreadyActive`, without side effects, if a stream is open.
    pub fn start(
        &mut self,
        config: &CaptureConfig,
        pipeline: Arc<BlockPipeline>,
        on_error: StreamErrorCallback,
    ) -> Result<CaptureHandle, CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        if !self.provider.is_available() {
            return Err(CaptureError::HardwareUnavailable("no input device".into()));
        }

        // A fresh gate per stream, so a straggling callback from an earlier stream stays shut out.
        let gate = Arc::new(CallbackGate::open());
        let on_block: AudioBlockCallback = {
            let gate = Arc::clone(&gate);
            let stats = Arc::clone(&self.stats);
            Arc::new(move |block| match gate.enter() {
                Ok(_admission) => {
                    // Failures are counted in stats; the block is simply dropped.
                    let _ = pipeline.process(block);
                }
                Err(Rejected::Busy) => stats.record_in_flight_drop(),
                Err(Rejected::Closed) => {}
            })
        };

        let request = StreamRequest {
            sample_rate: config.sample_rate,
            channels: config.channels,
            buffer_frames: config.buffer_frames,
        };
        let native_format = match self.provider.start(request, on_block, on_error) {
            Ok(format) => format,
            Err(e) => {
                gate.close();
                return Err(e);
            }
        };

        let handle = CaptureHandle {
            session_id: Uuid::new_v4(),
            native_format,
        };
        if native_format.conversion_required {
            log::info!(
                "Capture {} opened native format {} Hz x{} {:?}, converting",
                handle.session_id,
                native_format.sample_rate,
                native_format.channels,
                native_format.sample_format
            );
        } else {
            log::info!("Capture {} opened canonical format", handle.session_id);
        }

        self.active = Some((handle.clone(), gate));
        Ok(handle)
    }

    /// Release the hardware. Idempotent; waits up to `timeout` for an
    /// in-flight block before doing so. Returns whether a stream was open.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some((handle, gate)) = self.active.take() else {
            return false;
        };

        gate.close();
        if !gate.wait_idle(timeout) {
            log::warn!(
                "Capture {}: in-flight block still running after {:?}",
                handle.session_id,
                timeout
            );
        }
        self.provider.stop();
        log::info!("Capture {} stopped", handle.session_id);
        true
    }
}
