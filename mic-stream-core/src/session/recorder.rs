use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::delivery::event_sink::{EventSink, Subscription};
use crate::models::audio_models::PipelineDiagnostics;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::state::{RecordingState, StateCell};
use crate::processing::gain::GainStage;
use crate::processing::stats::PipelineStats;
use crate::session::lifecycle::{Collaborators, LifecycleGuard};
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::focus::LifecycleMessage;

enum Command {
    Start(Sender<Result<(), CaptureError>>),
    Stop(Sender<()>),
    Shutdown,
}

/// Command surface for one recorder instance.
///
/// Owns a `LifecycleGuard` on a dedicated thread that serializes commands,
/// focus events and stream failures. Gain, subscription and state reads go
/// straight to shared lock-free state.
///
/// ```ignore
/// let recorder = Recorder::spawn(provider, collaborators, CaptureConfig::default())?;
/// let frames = recorder.subscribe();
/// recorder.start_recording()?;
/// recorder.set_gain(1.5);
/// ```
pub struct Recorder {
    commands: Sender<Command>,
    sink: Arc<EventSink>,
    gain: Arc<GainStage>,
    state: Arc<StateCell>,
    stats: Arc<PipelineStats>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Recorder {
    pub fn spawn<P>(provider: P, collaborators: Collaborators, config: CaptureConfig) -> Result<Self, CaptureError>
    where
        P: CaptureProvider + 'static,
    {
        let guard = LifecycleGuard::new(provider, collaborators, config)?;
        let sink = guard.sink();
        let gain = guard.gain();
        let state = guard.state_cell();
        let stats = guard.stats();
        let messages = guard.messages();
        let (commands, command_rx) = bounded(8);

        let worker = thread::Builder::new()
            .name("mic-stream-lifecycle".into())
            .spawn(move || supervise(guard, command_rx, messages))
            .map_err(|e| CaptureError::Internal(format!("failed to spawn lifecycle thread: {}", e)))?;

        Ok(Self {
            commands,
            sink,
            gain,
            state,
            stats,
            worker: Some(worker),
        })
    }

    /// Start capturing. Errors are reported synchronously and not retried.
    pub fn start_recording(&self) -> Result<(), CaptureError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(Command::Start(reply_tx))
            .map_err(|_| CaptureError::Internal("lifecycle thread exited".into()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::Internal("lifecycle thread exited".into()))?
    }

    /// Stop capturing. Idempotent; returns once the hardware is released.
    pub fn stop_recording(&self) {
        let (reply_tx, reply_rx) = bounded(1);
        if self.commands.send(Command::Stop(reply_tx)).is_ok() {
            let _ = reply_rx.recv();
        }
    }

    /// Fire-and-forget gain change, effective from the next block.
    pub fn set_gain(&self, value: f32) {
        self.gain.set(value);
    }

    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    /// Attach the consumer, replacing any previous one.
    pub fn subscribe(&self) -> Subscription {
        self.sink.subscribe()
    }

    pub fn unsubscribe(&self) -> bool {
        self.sink.unsubscribe()
    }

    pub fn state(&self) -> RecordingState {
        self.state.load()
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        self.stats.snapshot()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn supervise<P: CaptureProvider>(
    mut guard: LifecycleGuard<P>,
    commands: Receiver<Command>,
    messages: Receiver<LifecycleMessage>,
) {
    loop {
        select! {
            recv(commands) -> command => match command {
                Ok(Command::Start(reply)) => {
                    let _ = reply.send(guard.start());
                }
                Ok(Command::Stop(reply)) => {
                    guard.stop();
                    let _ = reply.send(());
                }
                Ok(Command::Shutdown) | Err(_) => break,
            },
            recv(messages) -> message => {
                if let Ok(message) = message {
                    guard.handle_message(message);
                }
            }
        }
    }
    guard.stop();
    log::debug!("Lifecycle thread exiting");
}
