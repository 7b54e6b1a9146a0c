use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::delivery::event_sink::EventSink;
use crate::models::audio_models::PipelineDiagnostics;
use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::frame::SessionNotice;
use crate::models::state::{FocusEvent, RecordingState, SessionEnd, StateCell};
use crate::processing::gain::GainStage;
use crate::processing::pipeline::BlockPipeline;
use crate::processing::stats::PipelineStats;
use crate::session::capture::CaptureSession;
use crate::traits::capture_provider::{CaptureProvider, StreamErrorCallback};
use crate::traits::focus::{FocusEventSender, FocusManager, LifecycleMessage, TerminalLatch};
use crate::traits::keep_alive::{KeepAliveGuard, KeepAliveProvider};
use crate::traits::permission::{PermissionProvider, PermissionStatus};

/// Platform capabilities the lifecycle depends on.
pub struct Collaborators {
    pub permission: Arc<dyn PermissionProvider>,
    pub focus: Box<dyn FocusManager>,
    pub keep_alive: Arc<dyn KeepAliveProvider>,
}

/// Interruption-aware recording state machine.
///
/// The single owner of `RecordingState`, the hardware session and the
/// keep-alive token. Focus changes and stream failures reach it as
/// `LifecycleMessage`s on a bounded queue, consumed by whoever owns the guard
/// (`Recorder` runs it on a dedicated thread).
///
/// Transitions:
/// ```text
/// Idle        --start-->          Starting --> Active
/// Active      --LostTransient-->  Interrupted   (hardware released)
/// Interrupted --Gained-->         Active        (hardware reopened)
/// non-Idle    --LostPermanent-->  Idle          (Ended(FocusLost))
/// Active      --stream failure--> Idle          (Ended(TerminatedByError))
/// any         --stop-->           Idle          (Ended(Stopped))
/// ```
pub struct LifecycleGuard<P: CaptureProvider> {
    config: CaptureConfig,
    capture: CaptureSession<P>,
    pipeline: Arc<BlockPipeline>,
    sink: Arc<EventSink>,
    gain: Arc<GainStage>,
    stats: Arc<PipelineStats>,
    permission: Arc<dyn PermissionProvider>,
    focus: Box<dyn FocusManager>,
    keep_alive: Arc<dyn KeepAliveProvider>,
    keep_alive_guard: Option<KeepAliveGuard>,
    state: RecordingState,
    state_cell: Arc<StateCell>,
    /// Bumped per recording session; tags focus events.
    session_generation: u64,
    /// Bumped per opened hardware stream; tags stream failures.
    stream_epoch: u64,
    messages_tx: Sender<LifecycleMessage>,
    messages_rx: Receiver<LifecycleMessage>,
    terminal: Arc<TerminalLatch>,
}

impl<P: CaptureProvider> LifecycleGuard<P> {
    pub fn new(provider: P, collaborators: Collaborators, config: CaptureConfig) -> Result<Self, CaptureError> {
        config.validate()?;

        let stats = Arc::new(PipelineStats::default());
        let sink = Arc::new(EventSink::new(Arc::clone(&stats)));
        let gain = Arc::new(GainStage::new(config.gain));
        let pipeline = Arc::new(BlockPipeline::new(
            Arc::clone(&gain),
            Arc::clone(&sink),
            config.transport,
            Arc::clone(&stats),
        ));
        let (messages_tx, messages_rx) = bounded(config.lifecycle_queue_capacity);

        Ok(Self {
            capture: CaptureSession::new(provider, Arc::clone(&stats)),
            config,
            pipeline,
            sink,
            gain,
            stats,
            permission: collaborators.permission,
            focus: collaborators.focus,
            keep_alive: collaborators.keep_alive,
            keep_alive_guard: None,
            state: RecordingState::Idle,
            state_cell: Arc::new(StateCell::default()),
            session_generation: 0,
            stream_epoch: 0,
            messages_tx,
            messages_rx,
            terminal: Arc::new(TerminalLatch::default()),
        })
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Cell other threads read the state from.
    pub fn state_cell(&self) -> Arc<StateCell> {
        Arc::clone(&self.state_cell)
    }

    pub fn sink(&self) -> Arc<EventSink> {
        Arc::clone(&self.sink)
    }

    pub fn gain(&self) -> Arc<GainStage> {
        Arc::clone(&self.gain)
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        self.stats.snapshot()
    }

    pub(crate) fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn capture(&self) -> &CaptureSession<P> {
        &self.capture
    }

    /// Receiver for focus events and stream failures, for `select!` loops.
    pub fn messages(&self) -> Receiver<LifecycleMessage> {
        self.messages_rx.clone()
    }

    /// Begin recording: permission, keep-alive, focus, then hardware.
    ///
    /// Any failure unwinds what was acquired and leaves the guard `Idle`.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if !self.state.is_idle() {
            log::warn!("Start requested while {:?}", self.state);
            return Err(CaptureError::AlreadyActive);
        }

        if self.permission.check() != PermissionStatus::Granted
            && self.permission.request() != PermissionStatus::Granted
        {
            log::warn!("Microphone permission denied");
            return Err(CaptureError::NoPermission);
        }

        self.session_generation += 1;
        self.keep_alive_guard = Some(KeepAliveGuard::acquire(Arc::clone(&self.keep_alive)));
        self.set_state(RecordingState::Starting);

        let sender = FocusEventSender::new(
            self.session_generation,
            self.messages_tx.clone(),
            Arc::clone(&self.terminal),
        );
        if !self.focus.request_focus(sender) {
            log::warn!("Audio focus denied");
            self.abort_start();
            return Err(CaptureError::FocusDenied);
        }

        if let Err(e) = self.open_stream() {
            log::error!("Failed to open capture: {}", e);
            self.focus.abandon_focus();
            self.abort_start();
            return Err(e);
        }

        self.set_state(RecordingState::Active);
        Ok(())
    }

    /// End recording. Always succeeds; a no-op while `Idle`.
    pub fn stop(&mut self) {
        if self.state.is_idle() {
            return;
        }
        self.teardown(SessionEnd::Stopped);
    }

    /// Handle one queued message, then any latched terminal event.
    pub fn handle_message(&mut self, message: LifecycleMessage) {
        self.dispatch(message);
        self.handle_latched();
    }

    fn dispatch(&mut self, message: LifecycleMessage) {
        match message {
            LifecycleMessage::Focus { generation, event } => {
                if generation != self.session_generation {
                    log::debug!("Ignoring {:?} from session {}", event, generation);
                    return;
                }
                self.handle_focus_event(event);
            }
            LifecycleMessage::StreamFailed { generation, reason } => {
                if generation != self.stream_epoch {
                    log::debug!("Ignoring failure of stale stream {}: {}", generation, reason);
                    return;
                }
                self.handle_stream_failure(reason);
            }
        }
    }

    /// Drain queued lifecycle messages. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.messages_rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        self.handle_latched();
        handled
    }

    /// Act on a permanent focus loss or stream failure that was latched for
    /// the current session, whether or not its queued message got through.
    /// Returns whether the session was torn down.
    pub fn handle_latched(&mut self) -> bool {
        if self.state.is_idle() {
            return false;
        }
        if self.terminal.focus_lost(self.session_generation) {
            self.handle_focus_event(FocusEvent::LostPermanent);
        } else if self.state.is_active() && self.terminal.stream_failed(self.stream_epoch) {
            self.handle_stream_failure("stream failure latched while lifecycle queue was full".into());
        }
        self.state.is_idle()
    }

    pub fn handle_focus_event(&mut self, event: FocusEvent) {
        match (self.state, event) {
            (
                RecordingState::Starting | RecordingState::Active | RecordingState::Interrupted,
                FocusEvent::LostPermanent,
            ) => {
                log::info!("Audio focus lost permanently");
                self.teardown(SessionEnd::FocusLost);
            }
            (RecordingState::Active, FocusEvent::LostTransient) => {
                log::info!("Audio focus lost transiently, releasing hardware");
                self.capture.stop(self.stop_timeout());
                self.set_state(RecordingState::Interrupted);
            }
            (RecordingState::Interrupted, FocusEvent::Gained) => {
                log::info!("Audio focus regained, reopening hardware");
                match self.open_stream() {
                    Ok(()) => self.set_state(RecordingState::Active),
                    Err(e) => {
                        log::error!("Failed to resume capture: {}", e);
                        self.teardown(SessionEnd::TerminatedByError(
                            CaptureError::SessionTerminatedByError(e.to_string()),
                        ));
                    }
                }
            }
            (state, event) => {
                log::debug!("Ignoring {:?} while {:?}", event, state);
            }
        }
    }

    fn handle_stream_failure(&mut self, reason: String) {
        if !self.state.is_active() {
            log::debug!("Ignoring stream failure while {:?}: {}", self.state, reason);
            return;
        }
        log::error!("Capture stream failed: {}", reason);
        self.teardown(SessionEnd::TerminatedByError(CaptureError::SessionTerminatedByError(reason)));
    }

    fn open_stream(&mut self) -> Result<(), CaptureError> {
        self.stream_epoch += 1;
        let on_error = self.stream_error_callback(self.stream_epoch);
        self.capture
            .start(&self.config, Arc::clone(&self.pipeline), on_error)
            .map(|_| ())
    }

    /// Stream failures are forwarded to the lifecycle queue, never handled on
    /// the audio thread.
    fn stream_error_callback(&self, epoch: u64) -> StreamErrorCallback {
        let tx = self.messages_tx.clone();
        let terminal = Arc::clone(&self.terminal);
        Arc::new(move |error: CaptureError| {
            terminal.latch_stream_failed(epoch);
            let message = LifecycleMessage::StreamFailed {
                generation: epoch,
                reason: error.to_string(),
            };
            if let Err(TrySendError::Full(_)) = tx.try_send(message) {
                log::error!("Lifecycle queue full, stream failure latched: {}", error);
            }
        })
    }

    fn abort_start(&mut self) {
        self.keep_alive_guard = None;
        self.set_state(RecordingState::Idle);
    }

    fn teardown(&mut self, reason: SessionEnd) {
        self.set_state(RecordingState::Stopping);
        self.capture.stop(self.stop_timeout());
        self.focus.abandon_focus();
        // Dropping the guard releases the token exactly once.
        self.keep_alive_guard = None;
        self.set_state(RecordingState::Idle);
        log::info!("Recording ended: {:?}", reason);
        self.sink.notify(SessionNotice::Ended(reason));
    }

    fn set_state(&mut self, state: RecordingState) {
        if self.state == state {
            return;
        }
        log::debug!("Recording state {:?} -> {:?}", self.state, state);
        debug_assert!(
            !state.holds_keep_alive() || self.keep_alive_guard.is_some(),
            "{:?} entered without a keep-alive",
            state
        );
        debug_assert!(
            !state.is_idle() || self.keep_alive_guard.is_none(),
            "Idle entered while still holding a keep-alive"
        );
        self.state = state;
        self.state_cell.store(state);
        self.sink.notify(SessionNotice::StateChanged(state));
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.config.stop_timeout_ms)
    }
}

impl<P: CaptureProvider> Drop for LifecycleGuard<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::models::audio_models::{AudioBlock, NativeFormat, SampleBuffer, SampleFormat};
    use crate::test_support::{CountingKeepAlive, FixedPermission, FocusProbe, RecordingFocus, ScriptedProvider};

    struct Harness {
        guard: LifecycleGuard<ScriptedProvider>,
        focus: Arc<FocusProbe>,
        keep_alive: Arc<CountingKeepAlive>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_permission(FixedPermission::granted())
        }

        fn with_permission(permission: Arc<FixedPermission>) -> Self {
            let (focus, focus_probe) = RecordingFocus::new();
            let keep_alive = Arc::new(CountingKeepAlive::default());
            let guard = LifecycleGuard::new(
                ScriptedProvider::new(),
                Collaborators {
                    permission,
                    focus: Box::new(focus),
                    keep_alive: Arc::clone(&keep_alive) as Arc<dyn KeepAliveProvider>,
                },
                CaptureConfig::default(),
            )
            .unwrap();
            Self {
                guard,
                focus: focus_probe,
                keep_alive,
            }
        }

        fn starts(&self) -> usize {
            self.guard.capture().provider().probe().starts()
        }

        fn stops(&self) -> usize {
            self.guard.capture().provider().probe().stops()
        }

        fn focus(&mut self, event: FocusEvent) {
            assert!(self.focus.send(event));
            assert_eq!(self.guard.process_pending(), 1);
        }
    }

    #[test]
    fn start_acquires_everything() {
        let mut h = Harness::new();
        h.guard.start().unwrap();

        assert_eq!(h.guard.state(), RecordingState::Active);
        assert_eq!(h.guard.state_cell().load(), RecordingState::Active);
        assert_eq!(h.starts(), 1);
        assert_eq!(h.keep_alive.held(), 1);
        assert_eq!(h.focus.requests.load(Ordering::SeqCst), 1);
        assert!(h.guard.capture().is_active());
    }

    #[test]
    fn double_start_is_rejected_and_first_session_survives() {
        let mut h = Harness::new();
        h.guard.start().unwrap();

        assert_eq!(h.guard.start(), Err(CaptureError::AlreadyActive));
        assert_eq!(h.guard.state(), RecordingState::Active);
        assert_eq!(h.starts(), 1);
        assert_eq!(h.keep_alive.acquired.load(Ordering::SeqCst), 1);
        assert!(h.guard.capture().is_active());
    }

    #[test]
    fn stop_while_idle_does_nothing() {
        let mut h = Harness::new();
        h.guard.stop();

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.starts(), 0);
        assert_eq!(h.stops(), 0);
        assert_eq!(h.keep_alive.acquired.load(Ordering::SeqCst), 0);
        assert_eq!(h.keep_alive.released.load(Ordering::SeqCst), 0);
        assert_eq!(h.focus.abandons.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_releases_once_and_notifies() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();
        h.guard.stop();
        h.guard.stop();

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.stops(), 1);
        assert_eq!(h.keep_alive.released.load(Ordering::SeqCst), 1);

        let notices: Vec<_> = std::iter::from_fn(|| subscription.try_recv_notice()).collect();
        assert_eq!(
            notices,
            vec![
                SessionNotice::StateChanged(RecordingState::Starting),
                SessionNotice::StateChanged(RecordingState::Active),
                SessionNotice::StateChanged(RecordingState::Stopping),
                SessionNotice::StateChanged(RecordingState::Idle),
                SessionNotice::Ended(SessionEnd::Stopped),
            ]
        );
    }

    #[test]
    fn permission_is_requested_when_not_yet_granted() {
        let permission = FixedPermission::with(PermissionStatus::Denied, PermissionStatus::Granted);
        let mut h = Harness::with_permission(Arc::clone(&permission));
        h.guard.start().unwrap();
        assert_eq!(permission.requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn denied_permission_never_touches_hardware() {
        let permission = FixedPermission::with(PermissionStatus::Denied, PermissionStatus::Denied);
        let mut h = Harness::with_permission(permission);

        assert_eq!(h.guard.start(), Err(CaptureError::NoPermission));
        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.starts(), 0);
        assert_eq!(h.keep_alive.acquired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn denied_focus_unwinds_keep_alive() {
        let mut h = Harness::new();
        h.focus.deny(true);

        assert_eq!(h.guard.start(), Err(CaptureError::FocusDenied));
        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.starts(), 0);
        assert_eq!(h.keep_alive.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(h.keep_alive.held(), 0);
    }

    #[test]
    fn hardware_failure_unwinds_focus_and_keep_alive() {
        let mut h = Harness::new();
        h.guard
            .capture()
            .provider()
            .probe()
            .fail_next_start(CaptureError::HardwareUnavailable("device busy".into()));

        assert!(matches!(h.guard.start(), Err(CaptureError::HardwareUnavailable(_))));
        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.keep_alive.held(), 0);
        assert_eq!(h.focus.abandons.load(Ordering::SeqCst), 1);

        // A later start succeeds.
        h.guard.start().unwrap();
        assert_eq!(h.guard.state(), RecordingState::Active);
    }

    #[test]
    fn transient_loss_then_gain_reopens_hardware_once() {
        let mut h = Harness::new();
        h.guard.start().unwrap();

        h.focus(FocusEvent::LostTransient);
        assert_eq!(h.guard.state(), RecordingState::Interrupted);
        assert!(!h.guard.capture().is_active());
        assert_eq!(h.keep_alive.held(), 1);

        h.focus(FocusEvent::Gained);
        assert_eq!(h.guard.state(), RecordingState::Active);
        assert_eq!(h.starts(), h.stops() + 1);
        assert_eq!(h.starts(), 2);
        assert!(h.guard.capture().provider().probe().running());
        assert_eq!(h.keep_alive.acquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_transient_events_are_harmless() {
        let mut h = Harness::new();
        h.guard.start().unwrap();

        h.focus(FocusEvent::LostTransient);
        h.focus(FocusEvent::LostTransient);
        h.focus(FocusEvent::Gained);
        h.focus(FocusEvent::Gained);

        assert_eq!(h.guard.state(), RecordingState::Active);
        assert_eq!(h.starts(), 2);
        assert_eq!(h.stops(), 1);
    }

    #[test]
    fn permanent_loss_while_active_ends_session() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();

        h.focus(FocusEvent::LostPermanent);

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.keep_alive.released.load(Ordering::SeqCst), 1);
        assert_eq!(h.stops(), 1);
        assert!(!h.guard.capture().is_active());

        let last = std::iter::from_fn(|| subscription.try_recv_notice()).last();
        assert_eq!(last, Some(SessionNotice::Ended(SessionEnd::FocusLost)));

        // The later explicit stop has nothing left to release.
        h.guard.stop();
        assert_eq!(h.keep_alive.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn permanent_loss_while_interrupted_ends_session() {
        let mut h = Harness::new();
        h.guard.start().unwrap();
        h.focus(FocusEvent::LostTransient);
        h.focus(FocusEvent::LostPermanent);

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.stops(), 1);
        assert_eq!(h.keep_alive.held(), 0);
    }

    #[test]
    fn failed_resume_terminates_with_error() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();
        h.focus(FocusEvent::LostTransient);

        h.guard
            .capture()
            .provider()
            .probe()
            .fail_next_start(CaptureError::HardwareUnavailable("gone".into()));
        h.focus(FocusEvent::Gained);

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.keep_alive.held(), 0);
        let last = std::iter::from_fn(|| subscription.try_recv_notice()).last();
        assert!(matches!(
            last,
            Some(SessionNotice::Ended(SessionEnd::TerminatedByError(
                CaptureError::SessionTerminatedByError(_)
            )))
        ));
    }

    #[test]
    fn stream_failure_forces_stop() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();

        assert!(h.guard.capture().provider().probe().fail_stream("read failed"));
        assert_eq!(h.guard.process_pending(), 1);

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.stops(), 1);
        assert_eq!(h.keep_alive.held(), 0);
        let last = std::iter::from_fn(|| subscription.try_recv_notice()).last();
        assert!(matches!(
            last,
            Some(SessionNotice::Ended(SessionEnd::TerminatedByError(_)))
        ));
    }

    #[test]
    fn stale_stream_failure_after_resume_is_ignored() {
        let mut h = Harness::new();
        h.guard.start().unwrap();
        let old_stream_error = h.guard.stream_error_callback(h.guard.stream_epoch);
        h.focus(FocusEvent::LostTransient);
        h.focus(FocusEvent::Gained);

        old_stream_error(CaptureError::HardwareUnavailable("old stream".into()));
        assert_eq!(h.guard.process_pending(), 1);
        assert_eq!(h.guard.state(), RecordingState::Active);
    }

    #[test]
    fn focus_events_from_previous_session_are_ignored() {
        let mut h = Harness::new();
        h.guard.start().unwrap();
        let old_sender = h.focus.sender().unwrap();
        h.guard.stop();
        h.guard.start().unwrap();

        assert!(old_sender.send(FocusEvent::LostPermanent));
        assert_eq!(h.guard.process_pending(), 1);
        assert_eq!(h.guard.state(), RecordingState::Active);
    }

    #[test]
    fn blocks_reach_subscriber_while_active_only() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();
        let probe = Arc::clone(h.guard.capture().provider().probe());
        let block = || AudioBlock::new(SampleBuffer::I16(vec![500; 320]), 1, 16_000);

        assert!(probe.emit(block()));
        assert!(subscription.try_recv_frame().is_some());

        h.focus(FocusEvent::LostTransient);
        assert!(!probe.emit(block()));
        assert_eq!(h.guard.diagnostics().blocks_received, 1);
    }

    #[test]
    fn gain_change_applies_to_next_block() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard
            .capture()
            .provider()
            .probe()
            .set_native_format(NativeFormat::new(48_000, 2, SampleFormat::F32));
        h.guard.start().unwrap();
        let probe = Arc::clone(h.guard.capture().provider().probe());

        h.guard.gain().set(2.0);
        probe.emit(AudioBlock::new(SampleBuffer::F32(vec![0.5; 960]), 2, 48_000));
        let frame = subscription.try_recv_frame().unwrap();
        let bytes = frame.data.to_bytes().unwrap();
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), i16::MAX);
        assert_eq!(frame.amplitude, 1.0);
    }

    /// Queue alternating transient events until the lifecycle queue is full.
    fn flood_with_transients(h: &Harness) -> usize {
        let mut queued = 0;
        loop {
            let event = if queued % 2 == 0 {
                FocusEvent::LostTransient
            } else {
                FocusEvent::Gained
            };
            if !h.focus.send(event) {
                return queued;
            }
            queued += 1;
        }
    }

    #[test]
    fn permanent_loss_survives_a_full_queue() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();

        let queued = flood_with_transients(&h);
        assert_eq!(queued, CaptureConfig::default().lifecycle_queue_capacity);
        assert!(h.focus.send(FocusEvent::LostPermanent));
        assert!(h.guard.capture().provider().probe().fail_stream("read failed"));

        h.guard.process_pending();

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert!(!h.guard.capture().provider().probe().running());
        assert_eq!(h.keep_alive.held(), 0);
        assert_eq!(h.keep_alive.released.load(Ordering::SeqCst), 1);
        let ended: Vec<_> = std::iter::from_fn(|| subscription.try_recv_notice())
            .filter(|n| matches!(n, SessionNotice::Ended(_)))
            .collect();
        assert_eq!(ended, vec![SessionNotice::Ended(SessionEnd::FocusLost)]);
    }

    #[test]
    fn stream_failure_survives_a_full_queue() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        h.guard.start().unwrap();

        // Gained while Active is ignored, so these only occupy the queue.
        while h.focus.send(FocusEvent::Gained) {}
        assert!(h.guard.capture().provider().probe().fail_stream("read failed"));

        h.guard.process_pending();

        assert_eq!(h.guard.state(), RecordingState::Idle);
        assert_eq!(h.keep_alive.held(), 0);
        let last = std::iter::from_fn(|| subscription.try_recv_notice()).last();
        assert!(matches!(
            last,
            Some(SessionNotice::Ended(SessionEnd::TerminatedByError(_)))
        ));
    }

    #[test]
    fn latched_loss_does_not_leak_into_next_session() {
        let mut h = Harness::new();
        h.guard.start().unwrap();
        while h.focus.send(FocusEvent::Gained) {}
        assert!(h.focus.send(FocusEvent::LostPermanent));
        h.guard.process_pending();
        assert_eq!(h.guard.state(), RecordingState::Idle);

        h.guard.start().unwrap();
        assert!(!h.guard.handle_latched());
        assert_eq!(h.guard.process_pending(), 0);
        assert_eq!(h.guard.state(), RecordingState::Active);
    }

    #[test]
    fn undrained_notices_keep_every_session_end() {
        let mut h = Harness::new();
        let subscription = h.guard.sink().subscribe();
        for _ in 0..3 {
            h.guard.start().unwrap();
            h.guard.stop();
        }
        h.guard.start().unwrap();
        assert!(h.guard.capture().provider().probe().fail_stream("read failed"));
        h.guard.process_pending();
        assert_eq!(h.guard.state(), RecordingState::Idle);

        let notices: Vec<_> = std::iter::from_fn(|| subscription.try_recv_notice()).collect();
        let ended: Vec<_> = notices
            .iter()
            .filter(|n| matches!(n, SessionNotice::Ended(_)))
            .collect();
        assert_eq!(ended.len(), 4);
        assert!(matches!(
            notices.last(),
            Some(SessionNotice::Ended(SessionEnd::TerminatedByError(
                CaptureError::SessionTerminatedByError(_)
            )))
        ));
    }

    #[test]
    fn dropping_guard_releases_keep_alive() {
        let mut h = Harness::new();
        h.guard.start().unwrap();
        let keep_alive = Arc::clone(&h.keep_alive);
        drop(h);
        assert_eq!(keep_alive.held(), 0);
        assert_eq!(keep_alive.released.load(Ordering::SeqCst), 1);
    }
}
