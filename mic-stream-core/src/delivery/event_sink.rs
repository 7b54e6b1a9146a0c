use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

use crate::models::frame::{AudioFrameEvent, SessionNotice};
use crate::processing::stats::PipelineStats;

/// Frames held for the subscriber. One slot: an undrained frame blocks the next.
const FRAME_SLOTS: usize = 1;
/// Lifecycle notices are rare; this only needs to cover a burst of transitions.
/// When full, the oldest `StateChanged` is evicted so `Ended` always fits.
const NOTICE_SLOTS: usize = 16;

/// Result of offering a frame to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The subscriber had not drained the previous frame.
    DroppedBackpressure,
    /// Subscribe/unsubscribe held the slot; the frame was dropped rather than wait.
    DroppedContended,
    NoSubscriber,
}

struct SubscriberSlot {
    id: u64,
    frames: Sender<AudioFrameEvent>,
    notices: Sender<SessionNotice>,
    /// Sink-side handle on the notice queue, used only to evict.
    notices_rx: Receiver<SessionNotice>,
}

/// Single-subscriber delivery point for encoded frames and lifecycle notices.
///
/// `deliver` runs on the capture thread and never blocks: the subscriber slot
/// is taken with `try_lock` and frames are offered with `try_send`.
pub struct EventSink {
    slot: Mutex<Option<SubscriberSlot>>,
    next_id: AtomicU64,
    stats: Arc<PipelineStats>,
}

impl EventSink {
    pub fn new(stats: Arc<PipelineStats>) -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
            stats,
        }
    }

    /// Attach a new subscriber, detaching any previous one.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (frame_tx, frame_rx) = bounded(FRAME_SLOTS);
        let (notice_tx, notice_rx) = bounded(NOTICE_SLOTS);

        let previous = self.slot.lock().replace(SubscriberSlot {
            id,
            frames: frame_tx,
            notices: notice_tx,
            notices_rx: notice_rx.clone(),
        });
        if let Some(previous) = previous {
            log::info!("Subscriber {} replaced by {}", previous.id, id);
        }

        Subscription {
            id,
            frames: frame_rx,
            notices: notice_rx,
        }
    }

    /// Detach the current subscriber. Returns whether one was attached.
    pub fn unsubscribe(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Offer a frame without blocking.
    pub fn deliver(&self, event: AudioFrameEvent) -> DeliveryOutcome {
        let Some(mut slot) = self.slot.try_lock() else {
            self.stats.record_contended_drop();
            return DeliveryOutcome::DroppedContended;
        };
        let Some(subscriber) = slot.as_ref() else {
            return DeliveryOutcome::NoSubscriber;
        };

        match subscriber.frames.try_send(event) {
            Ok(()) => {
                self.stats.record_delivered();
                DeliveryOutcome::Delivered
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_backpressure_drop();
                log::trace!("Subscriber {} not drained, frame dropped", subscriber.id);
                DeliveryOutcome::DroppedBackpressure
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Subscriber {} went away", subscriber.id);
                *slot = None;
                DeliveryOutcome::NoSubscriber
            }
        }
    }

    /// Send a lifecycle notice to the subscriber, if any. Not for the capture path.
    ///
    /// Never blocks. On a full queue the oldest `StateChanged` makes room; an
    /// `Ended` notice is only dropped to make room for a newer `Ended`.
    pub fn notify(&self, notice: SessionNotice) {
        let slot = self.slot.lock();
        let Some(subscriber) = slot.as_ref() else {
            return;
        };
        let Err(TrySendError::Full(notice)) = subscriber.notices.try_send(notice) else {
            return;
        };

        // The slot lock makes this the only producer, so re-queueing fits.
        let mut pending: Vec<SessionNotice> = subscriber.notices_rx.try_iter().collect();
        let mut incoming = Some(notice);
        if pending.len() >= NOTICE_SLOTS {
            match pending.iter().position(|n| matches!(n, SessionNotice::StateChanged(_))) {
                Some(index) => {
                    pending.remove(index);
                }
                None if matches!(incoming, Some(SessionNotice::Ended(_))) => {
                    let evicted = pending.remove(0);
                    log::warn!("Subscriber {} notice queue full, evicting {:?}", subscriber.id, evicted);
                }
                None => {
                    log::warn!("Subscriber {} notice queue full, dropping {:?}", subscriber.id, incoming);
                    incoming = None;
                }
            }
        }
        for notice in pending.into_iter().chain(incoming) {
            let _ = subscriber.notices.try_send(notice);
        }
    }

    /// Notices currently buffered for the subscriber.
    pub fn retained_notices(&self) -> usize {
        self.slot.lock().as_ref().map(|s| s.notices.len()).unwrap_or(0)
    }

    /// Frames currently buffered for the subscriber.
    pub fn retained_frames(&self) -> usize {
        self.slot.lock().as_ref().map(|s| s.frames.len()).unwrap_or(0)
    }
}

/// Receiving end held by the single consumer.
///
/// Dropping it detaches the subscriber on the next delivery.
pub struct Subscription {
    id: u64,
    frames: Receiver<AudioFrameEvent>,
    notices: Receiver<SessionNotice>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw frame receiver, for use with `crossbeam_channel::select!`.
    pub fn frames(&self) -> &Receiver<AudioFrameEvent> {
        &self.frames
    }

    pub fn notices(&self) -> &Receiver<SessionNotice> {
        &self.notices
    }

    pub fn try_recv_frame(&self) -> Option<AudioFrameEvent> {
        self.frames.try_recv().ok()
    }

    /// Wait for the next frame. `None` on timeout or when the sink detached us.
    pub fn recv_frame_timeout(&self, timeout: Duration) -> Option<AudioFrameEvent> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv_notice(&self) -> Option<SessionNotice> {
        match self.notices.try_recv() {
            Ok(notice) => Some(notice),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_notice_timeout(&self, timeout: Duration) -> Option<SessionNotice> {
        self.notices.recv_timeout(timeout).ok()
    }
}
