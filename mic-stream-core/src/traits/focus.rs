use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};

use crate::models::state::FocusEvent;

/// Message consumed by the lifecycle owner.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleMessage {
    Focus { generation: u64, event: FocusEvent },
    StreamFailed { generation: u64, reason: String },
}

/// Terminal lifecycle events recorded outside the bounded queue.
///
/// A permanent focus loss or a stream failure must reach the lifecycle owner
/// even when the queue is full, so each is latched here under its generation
/// (or stream epoch) before being queued. Generations only grow, so a latch
/// left by an earlier session never matches the current one.
#[derive(Debug, Default)]
pub(crate) struct TerminalLatch {
    focus_lost: AtomicU64,
    stream_failed: AtomicU64,
}

impl TerminalLatch {
    pub(crate) fn latch_focus_lost(&self, generation: u64) {
        self.focus_lost.fetch_max(generation, Ordering::SeqCst);
    }

    pub(crate) fn latch_stream_failed(&self, epoch: u64) {
        self.stream_failed.fetch_max(epoch, Ordering::SeqCst);
    }

    pub(crate) fn focus_lost(&self, generation: u64) -> bool {
        generation != 0 && self.focus_lost.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn stream_failed(&self, epoch: u64) -> bool {
        epoch != 0 && self.stream_failed.load(Ordering::SeqCst) == epoch
    }
}

/// Handle a `FocusManager` uses to push focus changes to the lifecycle owner.
///
/// Tagged with the session generation so events from a finished session are
/// ignored by the next one.
#[derive(Debug, Clone)]
pub struct FocusEventSender {
    generation: u64,
    tx: Sender<LifecycleMessage>,
    latch: Arc<TerminalLatch>,
}

impl FocusEventSender {
    pub(crate) fn new(generation: u64, tx: Sender<LifecycleMessage>, latch: Arc<TerminalLatch>) -> Self {
        Self { generation, tx, latch }
    }

    /// Queue a focus change. Never blocks.
    ///
    /// `LostPermanent` is latched before queueing and is never lost. Other
    /// events return `false` when dropped because the queue is full or the
    /// receiver is gone.
    pub fn send(&self, event: FocusEvent) -> bool {
        let terminal = event == FocusEvent::LostPermanent;
        if terminal {
            self.latch.latch_focus_lost(self.generation);
        }
        match self.tx.try_send(LifecycleMessage::Focus {
            generation: self.generation,
            event,
        }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) if terminal => {
                log::warn!("Lifecycle queue full, permanent focus loss latched");
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Lifecycle queue full, dropping focus event {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Platform audio focus / session manager.
///
/// One implementation per platform, chosen at build time.
pub trait FocusManager: Send {
    /// Request exclusive input focus. On success the manager keeps `events`
    /// and reports later focus changes through it.
    fn request_focus(&mut self, events: FocusEventSender) -> bool;

    /// Give focus back and drop the event sender.
    fn abandon_focus(&mut self);
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn sender_tags_events_with_generation() {
        let (tx, rx) = bounded(4);
        let sender = FocusEventSender::new(3, tx, Arc::default());
        assert!(sender.send(FocusEvent::LostTransient));
        assert_eq!(
            rx.try_recv().unwrap(),
            LifecycleMessage::Focus {
                generation: 3,
                event: FocusEvent::LostTransient
            }
        );
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (tx, rx) = bounded(1);
        let sender = FocusEventSender::new(1, tx, Arc::default());
        assert!(sender.send(FocusEvent::LostTransient));
        assert!(!sender.send(FocusEvent::Gained));
        drop(rx);
        assert!(!sender.send(FocusEvent::Gained));
    }

    #[test]
    fn permanent_loss_is_latched_when_queue_is_full() {
        let (tx, _rx) = bounded(1);
        let latch = Arc::new(TerminalLatch::default());
        let sender = FocusEventSender::new(2, tx, Arc::clone(&latch));
        assert!(sender.send(FocusEvent::Gained));

        assert!(sender.send(FocusEvent::LostPermanent));
        assert!(latch.focus_lost(2));
        assert!(!latch.focus_lost(1));
    }

    #[test]
    fn latch_ignores_earlier_generations() {
        let latch = TerminalLatch::default();
        assert!(!latch.focus_lost(0));
        latch.latch_focus_lost(4);
        latch.latch_focus_lost(3);
        assert!(latch.focus_lost(4));
        assert!(!latch.focus_lost(5));

        latch.latch_stream_failed(7);
        assert!(latch.stream_failed(7));
        assert!(!latch.stream_failed(8));
    }
}
