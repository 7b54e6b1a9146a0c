//! Desktop stand-ins for the mobile focus and keep-alive capabilities.
//!
//! Desktop hosts have no audio-focus arbitration, so `ExclusiveFocus` always
//! grants focus and exposes a `FocusRelay` for whoever does observe device
//! loss or sharing (a UI, a device watcher) to forward events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use mic_stream_core::models::state::FocusEvent;
use mic_stream_core::traits::focus::{FocusEventSender, FocusManager};
use mic_stream_core::traits::keep_alive::{KeepAliveProvider, KeepAliveToken};

type SharedSender = Arc<Mutex<Option<FocusEventSender>>>;

/// Focus manager that grants every request.
pub struct ExclusiveFocus {
    holder: SharedSender,
}

/// Forwards externally observed focus changes into the active session.
#[derive(Clone)]
pub struct FocusRelay {
    holder: SharedSender,
}

impl ExclusiveFocus {
    pub fn new() -> (Self, FocusRelay) {
        let holder: SharedSender = Arc::new(Mutex::new(None));
        (
            Self {
                holder: Arc::clone(&holder),
            },
            FocusRelay { holder },
        )
    }
}

impl FocusManager for ExclusiveFocus {
    fn request_focus(&mut self, events: FocusEventSender) -> bool {
        log::debug!("Focus granted (session generation {})", events.generation());
        *self.holder.lock() = Some(events);
        true
    }

    fn abandon_focus(&mut self) {
        if self.holder.lock().take().is_some() {
            log::debug!("Focus abandoned");
        }
    }
}

impl FocusRelay {
    /// Returns `false` when no session holds focus or the event was dropped.
    pub fn send(&self, event: FocusEvent) -> bool {
        match self.holder.lock().as_ref() {
            Some(sender) => sender.send(event),
            None => false,
        }
    }

    pub fn has_focus_holder(&self) -> bool {
        self.holder.lock().is_some()
    }
}

/// Process-level keep-alive.
///
/// A desktop process is not suspended while capturing, so tokens are only
/// issued and logged.
#[derive(Default)]
pub struct ProcessKeepAlive {
    next_id: AtomicU64,
    held: AtomicU64,
}

impl ProcessKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held(&self) -> u64 {
        self.held.load(Ordering::SeqCst)
    }
}

impl KeepAliveProvider for ProcessKeepAlive {
    fn acquire(&self) -> KeepAliveToken {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.held.fetch_add(1, Ordering::SeqCst);
        log::info!("Keep-alive {} acquired", id);
        KeepAliveToken::new(id)
    }

    fn release(&self, token: KeepAliveToken) {
        self.held.fetch_sub(1, Ordering::SeqCst);
        log::info!("Keep-alive {} released", token.id());
    }
}
