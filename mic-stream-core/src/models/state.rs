use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Recording lifecycle state.
///
/// State transitions:
/// ```text
/// idle → starting → active ⇄ interrupted
///           ↓         ↓          ↓
///           └──────→ stopping ←──┘ → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Starting,
    Active,
    Interrupted,
    Stopping,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// States during which the keep-alive token must be held.
    pub fn holds_keep_alive(&self) -> bool {
        matches!(self, Self::Starting | Self::Active | Self::Interrupted)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Starting => 1,
            Self::Active => 2,
            Self::Interrupted => 3,
            Self::Stopping => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Active,
            3 => Self::Interrupted,
            4 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

/// Lock-free cell publishing the current `RecordingState` to other threads.
///
/// Written only by the lifecycle owner; read from anywhere.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: RecordingState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn load(&self) -> RecordingState {
        RecordingState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: RecordingState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(RecordingState::Idle)
    }
}

/// Platform notification that exclusive audio input access changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusEvent {
    Gained,
    LostTransient,
    LostPermanent,
}

/// Why a recording session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop` was requested.
    Stopped,
    /// Focus was lost permanently.
    FocusLost,
    /// The hardware stream failed mid-session, or could not be resumed.
    TerminatedByError(CaptureError),
}
