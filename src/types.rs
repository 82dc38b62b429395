// src/types.rs
use std::fmt;
use std::time::Duration;

/// Connection and acquisition state, owned by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    Acquiring,
    Full,
    Disconnected,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Acquiring | Self::Full)
    }

    pub fn is_acquiring(&self) -> bool {
        matches!(self, Self::Acquiring)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Acquiring => "acquiring",
            Self::Full => "full",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Why an acquisition run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    BufferFull,
    Shutdown,
}

// Controller -> UI notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    SampleReady { index: u64, value: f64 },
    FillRatio(f64),
    RemainingTime(Duration),
    AcquisitionStopped(StopReason),
    Error(String),
}
