use std::fmt;

/// Where the supervisor/session pair currently is in the link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Subscribed,
    Disconnecting,
    Failed,
}

/// Why a session ended. Every variant is recoverable except `Cancelled`,
/// which the supervisor treats as the signal to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ConnectFailed,
    LinkDropped,
    Cancelled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Connecting => "connecting",
            SessionState::Subscribed => "subscribed",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Termination::ConnectFailed => "connect failed",
            Termination::LinkDropped => "link dropped",
            Termination::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
