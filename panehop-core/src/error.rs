use thiserror::Error;

use crate::model::SessionId;

/// Failures surfaced by a host bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host not running: {0}")]
    Connection(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("session {id} no longer exists")]
    StaleReference { id: SessionId },

    #[error("malformed update: {0}")]
    MalformedEvent(String),

    #[error("host command failed: {0}")]
    Command(String),
}

impl HostError {
    /// Connection and permission failures end the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Permission(_))
    }

    /// Suggested fix shown alongside fatal errors.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Connection(_) => Some(
                "Start tmux first (for example `tmux new -s main`), or pass --socket to pick the server",
            ),
            Self::Permission(_) => Some(
                "Check the ownership and mode of the tmux socket under $TMUX_TMPDIR or /tmp/tmux-$UID",
            ),
            Self::StaleReference { .. } | Self::MalformedEvent(_) | Self::Command(_) => None,
        }
    }
}
