use crate::error::HostError;
use crate::model::{SessionId, TreeSnapshot};
use crate::tree::TreeUpdate;

/// Events that arrive asynchronously from background tasks.
/// These get merged into the main event loop alongside keyboard input.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The subscription reported a change
    TreeUpdated(TreeUpdate),

    /// The subscription stopped because the host went away
    HostDisconnected(HostError),

    /// A requested full resync completed
    SnapshotLoaded(TreeSnapshot),

    /// A requested full resync failed
    ResyncFailed(HostError),

    /// The host focused the session
    SessionActivated { session_id: SessionId },

    /// The host refused or failed to focus the session
    ActivationFailed {
        session_id: SessionId,
        error: HostError,
    },
}
