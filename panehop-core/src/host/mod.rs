pub mod mock;
pub mod tmux;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

use crate::error::HostError;
use crate::model::{SessionId, TreeSnapshot};
use crate::tree::TreeUpdate;

pub use tmux::CliTmuxBridge;

/// Notifications delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Update(TreeUpdate),
    /// The host went away; no further events follow.
    Disconnected(HostError),
}

/// Callback receiving host events on the subscription thread.
pub type UpdateSink = Box<dyn Fn(HostEvent) + Send + 'static>;

/// Client of the terminal application's scripting interface.
pub trait HostBridge: Send + Sync {
    /// Fails with `Connection` when the host is not running and `Permission`
    /// when access is denied.
    fn connect(&self) -> Result<(), HostError>;
    fn list_windows(&self) -> Result<TreeSnapshot, HostError>;
    fn subscribe(&self, sink: UpdateSink) -> Result<Subscription, HostError>;
    /// Fails with `StaleReference` when `id` no longer exists.
    fn activate_session(&self, id: &SessionId) -> Result<(), HostError>;
}

/// Handle to a running subscription. Dropping it stops delivery and waits
/// for the delivering thread, if any, to finish.
#[derive(Debug)]
pub struct Subscription {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(cancel: Arc<AtomicBool>, handle: Option<JoinHandle<()>>) -> Self {
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("host subscription thread panicked");
        }
    }
}
