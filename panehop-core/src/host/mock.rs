use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use super::{HostBridge, HostEvent, Subscription, UpdateSink};
use crate::error::HostError;
use crate::model::{SessionId, TreeSnapshot};
use crate::tree::{SessionTreeStore, TreeUpdate};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory host for tests. Records activations and forwards `emit`ted
/// events to the current subscriber.
#[derive(Default)]
pub struct MockHostBridge {
    pub snapshot: Mutex<TreeSnapshot>,
    pub connect_error: Option<HostError>,
    pub activate_error: Mutex<Option<HostError>>,
    pub activated: Mutex<Vec<SessionId>>,
    pub list_calls: Mutex<usize>,
    pub sink: Mutex<Option<(UpdateSink, Arc<AtomicBool>)>>,
}

impl MockHostBridge {
    pub fn new(snapshot: TreeSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Deliver `event` to the subscriber, as the host would.
    pub fn emit(&self, event: HostEvent) {
        if let HostEvent::Update(update) = &event {
            let mut snapshot = lock(&self.snapshot);
            let mut store = SessionTreeStore::new(snapshot.clone());
            store.apply_update(update.clone());
            *snapshot = TreeSnapshot::clone(&store.current_snapshot());
        }
        if let Some((sink, cancel)) = lock(&self.sink).as_ref()
            && !cancel.load(Ordering::Relaxed)
        {
            sink(event);
        }
    }

    pub fn activated(&self) -> Vec<SessionId> {
        lock(&self.activated).clone()
    }

    pub fn fail_next_activation(&self, error: HostError) {
        *lock(&self.activate_error) = Some(error);
    }
}

impl HostBridge for MockHostBridge {
    fn connect(&self) -> Result<(), HostError> {
        match &self.connect_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn list_windows(&self) -> Result<TreeSnapshot, HostError> {
        self.connect()?;
        *lock(&self.list_calls) += 1;
        Ok(lock(&self.snapshot).clone())
    }

    fn subscribe(&self, sink: UpdateSink) -> Result<Subscription, HostError> {
        self.connect()?;
        let cancel = Arc::new(AtomicBool::new(false));
        *lock(&self.sink) = Some((sink, Arc::clone(&cancel)));
        Ok(Subscription::new(cancel, None))
    }

    fn activate_session(&self, id: &SessionId) -> Result<(), HostError> {
        if let Some(e) = lock(&self.activate_error).take() {
            return Err(e);
        }
        let mut snapshot = lock(&self.snapshot);
        if !snapshot.contains_session(id) {
            return Err(HostError::StaleReference { id: id.clone() });
        }
        let mut store = SessionTreeStore::new(snapshot.clone());
        store.apply_update(TreeUpdate::FocusChanged {
            session_id: id.clone(),
        });
        *snapshot = TreeSnapshot::clone(&store.current_snapshot());
        lock(&self.activated).push(id.clone());
        Ok(())
    }
}
