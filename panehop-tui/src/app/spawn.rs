use panehop_core::{event::AppEvent, host::HostBridge, model::SessionId};
use std::{
    sync::{Arc, atomic::Ordering},
    thread,
};

use super::EventSender;

pub(super) fn spawn_activation(
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
    session_id: SessionId,
) {
    let host = Arc::clone(host);
    let sender = sender.clone();
    thread::spawn(move || {
        if sender.cancel.load(Ordering::Relaxed) {
            return;
        }
        match host.activate_session(&session_id) {
            Ok(()) => sender.send(AppEvent::SessionActivated { session_id }),
            Err(error) => sender.send(AppEvent::ActivationFailed { session_id, error }),
        }
    });
}

pub(super) fn spawn_resync(host: &Arc<dyn HostBridge>, sender: &EventSender) {
    let host = Arc::clone(host);
    let sender = sender.clone();
    thread::spawn(move || {
        if sender.cancel.load(Ordering::Relaxed) {
            return;
        }
        match host.list_windows() {
            Ok(snapshot) => sender.send(AppEvent::SnapshotLoaded(snapshot)),
            Err(e) => sender.send(AppEvent::ResyncFailed(e)),
        }
    });
}
