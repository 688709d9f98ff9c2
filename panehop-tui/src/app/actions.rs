use panehop_core::{geometry::Direction, host::HostBridge, model::SessionId, state::AppState};
use std::sync::Arc;

use super::EventSender;
use super::spawn::{spawn_activation, spawn_resync};

pub(super) fn handle_activate(
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
) {
    let Some(session_id) = state.filter.resolve_selected_session() else {
        return;
    };
    start_activation(state, host, sender, session_id);
}

pub(super) fn handle_focus_pane(
    state: &mut AppState,
    direction: Direction,
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
) {
    match state.adjacent_target(direction) {
        Some(session_id) => start_activation(state, host, sender, session_id),
        None => log::debug!("no pane {direction} of the current pane"),
    }
}

fn start_activation(
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
    session_id: SessionId,
) {
    if state.begin_activation(&session_id) {
        log::debug!("activating {session_id}");
        spawn_activation(host, sender, session_id);
    }
}

/// Ask the host for a fresh snapshot unless one is already on its way.
pub(super) fn request_resync(
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
) {
    if state.resync_pending {
        return;
    }
    log::info!("requesting full resync");
    state.resync_pending = true;
    spawn_resync(host, sender);
}
