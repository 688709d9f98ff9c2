mod actions;
mod spawn;

use crate::{components, keymap, theme::Theme};
use actions::{handle_activate, handle_focus_pane, request_resync};
use crossterm::event::{self, Event, KeyEventKind};
use panehop_core::{
    action::Action,
    config::{Command, KeysConfig, SearchPolicy},
    error::HostError,
    event::AppEvent,
    host::{HostBridge, HostEvent, Subscription},
    model::SessionId,
    state::{AppState, Mode, StatusMessage},
    tree::ApplyOutcome,
};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout, Rect},
};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::{Duration, Instant},
};

/// Why the TUI stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    /// A pane was focused and `exit_after_activate` is set
    Activated(SessionId),
    /// The host went away mid-session
    Disconnected(HostError),
}

/// Settings for a run that are not key bindings or colors
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub exit_after_activate: bool,
    /// Used to shorten working directories to `~/...`
    pub home_dir: Option<PathBuf>,
}

/// Handle for dispatching background work
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<AppEvent>,
    cancel: Arc<AtomicBool>,
}

impl EventSender {
    /// Send an event from a background thread to the main loop
    pub fn send(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }
}

pub fn run(
    terminal: &mut DefaultTerminal,
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    theme: &Theme,
    keys: &KeysConfig,
    options: &RunOptions,
) -> anyhow::Result<ExitReason> {
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let cancel = Arc::new(AtomicBool::new(false));
    let event_sender = EventSender {
        tx,
        cancel: Arc::clone(&cancel),
    };

    let subscription = match subscribe(host, &event_sender) {
        Ok(subscription) => subscription,
        Err(e) if e.is_fatal() => return Ok(ExitReason::Disconnected(e)),
        Err(e) => return Err(e.into()),
    };

    let result = event_loop(terminal, state, host, theme, keys, options, &rx, &event_sender);

    // Signal cancellation to background threads
    cancel.store(true, Ordering::Relaxed);
    subscription.cancel();
    result
}

/// Forward host notifications into the main loop's channel.
fn subscribe(
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
) -> Result<Subscription, HostError> {
    let sender = sender.clone();
    host.subscribe(Box::new(move |event| match event {
        HostEvent::Update(update) => sender.send(AppEvent::TreeUpdated(update)),
        HostEvent::Disconnected(error) => sender.send(AppEvent::HostDisconnected(error)),
    }))
}

#[allow(clippy::too_many_arguments)]
fn event_loop(
    terminal: &mut DefaultTerminal,
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    theme: &Theme,
    keys: &KeysConfig,
    options: &RunOptions,
    rx: &mpsc::Receiver<AppEvent>,
    sender: &EventSender,
) -> anyhow::Result<ExitReason> {
    loop {
        state.expire_quit_prompt(Instant::now());
        terminal.draw(|f| draw(f, state, theme, keys, options.home_dir.as_deref()))?;

        // Check background channel (non-blocking)
        if let Ok(app_event) = rx.try_recv() {
            if let Some(exit) = process_app_event(app_event, state, host, sender, options) {
                return Ok(exit);
            }
            continue;
        }

        // Poll terminal events with a timeout so host updates keep flowing
        if event::poll(Duration::from_millis(80))?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            // Clear error on any keypress
            state.error = None;

            if let Some(action) = keymap::resolve_action(key, state, keys)
                && let Some(exit) = process_action(action, state, host, sender)
            {
                return Ok(exit);
            }
        }
    }
}

fn draw(
    f: &mut Frame,
    state: &mut AppState,
    theme: &Theme,
    keys: &KeysConfig,
    home: Option<&Path>,
) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .split(f.area());

    let placeholder = search_placeholder(state, keys);
    components::search_bar::draw(
        f,
        chunks[0],
        &state.search,
        state.mode == Mode::SearchEdit,
        &placeholder,
        theme,
    );

    let page_rows = list_rows_from_list_area(chunks[1]);
    state.set_page_rows(page_rows);
    state.update_scroll_offset(page_rows);
    components::tree_list::draw(f, chunks[1], state, theme, home);

    components::status_bar::draw(f, chunks[2], state, theme, keys);
}

fn search_placeholder(state: &AppState, keys: &KeysConfig) -> String {
    match state.policy {
        SearchPolicy::TypeToSearch => "Type to search panes...".to_string(),
        SearchPolicy::Explicit => {
            let keymap = keys.keymap_for_mode(Mode::Navigate);
            match KeysConfig::find_key(&keymap, &Command::FocusSearch) {
                Some(key) => format!("Press {key} to search panes..."),
                None => "Search panes...".to_string(),
            }
        }
    }
}

fn list_rows_from_list_area(list_area: Rect) -> usize {
    usize::from(list_area.height.saturating_sub(2)).max(1)
}

/// Handle events from background tasks
fn process_app_event(
    event: AppEvent,
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
    options: &RunOptions,
) -> Option<ExitReason> {
    match event {
        AppEvent::TreeUpdated(update) => {
            if state.apply_tree_update(update) == ApplyOutcome::ResyncRequested {
                request_resync(state, host, sender);
            }
        }
        AppEvent::HostDisconnected(error) => {
            log::error!("host disconnected: {error}");
            return Some(ExitReason::Disconnected(error));
        }
        AppEvent::SnapshotLoaded(snapshot) => state.replace_snapshot(snapshot),
        AppEvent::ResyncFailed(error) => {
            state.resync_pending = false;
            if error.is_fatal() {
                log::error!("resync failed: {error}");
                return Some(ExitReason::Disconnected(error));
            }
            log::warn!("resync failed: {error}");
            if !matches!(error, HostError::MalformedEvent(_)) {
                state.error = Some(error.to_string());
            }
        }
        AppEvent::SessionActivated { session_id } => {
            state.finish_activation();
            log::info!("focused {session_id}");
            if options.exit_after_activate {
                return Some(ExitReason::Activated(session_id));
            }
            let snapshot = state.snapshot();
            let title = snapshot
                .find_session(&session_id)
                .map_or(session_id.as_str(), |s| s.display_title());
            state.status = Some(StatusMessage::Info(format!("Focused {title}")));
        }
        AppEvent::ActivationFailed { session_id, error } => {
            state.finish_activation();
            match error {
                HostError::StaleReference { .. } => {
                    log::info!("{session_id} disappeared before it could be focused");
                    request_resync(state, host, sender);
                }
                error if error.is_fatal() => {
                    log::error!("activating {session_id} failed: {error}");
                    return Some(ExitReason::Disconnected(error));
                }
                error => {
                    log::warn!("activating {session_id} failed: {error}");
                    state.error = Some(error.to_string());
                }
            }
        }
    }
    None
}

fn handle_movement_actions(action: &Action, state: &mut AppState) -> bool {
    let page_rows: i32 = state.page_rows().try_into().unwrap_or(i32::MAX);
    let list_len: i32 = state
        .filter
        .visible_len()
        .try_into()
        .unwrap_or(i32::MAX);
    let page_step = page_rows.max(1).min(list_len.max(1));
    let half_page_step = (page_step / 2).max(1);
    match action {
        Action::MoveSelection(delta) => state.filter.move_selection(*delta),
        Action::HalfPageUp => state.filter.move_selection(-half_page_step),
        Action::HalfPageDown => state.filter.move_selection(half_page_step),
        Action::PageUp => state.filter.move_selection(-page_step),
        Action::PageDown => state.filter.move_selection(page_step),
        Action::MoveTop => state.filter.move_to_top(),
        Action::MoveBottom => state.filter.move_to_bottom(),
        _ => return false,
    }
    true
}

/// Handle query editing and cursor actions
fn handle_search_actions(action: &Action, state: &mut AppState) -> bool {
    match action {
        Action::FocusSearch => state.focus_search(),
        Action::CancelSearch => state.cancel_search(),
        Action::LeaveSearch => state.leave_search(),
        Action::SearchPush(c) => state.search_push(*c),
        Action::SearchPop => state.search_pop(),
        Action::SearchDeleteWord => state.search_delete_word(),
        Action::CursorLeft => state.search.cursor_left(),
        Action::CursorRight => state.search.cursor_right(),
        Action::CursorStart => state.search.cursor_start(),
        Action::CursorEnd => state.search.cursor_end(),
        _ => return false,
    }
    true
}

fn process_action(
    action: Action,
    state: &mut AppState,
    host: &Arc<dyn HostBridge>,
    sender: &EventSender,
) -> Option<ExitReason> {
    if action != Action::QuitConfirm {
        state.disarm_quit();
    }
    if matches!(state.status, Some(StatusMessage::Info(_))) {
        state.status = None;
    }

    if handle_movement_actions(&action, state) || handle_search_actions(&action, state) {
        return None;
    }

    match action {
        Action::Quit => return Some(ExitReason::Quit),
        Action::QuitConfirm => {
            if state.quit_confirm(Instant::now()) {
                return Some(ExitReason::Quit);
            }
        }
        Action::Activate => handle_activate(state, host, sender),
        Action::FocusPane(direction) => handle_focus_pane(state, direction, host, sender),
        Action::Refresh => request_resync(state, host, sender),

        // Handled by the helpers above
        Action::MoveSelection(_)
        | Action::HalfPageUp
        | Action::HalfPageDown
        | Action::PageUp
        | Action::PageDown
        | Action::MoveTop
        | Action::MoveBottom
        | Action::FocusSearch
        | Action::CancelSearch
        | Action::LeaveSearch
        | Action::SearchPush(_)
        | Action::SearchPop
        | Action::SearchDeleteWord
        | Action::CursorLeft
        | Action::CursorRight
        | Action::CursorStart
        | Action::CursorEnd => {}
    }

    None
}
