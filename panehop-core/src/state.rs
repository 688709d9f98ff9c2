use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{Command, SearchPolicy};
use crate::filter::{FilterEngine, FilterOptions};
use crate::geometry::{self, Direction};
use crate::model::{SessionId, TreeSnapshot};
use crate::tree::{ApplyOutcome, SessionTreeStore, TreeUpdate, flatten};

/// Query text plus a cursor, edited one grapheme cluster at a time.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
    pub text: String,
    /// Byte offset, always on a grapheme boundary after any edit.
    pub cursor: usize,
}

#[derive(Clone, Copy)]
struct GraphemeSpan {
    start: usize,
    end: usize,
    is_whitespace: bool,
}

impl SearchInput {
    fn grapheme_spans(&self) -> Vec<GraphemeSpan> {
        self.text
            .grapheme_indices(true)
            .map(|(start, grapheme)| GraphemeSpan {
                start,
                end: start + grapheme.len(),
                is_whitespace: grapheme.chars().all(char::is_whitespace),
            })
            .collect()
    }

    fn grapheme_boundaries(&self) -> Vec<usize> {
        let mut boundaries: Vec<usize> = self.text.grapheme_indices(true).map(|(i, _)| i).collect();
        boundaries.push(self.text.len());
        boundaries
    }

    fn boundary_index_at_or_before(boundaries: &[usize], cursor: usize) -> usize {
        match boundaries.binary_search(&cursor) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    fn clamp_cursor_to_boundary(&mut self, boundaries: &[usize]) -> usize {
        let cursor = self.cursor.min(self.text.len());
        let idx = Self::boundary_index_at_or_before(boundaries, cursor);
        self.cursor = boundaries.get(idx).copied().unwrap_or(0);
        idx
    }

    fn prev_word_boundary(&self, from: usize) -> usize {
        let spans = self.grapheme_spans();
        if spans.is_empty() {
            return 0;
        }
        let mut boundaries: Vec<usize> = spans.iter().map(|s| s.start).collect();
        boundaries.push(self.text.len());
        let cursor = from.min(self.text.len());
        let mut grapheme_idx =
            Self::boundary_index_at_or_before(&boundaries, cursor).saturating_sub(1);

        // Skip trailing whitespace, then the word itself.
        while let Some(span) = spans.get(grapheme_idx) {
            if !span.is_whitespace {
                break;
            }
            if grapheme_idx == 0 {
                return 0;
            }
            grapheme_idx -= 1;
        }
        while let Some(span) = spans.get(grapheme_idx) {
            if span.is_whitespace {
                return span.end;
            }
            if grapheme_idx == 0 {
                return 0;
            }
            grapheme_idx -= 1;
        }
        0
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Insert a character at the current cursor position
    pub fn insert_char(&mut self, c: char) {
        let boundaries = self.grapheme_boundaries();
        self.clamp_cursor_to_boundary(&boundaries);
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Remove the grapheme cluster before the cursor (UTF-8 safe)
    pub fn backspace(&mut self) -> bool {
        let boundaries = self.grapheme_boundaries();
        let idx = self.clamp_cursor_to_boundary(&boundaries);
        if idx == 0 {
            return false;
        }
        let prev = boundaries[idx - 1];
        self.text.drain(prev..self.cursor);
        self.cursor = prev;
        true
    }

    /// Delete word backwards from cursor position
    pub fn delete_word(&mut self) {
        if self.text.is_empty() || self.cursor == 0 {
            return;
        }
        let boundaries = self.grapheme_boundaries();
        self.clamp_cursor_to_boundary(&boundaries);
        let new_cursor = self.prev_word_boundary(self.cursor);
        self.text.drain(new_cursor..self.cursor);
        self.cursor = new_cursor;
    }

    /// Move cursor left by one grapheme cluster (UTF-8 safe)
    pub fn cursor_left(&mut self) {
        let boundaries = self.grapheme_boundaries();
        let idx = self.clamp_cursor_to_boundary(&boundaries);
        if idx > 0 {
            self.cursor = boundaries[idx - 1];
        }
    }

    /// Move cursor right by one grapheme cluster (UTF-8 safe)
    pub fn cursor_right(&mut self) {
        let boundaries = self.grapheme_boundaries();
        let idx = self.clamp_cursor_to_boundary(&boundaries);
        if idx + 1 < boundaries.len() {
            self.cursor = boundaries[idx + 1];
        }
    }

    pub fn cursor_start(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.text.len();
    }
}

/// What mode the app is in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Keys drive the list; the query is shown but not edited
    #[default]
    Navigate,
    /// Keys edit the query
    SearchEdit,
}

impl Mode {
    /// Commands to show in the footer bar, in display order.
    pub fn footer_commands(self) -> &'static [Command] {
        match self {
            Mode::Navigate => &[
                Command::Activate,
                Command::FocusSearch,
                Command::Refresh,
                Command::Quit,
            ],
            Mode::SearchEdit => &[
                Command::Activate,
                Command::CancelSearch,
                Command::LeaveSearch,
                Command::Quit,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    /// First press of `quit_confirm` is armed
    QuitPrompt,
    Info(String),
}

/// Central application state. Components read from this, actions modify it.
pub struct AppState {
    pub store: SessionTreeStore,
    pub filter: FilterEngine,
    pub search: SearchInput,
    pub mode: Mode,
    pub policy: SearchPolicy,
    pub status: Option<StatusMessage>,
    pub error: Option<String>,
    /// Session whose activation is in flight
    pub pending_activation: Option<SessionId>,
    pub resync_pending: bool,
    pub scroll_offset: usize,
    quit_armed_at: Option<Instant>,
    quit_window: Duration,
    page_rows: usize,
}

impl AppState {
    pub fn new(
        snapshot: TreeSnapshot,
        options: FilterOptions,
        policy: SearchPolicy,
        quit_window: Duration,
    ) -> Self {
        let filter = FilterEngine::new(flatten(&snapshot), options);
        Self {
            store: SessionTreeStore::new(snapshot),
            filter,
            search: SearchInput::default(),
            mode: Mode::Navigate,
            policy,
            status: None,
            error: None,
            pending_activation: None,
            resync_pending: false,
            scroll_offset: 0,
            quit_armed_at: None,
            quit_window,
            page_rows: 10,
        }
    }

    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        self.store.current_snapshot()
    }

    /// Feed a host update through the store and rebuild the visible rows.
    pub fn apply_tree_update(&mut self, update: TreeUpdate) -> ApplyOutcome {
        let outcome = self.store.apply_update(update);
        if outcome == ApplyOutcome::Applied {
            self.filter.set_rows(flatten(&self.store.current_snapshot()));
        }
        outcome
    }

    pub fn replace_snapshot(&mut self, snapshot: TreeSnapshot) {
        self.resync_pending = false;
        self.apply_tree_update(TreeUpdate::Replace(snapshot));
    }

    /// Whether an unbound printable key should start a search.
    pub fn types_to_search(&self) -> bool {
        self.mode == Mode::SearchEdit || self.policy == SearchPolicy::TypeToSearch
    }

    pub fn focus_search(&mut self) {
        self.mode = Mode::SearchEdit;
        self.search.cursor_end();
    }

    /// Esc: drop the query and return to navigation.
    pub fn cancel_search(&mut self) {
        self.search.clear();
        self.mode = Mode::Navigate;
        self.apply_query();
    }

    /// Tab: return to navigation, keeping the filter.
    pub fn leave_search(&mut self) {
        self.mode = Mode::Navigate;
    }

    pub fn search_push(&mut self, c: char) {
        if self.mode == Mode::Navigate {
            self.focus_search();
        }
        self.search.insert_char(c);
        self.apply_query();
    }

    pub fn search_pop(&mut self) {
        if self.search.backspace() {
            self.apply_query();
        }
    }

    pub fn search_delete_word(&mut self) {
        self.search.delete_word();
        self.apply_query();
    }

    fn apply_query(&mut self) {
        self.filter.set_query(&self.search.text);
    }

    /// Neighbour of the focused pane, from on-screen geometry.
    pub fn adjacent_target(&self, direction: Direction) -> Option<SessionId> {
        let snapshot = self.store.current_snapshot();
        let current = snapshot.current_session()?;
        let panes = snapshot.visible_panes(&current.id)?;
        geometry::adjacent(&current.id, direction, &panes)
    }

    /// Reserve the activation slot. False while another activation is in flight.
    pub fn begin_activation(&mut self, id: &SessionId) -> bool {
        if let Some(pending) = &self.pending_activation {
            log::debug!("ignoring activation of {id}: {pending} still in flight");
            return false;
        }
        self.pending_activation = Some(id.clone());
        true
    }

    pub fn finish_activation(&mut self) -> Option<SessionId> {
        self.pending_activation.take()
    }

    /// Handle a `quit_confirm` press at `now`. True when the run should end.
    pub fn quit_confirm(&mut self, now: Instant) -> bool {
        if let Some(armed) = self.quit_armed_at
            && now.duration_since(armed) <= self.quit_window
        {
            return true;
        }
        self.quit_armed_at = Some(now);
        self.status = Some(StatusMessage::QuitPrompt);
        false
    }

    pub fn disarm_quit(&mut self) {
        if self.quit_armed_at.take().is_some() && self.status == Some(StatusMessage::QuitPrompt) {
            self.status = None;
        }
    }

    /// Clear the quit prompt once its window has passed.
    pub fn expire_quit_prompt(&mut self, now: Instant) {
        if let Some(armed) = self.quit_armed_at
            && now.duration_since(armed) > self.quit_window
        {
            self.disarm_quit();
        }
    }

    pub fn page_rows(&self) -> usize {
        self.page_rows
    }

    pub fn set_page_rows(&mut self, rows: usize) {
        self.page_rows = rows.max(1);
    }

    /// Keep the selection inside the viewport with a one-row margin.
    pub fn update_scroll_offset(&mut self, viewport_rows: usize) {
        let len = self.filter.visible_len();
        if len == 0 {
            self.scroll_offset = 0;
            return;
        }

        let viewport_rows = viewport_rows.max(1);
        let max_offset = len.saturating_sub(viewport_rows);
        let selected = self.filter.selected_index().unwrap_or(0).min(len - 1);
        let anchor_top = usize::from(viewport_rows > 2);
        let anchor_bottom = viewport_rows.saturating_sub(2);

        let top_bound = self.scroll_offset.saturating_add(anchor_top);
        let bottom_bound = self.scroll_offset.saturating_add(anchor_bottom);

        if selected < top_bound {
            self.scroll_offset = selected.saturating_sub(anchor_top);
        } else if selected > bottom_bound {
            self.scroll_offset = selected.saturating_sub(anchor_bottom);
        }

        self.scroll_offset = self.scroll_offset.min(max_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PaneRect, Session, Tab, Window};
    use crate::tree::tests::sample_snapshot;

    fn state() -> AppState {
        AppState::new(
            sample_snapshot(),
            FilterOptions::default(),
            SearchPolicy::TypeToSearch,
            Duration::from_millis(1500),
        )
    }

    fn visible_labels(state: &AppState) -> Vec<String> {
        state
            .filter
            .visible_rows()
            .map(|(r, _)| r.label.clone())
            .collect()
    }

    fn selected_label(state: &AppState) -> Option<String> {
        state.filter.selected_row().map(|r| r.label.clone())
    }

    #[test]
    fn test_cursor_grapheme_combining_mark() {
        let mut input = SearchInput {
            text: "e\u{0301}".to_string(),
            cursor: 0,
        };
        input.cursor_end();

        input.cursor_left();
        assert_eq!(input.cursor, 0);

        input.cursor_right();
        assert_eq!(input.cursor, input.text.len());

        assert!(input.backspace());
        assert_eq!(input.text, "");
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn test_cursor_grapheme_zwj_sequence() {
        let emoji = "👩‍💻";
        let mut input = SearchInput {
            text: format!("{emoji}a"),
            cursor: 0,
        };
        input.cursor_right();
        assert_eq!(input.cursor, emoji.len());
        input.insert_char('b');
        assert_eq!(input.text, format!("{emoji}ba"));
    }

    #[test]
    fn test_delete_word() {
        let mut input = SearchInput::default();
        for c in "cargo build  ".chars() {
            input.insert_char(c);
        }
        input.delete_word();
        assert_eq!(input.text, "cargo ");
        input.delete_word();
        assert_eq!(input.text, "");
        input.delete_word();
        assert_eq!(input.cursor, 0);
    }

    #[test]
    fn test_backspace_on_empty_is_false() {
        let mut input = SearchInput::default();
        assert!(!input.backspace());
    }

    #[test]
    fn test_typing_enters_search_and_filters() {
        let mut state = state();
        assert_eq!(state.mode, Mode::Navigate);
        for c in "ser".chars() {
            state.search_push(c);
        }
        assert_eq!(state.mode, Mode::SearchEdit);
        assert_eq!(visible_labels(&state), vec!["W1", "0: T1", "server"]);
        assert_eq!(selected_label(&state).as_deref(), Some("server"));
    }

    #[test]
    fn test_cancel_clears_query_leave_keeps_it() {
        let mut state = state();
        state.search_push('l');
        state.leave_search();
        assert_eq!(state.mode, Mode::Navigate);
        assert_eq!(state.filter.query(), "l");
        assert_eq!(visible_labels(&state), vec!["W1", "0: T1", "build", "W2", "0: T2", "logs"]);

        state.focus_search();
        state.cancel_search();
        assert_eq!(state.mode, Mode::Navigate);
        assert!(state.search.is_empty());
        assert_eq!(state.filter.visible_len(), state.filter.rows().len());
    }

    #[test]
    fn test_explicit_policy_does_not_type_to_search() {
        let mut state = state();
        state.policy = SearchPolicy::Explicit;
        assert!(!state.types_to_search());
        state.focus_search();
        assert!(state.types_to_search());
    }

    #[test]
    fn test_search_pop_restores_rows() {
        let mut state = state();
        state.search_push('z');
        assert_eq!(state.filter.visible_len(), 0);
        state.search_pop();
        assert_eq!(state.filter.visible_len(), state.filter.rows().len());
        assert_eq!(selected_label(&state).as_deref(), Some("build"));
    }

    #[test]
    fn test_search_pop_after_leaving_search_stays_in_navigate() {
        let mut state = state();
        for c in "serz".chars() {
            state.search_push(c);
        }
        state.leave_search();
        assert_eq!(state.filter.visible_len(), 0);

        state.search_pop();
        assert_eq!(state.mode, Mode::Navigate);
        assert_eq!(state.search.text, "ser");
        assert!(visible_labels(&state).contains(&"server".to_string()));
    }

    #[test]
    fn test_adjacent_target_uses_current_tab() {
        let state = state();
        // "server" (%2) sits right of "build" (%1) in the same tab.
        assert_eq!(state.adjacent_target(Direction::Left), Some("%1".into()));
        assert_eq!(state.adjacent_target(Direction::Right), None);
        assert_eq!(state.adjacent_target(Direction::Up), None);
    }

    #[test]
    fn test_adjacent_target_without_current_is_none() {
        let snapshot = TreeSnapshot::new(vec![Window {
            id: "$1".into(),
            title: "w".to_string(),
            index: 1,
            is_key: true,
            tabs: vec![Tab {
                id: "@1".into(),
                label: "t".to_string(),
                index: 0,
                sessions: vec![Session {
                    id: "%1".into(),
                    tab_id: "@1".into(),
                    title: "only".to_string(),
                    rect: PaneRect::new(0, 0, 80, 24),
                    is_current: false,
                    working_directory: String::new(),
                    command: String::new(),
                }],
            }],
        }]);
        let state = AppState::new(
            snapshot,
            FilterOptions::default(),
            SearchPolicy::TypeToSearch,
            Duration::from_millis(1500),
        );
        assert_eq!(state.adjacent_target(Direction::Right), None);
    }

    #[test]
    fn test_single_activation_in_flight() {
        let mut state = state();
        assert!(state.begin_activation(&"%1".into()));
        assert!(!state.begin_activation(&"%3".into()));
        assert_eq!(state.finish_activation(), Some("%1".into()));
        assert!(state.begin_activation(&"%3".into()));
    }

    #[test]
    fn test_quit_confirm_requires_second_press_in_window() {
        let mut state = state();
        let t0 = Instant::now();
        assert!(!state.quit_confirm(t0));
        assert_eq!(state.status, Some(StatusMessage::QuitPrompt));
        assert!(state.quit_confirm(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_quit_prompt_expires() {
        let mut state = state();
        let t0 = Instant::now();
        assert!(!state.quit_confirm(t0));
        state.expire_quit_prompt(t0 + Duration::from_millis(2000));
        assert_eq!(state.status, None);
        assert!(!state.quit_confirm(t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_disarm_keeps_unrelated_status() {
        let mut state = state();
        state.status = Some(StatusMessage::Info("refreshed".to_string()));
        state.disarm_quit();
        assert_eq!(
            state.status,
            Some(StatusMessage::Info("refreshed".to_string()))
        );
    }

    #[test]
    fn test_removed_session_disappears_without_error() {
        let mut state = state();
        assert_eq!(selected_label(&state).as_deref(), Some("server"));
        let outcome = state.apply_tree_update(TreeUpdate::SessionRemoved {
            session_id: "%2".into(),
        });
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(!visible_labels(&state).contains(&"server".to_string()));
        assert_eq!(selected_label(&state).as_deref(), Some("build"));
        assert!(state.error.is_none());
    }

    #[test]
    fn test_malformed_update_keeps_rows() {
        let mut state = state();
        let before = visible_labels(&state);
        let outcome = state.apply_tree_update(TreeUpdate::TitleChanged {
            session_id: "%404".into(),
            title: "ghost".to_string(),
        });
        assert_eq!(outcome, ApplyOutcome::ResyncRequested);
        assert_eq!(visible_labels(&state), before);
    }

    #[test]
    fn test_replace_snapshot_clears_resync_flag() {
        let mut state = state();
        state.resync_pending = true;
        state.replace_snapshot(TreeSnapshot::default());
        assert!(!state.resync_pending);
        assert_eq!(state.filter.visible_len(), 0);
        assert_eq!(state.filter.selected_index(), None);
    }

    #[test]
    fn test_scroll_offset_follows_selection() {
        let mut state = state();
        state.filter.move_to_bottom();
        state.update_scroll_offset(4);
        assert_eq!(state.scroll_offset, 5);
        state.filter.move_to_top();
        state.update_scroll_offset(4);
        assert_eq!(state.scroll_offset, 0);
    }
}
