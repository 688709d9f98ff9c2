use serde::Serialize;
use std::sync::Arc;

use crate::error::HostError;
use crate::model::{PaneRect, Session, SessionId, TabId, TreeSnapshot, WindowId};

/// A change reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeUpdate {
    Replace(TreeSnapshot),
    /// Insert `session` into its tab at `position` (clamped to the tab length).
    SessionAdded {
        session: Session,
        position: usize,
    },
    SessionRemoved {
        session_id: SessionId,
    },
    TitleChanged {
        session_id: SessionId,
        title: String,
    },
    FocusChanged {
        session_id: SessionId,
    },
    GeometryChanged {
        session_id: SessionId,
        rect: PaneRect,
    },
}

impl TreeUpdate {
    /// Updates that turn `old` into `new`: fine-grained when possible, a full
    /// replacement otherwise, nothing when they are equal.
    pub fn between(old: &TreeSnapshot, new: &TreeSnapshot) -> Vec<TreeUpdate> {
        if old == new {
            return Vec::new();
        }
        TreeSnapshot::diff(old, new).unwrap_or_else(|| vec![TreeUpdate::Replace(new.clone())])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The update did not fit the current snapshot and was dropped.
    ResyncRequested,
}

/// Owner of the current snapshot. Every accepted update swaps in a new `Arc`.
#[derive(Debug, Default)]
pub struct SessionTreeStore {
    snapshot: Arc<TreeSnapshot>,
}

impl SessionTreeStore {
    pub fn new(snapshot: TreeSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn current_snapshot(&self) -> Arc<TreeSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn apply_update(&mut self, update: TreeUpdate) -> ApplyOutcome {
        if let TreeUpdate::Replace(snapshot) = update {
            self.snapshot = Arc::new(snapshot);
            return ApplyOutcome::Applied;
        }

        let mut next = TreeSnapshot::clone(&self.snapshot);
        match apply_delta(&mut next, update) {
            Ok(()) => {
                self.snapshot = Arc::new(next);
                ApplyOutcome::Applied
            }
            Err(e) => {
                log::warn!("dropping update, requesting resync: {e}");
                ApplyOutcome::ResyncRequested
            }
        }
    }
}

fn session_mut<'a>(
    snapshot: &'a mut TreeSnapshot,
    id: &SessionId,
) -> Result<&'a mut Session, HostError> {
    snapshot
        .windows
        .iter_mut()
        .flat_map(|w| w.tabs.iter_mut())
        .flat_map(|t| t.sessions.iter_mut())
        .find(|s| &s.id == id)
        .ok_or_else(|| HostError::MalformedEvent(format!("unknown session {id}")))
}

fn apply_delta(snapshot: &mut TreeSnapshot, update: TreeUpdate) -> Result<(), HostError> {
    match update {
        TreeUpdate::Replace(next) => *snapshot = next,
        TreeUpdate::SessionAdded { session, position } => {
            if snapshot.contains_session(&session.id) {
                return Err(HostError::MalformedEvent(format!(
                    "session {} already present",
                    session.id
                )));
            }
            let tab = snapshot
                .windows
                .iter_mut()
                .flat_map(|w| w.tabs.iter_mut())
                .find(|t| t.id == session.tab_id)
                .ok_or_else(|| {
                    HostError::MalformedEvent(format!(
                        "session {} names unknown tab {}",
                        session.id, session.tab_id
                    ))
                })?;
            let position = position.min(tab.sessions.len());
            tab.sessions.insert(position, session);
        }
        TreeUpdate::SessionRemoved { session_id } => {
            let before = snapshot.session_count();
            for window in &mut snapshot.windows {
                for tab in &mut window.tabs {
                    tab.sessions.retain(|s| s.id != session_id);
                }
                window.tabs.retain(|t| !t.sessions.is_empty());
            }
            snapshot.windows.retain(|w| !w.tabs.is_empty());
            if snapshot.session_count() == before {
                return Err(HostError::MalformedEvent(format!(
                    "unknown session {session_id}"
                )));
            }
        }
        TreeUpdate::TitleChanged { session_id, title } => {
            session_mut(snapshot, &session_id)?.title = title;
        }
        TreeUpdate::GeometryChanged { session_id, rect } => {
            session_mut(snapshot, &session_id)?.rect = rect;
        }
        TreeUpdate::FocusChanged { session_id } => {
            if !snapshot.contains_session(&session_id) {
                return Err(HostError::MalformedEvent(format!(
                    "focus moved to unknown session {session_id}"
                )));
            }
            for window in &mut snapshot.windows {
                let mut holds_focus = false;
                for tab in &mut window.tabs {
                    for session in &mut tab.sessions {
                        session.is_current = session.id == session_id;
                        holds_focus |= session.is_current;
                    }
                }
                window.is_key = holds_focus;
            }
        }
    }
    Ok(())
}

impl TreeSnapshot {
    /// Incremental updates from `old` to `new`, or `None` when the structure
    /// (ids and order at every level, header labels, session metadata other than
    /// title, geometry and focus) changed.
    pub fn diff(old: &TreeSnapshot, new: &TreeSnapshot) -> Option<Vec<TreeUpdate>> {
        if old.windows.len() != new.windows.len() {
            return None;
        }

        let mut updates = Vec::new();
        for (ow, nw) in old.windows.iter().zip(&new.windows) {
            if ow.id != nw.id
                || ow.title != nw.title
                || ow.index != nw.index
                || ow.tabs.len() != nw.tabs.len()
            {
                return None;
            }
            for (ot, nt) in ow.tabs.iter().zip(&nw.tabs) {
                if ot.id != nt.id
                    || ot.label != nt.label
                    || ot.index != nt.index
                    || ot.sessions.len() != nt.sessions.len()
                {
                    return None;
                }
                for (os, ns) in ot.sessions.iter().zip(&nt.sessions) {
                    if os.id != ns.id
                        || os.working_directory != ns.working_directory
                        || os.command != ns.command
                    {
                        return None;
                    }
                    if os.title != ns.title {
                        updates.push(TreeUpdate::TitleChanged {
                            session_id: ns.id.clone(),
                            title: ns.title.clone(),
                        });
                    }
                    if os.rect != ns.rect {
                        updates.push(TreeUpdate::GeometryChanged {
                            session_id: ns.id.clone(),
                            rect: ns.rect,
                        });
                    }
                }
            }
        }

        let old_current = old.current_session().map(|s| &s.id);
        let new_current = new.current_session().map(|s| &s.id);
        if old_current != new_current {
            updates.push(TreeUpdate::FocusChanged {
                session_id: new_current?.clone(),
            });
        }

        // Flags the events cannot express (several current panes, key window
        // without focus) only survive a full replacement.
        let mut replayed = old.clone();
        for update in &updates {
            apply_delta(&mut replayed, update.clone()).ok()?;
        }
        (replayed == *new).then_some(updates)
    }
}

/// Back-reference from a row to the entity it renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Window(WindowId),
    Tab(TabId),
    Session(SessionId),
}

impl EntityRef {
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Session(id) => Some(id),
            Self::Window(_) | Self::Tab(_) => None,
        }
    }
}

/// One line of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// 0 for windows, 1 for tabs, 2 for sessions.
    pub depth: u8,
    pub entity: EntityRef,
    /// Text matched by the filter: window title, `index: label` for tabs,
    /// display title for sessions.
    pub label: String,
    pub is_current: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub working_directory: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub command: String,
}

impl Row {
    pub fn is_session(&self) -> bool {
        matches!(self.entity, EntityRef::Session(_))
    }
}

/// Pre-order projection of `snapshot`: window, its tabs, their sessions.
pub fn flatten(snapshot: &TreeSnapshot) -> Vec<Row> {
    let mut rows = Vec::with_capacity(snapshot.session_count() + snapshot.windows.len() * 2);
    for window in &snapshot.windows {
        rows.push(Row {
            depth: 0,
            entity: EntityRef::Window(window.id.clone()),
            label: window.title.clone(),
            is_current: window.is_key,
            working_directory: String::new(),
            command: String::new(),
        });
        let mut tabs: Vec<_> = window.tabs.iter().collect();
        tabs.sort_by_key(|t| t.index);
        for tab in tabs {
            rows.push(Row {
                depth: 1,
                entity: EntityRef::Tab(tab.id.clone()),
                label: format!("{}: {}", tab.index, tab.label),
                is_current: tab.sessions.iter().any(|s| s.is_current),
                working_directory: String::new(),
                command: String::new(),
            });
            for session in &tab.sessions {
                rows.push(Row {
                    depth: 2,
                    entity: EntityRef::Session(session.id.clone()),
                    label: session.display_title().to_string(),
                    is_current: session.is_current,
                    working_directory: session.working_directory.clone(),
                    command: session.command.clone(),
                });
            }
        }
    }
    rows
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Tab, Window};

    pub(crate) fn session(id: &str, tab: &str, title: &str, x: u16) -> Session {
        Session {
            id: id.into(),
            tab_id: tab.into(),
            title: title.to_string(),
            rect: PaneRect::new(x, 0, 40, 24),
            is_current: false,
            working_directory: String::new(),
            command: String::new(),
        }
    }

    /// W1{T1{"build","server"}}, W2{T2{"logs"}, T3{"editor"}} with "server" current.
    pub(crate) fn sample_snapshot() -> TreeSnapshot {
        let mut server = session("%2", "@1", "server", 40);
        server.is_current = true;
        TreeSnapshot::new(vec![
            Window {
                id: "$1".into(),
                title: "W1".to_string(),
                index: 1,
                is_key: true,
                tabs: vec![Tab {
                    id: "@1".into(),
                    label: "T1".to_string(),
                    index: 0,
                    sessions: vec![session("%1", "@1", "build", 0), server],
                }],
            },
            Window {
                id: "$2".into(),
                title: "W2".to_string(),
                index: 2,
                is_key: false,
                tabs: vec![
                    Tab {
                        id: "@2".into(),
                        label: "T2".to_string(),
                        index: 0,
                        sessions: vec![session("%3", "@2", "logs", 0)],
                    },
                    Tab {
                        id: "@3".into(),
                        label: "T3".to_string(),
                        index: 1,
                        sessions: vec![session("%4", "@3", "editor", 0)],
                    },
                ],
            },
        ])
    }

    fn labels(rows: &[Row]) -> Vec<(u8, &str)> {
        rows.iter().map(|r| (r.depth, r.label.as_str())).collect()
    }

    #[test]
    fn test_flatten_is_preorder() {
        let rows = flatten(&sample_snapshot());
        assert_eq!(
            labels(&rows),
            vec![
                (0, "W1"),
                (1, "0: T1"),
                (2, "build"),
                (2, "server"),
                (0, "W2"),
                (1, "0: T2"),
                (2, "logs"),
                (1, "1: T3"),
                (2, "editor"),
            ]
        );
    }

    #[test]
    fn test_flatten_is_deterministic() {
        let snapshot = sample_snapshot();
        assert_eq!(flatten(&snapshot), flatten(&snapshot));
    }

    #[test]
    fn test_flatten_orders_tabs_by_index() {
        let mut snapshot = sample_snapshot();
        snapshot.windows[1].tabs.reverse();
        let rows = flatten(&snapshot);
        assert_eq!(rows[5].label, "0: T2");
        assert_eq!(rows[7].label, "1: T3");
    }

    #[test]
    fn test_flatten_marks_current_path() {
        let rows = flatten(&sample_snapshot());
        let current: Vec<_> = rows
            .iter()
            .filter(|r| r.is_current)
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(current, vec!["W1", "0: T1", "server"]);
    }

    #[test]
    fn test_replace_swaps_snapshot() {
        let mut store = SessionTreeStore::default();
        let before = store.current_snapshot();
        let outcome = store.apply_update(TreeUpdate::Replace(sample_snapshot()));
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert!(before.windows.is_empty());
        assert_eq!(store.current_snapshot().session_count(), 4);
    }

    #[test]
    fn test_session_added_at_position() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        let outcome = store.apply_update(TreeUpdate::SessionAdded {
            session: session("%9", "@1", "tests", 80),
            position: 1,
        });
        assert_eq!(outcome, ApplyOutcome::Applied);
        let snapshot = store.current_snapshot();
        let titles: Vec<_> = snapshot.windows[0].tabs[0]
            .sessions
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["build", "tests", "server"]);
    }

    #[test]
    fn test_session_added_to_unknown_tab_requests_resync() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        let before = store.current_snapshot();
        let outcome = store.apply_update(TreeUpdate::SessionAdded {
            session: session("%9", "@99", "orphan", 0),
            position: 0,
        });
        assert_eq!(outcome, ApplyOutcome::ResyncRequested);
        assert_eq!(*store.current_snapshot(), *before);
    }

    #[test]
    fn test_duplicate_session_requests_resync() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        let outcome = store.apply_update(TreeUpdate::SessionAdded {
            session: session("%1", "@1", "dup", 0),
            position: 0,
        });
        assert_eq!(outcome, ApplyOutcome::ResyncRequested);
    }

    #[test]
    fn test_removal_prunes_empty_tab_and_window() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        store.apply_update(TreeUpdate::SessionRemoved {
            session_id: "%4".into(),
        });
        let snapshot = store.current_snapshot();
        assert_eq!(snapshot.windows[1].tabs.len(), 1);

        store.apply_update(TreeUpdate::SessionRemoved {
            session_id: "%3".into(),
        });
        let snapshot = store.current_snapshot();
        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.windows[0].title, "W1");
    }

    #[test]
    fn test_removing_unknown_session_requests_resync() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        let outcome = store.apply_update(TreeUpdate::SessionRemoved {
            session_id: "%77".into(),
        });
        assert_eq!(outcome, ApplyOutcome::ResyncRequested);
    }

    #[test]
    fn test_focus_change_clears_other_flags() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        store.apply_update(TreeUpdate::FocusChanged {
            session_id: "%3".into(),
        });
        let snapshot = store.current_snapshot();
        let current: Vec<_> = snapshot
            .sessions()
            .filter(|s| s.is_current)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(current, vec!["%3"]);
        assert!(!snapshot.windows[0].is_key);
        assert!(snapshot.windows[1].is_key);
    }

    #[test]
    fn test_title_and_geometry_changes() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        store.apply_update(TreeUpdate::TitleChanged {
            session_id: "%1".into(),
            title: "cargo build".to_string(),
        });
        store.apply_update(TreeUpdate::GeometryChanged {
            session_id: "%1".into(),
            rect: PaneRect::new(0, 0, 20, 24),
        });
        let snapshot = store.current_snapshot();
        let build = snapshot.find_session(&"%1".into()).unwrap();
        assert_eq!(build.title, "cargo build");
        assert_eq!(build.rect.width, 20);
    }

    #[test]
    fn test_title_change_for_unknown_session_requests_resync() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        let outcome = store.apply_update(TreeUpdate::TitleChanged {
            session_id: "%77".into(),
            title: "x".to_string(),
        });
        assert_eq!(outcome, ApplyOutcome::ResyncRequested);
    }

    #[test]
    fn test_old_snapshot_is_untouched_by_updates() {
        let mut store = SessionTreeStore::new(sample_snapshot());
        let held = store.current_snapshot();
        store.apply_update(TreeUpdate::TitleChanged {
            session_id: "%1".into(),
            title: "renamed".to_string(),
        });
        assert_eq!(held.find_session(&"%1".into()).unwrap().title, "build");
    }

    #[test]
    fn test_diff_emits_fine_grained_updates() {
        let old = sample_snapshot();
        let mut new = old.clone();
        new.windows[0].tabs[0].sessions[0].title = "make".to_string();
        new.windows[1].tabs[0].sessions[0].rect = PaneRect::new(0, 0, 80, 24);

        let updates = TreeSnapshot::diff(&old, &new).unwrap();
        assert_eq!(
            updates,
            vec![
                TreeUpdate::TitleChanged {
                    session_id: "%1".into(),
                    title: "make".to_string(),
                },
                TreeUpdate::GeometryChanged {
                    session_id: "%3".into(),
                    rect: PaneRect::new(0, 0, 80, 24),
                },
            ]
        );
    }

    #[test]
    fn test_diff_emits_focus_change() {
        let old = sample_snapshot();
        let mut store = SessionTreeStore::new(old.clone());
        store.apply_update(TreeUpdate::FocusChanged {
            session_id: "%4".into(),
        });
        let new = store.current_snapshot();

        let updates = TreeSnapshot::diff(&old, &new).unwrap();
        assert_eq!(
            updates,
            vec![TreeUpdate::FocusChanged {
                session_id: "%4".into()
            }]
        );
    }

    #[test]
    fn test_diff_gives_up_on_structural_change() {
        let old = sample_snapshot();
        let mut new = old.clone();
        new.windows[0].tabs[0].sessions.pop();
        assert!(TreeSnapshot::diff(&old, &new).is_none());

        let updates = TreeUpdate::between(&old, &new);
        assert_eq!(updates, vec![TreeUpdate::Replace(new)]);
    }

    #[test]
    fn test_between_equal_snapshots_is_empty() {
        let snapshot = sample_snapshot();
        assert!(TreeUpdate::between(&snapshot, &snapshot).is_empty());
    }
}
