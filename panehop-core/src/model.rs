use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, path::Path};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

entity_id!(
    /// Opaque host id of a pane (tmux `%12`).
    SessionId
);
entity_id!(
    /// Opaque host id of a tab (tmux `@3`).
    TabId
);
entity_id!(
    /// Opaque host id of a window (tmux `$1`).
    WindowId
);

impl PartialOrd for SessionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SessionId {
    /// Natural order: `%2` sorts before `%10`.
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(&self.0, &other.0)
    }
}

/// A run of digits compares by value, anything else char by char.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment<'a> {
    Text(char),
    /// Digits without leading zeros; the length orders by magnitude first.
    Number { len: usize, digits: &'a str },
}

fn segments(id: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = id;
    while let Some(c) = rest.chars().next() {
        if c.is_ascii_digit() {
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let digits = rest[..end].trim_start_matches('0');
            out.push(Segment::Number {
                len: digits.len(),
                digits,
            });
            rest = &rest[end..];
        } else {
            out.push(Segment::Text(c));
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Segment-wise natural order, then plain string order so that `%01` and `%1`
/// stay distinct. Both steps are total orders, so the result is one too.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    segments(a).cmp(&segments(b)).then_with(|| a.cmp(b))
}

/// Screen rectangle of a pane in character cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaneRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl PaneRect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        u32::from(self.x) + u32::from(self.width)
    }

    pub fn bottom(&self) -> u32 {
        u32::from(self.y) + u32::from(self.height)
    }

    /// Center scaled by two, to stay in integer space.
    pub fn doubled_center(&self) -> (i64, i64) {
        (
            i64::from(self.x) * 2 + i64::from(self.width),
            i64::from(self.y) * 2 + i64::from(self.height),
        )
    }

    /// Non-empty intersection of the `[x, x+width)` ranges.
    pub fn overlaps_horizontally(&self, other: &Self) -> bool {
        u32::from(self.x) < other.right() && u32::from(other.x) < self.right()
    }

    /// Non-empty intersection of the `[y, y+height)` ranges.
    pub fn overlaps_vertically(&self, other: &Self) -> bool {
        u32::from(self.y) < other.bottom() && u32::from(other.y) < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tab_id: TabId,
    pub title: String,
    pub rect: PaneRect,
    pub is_current: bool,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub command: String,
}

impl Session {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "(unnamed)"
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub label: String,
    /// Host-reported index within the window.
    pub index: usize,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    pub title: String,
    /// Position among all windows, starting at 1.
    pub index: usize,
    pub is_key: bool,
    pub tabs: Vec<Tab>,
}

/// Immutable picture of the Window → Tab → Session forest at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub windows: Vec<Window>,
}

impl TreeSnapshot {
    pub fn new(windows: Vec<Window>) -> Self {
        Self { windows }
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.windows
            .iter()
            .flat_map(|w| w.tabs.iter())
            .flat_map(|t| t.sessions.iter())
    }

    pub fn session_count(&self) -> usize {
        self.sessions().count()
    }

    pub fn find_session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions().find(|s| &s.id == id)
    }

    pub fn contains_session(&self, id: &SessionId) -> bool {
        self.find_session(id).is_some()
    }

    /// The focused pane, preferring the one inside the key window.
    pub fn current_session(&self) -> Option<&Session> {
        self.windows
            .iter()
            .filter(|w| w.is_key)
            .flat_map(|w| w.tabs.iter())
            .flat_map(|t| t.sessions.iter())
            .find(|s| s.is_current)
            .or_else(|| self.sessions().find(|s| s.is_current))
    }

    /// Panes sharing the screen with `id`: the sessions of its tab.
    ///
    /// Tabs of one window occupy the same screen area, so only the tab holding
    /// `id` has visible panes.
    pub fn visible_panes(&self, id: &SessionId) -> Option<Vec<(SessionId, PaneRect)>> {
        let tab = self
            .windows
            .iter()
            .flat_map(|w| w.tabs.iter())
            .find(|t| t.sessions.iter().any(|s| &s.id == id))?;
        Some(
            tab.sessions
                .iter()
                .map(|s| (s.id.clone(), s.rect))
                .collect(),
        )
    }
}

/// Abbreviate `home` to `~` at the start of `path`.
pub fn abbreviate_home(path: &str, home: Option<&Path>) -> String {
    let raw = path.trim();
    if raw.is_empty() {
        return String::new();
    }
    let Some(home) = home.map(|h| h.to_string_lossy()) else {
        return raw.to_string();
    };
    let home = home.trim_end_matches('/');
    if home.is_empty() {
        return raw.to_string();
    }
    if raw == home {
        return "~".to_string();
    }
    match raw.strip_prefix(home).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => format!("~/{rest}"),
        None => raw.to_string(),
    }
}
