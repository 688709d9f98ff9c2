use crate::keyboard::{KeyCode, KeyEvent, KeyModifiers};
use crate::state::Mode;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

/// Commands that can be bound to keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// No-op: explicitly unbinds a key (removes inherited/default binding)
    Noop,

    // General commands
    Quit,
    QuitConfirm,
    Activate,
    Refresh,

    // Search mode transitions
    FocusSearch,
    CancelSearch,
    LeaveSearch,

    // List movement commands
    MoveUp,
    MoveDown,
    HalfPageUp,
    HalfPageDown,
    PageUp,
    PageDown,
    MoveTop,
    MoveBottom,

    // Pane focus commands
    FocusLeft,
    FocusDown,
    FocusUp,
    FocusRight,

    // Text-edit commands
    DeleteBackwardChar,
    DeleteBackwardWord,
    MoveCursorLeft,
    MoveCursorRight,
    MoveCursorStart,
    MoveCursorEnd,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noop" | "none" | "unbound" => Ok(Command::Noop),
            "quit" => Ok(Command::Quit),
            "quit_confirm" => Ok(Command::QuitConfirm),
            "activate" => Ok(Command::Activate),
            "refresh" => Ok(Command::Refresh),
            "focus_search" => Ok(Command::FocusSearch),
            "cancel_search" => Ok(Command::CancelSearch),
            "leave_search" => Ok(Command::LeaveSearch),
            "move_up" => Ok(Command::MoveUp),
            "move_down" => Ok(Command::MoveDown),
            "half_page_up" => Ok(Command::HalfPageUp),
            "half_page_down" => Ok(Command::HalfPageDown),
            "page_up" => Ok(Command::PageUp),
            "page_down" => Ok(Command::PageDown),
            "move_top" => Ok(Command::MoveTop),
            "move_bottom" => Ok(Command::MoveBottom),
            "focus_left" => Ok(Command::FocusLeft),
            "focus_down" => Ok(Command::FocusDown),
            "focus_up" => Ok(Command::FocusUp),
            "focus_right" => Ok(Command::FocusRight),
            "delete_backward_char" => Ok(Command::DeleteBackwardChar),
            "delete_backward_word" => Ok(Command::DeleteBackwardWord),
            "move_cursor_left" => Ok(Command::MoveCursorLeft),
            "move_cursor_right" => Ok(Command::MoveCursorRight),
            "move_cursor_start" => Ok(Command::MoveCursorStart),
            "move_cursor_end" => Ok(Command::MoveCursorEnd),
            _ => Err(format!("Unknown command: {s}")),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Command::Noop => "noop",
            Command::Quit => "quit",
            Command::QuitConfirm => "quit_confirm",
            Command::Activate => "activate",
            Command::Refresh => "refresh",
            Command::FocusSearch => "focus_search",
            Command::CancelSearch => "cancel_search",
            Command::LeaveSearch => "leave_search",
            Command::MoveUp => "move_up",
            Command::MoveDown => "move_down",
            Command::HalfPageUp => "half_page_up",
            Command::HalfPageDown => "half_page_down",
            Command::PageUp => "page_up",
            Command::PageDown => "page_down",
            Command::MoveTop => "move_top",
            Command::MoveBottom => "move_bottom",
            Command::FocusLeft => "focus_left",
            Command::FocusDown => "focus_down",
            Command::FocusUp => "focus_up",
            Command::FocusRight => "focus_right",
            Command::DeleteBackwardChar => "delete_backward_char",
            Command::DeleteBackwardWord => "delete_backward_word",
            Command::MoveCursorLeft => "move_cursor_left",
            Command::MoveCursorRight => "move_cursor_right",
            Command::MoveCursorStart => "move_cursor_start",
            Command::MoveCursorEnd => "move_cursor_end",
        };
        write!(f, "{s}")
    }
}

impl Command {
    /// Get a human-readable description of the command for the hint line
    pub fn description(&self) -> &'static str {
        match self {
            Command::Noop => "Unbound",
            Command::Quit => "quit",
            Command::QuitConfirm => "quit (press twice)",
            Command::Activate => "focus pane",
            Command::Refresh => "refresh",
            Command::FocusSearch => "search",
            Command::CancelSearch => "clear search",
            Command::LeaveSearch => "keep search",
            Command::MoveUp => "up",
            Command::MoveDown => "down",
            Command::HalfPageUp => "half page up",
            Command::HalfPageDown => "half page down",
            Command::PageUp => "page up",
            Command::PageDown => "page down",
            Command::MoveTop => "top",
            Command::MoveBottom => "bottom",
            Command::FocusLeft => "pane left",
            Command::FocusDown => "pane below",
            Command::FocusUp => "pane above",
            Command::FocusRight => "pane right",
            Command::DeleteBackwardChar => "delete char",
            Command::DeleteBackwardWord => "delete word",
            Command::MoveCursorLeft => "cursor left",
            Command::MoveCursorRight => "cursor right",
            Command::MoveCursorStart => "cursor to start",
            Command::MoveCursorEnd => "cursor to end",
        }
    }
}

/// Key bindings for a specific layer/mode
pub type KeyMap = HashMap<KeyEvent, Command>;

/// Complete key binding configuration, composed from reusable layers.
#[derive(Debug, Clone)]
pub struct KeysConfig {
    pub general: KeyMap,
    pub list_navigation: KeyMap,
    pub pane_focus: KeyMap,
    pub navigate: KeyMap,
    pub search_edit: KeyMap,
}

/// Intermediate structure for deserializing key bindings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeysConfigRaw {
    #[serde(default)]
    general: HashMap<String, String>,
    #[serde(default)]
    list_navigation: HashMap<String, String>,
    #[serde(default)]
    pane_focus: HashMap<String, String>,
    #[serde(default)]
    navigate: HashMap<String, String>,
    #[serde(default)]
    search_edit: HashMap<String, String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
}

impl KeysConfig {
    pub fn new() -> Self {
        Self {
            general: Self::default_general(),
            list_navigation: Self::default_list_navigation(),
            pane_focus: Self::default_pane_focus(),
            navigate: Self::default_navigate(),
            search_edit: Self::default_search_edit(),
        }
    }

    /// Build the effective keymap for a given app mode using precedence:
    /// general < list navigation < pane focus < mode-specific
    pub fn keymap_for_mode(&self, mode: Mode) -> KeyMap {
        let mut combined = KeyMap::new();
        Self::apply_layer(&mut combined, &self.general);
        Self::apply_layer(&mut combined, &self.list_navigation);
        Self::apply_layer(&mut combined, &self.pane_focus);

        match mode {
            Mode::Navigate => Self::apply_layer(&mut combined, &self.navigate),
            Mode::SearchEdit => Self::apply_layer(&mut combined, &self.search_edit),
        }

        combined
    }

    /// Find the first key bound to a given command in a keymap.
    pub fn find_key(keymap: &KeyMap, command: &Command) -> Option<KeyEvent> {
        // Prefer shorter/simpler key representations
        let mut found: Vec<_> = keymap
            .iter()
            .filter(|(_, cmd)| *cmd == command)
            .map(|(key, _)| *key)
            .collect();
        found.sort();
        found.into_iter().next()
    }

    fn apply_layer(base: &mut KeyMap, layer: &KeyMap) {
        for (key, command) in layer {
            if *command == Command::Noop {
                base.remove(key);
            } else {
                base.insert(*key, command.clone());
            }
        }
    }

    fn default_general() -> KeyMap {
        KeyMap::from([
            (ctrl('c'), Command::Quit),
            (ctrl('q'), Command::QuitConfirm),
            (ctrl('r'), Command::Refresh),
            (key(KeyCode::Enter), Command::Activate),
        ])
    }

    fn default_list_navigation() -> KeyMap {
        KeyMap::from([
            (key(KeyCode::Up), Command::MoveUp),
            (key(KeyCode::Down), Command::MoveDown),
            (ctrl('p'), Command::MoveUp),
            (ctrl('n'), Command::MoveDown),
            (ctrl('u'), Command::HalfPageUp),
            (ctrl('d'), Command::HalfPageDown),
            (key(KeyCode::PageUp), Command::PageUp),
            (key(KeyCode::PageDown), Command::PageDown),
            (
                KeyEvent::new(KeyCode::Char('g'), KeyModifiers::ALT),
                Command::MoveTop,
            ),
            (
                KeyEvent::new(KeyCode::Char('G'), KeyModifiers::ALT),
                Command::MoveBottom,
            ),
        ])
    }

    fn default_pane_focus() -> KeyMap {
        KeyMap::from([
            (ctrl('h'), Command::FocusLeft),
            (ctrl('j'), Command::FocusDown),
            (ctrl('k'), Command::FocusUp),
            (ctrl('l'), Command::FocusRight),
        ])
    }

    fn default_navigate() -> KeyMap {
        KeyMap::from([
            (key(KeyCode::Char('q')), Command::Quit),
            (key(KeyCode::Char('/')), Command::FocusSearch),
            (ctrl('f'), Command::FocusSearch),
            (key(KeyCode::Esc), Command::CancelSearch),
            (key(KeyCode::Backspace), Command::DeleteBackwardChar),
            (key(KeyCode::Home), Command::MoveTop),
            (key(KeyCode::End), Command::MoveBottom),
        ])
    }

    fn default_search_edit() -> KeyMap {
        KeyMap::from([
            (key(KeyCode::Esc), Command::CancelSearch),
            (key(KeyCode::Tab), Command::LeaveSearch),
            (key(KeyCode::Backspace), Command::DeleteBackwardChar),
            (ctrl('w'), Command::DeleteBackwardWord),
            (key(KeyCode::Left), Command::MoveCursorLeft),
            (key(KeyCode::Right), Command::MoveCursorRight),
            (key(KeyCode::Home), Command::MoveCursorStart),
            (key(KeyCode::End), Command::MoveCursorEnd),
            (ctrl('a'), Command::MoveCursorStart),
            (ctrl('e'), Command::MoveCursorEnd),
        ])
    }

    /// Parse a string representation of keybindings into a `KeyMap`
    fn parse_keymap(raw_map: &HashMap<String, String>) -> Result<KeyMap, String> {
        let mut keymap = KeyMap::new();
        for (key_str, command_str) in raw_map {
            let key_event =
                KeyEvent::from_str(key_str).map_err(|e| format!("Invalid key '{key_str}': {e}"))?;
            let command = Command::from_str(command_str)
                .map_err(|e| format!("Invalid command '{command_str}': {e}"))?;
            keymap.insert(key_event, command);
        }
        Ok(keymap)
    }

    /// Merge user configuration with defaults.
    ///
    /// Keep `Noop` values so higher-precedence layers can explicitly unbind inherited mappings.
    fn from_raw(raw: &KeysConfigRaw) -> Result<Self, String> {
        let mut config = Self::default();

        config.general.extend(Self::parse_keymap(&raw.general)?);
        config
            .list_navigation
            .extend(Self::parse_keymap(&raw.list_navigation)?);
        config
            .pane_focus
            .extend(Self::parse_keymap(&raw.pane_focus)?);
        config.navigate.extend(Self::parse_keymap(&raw.navigate)?);
        config
            .search_edit
            .extend(Self::parse_keymap(&raw.search_edit)?);

        Ok(config)
    }
}

// Custom deserializer for KeysConfig
impl<'de> Deserialize<'de> for KeysConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = KeysConfigRaw::deserialize(deserializer)?;
        KeysConfig::from_raw(&raw).map_err(serde::de::Error::custom)
    }
}
