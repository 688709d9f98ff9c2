pub mod keys;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::filter::{FilterOptions, MatcherKind};

pub use keys::{Command, KeysConfig};

pub const APP_NAME: &str = "panehop";

fn config_dir() -> PathBuf {
    // ~/.config on macOS too, not ~/Library/Application Support
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// How typing interacts with the list.
    #[serde(default)]
    pub search: SearchConfig,

    /// Connection to the tmux server.
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub quit: QuitConfig,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    /// Color theme configuration.
    #[serde(default)]
    pub theme: ThemeConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Key binding configuration.
    /// To unbind an inherited key mapping, assign it to `noop`.
    #[serde(default)]
    pub keys: KeysConfig,
}

/// When keystrokes start editing the query.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPolicy {
    /// Any unbound printable key starts a search with that character.
    #[default]
    TypeToSearch,
    /// Only the `focus_search` command starts a search.
    Explicit,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// `"type-to-search"` (default) or `"explicit"`.
    #[serde(default)]
    pub policy: SearchPolicy,
    /// `"substring"` (default) or `"fuzzy"`.
    #[serde(default)]
    pub matcher: MatcherKind,
    /// Also match window and tab labels. A matching header shows everything beneath it.
    #[serde(default)]
    pub match_headers: bool,
}

impl SearchConfig {
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            matcher: self.matcher,
            match_headers: self.match_headers,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// How often the tmux server is polled for changes (default: 500).
    #[serde(default = "HostConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// tmux `-L` socket name. The `--socket` flag takes precedence.
    #[serde(default)]
    pub socket_name: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            socket_name: None,
        }
    }
}

impl HostConfig {
    fn default_poll_interval_ms() -> u64 {
        500
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct QuitConfig {
    /// Window for the second press of `quit_confirm` (default: 1500).
    #[serde(default = "QuitConfig::default_double_press_ms")]
    pub double_press_ms: u64,
}

impl Default for QuitConfig {
    fn default() -> Self {
        Self {
            double_press_ms: Self::default_double_press_ms(),
        }
    }
}

impl QuitConfig {
    fn default_double_press_ms() -> u64 {
        1500
    }

    pub fn double_press_window(&self) -> Duration {
        Duration::from_millis(self.double_press_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Exit once a pane has been focused. Handy inside `tmux display-popup`:
    /// ```toml
    /// [behavior]
    /// exit_after_activate = true
    /// ```
    #[serde(default)]
    pub exit_after_activate: bool,
}

/// File logging. The terminal belongs to the picker, so logs only go to a file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Used when `--log-level` is not given (default: warn).
    #[serde(default, deserialize_with = "deserialize_log_level")]
    pub level: Option<log::LevelFilter>,
    /// Log file, instead of `$XDG_CACHE_HOME/panehop/panehop.log`.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

pub fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse().map_err(|_| {
        format!("invalid log level '{s}': expected off, error, warn, info, debug or trace")
    })
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<Option<log::LevelFilter>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_log_level(&raw)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Colours for each part of the picker. Values are color names (`blue`,
/// `dark_gray`, ...), `default` for the terminal's own color, or `#rrggbb`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Background of the selected row.
    pub selection: ThemeColor,
    /// Text of the selected row.
    pub selection_text: ThemeColor,
    /// tmux session rows.
    pub window: ThemeColor,
    /// tmux window rows.
    pub tab: ThemeColor,
    /// The part of a title that matches the query.
    pub matched: ThemeColor,
    /// Pane command and directory, placeholders, separators.
    pub detail: ThemeColor,
    /// Marker on the focused pane and its parents.
    pub current: ThemeColor,
    pub border: ThemeColor,
    /// Search bar border while the query is being edited.
    pub search_active: ThemeColor,
    /// Keys in the footer.
    pub hint: ThemeColor,
    pub error: ThemeColor,
    /// Confirmation after a pane was focused.
    pub notice: ThemeColor,
    /// The quit confirmation prompt.
    pub prompt: ThemeColor,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        use NamedColor::{Blue, Cyan, Gray, Green, Magenta, Red, White, Yellow};
        Self {
            selection: ThemeColor::Named(Magenta),
            selection_text: ThemeColor::Named(White),
            window: ThemeColor::Named(Blue),
            tab: ThemeColor::Named(Cyan),
            matched: ThemeColor::Named(Yellow),
            detail: ThemeColor::Named(Gray),
            current: ThemeColor::Named(Green),
            border: ThemeColor::Named(Gray),
            search_active: ThemeColor::Named(Magenta),
            hint: ThemeColor::Named(Blue),
            error: ThemeColor::Named(Red),
            notice: ThemeColor::Named(Green),
            prompt: ThemeColor::Named(Yellow),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ThemeColor {
    /// Whatever the terminal uses when no color is set.
    Default,
    Named(NamedColor),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    Gray,
    DarkGray,
}

fn parse_hex(hex: &str) -> Option<ThemeColor> {
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).ok();
    Some(ThemeColor::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

impl FromStr for ThemeColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex)
                .ok_or_else(|| format!("invalid color '{s}': hex colors look like #1e90ff"));
        }

        let name = value
            .to_ascii_lowercase()
            .replace(['-', ' '], "_")
            .replace("grey", "gray");
        let named = match name.as_str() {
            "default" | "reset" => return Ok(Self::Default),
            "black" => NamedColor::Black,
            "red" => NamedColor::Red,
            "green" => NamedColor::Green,
            "yellow" => NamedColor::Yellow,
            "blue" => NamedColor::Blue,
            "magenta" => NamedColor::Magenta,
            "cyan" => NamedColor::Cyan,
            "white" => NamedColor::White,
            "gray" => NamedColor::Gray,
            "dark_gray" | "darkgray" => NamedColor::DarkGray,
            _ => {
                return Err(format!(
                    "invalid color '{s}': expected black, red, green, yellow, blue, magenta, \
                     cyan, white, gray, dark_gray, default or #rrggbb"
                ));
            }
        };
        Ok(Self::Named(named))
    }
}

impl TryFrom<String> for ThemeColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

pub fn load_config_from_str(s: &str) -> Result<Config> {
    let config: Config = toml::from_str(s)?;
    Ok(config)
}

/// Load the config file. A missing default file yields defaults; a missing
/// `--config` path is an error.
pub fn load_config(config_override: Option<&Path>) -> Result<Config> {
    let (config_file, required) = match config_override {
        Some(path) => (path.to_path_buf(), true),
        None => (config_file(), false),
    };
    if !config_file.exists() {
        if required {
            anyhow::bail!("Config file not found at {}", config_file.display());
        }
        log::debug!("no config at {}, using defaults", config_file.display());
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed to read {}", config_file.display()))?;
    toml::from_str(&contents).with_context(|| format!("Invalid config {}", config_file.display()))
}
