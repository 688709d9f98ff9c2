use std::{ffi::OsString, path::PathBuf};

use log::LevelFilter;
use panehop_core::config::{APP_NAME, LogConfig};

const LOG_FILE_NAME: &str = "panehop.log";

const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

/// Where and how much to log, once the flag and the `[log]` section are merged.
#[derive(Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub file: PathBuf,
}

impl LogSettings {
    /// `--log-level` wins over `[log] level`; a `[log] file` replaces the cache path.
    pub fn resolve(
        cli_level: Option<LevelFilter>,
        config: &LogConfig,
        cache_home: Option<PathBuf>,
    ) -> Self {
        let level = cli_level.or(config.level).unwrap_or(DEFAULT_LEVEL);
        let file = config.file.clone().unwrap_or_else(|| {
            cache_home
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_NAME)
                .join(LOG_FILE_NAME)
        });
        Self { level, file }
    }
}

/// `$XDG_CACHE_HOME` if set, else `~/.cache`.
pub fn cache_home() -> Option<PathBuf> {
    cache_home_from(std::env::var_os("XDG_CACHE_HOME"), dirs::home_dir())
}

fn cache_home_from(xdg_cache_home: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    xdg_cache_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|home| home.join(".cache")))
}

pub fn setup_logging(settings: &LogSettings) -> anyhow::Result<()> {
    if settings.level == LevelFilter::Off {
        return Ok(());
    }
    if let Some(parent) = settings.file.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    simple_log::file(
        settings.file.to_string_lossy().into_owned(),
        settings.level,
        10,
        10,
    )
    .map_err(|e| anyhow::anyhow!(e))?;
    log::info!(
        "panehop {} logging to {} at {}",
        env!("CARGO_PKG_VERSION"),
        settings.file.display(),
        settings.level
    );
    Ok(())
}
