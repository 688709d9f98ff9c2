mod cli;
mod logging;

use clap::{Parser, Subcommand};
use cli::{CliError, CliResult};
use logging::LogSettings;
use panehop_core::{
    config::{self, Config},
    geometry::Direction,
    host::{CliTmuxBridge, HostBridge},
    state::AppState,
};
use panehop_tui::{ExitReason, RunOptions, Theme};
use std::{path::PathBuf, process::ExitCode, sync::Arc};

#[derive(Parser)]
#[command(version, about = "Searchable tmux pane tree with directional focus jumps")]
struct Cli {
    /// Override path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// tmux socket name, as for `tmux -L`
    #[arg(short = 'L', long)]
    socket: Option<String>,

    /// Log level for the log file (off, error, warn, info, debug, trace).
    /// Overrides `[log] level`; the default is warn.
    #[arg(long, value_parser = config::parse_log_level)]
    log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the window/tab/pane tree
    List {
        #[arg(long)]
        json: bool,
    },
    /// Focus the pane to the left, right, above or below the current one
    Focus { direction: Direction },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_errors = matches!(cli.command, Some(Commands::List { json: true }));

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            let cli_error = CliError::system(format!("{error:#}"));
            cli::print_error(&cli_error, json_errors);
            return ExitCode::from(cli_error.code());
        }
    };

    let log_settings = LogSettings::resolve(cli.log_level, &config.log, logging::cache_home());
    if let Err(e) = logging::setup_logging(&log_settings) {
        eprintln!("warning: file logging disabled: {e:#}");
    }

    let socket = cli.socket.or_else(|| config.host.socket_name.clone());
    let host = CliTmuxBridge::new(socket, config.host.poll_interval());

    let result = match cli.command {
        Some(Commands::List { json }) => cli::cmd_list(&host, json, dirs::home_dir().as_deref()),
        Some(Commands::Focus { direction }) => cli::cmd_focus(&host, direction),
        None => run_tui(&config, host),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("exiting with code {}: {}", error.code(), error.message());
            cli::print_error(&error, json_errors);
            ExitCode::from(error.code())
        }
    }
}

fn run_tui(config: &Config, host: CliTmuxBridge) -> CliResult<()> {
    host.connect()?;
    let snapshot = host.list_windows()?;
    log::info!("starting with {} panes", snapshot.session_count());

    let mut state = AppState::new(
        snapshot,
        config.search.filter_options(),
        config.search.policy,
        config.quit.double_press_window(),
    );
    let theme = Theme::from_config(&config.theme);
    let options = RunOptions {
        exit_after_activate: config.behavior.exit_after_activate,
        home_dir: dirs::home_dir(),
    };
    let host: Arc<dyn HostBridge> = Arc::new(host);

    let mut terminal = if should_disable_alt_screen() {
        // Inline viewport keeps drawing in the primary screen buffer, which makes
        // tmux capture-pane output usable for automation/debugging.
        ratatui::init_with_options(ratatui::TerminalOptions {
            viewport: ratatui::Viewport::Inline(30),
        })
    } else {
        ratatui::init()
    };
    let result = panehop_tui::run(
        &mut terminal,
        &mut state,
        &host,
        &theme,
        &config.keys,
        &options,
    );
    ratatui::restore();

    match result? {
        ExitReason::Quit => log::info!("quit"),
        ExitReason::Activated(session_id) => log::info!("exiting after focusing {session_id}"),
        ExitReason::Disconnected(error) => return Err(error.into()),
    }
    Ok(())
}

fn should_disable_alt_screen() -> bool {
    match std::env::var("PANEHOP_NO_ALT_SCREEN") {
        Ok(value) => {
            let value = value.trim().to_ascii_lowercase();
            !matches!(value.as_str(), "" | "0" | "false" | "no" | "off")
        }
        Err(_) => false,
    }
}
