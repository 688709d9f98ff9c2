use panehop_core::{
    error::HostError,
    geometry::{self, Direction},
    host::HostBridge,
    model::abbreviate_home,
    tree::{Row, flatten},
};
use serde::Serialize;
use std::{fmt::Write, path::Path};

pub type CliResult<T> = Result<T, CliError>;

pub const EXIT_HOST_UNREACHABLE: u8 = 1;
pub const EXIT_FAILURE: u8 = 2;
pub const EXIT_PERMISSION_DENIED: u8 = 3;

#[derive(Debug, Clone)]
pub struct CliError {
    message: String,
    code: u8,
}

impl CliError {
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: EXIT_FAILURE,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> u8 {
        self.code
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(value: anyhow::Error) -> Self {
        // The TUI surfaces host failures through anyhow; keep their exit codes
        match value.downcast::<HostError>() {
            Ok(host_error) => host_error.into(),
            Err(other) => Self::system(format!("{other:#}")),
        }
    }
}

impl From<HostError> for CliError {
    fn from(value: HostError) -> Self {
        let code = match value {
            HostError::Connection(_) => EXIT_HOST_UNREACHABLE,
            HostError::Permission(_) => EXIT_PERMISSION_DENIED,
            _ => EXIT_FAILURE,
        };
        let mut message = value.to_string();
        if let Some(hint) = value.remediation() {
            let _ = write!(message, "\n{hint}");
        }
        Self { message, code }
    }
}

/// Print the flattened window/tab/pane tree.
pub fn cmd_list(host: &dyn HostBridge, json: bool, home: Option<&Path>) -> CliResult<()> {
    host.connect()?;
    let rows = flatten(&host.list_windows()?);

    if json {
        print_json(&rows)?;
    } else {
        print!("{}", format_tree(&rows, home));
    }

    Ok(())
}

/// Focus the pane next to the current one. No neighbour is not an error.
pub fn cmd_focus(host: &dyn HostBridge, direction: Direction) -> CliResult<()> {
    host.connect()?;
    let snapshot = host.list_windows()?;
    let Some(current) = snapshot.current_session() else {
        return Err(CliError::system("no current pane"));
    };
    let panes = snapshot.visible_panes(&current.id).unwrap_or_default();

    let Some(target) = geometry::adjacent(&current.id, direction, &panes) else {
        log::debug!("no pane {direction} of {}", current.id);
        return Ok(());
    };

    match host.activate_session(&target) {
        Ok(()) => {
            log::info!("focused {target} ({direction} of {})", current.id);
            Ok(())
        }
        Err(HostError::StaleReference { id }) => {
            log::info!("{id} disappeared before it could be focused");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn format_tree(rows: &[Row], home: Option<&Path>) -> String {
    let mut out = String::new();
    for row in rows {
        let indent = "  ".repeat(usize::from(row.depth));
        let marker = if row.is_current { " *" } else { "" };
        match row.entity.session_id() {
            Some(id) => {
                let mut line = format!("{indent}{id}  {}", row.label);
                if !row.command.is_empty() {
                    let _ = write!(line, "  [{}]", row.command);
                }
                let cwd = abbreviate_home(&row.working_directory, home);
                if !cwd.is_empty() {
                    let _ = write!(line, "  {cwd}");
                }
                let _ = writeln!(out, "{line}{marker}");
            }
            None => {
                let _ = writeln!(out, "{indent}{}{marker}", row.label);
            }
        }
    }
    out
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!(
        "{}",
        serde_json::to_string(value).map_err(|e| CliError::system(e.to_string()))?
    );
    Ok(())
}

pub fn print_error(error: &CliError, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": error.message() });
        eprintln!("{payload}");
    } else {
        eprintln!("{}", error.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehop_core::{
        host::mock::MockHostBridge,
        model::{PaneRect, Session, SessionId, Tab, TreeSnapshot, Window},
    };
    use std::path::PathBuf;

    fn pane(id: &str, title: &str, x: u16, y: u16) -> Session {
        Session {
            id: id.into(),
            tab_id: "@1".into(),
            title: title.to_string(),
            rect: PaneRect::new(x, y, 40, 12),
            is_current: false,
            working_directory: "/home/ada/src".to_string(),
            command: "zsh".to_string(),
        }
    }

    /// 2x2 grid in one tab, top-left pane current.
    fn grid() -> TreeSnapshot {
        let mut top_left = pane("%1", "editor", 0, 0);
        top_left.is_current = true;
        TreeSnapshot::new(vec![Window {
            id: "$1".into(),
            title: "work".to_string(),
            index: 1,
            is_key: true,
            tabs: vec![Tab {
                id: "@1".into(),
                label: "code".to_string(),
                index: 0,
                sessions: vec![
                    top_left,
                    pane("%2", "shell", 40, 0),
                    pane("%3", "tests", 0, 12),
                    pane("%4", "logs", 40, 12),
                ],
            }],
        }])
    }

    #[test]
    fn focus_moves_to_adjacent_pane() {
        let host = MockHostBridge::new(grid());
        cmd_focus(&host, Direction::Down).unwrap();
        assert_eq!(host.activated(), vec![SessionId::from("%3")]);
    }

    #[test]
    fn focus_without_neighbour_is_noop() {
        let host = MockHostBridge::new(grid());
        cmd_focus(&host, Direction::Left).unwrap();
        assert!(host.activated().is_empty());
    }

    #[test]
    fn focus_stale_target_is_noop() {
        let host = MockHostBridge::new(grid());
        host.fail_next_activation(HostError::StaleReference { id: "%2".into() });
        cmd_focus(&host, Direction::Right).unwrap();
        assert!(host.activated().is_empty());
    }

    #[test]
    fn focus_command_failure_exits_with_failure() {
        let host = MockHostBridge::new(grid());
        host.fail_next_activation(HostError::Command("select-pane: boom".to_string()));
        let err = cmd_focus(&host, Direction::Right).unwrap_err();
        assert_eq!(err.code(), EXIT_FAILURE);
    }

    #[test]
    fn connection_error_maps_to_exit_one_with_hint() {
        let host = MockHostBridge {
            connect_error: Some(HostError::Connection("no server running".to_string())),
            ..MockHostBridge::default()
        };
        let err = cmd_list(&host, false, None).unwrap_err();
        assert_eq!(err.code(), EXIT_HOST_UNREACHABLE);
        assert!(err.message().starts_with("host not running"));
        assert!(err.message().lines().count() > 1);
    }

    #[test]
    fn permission_error_maps_to_exit_three() {
        let err = CliError::from(HostError::Permission("/tmp/tmux-1000/default".to_string()));
        assert_eq!(err.code(), EXIT_PERMISSION_DENIED);
        assert!(err.message().starts_with("permission denied"));
    }

    #[test]
    fn host_error_survives_anyhow() {
        let err = CliError::from(anyhow::Error::from(HostError::Connection(
            "lost server".to_string(),
        )));
        assert_eq!(err.code(), EXIT_HOST_UNREACHABLE);
    }

    #[test]
    fn format_tree_snapshot() {
        let rows = flatten(&grid());
        let home = PathBuf::from("/home/ada");
        assert_eq!(
            format_tree(&rows, Some(&home)),
            "work *\n  0: code *\n    %1  editor  [zsh]  ~/src *\n    %2  shell  [zsh]  ~/src\n    %3  tests  [zsh]  ~/src\n    %4  logs  [zsh]  ~/src\n"
        );
    }
}
