use std::{
    collections::HashMap,
    io,
    process::Command,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use super::{HostBridge, HostEvent, Subscription, UpdateSink};
use crate::error::HostError;
use crate::model::{PaneRect, Session, SessionId, Tab, TreeSnapshot, Window};
use crate::tree::TreeUpdate;

/// Consecutive poll failures tolerated before reporting a disconnect.
const MAX_POLL_FAILURES: u32 = 3;

/// Granularity of cancellation checks while the poller sleeps.
const CANCEL_CHECK: Duration = Duration::from_millis(25);

const FIELD_COUNT: usize = 16;

// The title goes last: it is free text and may itself contain tabs.
const LIST_PANES_FORMAT: &str = concat!(
    "#{session_id}\t#{session_name}\t#{session_attached}\t",
    "#{window_id}\t#{window_index}\t#{window_name}\t#{window_active}\t",
    "#{pane_id}\t#{pane_active}\t",
    "#{pane_left}\t#{pane_top}\t#{pane_width}\t#{pane_height}\t",
    "#{pane_current_command}\t#{pane_current_path}\t#{pane_title}"
);

/// Talks to a tmux server through its command line.
#[derive(Debug, Clone)]
pub struct CliTmuxBridge {
    socket: Option<String>,
    poll_interval: Duration,
}

impl CliTmuxBridge {
    pub fn new(socket: Option<String>, poll_interval: Duration) -> Self {
        Self {
            socket,
            poll_interval,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("tmux");
        // Without -u a non-UTF-8 client locale turns the tab separators into `_`
        cmd.arg("-u");
        if let Some(socket) = &self.socket {
            cmd.args(["-L", socket]);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String, HostError> {
        let output = self.command().args(args).output().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                HostError::Connection("tmux is not installed or not on PATH".to_string())
            } else {
                HostError::Command(format!("failed to run tmux: {e}"))
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_failure(stderr.trim()))
        }
    }

    fn is_inside_tmux(&self) -> bool {
        std::env::var("TMUX").is_ok_and(|v| !v.is_empty())
    }

    /// Session of the client we are attached to, if any.
    fn key_session(&self) -> Option<String> {
        self.run(&["display-message", "-p", "#{session_id}"])
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl HostBridge for CliTmuxBridge {
    fn connect(&self) -> Result<(), HostError> {
        let sessions = self.run(&["list-sessions", "-F", "#{session_id}"])?;
        if sessions.trim().is_empty() {
            return Err(HostError::Connection("tmux has no sessions".to_string()));
        }
        log::info!(
            "connected to tmux ({} sessions)",
            sessions.lines().count()
        );
        Ok(())
    }

    fn list_windows(&self) -> Result<TreeSnapshot, HostError> {
        let key_session = self.key_session();
        let output = self.run(&["list-panes", "-a", "-F", LIST_PANES_FORMAT])?;
        parse_list_panes(&output, key_session.as_deref())
    }

    fn subscribe(&self, sink: UpdateSink) -> Result<Subscription, HostError> {
        let bridge = self.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("tmux-poll".to_string())
            .spawn(move || bridge.poll_loop(&sink, &thread_cancel))
            .map_err(|e| HostError::Command(format!("failed to start poller: {e}")))?;

        Ok(Subscription::new(cancel, Some(handle)))
    }

    fn activate_session(&self, id: &SessionId) -> Result<(), HostError> {
        let target = id.as_str();
        let stale = |e: HostError| match e {
            HostError::Command(msg) if msg.contains("can't find") => {
                HostError::StaleReference { id: id.clone() }
            }
            other => other,
        };

        self.run(&["select-window", "-t", target]).map_err(stale)?;
        self.run(&["select-pane", "-t", target]).map_err(stale)?;

        if self.is_inside_tmux()
            && let Err(e) = self.run(&["switch-client", "-t", target])
        {
            // Not fatal: the pane is focused within its session either way.
            log::debug!("switch-client to {target} failed: {e}");
        }
        Ok(())
    }
}

impl CliTmuxBridge {
    fn poll_loop(&self, sink: &UpdateSink, cancel: &AtomicBool) {
        let mut previous: Option<TreeSnapshot> = None;
        let mut failures = 0;

        while !cancel.load(Ordering::Relaxed) {
            match self.list_windows() {
                Ok(snapshot) => {
                    failures = 0;
                    let updates = match &previous {
                        Some(prev) => TreeUpdate::between(prev, &snapshot),
                        None => vec![TreeUpdate::Replace(snapshot.clone())],
                    };
                    for update in updates {
                        if cancel.load(Ordering::Relaxed) {
                            return;
                        }
                        sink(HostEvent::Update(update));
                    }
                    previous = Some(snapshot);
                }
                Err(HostError::MalformedEvent(reason)) => {
                    // The next tick is a full re-read, so just skip this one
                    log::warn!("ignoring unreadable tmux listing: {reason}");
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("tmux poll failed ({failures}/{MAX_POLL_FAILURES}): {e}");
                    if e.is_fatal() || failures >= MAX_POLL_FAILURES {
                        sink(HostEvent::Disconnected(e));
                        return;
                    }
                }
            }

            let deadline = Instant::now() + self.poll_interval;
            while Instant::now() < deadline {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                thread::sleep(CANCEL_CHECK.min(self.poll_interval));
            }
        }
    }
}

/// Map tmux stderr to an error kind.
pub fn classify_failure(stderr: &str) -> HostError {
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied") {
        HostError::Permission(stderr.to_string())
    } else if lower.contains("no server running")
        || lower.contains("error connecting to")
        || lower.contains("server exited")
        || lower.contains("lost server")
    {
        HostError::Connection(stderr.to_string())
    } else {
        HostError::Command(stderr.to_string())
    }
}

fn parse_num<T: std::str::FromStr>(field: &str, name: &str, line: &str) -> Result<T, HostError> {
    field
        .trim()
        .parse()
        .map_err(|_| HostError::MalformedEvent(format!("bad {name} '{field}' in '{line}'")))
}

/// One `list-panes` row split into its fields.
struct PaneLine<'a> {
    session_id: &'a str,
    attached: bool,
    window_active: bool,
    pane_active: bool,
    fields: Vec<&'a str>,
}

impl<'a> PaneLine<'a> {
    fn split(raw: &'a str) -> Option<Self> {
        let fields: Vec<&str> = raw.splitn(FIELD_COUNT, '\t').collect();
        (fields.len() == FIELD_COUNT).then(|| Self {
            session_id: fields[0],
            attached: fields[2].trim() != "0",
            window_active: fields[6] == "1",
            pane_active: fields[8] == "1",
            fields,
        })
    }

    fn tmux_window(&self) -> &'a str {
        self.fields[3]
    }
}

/// Build a snapshot from `list-panes -a` output in `LIST_PANES_FORMAT`.
///
/// tmux sessions become windows, tmux windows become tabs. Panes keep the
/// order tmux lists them in. `key_session` marks the client's session; without
/// it the first attached session is used.
///
/// Grouped sessions and linked windows list one tmux window under several
/// sessions. Each window is kept once, under the key session if it is there,
/// else under an attached session, else where it is first listed.
///
/// Unreadable lines are skipped. The listing is only rejected when nothing
/// in it could be read.
pub fn parse_list_panes(
    output: &str,
    key_session: Option<&str>,
) -> Result<TreeSnapshot, HostError> {
    let mut lines = Vec::new();
    let mut rejected = None;
    for raw in output.lines().filter(|l| !l.trim().is_empty()) {
        match PaneLine::split(raw) {
            Some(line) => lines.push(line),
            None => {
                log::warn!("skipping unreadable list-panes line '{raw}'");
                rejected.get_or_insert(raw);
            }
        }
    }
    if lines.is_empty()
        && let Some(raw) = rejected
    {
        return Err(HostError::MalformedEvent(format!(
            "expected {FIELD_COUNT} tab-separated fields in '{raw}'"
        )));
    }

    let key = key_session
        .filter(|k| lines.iter().any(|l| l.session_id == *k))
        .or_else(|| lines.iter().find(|l| l.attached).map(|l| l.session_id))
        .or_else(|| lines.first().map(|l| l.session_id));

    // Lower rank wins; ties go to the first session listed.
    let rank = |line: &PaneLine| {
        if Some(line.session_id) == key {
            0
        } else if line.attached {
            1
        } else {
            2
        }
    };
    let mut owners: HashMap<&str, (u8, &str)> = HashMap::new();
    for line in &lines {
        let candidate = (rank(line), line.session_id);
        owners
            .entry(line.tmux_window())
            .and_modify(|owner| {
                if candidate.0 < owner.0 {
                    *owner = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut windows: Vec<Window> = Vec::new();
    for line in &lines {
        if owners.get(line.tmux_window()).map(|(_, owner)| *owner) != Some(line.session_id) {
            continue;
        }
        let f = &line.fields;
        let raw = f.join("\t");
        let is_key = Some(line.session_id) == key;

        if windows.last().is_none_or(|w| w.id.as_str() != line.session_id) {
            windows.push(Window {
                id: line.session_id.into(),
                title: f[1].to_string(),
                index: windows.len() + 1,
                is_key,
                tabs: Vec::new(),
            });
        }
        let Some(window) = windows.last_mut() else {
            continue;
        };

        if window.tabs.last().is_none_or(|t| t.id.as_str() != f[3]) {
            window.tabs.push(Tab {
                id: f[3].into(),
                label: f[5].to_string(),
                index: parse_num(f[4], "window_index", &raw)?,
                sessions: Vec::new(),
            });
        }
        let Some(tab) = window.tabs.last_mut() else {
            continue;
        };

        tab.sessions.push(Session {
            id: f[7].into(),
            tab_id: tab.id.clone(),
            title: f[15].to_string(),
            rect: PaneRect::new(
                parse_num(f[9], "pane_left", &raw)?,
                parse_num(f[10], "pane_top", &raw)?,
                parse_num(f[11], "pane_width", &raw)?,
                parse_num(f[12], "pane_height", &raw)?,
            ),
            is_current: is_key && line.window_active && line.pane_active,
            working_directory: f[14].to_string(),
            command: f[13].to_string(),
        });
    }

    Ok(TreeSnapshot::new(windows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(parts: [&str; FIELD_COUNT]) -> String {
        parts.join("\t")
    }

    fn sample_output() -> String {
        [
            line([
                "$0", "main", "1", "@0", "0", "editor", "1", "%0", "0", "0", "0", "80", "24",
                "nvim", "/home/ada/src", "nvim",
            ]),
            line([
                "$0", "main", "1", "@0", "0", "editor", "1", "%1", "1", "81", "0", "79", "24",
                "cargo", "/home/ada/src", "build",
            ]),
            line([
                "$0", "main", "1", "@1", "1", "logs", "0", "%2", "1", "0", "0", "160", "24",
                "tail", "/var/log", "tail -f",
            ]),
            line([
                "$1", "scratch", "0", "@2", "0", "zsh", "1", "%3", "1", "0", "0", "160", "24",
                "zsh", "/tmp", "",
            ]),
        ]
        .join("\n")
    }

    #[test]
    fn test_parse_list_panes_builds_hierarchy() {
        let snapshot = parse_list_panes(&sample_output(), Some("$0")).unwrap();
        assert_eq!(snapshot.windows.len(), 2);

        let main = &snapshot.windows[0];
        assert_eq!(main.title, "main");
        assert_eq!(main.index, 1);
        assert!(main.is_key);
        assert_eq!(main.tabs.len(), 2);
        assert_eq!(main.tabs[0].label, "editor");
        assert_eq!(main.tabs[1].index, 1);

        let build = &main.tabs[0].sessions[1];
        assert_eq!(build.id.as_str(), "%1");
        assert_eq!(build.rect, PaneRect::new(81, 0, 79, 24));
        assert_eq!(build.title, "build");
        assert_eq!(build.command, "cargo");
        assert_eq!(build.working_directory, "/home/ada/src");

        assert_eq!(snapshot.windows[1].index, 2);
        assert!(!snapshot.windows[1].is_key);
    }

    #[test]
    fn test_only_key_session_has_current_pane() {
        let snapshot = parse_list_panes(&sample_output(), Some("$0")).unwrap();
        let current: Vec<_> = snapshot
            .sessions()
            .filter(|s| s.is_current)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(current, vec!["%1"]);
    }

    #[test]
    fn test_key_session_falls_back_to_attached() {
        let snapshot = parse_list_panes(&sample_output(), None).unwrap();
        assert!(snapshot.windows[0].is_key);

        let snapshot = parse_list_panes(&sample_output(), Some("$9")).unwrap();
        assert!(snapshot.windows[0].is_key);
    }

    #[test]
    fn test_title_may_contain_tabs() {
        let output = line([
            "$0", "main", "1", "@0", "0", "w", "1", "%0", "1", "0", "0", "80", "24", "zsh", "/",
            "a\tb",
        ]);
        let snapshot = parse_list_panes(&output, None).unwrap();
        assert_eq!(snapshot.windows[0].tabs[0].sessions[0].title, "a\tb");
    }

    #[test]
    fn test_commands_force_utf8_client() {
        let bridge = CliTmuxBridge::new(Some("work".to_string()), Duration::from_millis(500));
        let args: Vec<String> = bridge
            .command()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-u", "-L", "work"]);
    }

    #[test]
    fn test_parse_skips_lines_with_mangled_separators() {
        // What a non-UTF-8 client prints for a tab-separated format
        let mangled = "$0_main_1_@0_0_editor_1_%9_1_0_0_80_24_zsh_/tmp_t";
        let output = format!("{}\n{mangled}", sample_output());
        let snapshot = parse_list_panes(&output, Some("$0")).unwrap();
        assert_eq!(snapshot.session_count(), 4);
        assert!(!snapshot.contains_session(&"%9".into()));
    }

    #[test]
    fn test_parse_rejects_fully_mangled_listing() {
        let mangled = "$0_main_1_@0_0_editor_1_%0_1_0_0_80_24_zsh_/tmp_t";
        let err = parse_list_panes(mangled, None).unwrap_err();
        assert!(matches!(err, HostError::MalformedEvent(_)));
        assert!(!err.is_fatal());
    }

    /// `b` is grouped with `a`, so both list window @0 and pane %0.
    fn grouped_output(a_attached: &str, b_attached: &str) -> String {
        [
            line([
                "$0", "a", a_attached, "@0", "0", "shell", "1", "%0", "1", "0", "0", "80", "24",
                "zsh", "/tmp", "top",
            ]),
            line([
                "$1", "b", b_attached, "@0", "0", "shell", "1", "%0", "1", "0", "0", "80", "24",
                "zsh", "/tmp", "top",
            ]),
            line([
                "$1", "b", b_attached, "@1", "1", "notes", "0", "%1", "1", "0", "0", "80", "24",
                "vim", "/tmp", "notes",
            ]),
        ]
        .join("\n")
    }

    fn ids(snapshot: &TreeSnapshot) -> Vec<&str> {
        snapshot.sessions().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_grouped_sessions_list_each_pane_once() {
        let snapshot = parse_list_panes(&grouped_output("0", "0"), None).unwrap();
        assert_eq!(ids(&snapshot), vec!["%0", "%1"]);
        assert_eq!(snapshot.windows.len(), 2);
        assert_eq!(snapshot.windows[0].title, "a");
        assert_eq!(snapshot.windows[1].index, 2);
    }

    #[test]
    fn test_shared_window_goes_to_key_session() {
        let snapshot = parse_list_panes(&grouped_output("0", "0"), Some("$1")).unwrap();
        assert_eq!(ids(&snapshot), vec!["%0", "%1"]);
        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.windows[0].title, "b");
        assert_eq!(snapshot.windows[0].tabs.len(), 2);
        assert_eq!(snapshot.current_session().unwrap().id.as_str(), "%0");
    }

    #[test]
    fn test_shared_window_prefers_attached_session() {
        let snapshot = parse_list_panes(&grouped_output("0", "1"), Some("$7")).unwrap();
        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.windows[0].title, "b");
    }

    #[test]
    fn test_parse_rejects_short_lines() {
        let err = parse_list_panes("$0\tmain\t1", None).unwrap_err();
        assert!(matches!(err, HostError::MalformedEvent(_)));
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        let output = line([
            "$0", "main", "1", "@0", "0", "w", "1", "%0", "1", "left", "0", "80", "24", "zsh",
            "/", "t",
        ]);
        assert!(matches!(
            parse_list_panes(&output, None),
            Err(HostError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_parse_empty_output() {
        let snapshot = parse_list_panes("", None).unwrap();
        assert!(snapshot.windows.is_empty());
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("no server running on /tmp/tmux-1000/default"),
            HostError::Connection(_)
        ));
        assert!(matches!(
            classify_failure("error connecting to /tmp/tmux-1000/default (No such file or directory)"),
            HostError::Connection(_)
        ));
        assert!(matches!(
            classify_failure("error connecting to /tmp/tmux-1000/default (Permission denied)"),
            HostError::Permission(_)
        ));
        assert!(matches!(
            classify_failure("can't find pane: %99"),
            HostError::Command(_)
        ));
    }
}
