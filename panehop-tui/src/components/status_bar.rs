use crate::theme::Theme;
use panehop_core::{
    config::{Command, KeysConfig},
    state::{AppState, StatusMessage},
};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// Bottom line: an error, then a status message, else key hints for the mode.
pub fn draw(f: &mut Frame, area: Rect, state: &AppState, theme: &Theme, keys: &KeysConfig) {
    f.render_widget(Paragraph::new(status_line(state, theme, keys)), area);
}

pub(crate) fn status_line(state: &AppState, theme: &Theme, keys: &KeysConfig) -> Line<'static> {
    if let Some(error) = &state.error {
        return Line::from(Span::styled(
            format!(" Error: {error}"),
            Style::default()
                .fg(theme.error)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let keymap = keys.keymap_for_mode(state.mode);
    match &state.status {
        Some(StatusMessage::QuitPrompt) => {
            let key = KeysConfig::find_key(&keymap, &Command::QuitConfirm)
                .map_or_else(|| "C-q".to_string(), |k| k.to_string());
            Line::from(Span::styled(
                format!(" Press {key} again to quit"),
                Style::default()
                    .fg(theme.prompt)
                    .add_modifier(Modifier::BOLD),
            ))
        }
        Some(StatusMessage::Info(message)) => Line::from(Span::styled(
            format!(" {message}"),
            Style::default().fg(theme.notice),
        )),
        None => {
            let mut spans = vec![Span::raw(" ")];
            for command in state.mode.footer_commands() {
                let Some(key) = KeysConfig::find_key(&keymap, command) else {
                    continue;
                };
                if spans.len() > 1 {
                    spans.push(Span::styled(" | ", theme.detail_style()));
                }
                spans.push(Span::styled(
                    key.to_string(),
                    Style::default()
                        .fg(theme.hint)
                        .add_modifier(Modifier::BOLD),
                ));
                spans.push(Span::styled(
                    format!(" {}", command.description()),
                    theme.detail_style(),
                ));
            }
            Line::from(spans)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panehop_core::{
        config::{SearchPolicy, ThemeConfig},
        filter::FilterOptions,
        model::TreeSnapshot,
        state::Mode,
    };
    use std::time::{Duration, Instant};

    fn state() -> AppState {
        AppState::new(
            TreeSnapshot::default(),
            FilterOptions::default(),
            SearchPolicy::TypeToSearch,
            Duration::from_millis(1500),
        )
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_quit_prompt_names_configured_key() {
        let mut state = state();
        state.quit_confirm(Instant::now());
        let theme = Theme::from_config(&ThemeConfig::default());
        let line = status_line(&state, &theme, &KeysConfig::default());
        assert_eq!(text(&line), " Press C-q again to quit");
    }

    #[test]
    fn test_error_takes_precedence() {
        let mut state = state();
        state.status = Some(StatusMessage::Info("ok".to_string()));
        state.error = Some("host command failed: boom".to_string());
        let theme = Theme::from_config(&ThemeConfig::default());
        let line = status_line(&state, &theme, &KeysConfig::default());
        assert_eq!(text(&line), " Error: host command failed: boom");
    }

    #[test]
    fn test_hints_follow_mode() {
        let mut state = state();
        let theme = Theme::from_config(&ThemeConfig::default());
        let keys = KeysConfig::default();
        let navigate = text(&status_line(&state, &theme, &keys));
        assert!(navigate.contains("enter"));
        assert!(navigate.contains('/'));

        state.mode = Mode::SearchEdit;
        let search = text(&status_line(&state, &theme, &keys));
        assert!(search.contains("esc"));
        assert!(search.contains("tab"));
    }
}
