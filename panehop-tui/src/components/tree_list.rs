use crate::theme::Theme;
use panehop_core::{
    filter::VisibleRow,
    model::abbreviate_home,
    state::AppState,
    tree::Row,
};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};
use std::path::Path;

/// Render the flattened window/tab/pane tree, filtered by the current query.
pub fn draw(f: &mut Frame, area: Rect, state: &AppState, theme: &Theme, home: Option<&Path>) {
    let items: Vec<ListItem> = if state.filter.visible_len() == 0 {
        let message = if state.filter.rows().is_empty() {
            "No panes"
        } else {
            "No matching panes"
        };
        vec![ListItem::new(Line::from(Span::styled(
            message,
            theme.detail_style().add_modifier(Modifier::ITALIC),
        )))]
    } else {
        state
            .filter
            .visible_rows()
            .map(|(row, visible)| ListItem::new(row_line(row, visible, theme, home)))
            .collect()
    };

    let pane_count = state
        .filter
        .visible_rows()
        .filter(|(row, _)| row.is_session())
        .count();
    let title = if state.filter.query().trim().is_empty() {
        format!(" {pane_count} panes ")
    } else {
        format!(" {pane_count} matching panes ")
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(theme.border)),
        )
        .highlight_style(theme.selection_style())
        .highlight_symbol("▸ ");

    let mut list_state = ListState::default();
    list_state.select(state.filter.selected_index());
    *list_state.offset_mut() = state.scroll_offset;
    f.render_stateful_widget(list, area, &mut list_state);
}

fn row_line(row: &Row, visible: &VisibleRow, theme: &Theme, home: Option<&Path>) -> Line<'static> {
    let base = theme.row_style(&row.entity);
    let matched = theme.matched_style(base);

    let mut spans = vec![Span::raw("  ".repeat(usize::from(row.depth)))];
    spans.extend(highlighted_spans(&row.label, &visible.highlights, base, matched));

    if row.is_session() {
        if !row.command.is_empty() {
            spans.push(Span::styled(
                format!("  {}", row.command),
                theme.detail_style(),
            ));
        }
        let cwd = abbreviate_home(&row.working_directory, home);
        if !cwd.is_empty() {
            spans.push(Span::styled(
                format!("  {cwd}"),
                theme.detail_style(),
            ));
        }
    }
    if row.is_current {
        spans.push(Span::styled(" *", theme.current_marker_style()));
    }

    Line::from(spans)
}

/// Split `label` into plain and matched spans. Ranges are byte offsets.
fn highlighted_spans(
    label: &str,
    highlights: &[std::ops::Range<usize>],
    base: Style,
    matched: Style,
) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut pos = 0;
    for range in highlights {
        let (Some(before), Some(hit)) = (label.get(pos..range.start), label.get(range.clone()))
        else {
            continue;
        };
        if !before.is_empty() {
            spans.push(Span::styled(before.to_string(), base));
        }
        spans.push(Span::styled(hit.to_string(), matched));
        pos = range.end;
    }
    if let Some(rest) = label.get(pos..)
        && !rest.is_empty()
    {
        spans.push(Span::styled(rest.to_string(), base));
    }
    spans
}
