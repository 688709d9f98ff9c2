use crate::theme::Theme;
use panehop_core::state::SearchInput;
use ratatui::{
    Frame,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::ops::Range;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const PROMPT: &str = "/ ";

/// Query box above the tree. While editing, the border lights up and the
/// terminal cursor sits in the query. A query kept after leaving the search is dimmed.
pub fn draw(
    f: &mut Frame,
    area: Rect,
    input: &SearchInput,
    editing: bool,
    placeholder: &str,
    theme: &Theme,
) {
    let border = theme.search_border(editing);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" panehop ")
        .border_style(border);
    let inner = block.inner(area);
    let prompt_width = u16::try_from(PROMPT.width()).unwrap_or(u16::MAX);
    let text_width = inner.width.saturating_sub(prompt_width);

    let mut spans = vec![Span::styled(PROMPT, border)];
    let mut cursor_col = 0;
    if input.text.is_empty() {
        spans.push(Span::styled(
            placeholder.to_string(),
            theme.detail_style().add_modifier(Modifier::ITALIC),
        ));
    } else {
        let (range, col) = visible_window(&input.text, input.cursor, usize::from(text_width));
        let shown = input.text[range].to_string();
        spans.push(if editing {
            Span::raw(shown)
        } else {
            Span::styled(shown, theme.detail_style())
        });
        cursor_col = u16::try_from(col).unwrap_or(u16::MAX);
    }
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);

    if editing && text_width > 0 && inner.height > 0 {
        let x = inner.x + prompt_width + cursor_col.min(text_width - 1);
        f.set_cursor_position((x, inner.y));
    }
}

/// The part of `text` that fits in `width` columns with the cursor in view,
/// and the cursor column inside it. As much text as fits is kept left of the
/// cursor, and one column is left free for the cursor itself.
fn visible_window(text: &str, cursor: usize, width: usize) -> (Range<usize>, usize) {
    if width == 0 {
        return (0..0, 0);
    }
    let cursor = cursor.min(text.len());
    let graphemes: Vec<(usize, &str)> = text.grapheme_indices(true).collect();

    let mut start = cursor;
    let mut before = 0;
    for &(offset, grapheme) in graphemes.iter().rev().filter(|(offset, _)| *offset < cursor) {
        let grapheme_width = grapheme.width();
        if before + grapheme_width > width - 1 {
            break;
        }
        before += grapheme_width;
        start = offset;
    }

    let mut end = start;
    let mut shown = 0;
    for &(offset, grapheme) in graphemes.iter().filter(|(offset, _)| *offset >= start) {
        let grapheme_width = grapheme.width();
        if shown + grapheme_width > width {
            break;
        }
        shown += grapheme_width;
        end = offset + grapheme.len();
    }

    (start..end, before)
}
