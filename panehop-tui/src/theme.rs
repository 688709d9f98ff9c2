use panehop_core::{
    config::{NamedColor, ThemeColor, ThemeConfig},
    tree::EntityRef,
};
use ratatui::style::{Color, Modifier, Style};

/// Resolved colors plus the styles the list and the bars share.
pub struct Theme {
    pub selection: Color,
    pub selection_text: Color,
    pub window: Color,
    pub tab: Color,
    pub matched: Color,
    pub detail: Color,
    pub current: Color,
    pub border: Color,
    pub search_active: Color,
    pub hint: Color,
    pub error: Color,
    pub notice: Color,
    pub prompt: Color,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Self {
        Self {
            selection: color(config.selection),
            selection_text: color(config.selection_text),
            window: color(config.window),
            tab: color(config.tab),
            matched: color(config.matched),
            detail: color(config.detail),
            current: color(config.current),
            border: color(config.border),
            search_active: color(config.search_active),
            hint: color(config.hint),
            error: color(config.error),
            notice: color(config.notice),
            prompt: color(config.prompt),
        }
    }

    /// Label style of a tree row. Session headers are bold so groups stand out.
    pub fn row_style(&self, entity: &EntityRef) -> Style {
        match entity {
            EntityRef::Window(_) => Style::default()
                .fg(self.window)
                .add_modifier(Modifier::BOLD),
            EntityRef::Tab(_) => Style::default().fg(self.tab),
            EntityRef::Session(_) => Style::default(),
        }
    }

    /// `base` with the matched characters recolored, keeping its weight.
    pub fn matched_style(&self, base: Style) -> Style {
        base.fg(self.matched).add_modifier(Modifier::UNDERLINED)
    }

    pub fn selection_style(&self) -> Style {
        Style::default()
            .bg(self.selection)
            .fg(self.selection_text)
            .add_modifier(Modifier::BOLD)
    }

    pub fn detail_style(&self) -> Style {
        Style::default().fg(self.detail)
    }

    pub fn current_marker_style(&self) -> Style {
        Style::default().fg(self.current)
    }

    pub fn search_border(&self, editing: bool) -> Style {
        Style::default().fg(if editing { self.search_active } else { self.border })
    }
}

fn color(color: ThemeColor) -> Color {
    match color {
        ThemeColor::Default => Color::Reset,
        ThemeColor::Rgb(r, g, b) => Color::Rgb(r, g, b),
        ThemeColor::Named(named) => match named {
            NamedColor::Black => Color::Black,
            NamedColor::Red => Color::Red,
            NamedColor::Green => Color::Green,
            NamedColor::Yellow => Color::Yellow,
            NamedColor::Blue => Color::Blue,
            NamedColor::Magenta => Color::Magenta,
            NamedColor::Cyan => Color::Cyan,
            NamedColor::White => Color::White,
            NamedColor::Gray => Color::Gray,
            NamedColor::DarkGray => Color::DarkGray,
        },
    }
}
