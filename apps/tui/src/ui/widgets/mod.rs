pub mod list;
pub mod map;
pub mod popup;
pub mod tables;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

/// A key name in the shortcut bar style.
pub fn key_hint(key: &str) -> Span<'_> {
    Span::styled(
        key,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

pub fn selected_style() -> Style {
    Style::default()
        .bg(Color::Rgb(0, 0, 238))
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}
