use crate::app::state::App;
use crate::ui::widgets::key_hint;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as TextLine, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

fn field(label: &str, value: String) -> TextLine<'static> {
    TextLine::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(value),
    ])
}

pub fn render_details(app: &App, f: &mut Frame<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(f.area());

    let Some(poi) = app.selected_poi() else {
        f.render_widget(
            Paragraph::new("No POI selected.").block(Block::default().borders(Borders::ALL)),
            chunks[0],
        );
        return;
    };

    let text_or_dash = |value: Option<&String>| value.cloned().unwrap_or_else(|| "-".to_string());
    let coordinates = poi.coordinates().map_or_else(
        || "not located".to_string(),
        |position| format!("{:.5}, {:.5}", position.lat, position.lng),
    );

    let mut lines = vec![
        field("Location", poi.location_line()),
        field("Subregion", text_or_dash(poi.subregion.as_ref())),
        field("Region", text_or_dash(poi.region.as_ref())),
        field("Coordinates", coordinates),
        field(
            "Tags",
            if poi.tags.is_empty() {
                "-".to_string()
            } else {
                poi.tags.join(", ")
            },
        ),
        field("ID", poi.id.to_string()),
        TextLine::from(""),
    ];
    lines.push(TextLine::from(
        poi.description()
            .unwrap_or("No description.")
            .to_string(),
    ));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(format!(" {} ", poi.display_name()))
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, chunks[0]);

    let help_text = vec![
        key_hint("ESC"),
        Span::raw(": Back   "),
        key_hint("↑/↓"),
        Span::raw(": Previous/Next POI   "),
        key_hint("Enter"),
        Span::raw(": Show on map"),
    ];
    f.render_widget(Paragraph::new(TextLine::from(help_text)), chunks[1]);
}
