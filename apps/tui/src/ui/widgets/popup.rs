use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as TextLine, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::state::{Alert, App};
use crate::ui::widgets::key_hint;

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);

    horizontal_layout[1]
}

pub fn render_alert(alert: &Alert, f: &mut Frame<'_>) {
    let area = centered_rect(60, 30, f.area());
    let mut lines = vec![
        TextLine::from(Span::styled(
            alert.message.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        TextLine::from(""),
    ];
    if let Some(detail) = &alert.detail {
        lines.push(TextLine::from(Span::styled(
            detail.clone(),
            Style::default().fg(Color::Gray),
        )));
        lines.push(TextLine::from(""));
    }
    lines.push(TextLine::from(vec![
        key_hint("Enter"),
        Span::raw(": OK"),
    ]));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(format!(" {} ", alert.title))
                .title_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

pub fn render_sign_in(url: &str, f: &mut Frame<'_>) {
    let area = centered_rect(70, 30, f.area());
    let lines = vec![
        TextLine::from("Finish signing in with Google in your browser."),
        TextLine::from("If no browser opened, visit:"),
        TextLine::from(""),
        TextLine::from(Span::styled(url.to_string(), Style::default().fg(Color::Cyan))),
        TextLine::from(""),
        TextLine::from(vec![key_hint("Esc"), Span::raw(": Cancel")]),
    ];

    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(" Sign in ")
                .title_style(Style::default().fg(Color::Green))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

const HELP_ENTRIES: &[(&str, &str)] = &[
    ("Tab", "Switch between list and map"),
    ("↑/↓", "Select POI (list) or pan (map)"),
    ("←/→", "Pan the map"),
    ("Enter", "Show the selected POI on the map"),
    ("d", "POI details"),
    ("+/-", "Zoom the map"),
    ("n/N", "Next/previous marker popup"),
    ("c", "Back to the home view"),
    ("t", "Cycle highlighted tag"),
    ("f", "Filters"),
    ("x", "Clear filters and reload"),
    ("r", "Reload with current filters"),
    ("l / o", "Sign in / sign out"),
    ("e", "Export a snapshot (signed in)"),
    ("F1/?", "Toggle this help"),
    ("q", "Quit"),
];

pub fn render_help(app: &App, f: &mut Frame<'_>) {
    let area = centered_rect(60, 70, f.area());
    let mut lines: Vec<TextLine<'_>> = HELP_ENTRIES
        .iter()
        .map(|(key, action)| TextLine::from(vec![key_hint(key), Span::raw(format!(": {action}"))]))
        .collect();
    lines.push(TextLine::from(""));
    lines.push(TextLine::from(Span::styled(
        format!("Source: {}", app.actions.describe_source()),
        Style::default().fg(Color::Gray),
    )));
    lines.push(TextLine::from(Span::styled(
        format!("Log file: {}", app.settings.log_file.display()),
        Style::default().fg(Color::Gray),
    )));

    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .title(" Help ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}
