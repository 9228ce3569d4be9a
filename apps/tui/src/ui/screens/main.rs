use crate::app::state::{App, Focus};
use crate::ui::layout::main_panes;
use crate::ui::widgets::key_hint;
use crate::ui::widgets::list::render_poi_list;
use crate::ui::widgets::map::render_map;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as TextLine, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

/// Below this the panes cannot show anything useful.
const MIN_WIDTH: u16 = 40;
const MIN_HEIGHT: u16 = 14;

pub fn render_main(app: &App, f: &mut Frame<'_>) {
    let area = f.area();
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        tracing::debug!(width = area.width, height = area.height, "terminal too small to render");
        f.render_widget(
            Paragraph::new("Terminal too small").alignment(Alignment::Center),
            area,
        );
        return;
    }

    let panes = main_panes(area, app.settings.app.ui);
    render_header(app, f, panes.header);
    render_map(app, f, panes.map);
    render_poi_list(app, f, panes.list);
    render_status(app, f, panes.status);
    render_shortcuts(app, f, panes.shortcuts);
}

fn render_header(app: &App, f: &mut Frame<'_>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    let title = Paragraph::new(TextLine::from(vec![
        Span::styled(
            "POI ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Tracker",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    f.render_widget(title, columns[0]);

    let auth_color = if app.session.is_authenticated() {
        Color::Green
    } else {
        Color::Gray
    };
    let auth = Paragraph::new(Span::styled(
        app.auth_summary(),
        Style::default().fg(auth_color),
    ))
    .alignment(Alignment::Right);
    f.render_widget(auth, columns[1]);
}

fn render_status(app: &App, f: &mut Frame<'_>, area: Rect) {
    let filters = if app.last_query.is_empty() {
        "all POIs".to_string()
    } else {
        app.last_query.to_string()
    };
    let mut spans = vec![
        Span::styled("Status: ", Style::default().fg(Color::Yellow)),
        Span::raw(app.status_message.clone()),
        Span::raw("   "),
        Span::styled("Filters: ", Style::default().fg(Color::Yellow)),
        Span::styled(filters, Style::default().fg(Color::Gray)),
    ];
    if let Some(tag) = &app.highlight_tag {
        spans.push(Span::raw("   "));
        spans.push(Span::styled("Tag: ", Style::default().fg(Color::Yellow)));
        spans.push(Span::styled(tag.clone(), Style::default().fg(Color::Yellow)));
    }

    let paragraph = Paragraph::new(TextLine::from(spans))
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_shortcuts(app: &App, f: &mut Frame<'_>, area: Rect) {
    let mut spans = vec![
        key_hint("Tab"),
        Span::raw(": Focus  "),
    ];
    match app.focus {
        Focus::List => spans.extend([
            key_hint("↑/↓"),
            Span::raw(": Select  "),
            key_hint("Enter"),
            Span::raw(": Show on map  "),
            key_hint("d"),
            Span::raw(": Details  "),
        ]),
        Focus::Map => spans.extend([
            key_hint("Arrows"),
            Span::raw(": Pan  "),
            key_hint("+/-"),
            Span::raw(": Zoom  "),
            key_hint("n"),
            Span::raw(": Next popup  "),
        ]),
    }
    spans.extend([
        key_hint("f"),
        Span::raw(": Filters  "),
        key_hint(if app.session.is_authenticated() { "o" } else { "l" }),
        Span::raw(if app.session.is_authenticated() {
            ": Sign out  "
        } else {
            ": Sign in  "
        }),
        key_hint("F1"),
        Span::raw(": Help  "),
        key_hint("q"),
        Span::raw(": Quit"),
    ]);

    f.render_widget(
        Paragraph::new(TextLine::from(spans)).alignment(Alignment::Center),
        area,
    );
}
