use crate::app::state::App;
use crate::ui::widgets::tables::scroll_offset;
use crate::ui::widgets::{key_hint, selected_style};
use poi_core::Facet;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as TextLine, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap};
use ratatui::Frame;

pub fn render_filters(app: &App, f: &mut Frame<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Facet tabs
            Constraint::Min(5),    // Options
            Constraint::Length(3), // Query preview
            Constraint::Length(1), // Shortcuts hint
        ])
        .split(f.area());

    render_facet_tabs(app, f, chunks[0]);
    render_options(app, f, chunks[1]);
    render_query_preview(app, f, chunks[2]);
    render_shortcuts(app, f, chunks[3]);
}

fn render_facet_tabs(app: &App, f: &mut Frame<'_>, area: Rect) {
    let form = app.filters.form();
    let titles: Vec<String> = Facet::ALL
        .iter()
        .map(|facet| {
            let selected = form.control(*facet).selected_count();
            if selected == 0 {
                facet.label().to_string()
            } else {
                format!("{} ({selected})", facet.label())
            }
        })
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.filter_cursor.facet_index)
        .block(
            Block::default()
                .title(" Filters ")
                .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn render_options(app: &App, f: &mut Frame<'_>, area: Rect) {
    let facet = app.filter_cursor.facet();
    let control = app.filters.form().control(facet);
    let visible = app.visible_options();

    let title = if app.search_active {
        format!(" {} - search: {}_ ", facet.label(), app.option_search)
    } else {
        format!(" {} ({} options) ", facet.label(), control.options().len())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    if visible.is_empty() {
        let message = if control.options().is_empty() {
            "No values available."
        } else {
            "No options match the search."
        };
        f.render_widget(Paragraph::new(message).block(block), area);
        return;
    }

    let max_visible = area.height.saturating_sub(2) as usize;
    let offset = scroll_offset(visible.len(), max_visible, app.filter_cursor.option_index);
    let items: Vec<ListItem<'_>> = visible
        .iter()
        .enumerate()
        .skip(offset)
        .take(max_visible)
        .map(|(row, option_index)| {
            let checked = control.is_checked(*option_index);
            let mark = if checked { "[x] " } else { "[ ] " };
            let label = control
                .options()
                .get(*option_index)
                .cloned()
                .unwrap_or_default();
            let style = if row == app.filter_cursor.option_index {
                selected_style()
            } else if checked {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(TextLine::from(vec![Span::raw(mark), Span::raw(label)])).style(style)
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

fn render_query_preview(app: &App, f: &mut Frame<'_>, area: Rect) {
    let query = app.filters.build_filter_query();
    let text = if query.is_empty() {
        Span::styled("(no filters: all POIs)", Style::default().fg(Color::Gray))
    } else {
        Span::styled(query.to_string(), Style::default().fg(Color::White))
    };
    let paragraph = Paragraph::new(TextLine::from(vec![
        Span::styled("Query: ", Style::default().fg(Color::Yellow)),
        text,
    ]))
    .block(Block::default().borders(Borders::ALL))
    .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_shortcuts(app: &App, f: &mut Frame<'_>, area: Rect) {
    let spans = if app.search_active {
        vec![
            key_hint("Type"),
            Span::raw(": Narrow  "),
            key_hint("Space/Enter"),
            Span::raw(": Toggle  "),
            key_hint("Esc"),
            Span::raw(": End search"),
        ]
    } else {
        vec![
            key_hint("←/→"),
            Span::raw(": Facet  "),
            key_hint("↑/↓"),
            Span::raw(": Option  "),
            key_hint("Space"),
            Span::raw(": Toggle  "),
            key_hint("/"),
            Span::raw(": Search  "),
            key_hint("Enter"),
            Span::raw(": Apply  "),
            key_hint("c"),
            Span::raw(": Clear  "),
            key_hint("ESC"),
            Span::raw(": Back"),
        ]
    };
    f.render_widget(Paragraph::new(TextLine::from(spans)), area);
}
