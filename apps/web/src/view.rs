use poi_core::Facet;
use ratzilla::ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker as CanvasMarker,
    text::{Line as TextLine, Span, Text},
    widgets::{
        canvas::{Canvas, Circle, Map, MapResolution, Points},
        Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap,
    },
    Frame,
};

use crate::state::{Focus, Screen, WebApp};

const CARD_HEIGHT: usize = 3;

fn key_hint(key: &str) -> Span<'_> {
    Span::styled(
        key,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
}

fn selected_style() -> Style {
    Style::default()
        .bg(Color::Rgb(0, 0, 238))
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

/// First row to draw so that `selected` stays on screen.
fn scroll_offset(len: usize, visible: usize, selected: usize) -> usize {
    if visible == 0 || len <= visible || selected < visible {
        0
    } else {
        (selected + 1 - visible).min(len - visible)
    }
}

pub fn render(app: &mut WebApp, f: &mut Frame<'_>) {
    let area = f.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(app, f, rows[0]);
    match app.screen {
        Screen::Main => render_main(app, f, rows[1]),
        Screen::Filters => render_filters(app, f, rows[1]),
    }
    render_status(app, f, rows[2]);
    render_shortcuts(app, f, rows[3]);

    if let Some(message) = &app.alert {
        render_alert(message, f, area);
    }
}

fn render_header(app: &WebApp, f: &mut Frame<'_>, area: Rect) {
    let selected = app.filters.form().selection().count();
    let line = TextLine::from(vec![
        Span::styled(
            format!("POIs: {}  ", app.pois.len()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Filters: {selected}  "),
            Style::default().fg(Color::Green),
        ),
        Span::styled(app.auth_summary(), Style::default().fg(Color::Cyan)),
    ]);
    let block = Block::default()
        .title(" POI Tracker ")
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_main(app: &mut WebApp, f: &mut Frame<'_>, area: Rect) {
    let ui = app.config.ui;
    let stacked = area.width < ui.narrow_breakpoint;
    let panes = if stacked {
        Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(ui.list_width)])
            .split(area)
    };

    // The browser resizes the grid without telling us; re-measure on change.
    let inner = (
        panes[0].width.saturating_sub(2),
        panes[0].height.saturating_sub(2),
    );
    let measured = app.map.viewport().map(|viewport| (viewport.columns, viewport.rows));
    if measured != Some(inner) {
        app.map.invalidate_layout(inner.0, inner.1);
    }

    render_map(app, f, panes[0]);
    render_list(app, f, panes[1]);
}

fn render_map(app: &WebApp, f: &mut Frame<'_>, area: Rect) {
    let focused = app.focus == Focus::Map;
    let border_color = if focused { Color::Yellow } else { Color::Blue };
    let bounds = app.map.bounds();
    let center = app.map.center();

    let mut plain = Vec::new();
    let mut clusters = Vec::new();
    for cluster in app.map.clusters() {
        let point = (cluster.position.lng, cluster.position.lat);
        if cluster.is_single() {
            plain.push(point);
        } else {
            clusters.push((point.0, point.1, cluster.len()));
        }
    }
    let open = app
        .map
        .popup()
        .map(|marker| (marker.position.lng, marker.position.lat));

    let block = Block::default()
        .title(format!(
            " Map  z{}  {:.3}, {:.3} ",
            app.map.zoom(),
            center.lat,
            center.lng
        ))
        .title_style(Style::default().fg(border_color).add_modifier(Modifier::BOLD))
        .title_bottom(TextLine::from(Span::styled(
            format!(" {} ", app.config.map.tiles.attribution),
            Style::default().fg(Color::DarkGray),
        )))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let canvas = Canvas::default()
        .block(block)
        .marker(CanvasMarker::Braille)
        .x_bounds([bounds.south_west.lng, bounds.north_east.lng])
        .y_bounds([bounds.south_west.lat, bounds.north_east.lat])
        .paint(move |ctx| {
            ctx.draw(&Map {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();
            ctx.draw(&Points {
                coords: &plain,
                color: Color::Red,
            });
            for (x, y, count) in &clusters {
                ctx.print(
                    *x,
                    *y,
                    Span::styled(count.to_string(), Style::default().fg(Color::LightMagenta)),
                );
            }
            if let Some((x, y)) = open {
                ctx.draw(&Circle {
                    x,
                    y,
                    radius: bounds.lat_span() / 60.0,
                    color: Color::Green,
                });
            }
        });
    f.render_widget(canvas, area);

    if let Some(marker) = app.map.popup() {
        let popup = &marker.popup;
        let mut lines = vec![TextLine::from(Span::styled(
            popup.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if !popup.location.is_empty() {
            lines.push(TextLine::from(popup.location.clone()));
        }
        if let Some(description) = &popup.description {
            lines.push(TextLine::from(description.clone()));
        }
        if !popup.tags.is_empty() {
            lines.push(TextLine::from(Span::styled(
                popup.tags.join(", "),
                Style::default().fg(Color::Green),
            )));
        }
        let width = 40.min(area.width.saturating_sub(2));
        let wanted = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
        let height = wanted.min(area.height.saturating_sub(2));
        if width >= 10 && height >= 3 {
            let popup_area = Rect::new(area.x + 1, area.y + 1, width, height);
            f.render_widget(Clear, popup_area);
            f.render_widget(
                Paragraph::new(Text::from(lines))
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(Color::Green)),
                    )
                    .wrap(Wrap { trim: true }),
                popup_area,
            );
        }
    }
}

fn render_list(app: &WebApp, f: &mut Frame<'_>, area: Rect) {
    let border_color = if app.focus == Focus::List {
        Color::Yellow
    } else {
        Color::Gray
    };
    let cards = app.list.cards();
    let title = if app.loading {
        " POIs (loading...) ".to_string()
    } else {
        format!(" POIs ({}) ", cards.len())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    if let Some(message) = app.list.placeholder() {
        f.render_widget(
            Paragraph::new(message.to_string())
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            area,
        );
        return;
    }

    let visible = usize::from(area.height.saturating_sub(2)) / CARD_HEIGHT;
    let selected = app.list.selected_index();
    let items: Vec<ListItem<'static>> = cards
        .iter()
        .enumerate()
        .skip(scroll_offset(cards.len(), visible, selected))
        .take(visible)
        .map(|(index, card)| {
            let tags = card
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");
            let item = ListItem::new(vec![
                TextLine::from(Span::styled(
                    card.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                TextLine::from(Span::styled(
                    card.subtitle.clone(),
                    Style::default().fg(Color::Gray),
                )),
                TextLine::from(Span::styled(tags, Style::default().fg(Color::Green))),
            ]);
            if index == selected {
                item.style(selected_style())
            } else {
                item
            }
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

fn render_filters(app: &WebApp, f: &mut Frame<'_>, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let form = app.filters.form();
    let titles: Vec<String> = Facet::ALL
        .iter()
        .map(|facet| match form.control(*facet).selected_count() {
            0 => facet.label().to_string(),
            count => format!("{} ({count})", facet.label()),
        })
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.facet_index)
        .block(Block::default().title(" Filters ").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, rows[0]);

    let control = form.control(app.facet());
    let block = Block::default()
        .title(format!(" {} ", app.facet().label()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    if control.options().is_empty() {
        f.render_widget(Paragraph::new("No values available.").block(block), rows[1]);
    } else {
        let visible = usize::from(rows[1].height.saturating_sub(2));
        let items: Vec<ListItem<'_>> = control
            .options()
            .iter()
            .enumerate()
            .skip(scroll_offset(control.options().len(), visible, app.option_index))
            .take(visible)
            .map(|(index, label)| {
                let checked = control.is_checked(index);
                let mark = if checked { "[x] " } else { "[ ] " };
                let style = if index == app.option_index {
                    selected_style()
                } else if checked {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default()
                };
                ListItem::new(format!("{mark}{label}")).style(style)
            })
            .collect();
        f.render_widget(List::new(items).block(block), rows[1]);
    }

    let query = app.filters.build_filter_query();
    let preview = if query.is_empty() {
        "(no filters: all POIs)".to_string()
    } else {
        query.to_string()
    };
    f.render_widget(
        Paragraph::new(TextLine::from(vec![
            Span::styled("Query: ", Style::default().fg(Color::Yellow)),
            Span::raw(preview),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: true }),
        rows[2],
    );
}

fn render_status(app: &WebApp, f: &mut Frame<'_>, area: Rect) {
    f.render_widget(
        Paragraph::new(app.status.as_str()).style(Style::default().fg(Color::Gray)),
        area,
    );
}

fn render_shortcuts(app: &WebApp, f: &mut Frame<'_>, area: Rect) {
    let keys: &[(&str, &str)] = match app.screen {
        Screen::Main => &[
            ("Tab", "Focus"),
            ("f", "Filters"),
            ("x", "Clear"),
            ("Enter", "Show"),
            ("+/-", "Zoom"),
            ("l", "Sign in"),
            ("o", "Sign out"),
        ],
        Screen::Filters => &[
            ("←/→", "Facet"),
            ("↑/↓", "Option"),
            ("Space", "Toggle"),
            ("Enter", "Apply"),
            ("c", "Clear"),
            ("Esc", "Back"),
        ],
    };
    let spans: Vec<Span<'_>> = keys
        .iter()
        .flat_map(|(key, action)| [key_hint(key), Span::raw(format!(": {action}  "))])
        .collect();
    f.render_widget(Paragraph::new(TextLine::from(spans)), area);
}

fn render_alert(message: &str, f: &mut Frame<'_>, area: Rect) {
    let width = area.width.saturating_mul(3) / 5;
    let height = (area.height / 3).max(7).min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );
    let mut lines: Vec<TextLine<'_>> = message.lines().map(TextLine::from).collect();
    lines.push(TextLine::from(""));
    lines.push(TextLine::from(vec![key_hint("Enter"), Span::raw(": OK")]));

    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .title(" Error ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: true }),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::scroll_offset;

    #[test]
    fn test_scroll_offset_keeps_selection_visible() {
        assert_eq!(scroll_offset(10, 4, 2), 0);
        assert_eq!(scroll_offset(10, 4, 6), 3);
        assert_eq!(scroll_offset(10, 4, 9), 6);
        assert_eq!(scroll_offset(3, 4, 2), 0);
    }
}
