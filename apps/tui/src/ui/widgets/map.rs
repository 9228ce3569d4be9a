use poi_core::map::{Marker, PopupContent};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker as CanvasMarker;
use ratatui::text::{Line as TextLine, Span, Text};
use ratatui::widgets::canvas::{Canvas, Circle, Map, MapResolution, Points};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::state::{App, Focus};

const POPUP_WIDTH: u16 = 40;

/// Marker groups prepared for the paint closure.
#[derive(Debug, Default)]
struct MarkerLayers {
    plain: Vec<(f64, f64)>,
    highlighted: Vec<(f64, f64)>,
    /// Multi-marker clusters: position and member count.
    clusters: Vec<(f64, f64, usize)>,
    open: Option<(f64, f64)>,
}

fn marker_layers(app: &App) -> MarkerLayers {
    let markers = app.map.markers();
    let highlighted = app.highlighted_ids();
    let mut layers = MarkerLayers::default();

    for cluster in app.map.clusters() {
        let point = (cluster.position.lng, cluster.position.lat);
        if cluster.is_single() {
            let is_highlighted = cluster
                .members
                .first()
                .and_then(|index| markers.get(*index))
                .is_some_and(|marker| highlighted.contains(&marker.poi_id));
            if is_highlighted {
                layers.highlighted.push(point);
            } else {
                layers.plain.push(point);
            }
        } else {
            layers.clusters.push((point.0, point.1, cluster.len()));
        }
    }

    layers.open = app
        .map
        .popup()
        .map(|marker| (marker.position.lng, marker.position.lat));
    layers
}

pub fn render_map(app: &App, f: &mut Frame<'_>, area: Rect) {
    let focused = app.focus == Focus::Map;
    let border_color = if focused { Color::Yellow } else { Color::Blue };
    let bounds = app.map.bounds();
    let center = app.map.center();

    let block = Block::default()
        .title(format!(
            " Map  z{}  {:.3}, {:.3} ",
            app.map.zoom(),
            center.lat,
            center.lng
        ))
        .title_style(Style::default().fg(border_color).add_modifier(Modifier::BOLD))
        .title_bottom(TextLine::from(Span::styled(
            format!(" {} ", app.settings.app.map.tiles.attribution),
            Style::default().fg(Color::DarkGray),
        )))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let layers = marker_layers(app);
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
                coords: &layers.plain,
                color: Color::Red,
            });
            ctx.draw(&Points {
                coords: &layers.highlighted,
                color: Color::Yellow,
            });
            for (x, y, count) in &layers.clusters {
                ctx.print(
                    *x,
                    *y,
                    Span::styled(
                        count.to_string(),
                        Style::default()
                            .fg(Color::LightMagenta)
                            .add_modifier(Modifier::BOLD),
                    ),
                );
            }
            if let Some((x, y)) = layers.open {
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
        render_popup(marker, f, area);
    }
}

fn popup_lines(content: &PopupContent) -> Vec<TextLine<'static>> {
    let mut lines = vec![TextLine::from(Span::styled(
        content.title.clone(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ))];
    if !content.location.is_empty() {
        lines.push(TextLine::from(Span::styled(
            content.location.clone(),
            Style::default().fg(Color::Gray),
        )));
    }
    if let Some(description) = &content.description {
        lines.push(TextLine::from(description.clone()));
    }
    if !content.tags.is_empty() {
        lines.push(TextLine::from(Span::styled(
            content.tags.join(", "),
            Style::default().fg(Color::Green),
        )));
    }
    lines
}

/// Popup box pinned to the top-left corner of the map.
fn render_popup(marker: &Marker, f: &mut Frame<'_>, area: Rect) {
    let lines = popup_lines(&marker.popup);
    let width = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let wanted = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(3);
    let height = wanted.min(area.height.saturating_sub(2));
    if width < 10 || height < 3 {
        tracing::debug!(width, height, "map too small for popup");
        return;
    }

    let popup_area = Rect::new(area.x + 1, area.y + 1, width, height);
    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Green)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, popup_area);
    f.render_widget(paragraph, popup_area);
}
