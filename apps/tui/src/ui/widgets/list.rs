use poi_core::poi::PoiCard;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as TextLine, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::state::{App, Focus};
use crate::ui::widgets::selected_style;
use crate::ui::widgets::tables::scroll_offset;

/// Lines per card: title, location, tags.
const CARD_HEIGHT: usize = 3;

fn card_item(card: &PoiCard, selected: bool, highlighted: bool) -> ListItem<'static> {
    let title_style = if highlighted {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let tags = if card.tags.is_empty() {
        String::new()
    } else {
        card.tags
            .iter()
            .map(|tag| format!("#{tag}"))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let item = ListItem::new(vec![
        TextLine::from(Span::styled(card.title.clone(), title_style)),
        TextLine::from(Span::styled(
            card.subtitle.clone(),
            Style::default().fg(Color::Gray),
        )),
        TextLine::from(Span::styled(tags, Style::default().fg(Color::Green))),
    ]);

    if selected {
        item.style(selected_style())
    } else {
        item
    }
}

pub fn render_poi_list(app: &App, f: &mut Frame<'_>, area: Rect) {
    let focused = app.focus == Focus::List;
    let border_color = if focused { Color::Yellow } else { Color::Gray };
    let cards = app.list.cards();
    let title = if app.loading {
        " POIs (loading...) ".to_string()
    } else if cards.is_empty() {
        " POIs ".to_string()
    } else {
        format!(
            " POIs ({} of {}) ",
            app.list.selected_index() + 1,
            cards.len()
        )
    };
    let block = Block::default()
        .title(title)
        .title_style(Style::default().fg(border_color).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    if let Some(message) = app.list.placeholder() {
        let paragraph = Paragraph::new(message.to_string())
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let max_visible = (area.height.saturating_sub(2) as usize) / CARD_HEIGHT;
    let offset = scroll_offset(cards.len(), max_visible, app.list.selected_index());
    let highlighted = app.highlighted_ids();

    let items: Vec<ListItem<'static>> = cards
        .iter()
        .enumerate()
        .skip(offset)
        .take(max_visible)
        .map(|(index, card)| {
            card_item(
                card,
                index == app.list.selected_index(),
                highlighted.contains(&card.poi.id),
            )
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}
