use crate::app::state::{App, AppScreen};
use crossterm::event::KeyCode;

pub fn handle_filters_input(app: &mut App, key: KeyCode) {
    if app.search_active {
        handle_search_input(app, key);
        return;
    }

    match key {
        KeyCode::Esc => app.screen = AppScreen::Main,
        KeyCode::Left | KeyCode::BackTab => app.filter_previous_facet(),
        KeyCode::Right | KeyCode::Tab => app.filter_next_facet(),
        KeyCode::Up => app.filter_previous_option(),
        KeyCode::Down => app.filter_next_option(),
        KeyCode::Char(' ') => app.toggle_filter_option(),
        KeyCode::Enter => app.submit_filters(),
        KeyCode::Char('c') => {
            app.filters.clear_selection();
            app.status_message = "Selection cleared".to_string();
        }
        KeyCode::Char('x') => {
            app.clear_filters();
            app.screen = AppScreen::Main;
        }
        KeyCode::Char('/') => app.begin_option_search(),
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc => app.end_option_search(),
        KeyCode::Backspace => app.pop_search_char(),
        KeyCode::Up => app.filter_previous_option(),
        KeyCode::Down => app.filter_next_option(),
        // Space toggles so multi-word values stay searchable by fragments.
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_filter_option(),
        KeyCode::Char(ch) => app.push_search_char(ch),
        _ => {}
    }
}
