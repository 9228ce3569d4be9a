use crate::app::state::{App, AppScreen};
use crossterm::event::KeyCode;

pub fn handle_details_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc | KeyCode::Backspace => app.screen = AppScreen::Main,
        KeyCode::Enter | KeyCode::Char('m') => {
            app.show_selected_on_map();
        }
        KeyCode::Up => app.list.select_previous(),
        KeyCode::Down => app.list.select_next(),
        KeyCode::Char('q') => app.running = false,
        _ => {}
    }
}
