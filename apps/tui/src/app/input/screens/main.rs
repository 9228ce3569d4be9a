use crate::app::state::{App, AppScreen, Focus};
use crossterm::event::KeyCode;

const PAGE_ROWS: usize = 5;

pub fn handle_main_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => app.running = false,
        KeyCode::Esc => {
            if !app.cancel_sign_in() && app.focus == Focus::Map {
                app.map.close_popup();
            }
        }
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::Char('f') => app.open_filters(),
        KeyCode::Char('x') => app.clear_filters(),
        KeyCode::Char('r') => app.submit_filters(),
        KeyCode::Char('t') => app.cycle_highlight_tag(),
        KeyCode::Char('l') => app.sign_in(),
        KeyCode::Char('o') => app.sign_out(),
        KeyCode::Char('e') => app.export_snapshot(),
        _ => match app.focus {
            Focus::List => handle_list_keys(app, key),
            Focus::Map => handle_map_keys(app, key),
        },
    }
}

fn handle_list_keys(app: &mut App, key: KeyCode) {
    let total_rows = app.list.cards().len();
    let selected = app.list.selected_index();

    match key {
        KeyCode::Up => app.list.select_previous(),
        KeyCode::Down => app.list.select_next(),
        KeyCode::PageUp => app.list.select(selected.saturating_sub(PAGE_ROWS)),
        KeyCode::PageDown => app.list.select(selected + PAGE_ROWS),
        KeyCode::Home => app.list.select(0),
        KeyCode::End => app.list.select(total_rows.saturating_sub(1)),
        KeyCode::Enter => {
            app.show_selected_on_map();
        }
        KeyCode::Char('d') => {
            if total_rows > 0 {
                app.screen = AppScreen::Details;
            }
        }
        _ => {}
    }
}

fn handle_map_keys(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Up => app.map.pan(0, 1),
        KeyCode::Down => app.map.pan(0, -1),
        KeyCode::Left => app.map.pan(-1, 0),
        KeyCode::Right => app.map.pan(1, 0),
        KeyCode::Char('+' | '=') => app.map.zoom_in(),
        KeyCode::Char('-') => app.map.zoom_out(),
        KeyCode::Char('n') => app.cycle_popup(true),
        KeyCode::Char('N') => app.cycle_popup(false),
        KeyCode::Char('c') => {
            let home = app.settings.app.map.center;
            let zoom = app.settings.app.map.zoom;
            app.map.center_on(home.lat, home.lng, zoom);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::source::fake::FakeSource;
    use poi_core::AppConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_map_keys_zoom_and_pan() {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings = Settings {
            app: AppConfig::default(),
            session_file: dir.path().join("session.json"),
            log_file: dir.path().join("poi-tracker.log"),
            snapshot_file: dir.path().join("snapshot.db"),
            snapshot_source: None,
            debug: false,
        };
        let mut app = App::new(settings, Arc::new(FakeSource::default()));
        app.focus = Focus::Map;
        let start = app.map.center();

        handle_main_input(&mut app, KeyCode::Char('+'));
        assert_eq!(app.map.zoom(), 5);
        handle_main_input(&mut app, KeyCode::Right);
        assert!(app.map.center().lng > start.lng);
        handle_main_input(&mut app, KeyCode::Char('c'));
        assert_eq!(app.map.center(), start);
        assert_eq!(app.map.zoom(), 4);
    }
}
