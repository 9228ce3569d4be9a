use crate::app::state::{App, AppScreen};
use crossterm::event::KeyCode;

mod details;
mod filters;
mod help;
mod main;

pub fn dispatch_input(app: &mut App, key: KeyCode) {
    // Alerts block everything until dismissed.
    if app.alert.is_some() {
        if matches!(key, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            app.dismiss_alert();
        }
        return;
    }

    if help::handle_help_toggle(app, key) {
        return;
    }

    match app.screen {
        AppScreen::Main => main::handle_main_input(app, key),
        AppScreen::Filters => filters::handle_filters_input(app, key),
        AppScreen::Details => details::handle_details_input(app, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::{Alert, Focus};
    use crate::config::Settings;
    use crate::source::fake::FakeSource;
    use poi_core::AppConfig;
    use std::sync::Arc;

    fn app(dir: &std::path::Path) -> App {
        let settings = Settings {
            app: AppConfig::default(),
            session_file: dir.join("session.json"),
            log_file: dir.join("poi-tracker.log"),
            snapshot_file: dir.join("snapshot.db"),
            snapshot_source: None,
            debug: false,
        };
        App::new(settings, Arc::new(FakeSource::default()))
    }

    #[tokio::test]
    async fn test_alert_swallows_keys_until_dismissed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut app = app(dir.path());
        app.alert = Some(Alert::new("Error", "boom"));

        dispatch_input(&mut app, KeyCode::Char('q'));
        assert!(app.running);
        assert!(app.alert.is_some());

        dispatch_input(&mut app, KeyCode::Enter);
        assert!(app.alert.is_none());

        dispatch_input(&mut app, KeyCode::Char('q'));
        assert!(!app.running);
    }

    #[tokio::test]
    async fn test_help_overlay_and_screen_navigation() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut app = app(dir.path());

        dispatch_input(&mut app, KeyCode::F(1));
        assert!(app.show_help);
        dispatch_input(&mut app, KeyCode::Char('f'));
        assert_eq!(app.screen, AppScreen::Main);
        dispatch_input(&mut app, KeyCode::Esc);
        assert!(!app.show_help);

        dispatch_input(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Map);
        dispatch_input(&mut app, KeyCode::Char('f'));
        assert_eq!(app.screen, AppScreen::Filters);
        dispatch_input(&mut app, KeyCode::Esc);
        assert_eq!(app.screen, AppScreen::Main);
    }
}
