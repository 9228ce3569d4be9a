// UI module for poi-tracker
// Handles all UI rendering functions

pub mod layout;
pub mod screens;
pub mod widgets;

use crate::app::state::AppScreen;
use crate::app::App;
use ratatui::Frame;

pub fn ui(app: &App, f: &mut Frame<'_>) {
    match app.screen {
        AppScreen::Main => screens::main::render_main(app, f),
        AppScreen::Filters => screens::filters::render_filters(app, f),
        AppScreen::Details => screens::details::render_details(app, f),
    }

    if app.show_help {
        widgets::popup::render_help(app, f);
    }
    if let Some(url) = &app.sign_in_url {
        widgets::popup::render_sign_in(url, f);
    }
    if let Some(alert) = &app.alert {
        widgets::popup::render_alert(alert, f);
    }
}
