use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

use crate::app::{handle_input, App};
use crate::terminal::PoiTerminal;
use crate::ui;

/// Run the main application event loop
pub async fn run(terminal: &mut PoiTerminal, app: &mut App) -> Result<()> {
    // Configure event poll timeout (ms)
    const EVENT_POLL_TIMEOUT: u64 = 50;

    app.initialize().await;

    loop {
        // Results from background fetches and auth
        app.drain_events();
        app.refresh_session_if_needed(chrono::Utc::now().timestamp());

        let size = terminal.size()?;
        app.relayout_if_due(Instant::now(), Rect::new(0, 0, size.width, size.height));

        if let Err(e) = terminal.draw(|f| ui::ui(app, f)) {
            return Err(color_eyre::eyre::eyre!("Terminal draw error: {e}"));
        }

        if matches!(
            event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT)),
            Ok(true)
        ) {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        app.running = false;
                    } else {
                        handle_input(app, key.code);
                    }
                    if !app.running {
                        break;
                    }
                }
                Ok(Event::Resize(width, height)) => {
                    tracing::debug!(width, height, "terminal resized");
                    app.on_resize(Instant::now());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "failed to read terminal event"),
            }
        }
    }

    app.cancel_sign_in();
    tracing::info!("exiting");
    Ok(())
}
