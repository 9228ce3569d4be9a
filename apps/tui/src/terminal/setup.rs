use std::io::{stdout, Stdout, Write};

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

/// The terminal the map and list are drawn on.
pub type PoiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Take over the terminal for the UI: raw mode, alternate screen, hidden
/// cursor. A failure part way restores what was already changed.
pub fn setup() -> Result<PoiTerminal> {
    enable_raw_mode().wrap_err("Failed to enable raw mode")?;

    let mut out = stdout();
    if let Err(e) = execute!(out, EnterAlternateScreen, cursor::Hide) {
        restore();
        return Err(e).wrap_err("Failed to enter alternate screen");
    }

    let mut terminal = match Terminal::new(CrosstermBackend::new(out)) {
        Ok(terminal) => terminal,
        Err(e) => {
            restore();
            return Err(e).wrap_err("Failed to create terminal");
        }
    };
    if let Err(e) = terminal.clear() {
        tracing::warn!(error = %e, "failed to clear terminal");
    }

    if let Ok(size) = terminal.size() {
        tracing::debug!(width = size.width, height = size.height, "terminal ready");
    }
    Ok(terminal)
}

/// Give the terminal back to the shell. Also safe after a partial `setup`.
pub fn restore() {
    let mut out = stdout();
    if let Err(e) = execute!(out, cursor::Show, LeaveAlternateScreen) {
        tracing::warn!(error = %e, "failed to leave alternate screen");
    }
    if let Err(e) = disable_raw_mode() {
        tracing::warn!(error = %e, "failed to disable raw mode");
    }
    // Keep the shell prompt on a fresh line.
    let _ = execute!(out, cursor::MoveToNextLine(1));
    let _ = out.flush();
}
