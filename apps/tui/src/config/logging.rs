use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

/// Where log lines go: the log file, or stderr when it cannot be opened.
fn log_writer(log_file: &Path) -> (BoxMakeWriter, Option<io::Error>) {
    match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => (BoxMakeWriter::new(Arc::new(file)), None),
        Err(e) => (BoxMakeWriter::new(io::stderr), Some(e)),
    }
}

/// Send `tracing` output to a file so it never lands on the terminal UI.
/// `RUST_LOG` wins over the default level. Never fails: an unusable log file
/// falls back to stderr and a second subscriber is reported and skipped.
pub fn init_logging(log_file: &Path, debug: bool) {
    let (writer, open_error) = log_writer(log_file);
    if let Some(e) = &open_error {
        eprintln!(
            "Warning: cannot open log file {}: {e}; logging to stderr",
            log_file.display()
        );
    }

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("poi_tracker={default_level},poi_core={default_level},warn")));

    if let Err(e) = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
    {
        eprintln!("Warning: failed to start logging: {e}");
        return;
    }

    match open_error {
        None => tracing::info!(path = %log_file.display(), "logging started"),
        Some(e) => tracing::warn!(path = %log_file.display(), error = %e, "log file unavailable, logging to stderr"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("poi-tracker.log");

        let (_writer, error) = log_writer(&path);

        assert!(error.is_none());
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_log_path_falls_back_to_stderr() {
        let dir = tempfile::tempdir().expect("tempdir");

        // A directory cannot be opened for appending.
        let (_writer, error) = log_writer(dir.path());

        assert!(error.is_some());
    }
}
