use dotenv::dotenv;
use poi_core::AppConfig;
use std::env;
use std::path::PathBuf;

use crate::remote::default_session_path;

const DEFAULT_LOG_FILE: &str = "poi-tracker.log";
const DEFAULT_SNAPSHOT_FILE: &str = "poi-snapshot.db";

/// Everything the terminal app reads from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppConfig,
    pub session_file: PathBuf,
    pub log_file: PathBuf,
    /// Where `e` in the UI writes a snapshot.
    pub snapshot_file: PathBuf,
    /// Read POIs from this snapshot instead of the remote table.
    pub snapshot_source: Option<PathBuf>,
    pub debug: bool,
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Initializes the application configuration from `.env` and the process
/// environment. Unparsable values keep their defaults; they and missing
/// endpoint settings are logged later by `AppConfig::validate`.
pub fn init_app_config() -> Settings {
    // Load environment variables from .env file
    dotenv().ok();

    let app = AppConfig::from_lookup(|key| env::var(key).ok());

    Settings {
        app,
        session_file: default_session_path(),
        log_file: env_value("POI_LOG_FILE").map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
        snapshot_file: env_value("POI_SNAPSHOT_FILE")
            .map_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_FILE), PathBuf::from),
        snapshot_source: env_value("POI_SNAPSHOT").map(PathBuf::from),
        debug: env_value("DEBUG").is_some(),
    }
}
