use std::fs;
use std::path::{Path, PathBuf};

use poi_core::Session;

use super::RemoteError;

const APP_DIR: &str = "poi-tracker";
const SESSION_FILE: &str = "session.json";

/// `POI_SESSION_FILE`, else `<config dir>/poi-tracker/session.json`.
pub fn default_session_path() -> PathBuf {
    if let Ok(path) = std::env::var("POI_SESSION_FILE") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir().map_or_else(
        || PathBuf::from(".poi-session.json"),
        |dir| dir.join(APP_DIR).join(SESSION_FILE),
    )
}

/// Persisted auth session, one JSON document on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Session>, RemoteError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, session: &Session) -> Result<(), RemoteError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), RemoteError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_at":10,
                "user":{"id":"u1","email":"u@example.com","user_metadata":{}}}"#,
        )
        .expect("valid session")
    }

    #[test]
    fn test_save_load_clear() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load()?.is_none());
        store.save(&session())?;
        assert_eq!(store.load()?, Some(session()));

        store.clear()?;
        assert!(store.load()?.is_none());
        // Clearing twice is fine
        store.clear()?;
        Ok(())
    }

    #[test]
    fn test_corrupt_file_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json")?;

        let store = SessionStore::new(&path);
        assert!(matches!(store.load(), Err(RemoteError::Session(_))));
        Ok(())
    }
}
