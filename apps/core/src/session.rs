//! Signed-in / signed-out state driven by auth provider notifications.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_AUTH_REQUIRED_MESSAGE: &str = "Please sign in to continue.";

/// Notification kinds emitted by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl AuthEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INITIAL_SESSION" => Some(Self::InitialSession),
            "SIGNED_IN" => Some(Self::SignedIn),
            "SIGNED_OUT" => Some(Self::SignedOut),
            "TOKEN_REFRESHED" => Some(Self::TokenRefreshed),
            "USER_UPDATED" => Some(Self::UserUpdated),
            _ => None,
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    /// Remaining top-level user attributes (`phone`, `role`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn full_name(&self) -> Option<&str> {
        self.metadata_str("full_name")
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.metadata_str("avatar_url")
    }

    /// Profile lookup: `name` falls back to email; unknown fields read
    /// metadata first, then top-level attributes.
    pub fn profile_field(&self, field: &str) -> Option<String> {
        match field {
            "name" => self
                .full_name()
                .or(self.email.as_deref())
                .map(str::to_string),
            "email" => self.email.clone(),
            "avatar" => self.avatar_url().map(str::to_string),
            "id" => Some(self.id.clone()),
            other => self
                .user_metadata
                .get(other)
                .or_else(|| self.extra.get(other))
                .and_then(value_text),
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(false) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Option<User>,
}

impl Session {
    /// A session without an expiry never expires locally.
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now_unix)
    }
}

/// One provider notification.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthNotification {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthNotification {
    pub const fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("{0}")]
    Failed(String),
    #[error("observer panicked: {0}")]
    Panicked(String),
}

impl ObserverError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type AuthObserver = Box<dyn FnMut(AuthEvent, Option<&Session>) -> Result<(), ObserverError>>;

/// Surfaces auth messages to the user (alert, status line, console).
pub trait AuthNotifier {
    fn show_auth_error(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn,
}

#[derive(Default)]
pub struct SessionManager {
    session: Option<Session>,
    observers: Vec<(ObserverId, AuthObserver)>,
    next_observer: u64,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a session restored at start-up, without notifying.
    pub fn with_session(session: Option<Session>) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    pub fn state(&self) -> AuthState {
        if self.is_authenticated() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.user.is_some())
    }

    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().and_then(|session| session.user.as_ref())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user().map(|user| user.id.as_str())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
    }

    pub fn profile_field(&self, field: &str) -> Option<String> {
        self.user().and_then(|user| user.profile_field(field))
    }

    pub fn on_auth_state_change<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(AuthEvent, Option<&Session>) -> Result<(), ObserverError> + 'static,
    {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(candidate, _)| *candidate != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Apply a provider notification, then run every observer in
    /// registration order. Returns the failures, already logged.
    pub fn handle_notification(&mut self, notification: AuthNotification) -> Vec<ObserverError> {
        let AuthNotification { event, session } = notification;
        self.session = match event {
            AuthEvent::SignedOut => None,
            _ => session,
        };
        tracing::info!(event = %event, signed_in = self.is_authenticated(), "auth state changed");

        let mut failures = Vec::new();
        let current = self.session.as_ref();
        for (id, observer) in &mut self.observers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(event, current)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(payload) => ObserverError::Panicked(panic_message(payload.as_ref())),
            };
            tracing::error!(observer = id.0, error = %error, "auth observer failed");
            failures.push(error);
        }
        failures
    }

    /// Run `action` only when signed in; otherwise surface `message` and
    /// return `None`.
    pub fn require_auth<R>(
        &self,
        notifier: &mut dyn AuthNotifier,
        message: Option<&str>,
        action: impl FnOnce() -> R,
    ) -> Option<R> {
        if self.is_authenticated() {
            return Some(action());
        }

        let message = message.unwrap_or(DEFAULT_AUTH_REQUIRED_MESSAGE);
        tracing::warn!(message, "action requires sign-in");
        notifier.show_auth_error(message);
        None
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Vec<String>,
    }

    impl AuthNotifier for RecordingNotifier {
        fn show_auth_error(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }
    }

    fn session() -> Session {
        serde_json::from_value(serde_json::json!({
            "access_token": "token-1",
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "expires_at": 1_700_000_000,
            "user": {
                "id": "user-1",
                "email": "ada@example.com",
                "phone": "555",
                "user_metadata": {"full_name": "Ada Lovelace", "avatar_url": "https://x/a.png", "team": "maps"}
            }
        }))
        .expect("valid session json")
    }

    #[test]
    fn test_signed_in_runs_required_action() {
        let mut manager = SessionManager::new();
        let mut notifier = RecordingNotifier::default();

        manager.handle_notification(AuthNotification::new(AuthEvent::SignedIn, Some(session())));

        assert!(manager.is_authenticated());
        assert_eq!(manager.state(), AuthState::SignedIn);
        assert_eq!(manager.require_auth(&mut notifier, None, || 42), Some(42));
        assert!(notifier.messages.is_empty());
    }

    #[test]
    fn test_signed_out_blocks_action_and_reports() {
        let mut manager = SessionManager::with_session(Some(session()));
        let mut notifier = RecordingNotifier::default();

        manager.handle_notification(AuthNotification::new(AuthEvent::SignedOut, Some(session())));

        assert!(!manager.is_authenticated());
        let mut ran = false;
        assert_eq!(manager.require_auth(&mut notifier, None, || ran = true), None);
        assert!(!ran);
        assert_eq!(notifier.messages, vec![DEFAULT_AUTH_REQUIRED_MESSAGE]);

        manager.require_auth(&mut notifier, Some("Sign in to export."), || ());
        assert_eq!(notifier.messages[1], "Sign in to export.");
    }

    #[test]
    fn test_observers_run_in_order_and_failures_are_isolated() {
        let mut manager = SessionManager::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&calls);
        manager.on_auth_state_change(move |event, _| {
            first.borrow_mut().push(format!("first:{event}"));
            Err(ObserverError::failed("boom"))
        });
        manager.on_auth_state_change(|_, _| panic!("observer exploded"));
        let third = Rc::clone(&calls);
        manager.on_auth_state_change(move |_, session| {
            third
                .borrow_mut()
                .push(format!("third:{}", session.is_some()));
            Ok(())
        });

        let failures =
            manager.handle_notification(AuthNotification::new(AuthEvent::SignedIn, Some(session())));

        assert_eq!(failures.len(), 2);
        assert!(matches!(&failures[1], ObserverError::Panicked(message) if message == "observer exploded"));
        assert_eq!(
            *calls.borrow(),
            vec!["first:SIGNED_IN".to_string(), "third:true".to_string()]
        );
    }

    #[test]
    fn test_remove_observer() {
        let mut manager = SessionManager::new();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let id = manager.on_auth_state_change(move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        manager.handle_notification(AuthNotification::new(AuthEvent::InitialSession, None));
        assert!(manager.remove_observer(id));
        assert!(!manager.remove_observer(id));
        manager.handle_notification(AuthNotification::new(AuthEvent::SignedIn, Some(session())));

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(manager.observer_count(), 0);
    }

    #[test]
    fn test_profile_fields() {
        let manager = SessionManager::with_session(Some(session()));

        assert_eq!(manager.user_id(), Some("user-1"));
        assert_eq!(manager.profile_field("name").as_deref(), Some("Ada Lovelace"));
        assert_eq!(manager.profile_field("avatar").as_deref(), Some("https://x/a.png"));
        assert_eq!(manager.profile_field("team").as_deref(), Some("maps"));
        assert_eq!(manager.profile_field("phone").as_deref(), Some("555"));
        assert_eq!(manager.profile_field("nickname"), None);

        let mut anonymous = session();
        if let Some(user) = anonymous.user.as_mut() {
            user.user_metadata.clear();
        }
        let manager = SessionManager::with_session(Some(anonymous));
        assert_eq!(manager.profile_field("name").as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_token_refresh_replaces_session_and_expiry() {
        let mut manager = SessionManager::with_session(Some(session()));
        let mut refreshed = session();
        refreshed.access_token = "token-2".to_string();
        refreshed.expires_at = None;

        manager.handle_notification(AuthNotification::new(AuthEvent::TokenRefreshed, Some(refreshed)));

        assert_eq!(manager.access_token(), Some("token-2"));
        assert!(!manager.session().is_some_and(|s| s.is_expired_at(i64::MAX)));
        assert!(session().is_expired_at(1_700_000_000));
        assert_eq!(AuthEvent::parse("USER_UPDATED"), Some(AuthEvent::UserUpdated));
    }
}
