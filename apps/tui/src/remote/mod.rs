pub mod auth;
pub mod callback;
pub mod client;
pub mod error;
pub mod session_store;

pub use auth::{AuthClient, PendingSignIn};
pub use client::RestClient;
pub use error::RemoteError;
pub use session_store::{default_session_path, SessionStore};
