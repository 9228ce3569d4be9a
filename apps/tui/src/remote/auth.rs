//! GoTrue client: Google sign-in through a PKCE authorization-code flow
//! with a loopback redirect, token refresh and sign-out.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use poi_core::config::SupabaseConfig;
use poi_core::Session;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{Client, Url};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::callback::CallbackListener;
use super::error::check_response;
use super::session_store::SessionStore;
use super::RemoteError;

pub const PROVIDER: &str = "google";
/// How long to wait for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;
/// Refresh this long before the access token expires.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// A sign-in waiting for the browser redirect.
pub struct PendingSignIn {
    pub authorize_url: Url,
    verifier: String,
    listener: CallbackListener,
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    auth_url: Option<String>,
    anon_key: Option<String>,
    redirect_port: u16,
    store: SessionStore,
}

impl AuthClient {
    pub fn new(config: &SupabaseConfig, redirect_port: u16, store: SessionStore) -> Self {
        Self {
            client: Client::new(),
            auth_url: config.auth_url(),
            anon_key: config.anon_key.clone(),
            redirect_port,
            store,
        }
    }

    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        let base = self
            .auth_url
            .as_deref()
            .ok_or(RemoteError::NotConfigured("POI_SUPABASE_URL"))?;
        Url::parse(&format!("{base}{path}")).map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    fn anon_key(&self) -> Result<&str, RemoteError> {
        self.anon_key
            .as_deref()
            .ok_or(RemoteError::NotConfigured("POI_SUPABASE_ANON_KEY"))
    }

    pub fn authorize_url(&self, redirect_to: &str, verifier: &str) -> Result<Url, RemoteError> {
        let mut url = self.endpoint("/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", PROVIDER)
            .append_pair("redirect_to", redirect_to)
            .append_pair("code_challenge", &pkce_challenge(verifier))
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    /// Bind the loopback listener and build the provider URL. Nothing is
    /// persisted until [`Self::complete_sign_in`] succeeds.
    pub async fn begin_sign_in(&self) -> Result<PendingSignIn, RemoteError> {
        self.anon_key()?;
        let listener = CallbackListener::bind(self.redirect_port, random_token(STATE_LEN)).await?;
        let verifier = random_token(VERIFIER_LEN);
        let authorize_url = self.authorize_url(&listener.redirect_url(), &verifier)?;

        tracing::info!(url = %authorize_url, "opening browser for sign-in");
        if let Err(e) = webbrowser::open(authorize_url.as_str()) {
            tracing::warn!(error = %e, "could not open a browser; open the URL manually");
        }

        Ok(PendingSignIn {
            authorize_url,
            verifier,
            listener,
        })
    }

    pub async fn complete_sign_in(&self, pending: PendingSignIn) -> Result<Session, RemoteError> {
        let PendingSignIn {
            verifier, listener, ..
        } = pending;

        let code = tokio::time::timeout(CALLBACK_TIMEOUT, listener.wait_for_code())
            .await
            .map_err(|_| RemoteError::CallbackTimeout)??;

        let mut url = self.endpoint("/token")?;
        url.query_pairs_mut().append_pair("grant_type", "pkce");
        let session = self
            .token_request(
                url,
                &PkceGrant {
                    auth_code: &code,
                    code_verifier: &verifier,
                },
            )
            .await?;

        self.store.save(&session)?;
        tracing::info!(user = ?session.user.as_ref().map(|user| &user.id), "signed in");
        Ok(session)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, RemoteError> {
        let mut url = self.endpoint("/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");
        let session = self
            .token_request(url, &RefreshGrant { refresh_token })
            .await?;
        self.store.save(&session)?;
        tracing::debug!("access token refreshed");
        Ok(session)
    }

    /// Revoke the session server-side, then forget it locally.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        let url = self.endpoint("/logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", self.anon_key()?)
            .bearer_auth(access_token)
            .send()
            .await?;
        check_response(response).await?;
        self.store.clear()?;
        tracing::info!("signed out");
        Ok(())
    }

    /// The persisted session, refreshed when expired. Failures are logged
    /// and yield no session.
    pub async fn restore_session(&self) -> Option<Session> {
        let session = match self.store.load() {
            Ok(session) => session?,
            Err(e) => {
                tracing::error!(error = %e, "could not read saved session");
                return None;
            }
        };

        if !needs_refresh(&session, Utc::now().timestamp()) {
            return Some(session);
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::info!("saved session expired");
            return None;
        };
        match self.refresh(refresh_token).await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(error = %e, "could not refresh saved session");
                None
            }
        }
    }

    async fn token_request<B: Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Session, RemoteError> {
        let response = self
            .client
            .post(url)
            .header("apikey", self.anon_key()?)
            .json(body)
            .send()
            .await?;
        let mut session: Session = check_response(response).await?.json().await?;
        fill_expiry(&mut session, Utc::now().timestamp());
        Ok(session)
    }
}

pub fn needs_refresh(session: &Session, now_unix: i64) -> bool {
    session.is_expired_at(now_unix + REFRESH_MARGIN_SECS)
}

/// GoTrue may send only `expires_in`; derive the absolute expiry.
fn fill_expiry(session: &mut Session, now_unix: i64) {
    if session.expires_at.is_none() {
        session.expires_at = session.expires_in.map(|seconds| now_unix + seconds);
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// `BASE64URL(SHA256(verifier))` without padding.
fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
