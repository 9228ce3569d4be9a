use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::Result;
use poi_core::filters::FilterQuery;
use poi_core::{AuthEvent, AuthNotification, FetchTicket};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::app::state::{AppEvent, ExportSummary};
use crate::config::Settings;
use crate::remote::{AuthClient, RestClient, SessionStore};
use crate::source::{PoiSource, SourceError};
use crate::store::SnapshotStore;

pub const SIGN_IN_FAILED: &str = "Failed to sign in. Please try again.";
pub const SIGN_OUT_FAILED: &str = "Failed to sign out. Please try again.";

/// Background work for the UI loop. Every task reports back as an
/// [`AppEvent`]; nothing here touches UI state directly.
#[derive(Clone)]
pub struct AppActions {
    source: Arc<dyn PoiSource>,
    remote: RestClient,
    auth: AuthClient,
    events: UnboundedSender<AppEvent>,
}

impl std::fmt::Debug for AppActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppActions")
            .field("source", &self.source.describe())
            .finish_non_exhaustive()
    }
}

impl AppActions {
    pub fn new(
        source: Arc<dyn PoiSource>,
        remote: RestClient,
        auth: AuthClient,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            source,
            remote,
            auth,
            events,
        }
    }

    pub fn describe_source(&self) -> String {
        self.source.describe()
    }

    pub const fn auth(&self) -> &AuthClient {
        &self.auth
    }

    fn send(events: &UnboundedSender<AppEvent>, event: AppEvent) {
        if events.send(event).is_err() {
            tracing::debug!("UI loop gone; dropping event");
        }
    }

    pub fn spawn_facet_rows(&self, access_token: Option<String>) {
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = source.fetch_facet_rows(access_token.as_deref()).await;
            Self::send(&events, AppEvent::FacetRows(result));
        });
    }

    pub fn spawn_fetch(&self, ticket: FetchTicket, query: FilterQuery, access_token: Option<String>) {
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        tracing::debug!(ticket = ticket.generation(), filters = %query, "fetching POIs");
        tokio::spawn(async move {
            let result = source.fetch_pois(&query, access_token.as_deref()).await;
            Self::send(&events, AppEvent::Pois { ticket, result });
        });
    }

    /// Start the browser sign-in. The handle lets the UI abandon the wait.
    pub fn spawn_sign_in(&self) -> JoinHandle<()> {
        let auth = self.auth.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let pending = match auth.begin_sign_in().await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(error = %e, "sign-in could not start");
                    Self::send(&events, AppEvent::AuthFailed {
                        message: SIGN_IN_FAILED,
                        detail: e.to_string(),
                    });
                    return;
                }
            };
            Self::send(
                &events,
                AppEvent::SignInStarted(pending.authorize_url.to_string()),
            );

            let event = match auth.complete_sign_in(pending).await {
                Ok(session) => AppEvent::Auth(AuthNotification::new(
                    AuthEvent::SignedIn,
                    Some(session),
                )),
                Err(e) => {
                    tracing::error!(error = %e, "sign-in failed");
                    AppEvent::AuthFailed {
                        message: SIGN_IN_FAILED,
                        detail: e.to_string(),
                    }
                }
            };
            Self::send(&events, event);
        })
    }

    pub fn spawn_sign_out(&self, access_token: String) {
        let auth = self.auth.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match auth.sign_out(&access_token).await {
                Ok(()) => AppEvent::Auth(AuthNotification::new(AuthEvent::SignedOut, None)),
                Err(e) => {
                    tracing::error!(error = %e, "sign-out failed");
                    AppEvent::AuthFailed {
                        message: SIGN_OUT_FAILED,
                        detail: e.to_string(),
                    }
                }
            };
            Self::send(&events, event);
        });
    }

    pub fn spawn_refresh(&self, refresh_token: String) {
        let auth = self.auth.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match auth.refresh(&refresh_token).await {
                Ok(session) => AppEvent::Auth(AuthNotification::new(
                    AuthEvent::TokenRefreshed,
                    Some(session),
                )),
                // An unusable refresh token means the session is over.
                Err(e) => {
                    tracing::error!(error = %e, "token refresh failed");
                    AppEvent::Auth(AuthNotification::new(AuthEvent::SignedOut, None))
                }
            };
            Self::send(&events, event);
        });
    }

    pub fn spawn_export(&self, access_token: String, path: PathBuf) {
        let remote = self.remote.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = export_snapshot(&remote, &access_token, &path)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, path = %path.display(), "snapshot export failed");
                    e.to_string()
                });
            Self::send(&events, AppEvent::SnapshotExported(result));
        });
    }
}

/// Copy the whole hosted table into a snapshot file.
pub async fn export_snapshot(
    remote: &RestClient,
    access_token: &str,
    path: &Path,
) -> Result<ExportSummary, SourceError> {
    let pois = remote
        .fetch_pois(&FilterQuery::unfiltered(), Some(access_token))
        .await?;
    let location = path.to_string_lossy().to_string();
    let store = SnapshotStore::create(&location).await?;
    let count = store.replace_all(&pois, &remote.describe()).await?;
    Ok(ExportSummary { count, location })
}

/// The remote client, or the snapshot named by `POI_SNAPSHOT`.
pub async fn open_source(settings: &Settings) -> Result<Arc<dyn PoiSource>> {
    if let Some(path) = &settings.snapshot_source {
        let store = SnapshotStore::open(&path.to_string_lossy()).await?;
        tracing::info!(source = %store.describe(), "reading POIs from snapshot");
        return Ok(Arc::new(store));
    }
    Ok(Arc::new(RestClient::new(&settings.app.supabase)))
}

pub fn auth_client(settings: &Settings) -> AuthClient {
    AuthClient::new(
        &settings.app.supabase,
        settings.app.redirect_port,
        SessionStore::new(settings.session_file.clone()),
    )
}
