use std::sync::Arc;
use std::time::{Duration, Instant};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use poi_core::filters::{FilterQuery, FilterState};
use poi_core::map::MapView;
use poi_core::poi::{FetchOutcome, FetchTicket, PoiCollection, PoiListPane};
use poi_core::session::{AuthNotifier, ObserverError, SessionManager};
use poi_core::{AuthEvent, AuthNotification, Facet, FacetRow, Poi, PoiId};
use ratatui::layout::Rect;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::app::actions::{auth_client, AppActions};
use crate::app::input::helpers::{wrap_decrement, wrap_increment};
use crate::config::Settings;
use crate::remote::auth::needs_refresh;
use crate::remote::RestClient;
use crate::source::{PoiSource, SourceError};
use crate::ui::layout::main_panes;

/// How long the terminal size must hold still before the map re-measures.
pub const RESIZE_SETTLE: Duration = Duration::from_millis(100);

pub const EXPORT_REQUIRES_SIGN_IN: &str = "Please sign in to export a snapshot.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppScreen {
    Main,
    Filters,
    Details,
}

/// Which pane receives navigation keys on the main screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Map,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub count: u64,
    pub location: String,
}

/// Results of background work, drained by the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    FacetRows(Result<Vec<FacetRow>, SourceError>),
    Pois {
        ticket: FetchTicket,
        result: Result<Vec<Poi>, SourceError>,
    },
    SignInStarted(String),
    Auth(AuthNotification),
    AuthFailed {
        message: &'static str,
        detail: String,
    },
    ReloadRequested(AuthEvent),
    SnapshotExported(Result<ExportSummary, String>),
}

/// Blocking message box; input is swallowed until it is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub detail: Option<String>,
}

impl Alert {
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

struct AlertSink<'a>(&'a mut Option<Alert>);

impl AuthNotifier for AlertSink<'_> {
    fn show_auth_error(&mut self, message: &str) {
        *self.0 = Some(Alert::new("Sign in required", message));
    }
}

/// Position inside the filter form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterCursor {
    pub facet_index: usize,
    /// Index into the currently visible (search-narrowed) options.
    pub option_index: usize,
}

impl FilterCursor {
    pub fn facet(self) -> Facet {
        Facet::from_index(self.facet_index).unwrap_or(Facet::Tags)
    }
}

#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub screen: AppScreen,
    pub focus: Focus,
    pub show_help: bool,
    pub status_message: String,
    pub alert: Option<Alert>,
    pub settings: Settings,
    pub filters: FilterState,
    pub pois: PoiCollection,
    pub list: PoiListPane,
    pub map: MapView,
    pub session: SessionManager,
    pub actions: AppActions,
    pub filter_cursor: FilterCursor,
    pub option_search: String,
    pub search_active: bool,
    pub highlight_tag: Option<String>,
    pub loading: bool,
    pub last_query: FilterQuery,
    pub sign_in_url: Option<String>,
    pub refresh_in_flight: bool,
    pending_resize: Option<Instant>,
    sign_in_task: Option<JoinHandle<()>>,
    events: UnboundedReceiver<AppEvent>,
    sender: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(settings: Settings, source: Arc<dyn PoiSource>) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        let actions = AppActions::new(
            source,
            RestClient::new(&settings.app.supabase),
            auth_client(&settings),
            sender.clone(),
        );
        let map = MapView::new(settings.app.map.center, settings.app.map.zoom);

        Self {
            running: true,
            screen: AppScreen::Main,
            focus: Focus::List,
            show_help: false,
            status_message: String::new(),
            alert: None,
            settings,
            filters: FilterState::new(),
            pois: PoiCollection::new(),
            list: PoiListPane::new(),
            map,
            session: SessionManager::new(),
            actions,
            filter_cursor: FilterCursor::default(),
            option_search: String::new(),
            search_active: false,
            highlight_tag: None,
            loading: false,
            last_query: FilterQuery::unfiltered(),
            sign_in_url: None,
            refresh_in_flight: false,
            pending_resize: None,
            sign_in_task: None,
            events,
            sender,
        }
    }

    /// Restore the saved session, subscribe to auth changes, then load the
    /// facet domains and every POI.
    pub async fn initialize(&mut self) {
        let restored = self.actions.auth().restore_session().await;
        self.session
            .handle_notification(AuthNotification::new(AuthEvent::InitialSession, restored));

        let sender = self.sender.clone();
        self.session.on_auth_state_change(move |event, _session| {
            // A refreshed token sees the same rows.
            if event == AuthEvent::TokenRefreshed {
                return Ok(());
            }
            sender
                .send(AppEvent::ReloadRequested(event))
                .map_err(|e| ObserverError::failed(e.to_string()))
        });

        self.load_facets();
        self.load_pois();
        self.status_message = format!("Loading POIs from {}", self.actions.describe_source());
    }

    fn access_token(&self) -> Option<String> {
        self.session.access_token().map(str::to_string)
    }

    pub fn load_facets(&mut self) {
        self.actions.spawn_facet_rows(self.access_token());
    }

    /// Fetch with whatever the form currently selects.
    pub fn load_pois(&mut self) {
        let query = self.filters.build_filter_query();
        let ticket = self.pois.begin_fetch();
        self.loading = true;
        self.last_query = query.clone();
        self.actions.spawn_fetch(ticket, query, self.access_token());
    }

    pub fn submit_filters(&mut self) {
        self.screen = AppScreen::Main;
        self.end_option_search();
        self.load_pois();
        self.status_message = if self.last_query.is_empty() {
            "Loading all POIs...".to_string()
        } else {
            format!("Applying filters: {}", self.last_query)
        };
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear_selection();
        self.load_pois();
        self.status_message = "Filters cleared".to_string();
    }

    pub fn try_next_event(&mut self) -> Option<AppEvent> {
        self.events.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.events.recv().await
    }

    /// Apply every event already waiting on the channel.
    pub fn drain_events(&mut self) {
        while let Some(event) = self.try_next_event() {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::FacetRows(Ok(rows)) => {
                self.filters.apply_rows(&rows);
                self.filter_cursor.option_index = 0;
            }
            AppEvent::FacetRows(Err(e)) => {
                tracing::error!(error = %e, "could not load filter options");
                self.filters.reset_domains();
                self.status_message = "Filter options unavailable".to_string();
            }
            AppEvent::Pois { ticket, result } => self.finish_fetch(ticket, result),
            AppEvent::SignInStarted(url) => {
                self.status_message = "Complete sign-in in your browser (Esc cancels)".to_string();
                self.sign_in_url = Some(url);
            }
            AppEvent::Auth(notification) => self.apply_auth(notification),
            AppEvent::AuthFailed { message, detail } => {
                self.sign_in_task = None;
                self.sign_in_url = None;
                self.alert = Some(Alert::new("Authentication", message).with_detail(detail));
            }
            AppEvent::ReloadRequested(event) => {
                tracing::info!(event = %event, "reloading POIs after auth change");
                self.load_pois();
            }
            AppEvent::SnapshotExported(Ok(summary)) => {
                self.status_message = format!(
                    "Exported {} POIs to {}",
                    summary.count, summary.location
                );
            }
            AppEvent::SnapshotExported(Err(detail)) => {
                self.alert = Some(
                    Alert::new("Snapshot", "Failed to export snapshot.").with_detail(detail),
                );
            }
        }
    }

    fn finish_fetch(&mut self, ticket: FetchTicket, result: Result<Vec<Poi>, SourceError>) {
        match self.pois.finish_fetch(ticket, result) {
            FetchOutcome::Applied { count } => {
                self.loading = false;
                self.pois.render_list(&mut self.list);
                let placed = self.map.set_markers(self.pois.pois());
                self.status_message = format!("{count} POIs ({placed} on the map)");
            }
            FetchOutcome::Failed { message, detail } => {
                self.loading = false;
                tracing::error!(error = %detail, filters = %self.last_query, "POI fetch failed");
                self.alert = Some(Alert::new("Error", message).with_detail(detail));
            }
            FetchOutcome::Stale { .. } => {}
        }
    }

    fn apply_auth(&mut self, notification: AuthNotification) {
        let event = notification.event;
        match event {
            AuthEvent::SignedIn => {
                self.sign_in_task = None;
                self.sign_in_url = None;
            }
            AuthEvent::TokenRefreshed | AuthEvent::SignedOut => self.refresh_in_flight = false,
            AuthEvent::InitialSession | AuthEvent::UserUpdated => {}
        }

        self.session.handle_notification(notification);
        self.status_message = match event {
            AuthEvent::SignedIn => format!("Signed in as {}", self.display_name()),
            AuthEvent::SignedOut => "Signed out".to_string(),
            _ => return,
        };
    }

    pub fn display_name(&self) -> String {
        self.session
            .profile_field("name")
            .unwrap_or_else(|| "unknown user".to_string())
    }

    pub fn auth_summary(&self) -> String {
        if self.session.is_authenticated() {
            format!("Signed in as {}", self.display_name())
        } else if self.sign_in_url.is_some() {
            "Signing in...".to_string()
        } else {
            "Not signed in".to_string()
        }
    }

    pub fn sign_in(&mut self) {
        if self.session.is_authenticated() {
            self.status_message = format!("Already signed in as {}", self.display_name());
            return;
        }
        if self
            .sign_in_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            self.status_message = "Sign-in already in progress".to_string();
            return;
        }
        self.sign_in_task = Some(self.actions.spawn_sign_in());
        self.status_message = "Opening browser for sign-in...".to_string();
    }

    pub fn cancel_sign_in(&mut self) -> bool {
        let Some(task) = self.sign_in_task.take() else {
            return false;
        };
        task.abort();
        self.sign_in_url = None;
        self.status_message = "Sign-in cancelled".to_string();
        tracing::info!("sign-in cancelled");
        true
    }

    pub fn sign_out(&mut self) {
        match self.access_token() {
            Some(token) if self.session.is_authenticated() => {
                self.actions.spawn_sign_out(token);
                self.status_message = "Signing out...".to_string();
            }
            _ => self.status_message = "Not signed in".to_string(),
        }
    }

    /// Export the hosted table to the snapshot file. Signed-in users only.
    pub fn export_snapshot(&mut self) {
        let session = &self.session;
        let token = session
            .require_auth(
                &mut AlertSink(&mut self.alert),
                Some(EXPORT_REQUIRES_SIGN_IN),
                || session.access_token().map(str::to_string),
            )
            .flatten();

        if let Some(token) = token {
            let path = self.settings.snapshot_file.clone();
            self.status_message = format!("Exporting snapshot to {}...", path.display());
            self.actions.spawn_export(token, path);
        }
    }

    /// Refresh the access token shortly before it expires.
    pub fn refresh_session_if_needed(&mut self, now_unix: i64) {
        if self.refresh_in_flight {
            return;
        }
        let Some(session) = self.session.session() else {
            return;
        };
        if !needs_refresh(session, now_unix) {
            return;
        }
        if let Some(refresh_token) = session.refresh_token.clone() {
            self.refresh_in_flight = true;
            self.actions.spawn_refresh(refresh_token);
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn selected_poi(&self) -> Option<&Poi> {
        self.list.selected_card().map(|card| &card.poi)
    }

    /// Card activation: center the map on the POI and open its popup.
    pub fn show_selected_on_map(&mut self) -> bool {
        let map = &mut self.map;
        let mut opened = false;
        let activated = self.list.activate_selected(|poi| opened = map.focus_poi(poi));
        if !activated {
            return false;
        }

        self.screen = AppScreen::Main;
        self.focus = Focus::Map;
        if !opened {
            self.status_message = "This POI has no coordinates".to_string();
        }
        opened
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::List => Focus::Map,
            Focus::Map => Focus::List,
        };
    }

    /// Step the popup through the markers, centering on each.
    pub fn cycle_popup(&mut self, forward: bool) {
        let markers = self.map.markers();
        if markers.is_empty() {
            return;
        }
        let current = self.map.popup().and_then(|open| {
            markers
                .iter()
                .position(|marker| marker.poi_id == open.poi_id)
        });
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(index), true) => wrap_increment(index, markers.len()),
            (Some(index), false) => wrap_decrement(index, markers.len()),
        };
        let position = markers[next].position;
        let zoom = self.map.zoom();
        self.map.center_on(position.lat, position.lng, zoom);
        self.map.open_popup_at(position);
    }

    /// Move the highlighted tag to the next tag in the domain; wraps to
    /// no highlight after the last one.
    pub fn cycle_highlight_tag(&mut self) {
        let tags = self.filters.domains().values(Facet::Tags);
        let next = match &self.highlight_tag {
            None => tags.first(),
            Some(current) => tags
                .iter()
                .position(|tag| tag == current)
                .and_then(|index| tags.get(index + 1)),
        };
        self.highlight_tag = next.map(|tag| (*tag).to_string());
        self.status_message = self.highlight_tag.as_ref().map_or_else(
            || "Tag highlight off".to_string(),
            |tag| format!("Highlighting tag: {tag}"),
        );
    }

    pub fn highlighted_ids(&self) -> Vec<PoiId> {
        self.highlight_tag.as_deref().map_or_else(Vec::new, |tag| {
            self.pois
                .filter_by_tag(tag)
                .into_iter()
                .map(|poi| poi.id.clone())
                .collect()
        })
    }

    pub fn open_filters(&mut self) {
        self.screen = AppScreen::Filters;
        self.end_option_search();
    }

    /// Option indices of the current facet that match the search pattern,
    /// in control order.
    pub fn visible_options(&self) -> Vec<usize> {
        let control = self.filters.form().control(self.filter_cursor.facet());
        if self.option_search.is_empty() {
            return (0..control.options().len()).collect();
        }
        let matcher = SkimMatcherV2::default();
        control
            .options()
            .iter()
            .enumerate()
            .filter(|(_, option)| matcher.fuzzy_match(option, &self.option_search).is_some())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn filter_next_facet(&mut self) {
        self.filter_cursor.facet_index =
            wrap_increment(self.filter_cursor.facet_index, Facet::ALL.len());
        self.end_option_search();
    }

    pub fn filter_previous_facet(&mut self) {
        self.filter_cursor.facet_index =
            wrap_decrement(self.filter_cursor.facet_index, Facet::ALL.len());
        self.end_option_search();
    }

    pub fn filter_next_option(&mut self) {
        let len = self.visible_options().len();
        self.filter_cursor.option_index = wrap_increment(self.filter_cursor.option_index, len);
    }

    pub fn filter_previous_option(&mut self) {
        let len = self.visible_options().len();
        self.filter_cursor.option_index = wrap_decrement(self.filter_cursor.option_index, len);
    }

    pub fn toggle_filter_option(&mut self) {
        let visible = self.visible_options();
        let Some(&index) = visible.get(self.filter_cursor.option_index) else {
            return;
        };
        let facet = self.filter_cursor.facet();
        self.filters.form_mut().control_mut(facet).toggle(index);
    }

    pub fn begin_option_search(&mut self) {
        self.search_active = true;
        self.option_search.clear();
        self.filter_cursor.option_index = 0;
    }

    pub fn push_search_char(&mut self, ch: char) {
        self.option_search.push(ch);
        self.filter_cursor.option_index = 0;
    }

    pub fn pop_search_char(&mut self) {
        self.option_search.pop();
        self.filter_cursor.option_index = 0;
    }

    pub fn end_option_search(&mut self) {
        self.search_active = false;
        self.option_search.clear();
        self.filter_cursor.option_index = 0;
    }

    /// Note a terminal resize. The map is re-measured once the size has
    /// settled.
    pub fn on_resize(&mut self, now: Instant) {
        self.pending_resize = Some(now);
        self.map.mark_layout_stale();
    }

    /// Recompute the pane layout if a resize has settled, or if the map
    /// was never measured. Returns whether the layout changed.
    pub fn relayout_if_due(&mut self, now: Instant, area: Rect) -> bool {
        let settled = self
            .pending_resize
            .is_some_and(|since| now.duration_since(since) >= RESIZE_SETTLE);
        if !settled && self.map.viewport().is_some() {
            return false;
        }

        let panes = main_panes(area, self.settings.app.ui);
        let columns = panes.map.width.saturating_sub(2);
        let rows = panes.map.height.saturating_sub(2);
        self.map.invalidate_layout(columns, rows);
        self.pending_resize = None;
        tracing::debug!(columns, rows, stacked = panes.stacked, "map layout invalidated");
        true
    }
}
