use poi_core::config::AppConfig;
use poi_core::filters::FilterQuery;
use poi_core::session::ObserverError;
use poi_core::{
    AuthEvent, AuthNotification, Facet, FacetRow, FetchOutcome, FetchTicket, FilterState, MapView,
    Poi, PoiCollection, PoiListPane, SessionManager,
};
use ratzilla::event::KeyCode;

pub const SIGN_IN_FAILED: &str = "Failed to sign in. Please try again.";
pub const SIGN_OUT_FAILED: &str = "Failed to sign out. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Main,
    Filters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Map,
}

/// Work a key press asks the browser side to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    LoadPois,
    SignIn,
    SignOut,
}

/// Everything one fetch needs once the state borrow is released.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub ticket: FetchTicket,
    pub query: FilterQuery,
    pub access_token: Option<String>,
}

#[derive(Debug)]
pub struct WebApp {
    pub config: AppConfig,
    pub filters: FilterState,
    pub pois: PoiCollection,
    pub list: PoiListPane,
    pub map: MapView,
    pub session: SessionManager,
    pub screen: Screen,
    pub focus: Focus,
    pub facet_index: usize,
    pub option_index: usize,
    pub alert: Option<String>,
    pub status: String,
    pub loading: bool,
}

impl WebApp {
    pub fn new(config: AppConfig) -> Self {
        let map = MapView::new(config.map.center, config.map.zoom);
        Self {
            config,
            filters: FilterState::new(),
            pois: PoiCollection::new(),
            list: PoiListPane::new(),
            map,
            session: SessionManager::new(),
            screen: Screen::Main,
            focus: Focus::List,
            facet_index: 0,
            option_index: 0,
            alert: None,
            status: "Loading POIs...".to_string(),
            loading: false,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.session.access_token().map(str::to_string)
    }

    pub fn begin_load(&mut self) -> FetchPlan {
        self.loading = true;
        FetchPlan {
            ticket: self.pois.begin_fetch(),
            query: self.filters.build_filter_query(),
            access_token: self.access_token(),
        }
    }

    pub fn finish_load(&mut self, ticket: FetchTicket, result: Result<Vec<Poi>, String>) {
        match self.pois.finish_fetch(ticket, result) {
            FetchOutcome::Applied { count } => {
                self.loading = false;
                self.pois.render_list(&mut self.list);
                let placed = self.map.set_markers(self.pois.pois());
                self.status = format!("{count} POIs ({placed} on the map)");
            }
            FetchOutcome::Failed { message, detail } => {
                self.loading = false;
                self.alert = Some(format!("{message}\n\n{detail}"));
            }
            FetchOutcome::Stale { .. } => {}
        }
    }

    /// Repopulate the filter controls. A failed load leaves them empty
    /// and only says so in the status line.
    pub fn apply_facet_rows(&mut self, result: Result<Vec<FacetRow>, String>) {
        match result {
            Ok(rows) => self.filters.apply_rows(&rows),
            Err(detail) => {
                self.filters.reset_domains();
                self.status = format!("Filter options unavailable: {detail}");
            }
        }
        self.option_index = 0;
    }

    pub fn apply_auth(&mut self, notification: AuthNotification) -> Vec<ObserverError> {
        let event = notification.event;
        let errors = self.session.handle_notification(notification);
        match event {
            AuthEvent::SignedIn => self.status = format!("Signed in as {}", self.display_name()),
            AuthEvent::SignedOut => self.status = "Signed out".to_string(),
            _ => {}
        }
        errors
    }

    pub fn display_name(&self) -> String {
        self.session
            .profile_field("name")
            .unwrap_or_else(|| "unknown user".to_string())
    }

    pub fn auth_summary(&self) -> String {
        if self.session.is_authenticated() {
            format!("Signed in as {}", self.display_name())
        } else {
            "Not signed in".to_string()
        }
    }

    pub fn facet(&self) -> Facet {
        Facet::from_index(self.facet_index).unwrap_or(Facet::Tags)
    }

    fn option_count(&self) -> usize {
        self.filters.form().control(self.facet()).options().len()
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Command {
        if self.alert.is_some() {
            if matches!(code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.alert = None;
            }
            return Command::None;
        }
        match self.screen {
            Screen::Main => self.main_key(code),
            Screen::Filters => self.filters_key(code),
        }
    }

    fn main_key(&mut self, code: KeyCode) -> Command {
        match code {
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::List => Focus::Map,
                    Focus::Map => Focus::List,
                };
            }
            KeyCode::Char('f') => {
                self.screen = Screen::Filters;
                self.option_index = 0;
            }
            KeyCode::Char('x') => {
                self.filters.clear_selection();
                self.status = "Filters cleared".to_string();
                return Command::LoadPois;
            }
            KeyCode::Char('r') => return Command::LoadPois,
            KeyCode::Char('l') => return Command::SignIn,
            KeyCode::Char('o') => return Command::SignOut,
            KeyCode::Esc => self.map.close_popup(),
            _ if self.focus == Focus::List => self.list_key(code),
            _ => self.map_key(code),
        }
        Command::None
    }

    fn list_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.list.select_previous(),
            KeyCode::Down => self.list.select_next(),
            KeyCode::Home => self.list.select(0),
            KeyCode::End => self.list.select(usize::MAX),
            KeyCode::Enter => {
                let map = &mut self.map;
                let mut placed = false;
                self.list.activate_selected(|poi| placed = map.focus_poi(poi));
                if !placed {
                    self.status = "This POI has no coordinates".to_string();
                }
            }
            _ => {}
        }
    }

    fn map_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.map.pan(0, 1),
            KeyCode::Down => self.map.pan(0, -1),
            KeyCode::Left => self.map.pan(-1, 0),
            KeyCode::Right => self.map.pan(1, 0),
            KeyCode::Char('+' | '=') => self.map.zoom_in(),
            KeyCode::Char('-') => self.map.zoom_out(),
            KeyCode::Char('c') => {
                let home = self.config.map.center;
                self.map.center_on(home.lat, home.lng, self.config.map.zoom);
            }
            _ => {}
        }
    }

    fn filters_key(&mut self, code: KeyCode) -> Command {
        let facets = Facet::ALL.len();
        match code {
            KeyCode::Left => {
                self.facet_index = (self.facet_index + facets - 1) % facets;
                self.option_index = 0;
            }
            KeyCode::Right | KeyCode::Tab => {
                self.facet_index = (self.facet_index + 1) % facets;
                self.option_index = 0;
            }
            KeyCode::Up => self.option_index = self.option_index.saturating_sub(1),
            KeyCode::Down => {
                let count = self.option_count();
                if count > 0 {
                    self.option_index = (self.option_index + 1).min(count - 1);
                }
            }
            KeyCode::Char(' ') => {
                let facet = self.facet();
                if self.option_index < self.option_count() {
                    self.filters.form_mut().control_mut(facet).toggle(self.option_index);
                }
            }
            KeyCode::Char('c') => self.filters.clear_selection(),
            KeyCode::Esc => self.screen = Screen::Main,
            KeyCode::Enter => {
                self.screen = Screen::Main;
                let query = self.filters.build_filter_query();
                self.status = if query.is_empty() {
                    "Loading all POIs...".to_string()
                } else {
                    format!("Applying filters: {query}")
                };
                return Command::LoadPois;
            }
            _ => {}
        }
        Command::None
    }
}

#[cfg(test)]
mod tests {
    use poi_core::{PoiId, Session, FILTER_FAILED, LOAD_FAILED};

    use super::*;

    fn poi(id: i64, city: &str, tags: &[&str]) -> Poi {
        Poi {
            id: PoiId::Int(id),
            name: Some(format!("Place {id}")),
            description: None,
            city: Some(city.to_string()),
            state: Some("TX".to_string()),
            subregion: None,
            region: Some("South".to_string()),
            lat: Some(30.0 + f64::from(u32::try_from(id).unwrap_or(0))),
            lng: Some(-97.0),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    fn sample() -> Vec<Poi> {
        vec![
            poi(1, "Austin", &["park"]),
            poi(2, "Houston", &["museum"]),
            poi(3, "Austin", &["park", "trail"]),
        ]
    }

    fn loaded() -> WebApp {
        let mut app = WebApp::new(AppConfig::default());
        let rows: Vec<FacetRow> = sample().iter().map(FacetRow::from).collect();
        app.apply_facet_rows(Ok(rows));
        let plan = app.begin_load();
        app.finish_load(plan.ticket, Ok(sample()));
        app
    }

    #[test]
    fn test_filter_form_submits_encoded_selection() {
        let mut app = loaded();

        assert_eq!(app.handle_key(KeyCode::Char('f')), Command::None);
        app.handle_key(KeyCode::Right);
        assert_eq!(app.facet(), Facet::City);
        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.handle_key(KeyCode::Enter), Command::LoadPois);

        assert_eq!(app.screen, Screen::Main);
        let plan = app.begin_load();
        assert_eq!(plan.query.to_query_string(), "city=eq.Austin");
    }

    #[test]
    fn test_late_response_does_not_replace_newer_one() {
        let mut app = loaded();
        let first = app.begin_load();
        let second = app.begin_load();

        app.finish_load(second.ticket, Ok(vec![poi(9, "Dallas", &[])]));
        app.finish_load(first.ticket, Ok(sample()));

        assert_eq!(app.list.cards().len(), 1);
        assert_eq!(app.map.markers().len(), 1);
    }

    #[test]
    fn test_failure_message_depends_on_prior_load() {
        let mut app = WebApp::new(AppConfig::default());
        let plan = app.begin_load();
        app.finish_load(plan.ticket, Err("offline".to_string()));
        assert!(app.alert.as_deref().is_some_and(|alert| alert.starts_with(LOAD_FAILED)));

        let mut app = loaded();
        let plan = app.begin_load();
        app.finish_load(plan.ticket, Err("503".to_string()));
        assert!(app.alert.as_deref().is_some_and(|alert| alert.starts_with(FILTER_FAILED)));
        assert_eq!(app.list.cards().len(), 3);

        assert_eq!(app.handle_key(KeyCode::Char('r')), Command::None);
        app.handle_key(KeyCode::Esc);
        assert!(app.alert.is_none());
    }

    #[test]
    fn test_card_activation_opens_popup() {
        let mut app = loaded();
        app.handle_key(KeyCode::Down);
        app.handle_key(KeyCode::Enter);

        let popup = app.map.popup().map(|marker| marker.poi_id.clone());
        assert_eq!(popup, Some(PoiId::Int(2)));
        assert!((app.map.center().lat - 32.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_facet_failure_sets_status_without_alert() {
        let mut app = loaded();
        app.apply_facet_rows(Err("timeout".to_string()));

        assert!(app.filters.domains().is_empty());
        assert!(app.alert.is_none());
        assert!(app.status.contains("timeout"));
    }

    #[test]
    fn test_sign_in_updates_access_token() {
        let mut app = loaded();
        let session = Session {
            access_token: "jwt".to_string(),
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            expires_in: None,
            expires_at: None,
            user: None,
        };

        let errors = app.apply_auth(AuthNotification::new(AuthEvent::SignedIn, Some(session)));

        assert!(errors.is_empty());
        assert_eq!(app.begin_load().access_token.as_deref(), Some("jwt"));
        assert_eq!(app.handle_key(KeyCode::Char('o')), Command::SignOut);
    }
}
