//! Platform-independent model of the POI Tracker: filter encoding, the POI
//! collection and list, the map view model, session state and settings.

pub mod config;
pub mod domain;
pub mod filters;
pub mod map;
pub mod poi;
pub mod session;

pub use config::{AppConfig, ConfigError};
pub use domain::{Bounds, Facet, FacetRow, LatLng, Poi, PoiId};
pub use filters::{FacetDomains, FilterQuery, FilterSelection, FilterState};
pub use map::MapView;
pub use poi::{FetchOutcome, FetchTicket, PoiCollection, PoiListPane, FILTER_FAILED, LOAD_FAILED};
pub use session::{AuthEvent, AuthNotification, Session, SessionManager, User};
