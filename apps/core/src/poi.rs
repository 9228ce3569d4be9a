use std::fmt;

use crate::domain::{Bounds, Poi, PoiId};

pub const NO_RESULTS_MESSAGE: &str = "No POIs matched your filters.";
/// Alert for a failed first load.
pub const LOAD_FAILED: &str = "Failed to load POIs. Please check your connection.";
/// Alert for a failed reload after rows were shown.
pub const FILTER_FAILED: &str = "Failed to apply filters. Please try again.";

/// Identifies one fetch. Tickets increase monotonically per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub const fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result replaced the held collection.
    Applied { count: usize },
    /// A newer fetch was issued after this one; the result was dropped.
    Stale { latest: u64 },
    /// The current fetch failed. The held rows are unchanged; `message` is
    /// the alert to show and `detail` the underlying error.
    Failed {
        message: &'static str,
        detail: String,
    },
}

/// The POI set behind the list and the map. Only a completed, current
/// fetch may replace it.
#[derive(Debug, Default)]
pub struct PoiCollection {
    pois: Vec<Poi>,
    latest_ticket: u64,
    applied_ticket: u64,
}

impl PoiCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new fetch. Any fetch started earlier becomes stale.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_ticket += 1;
        FetchTicket(self.latest_ticket)
    }

    pub const fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.latest_ticket
    }

    /// Swap in the rows of a finished fetch, unless it has been superseded.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, pois: Vec<Poi>) -> FetchOutcome {
        if !self.is_current(ticket) {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.latest_ticket,
                "dropping stale POI fetch"
            );
            return FetchOutcome::Stale {
                latest: self.latest_ticket,
            };
        }

        self.pois = pois;
        self.applied_ticket = ticket.0;
        FetchOutcome::Applied {
            count: self.pois.len(),
        }
    }

    /// Settle a finished fetch, successful or not. Failures of superseded
    /// fetches are stale like their rows would be.
    pub fn finish_fetch<E: fmt::Display>(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Poi>, E>,
    ) -> FetchOutcome {
        match result {
            Ok(pois) => self.complete_fetch(ticket, pois),
            Err(e) if self.is_current(ticket) => FetchOutcome::Failed {
                // Nothing applied yet means start-up; afterwards it is a filter run.
                message: if self.applied_ticket == 0 {
                    LOAD_FAILED
                } else {
                    FILTER_FAILED
                },
                detail: e.to_string(),
            },
            Err(e) => {
                tracing::debug!(error = %e, ticket = ticket.0, "ignoring stale fetch error");
                FetchOutcome::Stale {
                    latest: self.latest_ticket,
                }
            }
        }
    }

    /// Generation of the fetch whose rows are currently held, 0 if none.
    pub const fn applied_generation(&self) -> u64 {
        self.applied_ticket
    }

    pub fn pois(&self) -> &[Poi] {
        &self.pois
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Poi> {
        self.pois.get(index)
    }

    pub fn lookup_by_id(&self, id: &PoiId) -> Option<&Poi> {
        self.pois.iter().find(|poi| &poi.id == id)
    }

    pub fn filter_by_tag(&self, tag: &str) -> Vec<&Poi> {
        self.pois.iter().filter(|poi| poi.has_tag(tag)).collect()
    }

    pub fn filter_within_bounds(&self, bounds: &Bounds) -> Vec<&Poi> {
        self.pois
            .iter()
            .filter(|poi| {
                poi.coordinates()
                    .is_some_and(|position| bounds.contains(position))
            })
            .collect()
    }

    /// Clear and refill a list pane: one card per POI, or the placeholder.
    pub fn render_list(&self, pane: &mut PoiListPane) {
        if self.pois.is_empty() {
            pane.show_placeholder(NO_RESULTS_MESSAGE);
            return;
        }

        pane.show_cards(self.pois.iter().map(PoiCard::from).collect());
    }
}

/// What a list card shows for one POI.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiCard {
    pub poi: Poi,
    pub title: String,
    pub subtitle: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl From<&Poi> for PoiCard {
    fn from(poi: &Poi) -> Self {
        Self {
            poi: poi.clone(),
            title: poi.display_name().to_string(),
            subtitle: poi.location_line(),
            description: poi.description().map(str::to_string),
            tags: poi.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListContent {
    Placeholder(String),
    Cards(Vec<PoiCard>),
}

/// The scrollable list container.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiListPane {
    content: ListContent,
    selected: usize,
}

impl Default for PoiListPane {
    fn default() -> Self {
        Self {
            content: ListContent::Cards(Vec::new()),
            selected: 0,
        }
    }
}

impl PoiListPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show_placeholder(&mut self, message: &str) {
        self.content = ListContent::Placeholder(message.to_string());
        self.selected = 0;
    }

    pub fn show_cards(&mut self, cards: Vec<PoiCard>) {
        self.content = ListContent::Cards(cards);
        self.selected = 0;
    }

    pub const fn content(&self) -> &ListContent {
        &self.content
    }

    pub fn cards(&self) -> &[PoiCard] {
        match &self.content {
            ListContent::Cards(cards) => cards,
            ListContent::Placeholder(_) => &[],
        }
    }

    pub fn placeholder(&self) -> Option<&str> {
        match &self.content {
            ListContent::Placeholder(message) => Some(message),
            ListContent::Cards(_) => None,
        }
    }

    pub const fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_card(&self) -> Option<&PoiCard> {
        self.cards().get(self.selected)
    }

    pub fn select(&mut self, index: usize) {
        let len = self.cards().len();
        self.selected = if len == 0 { 0 } else { index.min(len - 1) };
    }

    pub fn select_next(&mut self) {
        self.select(self.selected.saturating_add(1));
    }

    pub fn select_previous(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    /// Activate the selected card. Returns whether a card was activated.
    pub fn activate_selected(&self, on_select: impl FnOnce(&Poi)) -> bool {
        match self.selected_card() {
            Some(card) => {
                on_select(&card.poi);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LatLng;

    fn poi(id: i64, name: &str, tags: &[&str], position: Option<(f64, f64)>) -> Poi {
        Poi {
            id: PoiId::Int(id),
            name: Some(name.to_string()),
            description: None,
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            subregion: None,
            region: None,
            lat: position.map(|(lat, _)| lat),
            lng: position.map(|(_, lng)| lng),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    fn loaded(pois: Vec<Poi>) -> PoiCollection {
        let mut collection = PoiCollection::new();
        let ticket = collection.begin_fetch();
        collection.complete_fetch(ticket, pois);
        collection
    }

    #[test]
    fn test_filter_by_tag_preserves_order() {
        let collection = loaded(vec![
            poi(1, "Zilker", &["park"], None),
            poi(2, "Museum", &[], None),
            poi(3, "Barton Springs", &["swim", "park"], None),
        ]);

        let parks: Vec<&PoiId> = collection
            .filter_by_tag("park")
            .into_iter()
            .map(|poi| &poi.id)
            .collect();
        assert_eq!(parks, vec![&PoiId::Int(1), &PoiId::Int(3)]);
        assert!(collection.filter_by_tag("museum").is_empty());
    }

    #[test]
    fn test_render_empty_collection_shows_placeholder() {
        let collection = loaded(Vec::new());
        let mut pane = PoiListPane::new();
        pane.show_cards(vec![PoiCard::from(&poi(9, "Old", &[], None))]);

        collection.render_list(&mut pane);

        assert_eq!(pane.placeholder(), Some(NO_RESULTS_MESSAGE));
        assert!(pane.cards().is_empty());
        assert!(!pane.activate_selected(|_| panic!("no card to activate")));
    }

    #[test]
    fn test_render_one_card_per_poi_in_order() {
        let collection = loaded(vec![
            poi(3, "C", &[], None),
            poi(1, "A", &[], None),
            poi(2, "B", &[], None),
        ]);
        let mut pane = PoiListPane::new();
        pane.show_placeholder(NO_RESULTS_MESSAGE);

        collection.render_list(&mut pane);

        let titles: Vec<&str> = pane.cards().iter().map(|card| card.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
        assert!(pane.placeholder().is_none());
    }

    #[test]
    fn test_activation_invokes_callback_with_selected_poi() {
        let collection = loaded(vec![poi(1, "A", &[], None), poi(2, "B", &[], None)]);
        let mut pane = PoiListPane::new();
        collection.render_list(&mut pane);

        pane.select_next();
        pane.select_next();
        assert_eq!(pane.selected_index(), 1);

        let mut activated = None;
        assert!(pane.activate_selected(|poi| activated = Some(poi.id.clone())));
        assert_eq!(activated, Some(PoiId::Int(2)));
    }

    #[test]
    fn test_stale_fetch_does_not_replace_newer() {
        let mut collection = PoiCollection::new();
        let first = collection.begin_fetch();
        let second = collection.begin_fetch();

        let applied = collection.complete_fetch(second, vec![poi(2, "Second", &[], None)]);
        assert_eq!(applied, FetchOutcome::Applied { count: 1 });

        let stale = collection.complete_fetch(first, vec![poi(1, "First", &[], None)]);
        assert_eq!(stale, FetchOutcome::Stale { latest: 2 });

        assert_eq!(collection.pois()[0].display_name(), "Second");
        assert_eq!(collection.applied_generation(), second.generation());
    }

    #[test]
    fn test_failure_alert_depends_on_what_was_shown() {
        let mut collection = PoiCollection::new();
        let first = collection.begin_fetch();
        assert_eq!(
            collection.finish_fetch(first, Err("offline")),
            FetchOutcome::Failed {
                message: LOAD_FAILED,
                detail: "offline".to_string()
            }
        );

        let second = collection.begin_fetch();
        let ok: Result<_, &str> = Ok(vec![poi(1, "A", &[], None)]);
        assert_eq!(
            collection.finish_fetch(second, ok),
            FetchOutcome::Applied { count: 1 }
        );

        let third = collection.begin_fetch();
        assert_eq!(
            collection.finish_fetch(third, Err("timeout")),
            FetchOutcome::Failed {
                message: FILTER_FAILED,
                detail: "timeout".to_string()
            }
        );
        assert_eq!(collection.pois().len(), 1);
    }

    #[test]
    fn test_stale_failure_is_dropped() {
        let mut collection = PoiCollection::new();
        let first = collection.begin_fetch();
        let second = collection.begin_fetch();

        assert_eq!(
            collection.finish_fetch(first, Err("offline")),
            FetchOutcome::Stale { latest: 2 }
        );
        let ok: Result<_, &str> = Ok(vec![poi(2, "B", &[], None)]);
        assert_eq!(
            collection.finish_fetch(second, ok),
            FetchOutcome::Applied { count: 1 }
        );
    }

    #[test]
    fn test_lookup_and_bounds() {
        let collection = loaded(vec![
            poi(1, "Inside", &[], Some((30.0, -97.0))),
            poi(2, "Outside", &[], Some((45.0, -120.0))),
            poi(3, "Nowhere", &[], None),
        ]);

        assert_eq!(
            collection.lookup_by_id(&PoiId::Int(2)).map(Poi::display_name),
            Some("Outside")
        );
        assert!(collection.lookup_by_id(&PoiId::Int(4)).is_none());

        let bounds = Bounds::new(LatLng::new(25.0, -100.0), LatLng::new(35.0, -90.0));
        let inside: Vec<&str> = collection
            .filter_within_bounds(&bounds)
            .into_iter()
            .map(Poi::display_name)
            .collect();
        assert_eq!(inside, vec!["Inside"]);
    }
}
