//! View model of the map pane.
//!
//! The renderer draws whatever this model says: visible bounds, clustered
//! markers and the open popup. Like a browser map widget it measures its
//! container once and keeps using the cached size until
//! [`MapView::invalidate_layout`] is called.

use std::collections::BTreeMap;

use crate::domain::{Bounds, LatLng, Poi, PoiId};

pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 18;
/// Zoom used when a list card is activated.
pub const FOCUS_ZOOM: u8 = 12;

/// Nominal pixel size of one terminal cell.
const CELL_WIDTH_PX: f64 = 8.0;
const CELL_HEIGHT_PX: f64 = 16.0;
/// World width in pixels at zoom 0.
const TILE_SIZE_PX: f64 = 256.0;
/// Markers closer than this on screen share a cluster.
const CLUSTER_RADIUS_PX: f64 = 40.0;
/// Fraction of the visible span moved per pan step.
const PAN_FRACTION: f64 = 0.25;

const DEFAULT_COLUMNS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Cached container size in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub columns: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub poi_id: PoiId,
    pub position: LatLng,
    pub title: String,
    pub popup: PopupContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub title: String,
    pub location: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl From<&Poi> for PopupContent {
    fn from(poi: &Poi) -> Self {
        Self {
            title: poi.display_name().to_string(),
            location: poi.location_line(),
            description: poi.description().map(str::to_string),
            tags: poi.tags.clone(),
        }
    }
}

/// Markers that render as one symbol at the current zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub position: LatLng,
    /// Indices into [`MapView::markers`], in insertion order.
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }
}

#[derive(Debug, Clone)]
pub struct MapView {
    center: LatLng,
    zoom: u8,
    markers: Vec<Marker>,
    viewport: Option<Viewport>,
    layout_stale: bool,
    popup: Option<usize>,
}

impl MapView {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            center,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            markers: Vec::new(),
            viewport: None,
            layout_stale: true,
            popup: None,
        }
    }

    pub const fn center(&self) -> LatLng {
        self.center
    }

    pub const fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub const fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Replace all markers with one per POI that has coordinates.
    pub fn set_markers(&mut self, pois: &[Poi]) -> usize {
        self.markers.clear();
        self.popup = None;

        for poi in pois {
            let Some(position) = poi.coordinates() else {
                continue;
            };
            self.markers.push(Marker {
                poi_id: poi.id.clone(),
                position,
                title: poi.display_name().to_string(),
                popup: PopupContent::from(poi),
            });
        }

        self.markers.len()
    }

    pub fn center_on(&mut self, lat: f64, lng: f64, zoom: u8) {
        self.center = LatLng::new(lat.clamp(-90.0, 90.0), wrap_longitude(lng));
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Re-measure the container. Must follow every container resize.
    pub fn invalidate_layout(&mut self, columns: u16, rows: u16) {
        self.viewport = Some(Viewport {
            columns: columns.max(1),
            rows: rows.max(1),
        });
        self.layout_stale = false;
    }

    /// The container changed size and the cached measurement is wrong.
    pub fn mark_layout_stale(&mut self) {
        self.layout_stale = true;
    }

    pub const fn is_layout_stale(&self) -> bool {
        self.layout_stale
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + 1).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = self.zoom.saturating_sub(1).max(MIN_ZOOM);
    }

    /// Move the view by whole pan steps; positive is north/east.
    pub fn pan(&mut self, east_steps: i32, north_steps: i32) {
        let bounds = self.bounds();
        let lat = bounds
            .lat_span()
            .mul_add(PAN_FRACTION * f64::from(north_steps), self.center.lat);
        let lng = bounds
            .lng_span()
            .mul_add(PAN_FRACTION * f64::from(east_steps), self.center.lng);
        self.center = LatLng::new(lat.clamp(-90.0, 90.0), wrap_longitude(lng));
    }

    fn degrees_per_pixel(&self) -> f64 {
        360.0 / (TILE_SIZE_PX * f64::from(1_u32 << self.zoom))
    }

    /// Visible region, computed from the cached viewport size.
    pub fn bounds(&self) -> Bounds {
        let viewport = self.viewport.unwrap_or(Viewport {
            columns: DEFAULT_COLUMNS,
            rows: DEFAULT_ROWS,
        });
        let per_pixel = self.degrees_per_pixel();
        let half_lng = (f64::from(viewport.columns) * CELL_WIDTH_PX * per_pixel / 2.0).min(180.0);
        let half_lat = (f64::from(viewport.rows) * CELL_HEIGHT_PX * per_pixel / 2.0).min(90.0);

        Bounds::new(
            LatLng::new(
                (self.center.lat - half_lat).max(-90.0),
                self.center.lng - half_lng,
            ),
            LatLng::new(
                (self.center.lat + half_lat).min(90.0),
                self.center.lng + half_lng,
            ),
        )
    }

    /// Group markers on a grid whose cell size follows the zoom level.
    pub fn clusters(&self) -> Vec<Cluster> {
        let cell = CLUSTER_RADIUS_PX * self.degrees_per_pixel();
        let mut grid: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();

        for (index, marker) in self.markers.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let key = (
                (marker.position.lng / cell).floor() as i64,
                (marker.position.lat / cell).floor() as i64,
            );
            grid.entry(key).or_default().push(index);
        }

        grid.into_values()
            .map(|members| {
                #[allow(clippy::cast_precision_loss)]
                let count = members.len() as f64;
                let (lat_sum, lng_sum) = members.iter().fold((0.0, 0.0), |(lat, lng), index| {
                    let position = self.markers[*index].position;
                    (lat + position.lat, lng + position.lng)
                });
                Cluster {
                    position: LatLng::new(lat_sum / count, lng_sum / count),
                    members,
                }
            })
            .collect()
    }

    /// Open the popup of the marker sitting exactly at `position`.
    pub fn open_popup_at(&mut self, position: LatLng) -> Option<&Marker> {
        self.popup = self.markers.iter().position(|marker| {
            marker.position.lat.to_bits() == position.lat.to_bits()
                && marker.position.lng.to_bits() == position.lng.to_bits()
        });
        self.popup()
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
    }

    pub fn popup(&self) -> Option<&Marker> {
        self.popup.and_then(|index| self.markers.get(index))
    }

    /// Center on a POI and open its popup. POIs without coordinates are
    /// ignored.
    pub fn focus_poi(&mut self, poi: &Poi) -> bool {
        let Some(position) = poi.coordinates() else {
            return false;
        };
        self.center_on(position.lat, position.lng, FOCUS_ZOOM);
        self.open_popup_at(position).is_some()
    }
}

fn wrap_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(id: i64, position: Option<(f64, f64)>) -> Poi {
        Poi {
            id: PoiId::Int(id),
            name: Some(format!("POI {id}")),
            description: Some("A place".to_string()),
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            subregion: None,
            region: None,
            lat: position.map(|(lat, _)| lat),
            lng: position.map(|(_, lng)| lng),
            tags: vec!["park".to_string()],
        }
    }

    #[test]
    fn test_set_markers_skips_missing_coordinates() {
        let mut map = MapView::new(LatLng::new(39.0, -98.0), 4);
        let added = map.set_markers(&[poi(1, Some((30.0, -97.0))), poi(2, None)]);
        assert_eq!(added, 1);

        // Replaces, never appends
        let added = map.set_markers(&[poi(3, Some((40.0, -105.0)))]);
        assert_eq!(added, 1);
        assert_eq!(map.markers()[0].poi_id, PoiId::Int(3));
    }

    #[test]
    fn test_focus_poi_centers_and_opens_popup() {
        let mut map = MapView::new(LatLng::new(39.0, -98.0), 4);
        let target = poi(1, Some((30.25, -97.75)));
        map.set_markers(&[poi(2, Some((40.0, -105.0))), target.clone()]);

        assert!(map.focus_poi(&target));
        assert_eq!(map.zoom(), FOCUS_ZOOM);
        assert_eq!(map.center(), LatLng::new(30.25, -97.75));
        assert_eq!(
            map.popup().map(|marker| marker.popup.location.as_str()),
            Some("Austin, TX")
        );

        map.set_markers(&[]);
        assert!(map.popup().is_none());
        assert!(!map.focus_poi(&poi(5, None)));
    }

    #[test]
    fn test_bounds_follow_cached_viewport() {
        let mut map = MapView::new(LatLng::new(39.0, -98.0), 4);
        map.invalidate_layout(100, 30);
        let measured = map.bounds();
        assert!(measured.contains(map.center()));

        // Stale until re-measured
        map.mark_layout_stale();
        assert!(map.is_layout_stale());
        assert_eq!(map.bounds(), measured);

        map.invalidate_layout(50, 30);
        assert!(!map.is_layout_stale());
        assert!(map.bounds().lng_span() < measured.lng_span());
    }

    #[test]
    fn test_clusters_merge_at_low_zoom_and_split_at_high_zoom() {
        let mut map = MapView::new(LatLng::new(30.0, -97.0), 2);
        map.set_markers(&[
            poi(1, Some((30.26, -97.74))),
            poi(2, Some((30.27, -97.75))),
            poi(3, Some((-33.9, 151.2))),
        ]);

        let coarse = map.clusters();
        assert_eq!(coarse.len(), 2);
        assert_eq!(coarse.iter().map(Cluster::len).sum::<usize>(), 3);

        map.center_on(30.26, -97.74, MAX_ZOOM);
        let fine = map.clusters();
        assert_eq!(fine.len(), 3);
        assert!(fine.iter().all(Cluster::is_single));
    }

    #[test]
    fn test_zoom_and_pan_stay_in_range() {
        let mut map = MapView::new(LatLng::new(0.0, 179.0), MAX_ZOOM);
        map.zoom_in();
        assert_eq!(map.zoom(), MAX_ZOOM);

        map.center_on(0.0, 179.0, 0);
        map.zoom_out();
        assert_eq!(map.zoom(), MIN_ZOOM);

        map.pan(1, 0);
        assert!((-180.0..=180.0).contains(&map.center().lng));
    }
}
