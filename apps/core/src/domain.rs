use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A filterable dimension of the POI table.
///
/// Declaration order is the order in which filter clauses are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Tags,
    City,
    State,
    Subregion,
    Region,
}

impl Facet {
    pub const ALL: [Self; 5] = [
        Self::Tags,
        Self::City,
        Self::State,
        Self::Subregion,
        Self::Region,
    ];

    pub const SCALARS: [Self; 4] = [Self::City, Self::State, Self::Subregion, Self::Region];

    /// Column name on the remote resource.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::City => "city",
            Self::State => "state",
            Self::Subregion => "subregion",
            Self::Region => "region",
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Tags),
            1 => Some(Self::City),
            2 => Some(Self::State),
            3 => Some(Self::Subregion),
            4 => Some(Self::Region),
            _ => None,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Tags => 0,
            Self::City => 1,
            Self::State => 2,
            Self::Subregion => 3,
            Self::Region => 4,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tag" | "tags" => Some(Self::Tags),
            "city" | "cities" => Some(Self::City),
            "state" | "states" => Some(Self::State),
            "subregion" | "subregions" => Some(Self::Subregion),
            "region" | "regions" => Some(Self::Region),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Tags => "Tags",
            Self::City => "City",
            Self::State => "State",
            Self::Subregion => "Subregion",
            Self::Region => "Region",
        }
    }

    /// Tags are a set per POI; every other facet holds one value.
    pub const fn is_multi_valued(self) -> bool {
        matches!(self, Self::Tags)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key of a POI row. The hosted table uses integers, snapshots and
/// fixtures may carry text keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoiId {
    Int(i64),
    Text(String),
}

impl fmt::Display for PoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for PoiId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PoiId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned geographic rectangle, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl Bounds {
    pub const fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn lng_span(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }
}

/// One row of the `enriched_pois` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: PoiId,
    #[serde(rename = "place_name", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
}

pub const UNNAMED_LOCATION: &str = "Unnamed Location";

impl Poi {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_LOCATION)
    }

    /// "city, state" with missing parts left blank.
    pub fn location_line(&self) -> String {
        format!(
            "{}, {}",
            self.city.as_deref().unwrap_or(""),
            self.state.as_deref().unwrap_or("")
        )
    }

    /// Both coordinates present and finite.
    pub fn coordinates(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(LatLng::new(lat, lng))
            }
            _ => None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|text| !text.is_empty())
    }

    /// Values this POI contributes to a facet domain.
    pub fn facet_values(&self, facet: Facet) -> Vec<&str> {
        match facet {
            Facet::Tags => self.tags.iter().map(String::as_str).collect(),
            Facet::City => self.city.as_deref().into_iter().collect(),
            Facet::State => self.state.as_deref().into_iter().collect(),
            Facet::Subregion => self.subregion.as_deref().into_iter().collect(),
            Facet::Region => self.region.as_deref().into_iter().collect(),
        }
    }
}

/// The facet columns of a POI row, as returned by
/// `select=city,state,subregion,region,tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRow {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "nullable_list")]
    pub tags: Vec<String>,
}

impl FacetRow {
    pub const COLUMNS: &'static str = "city,state,subregion,region,tags";

    pub fn values(&self, facet: Facet) -> Vec<&str> {
        match facet {
            Facet::Tags => self.tags.iter().map(String::as_str).collect(),
            Facet::City => self.city.as_deref().into_iter().collect(),
            Facet::State => self.state.as_deref().into_iter().collect(),
            Facet::Subregion => self.subregion.as_deref().into_iter().collect(),
            Facet::Region => self.region.as_deref().into_iter().collect(),
        }
    }
}

impl From<&Poi> for FacetRow {
    fn from(poi: &Poi) -> Self {
        Self {
            city: poi.city.clone(),
            state: poi.state.clone(),
            subregion: poi.subregion.clone(),
            region: poi.region.clone(),
            tags: poi.tags.clone(),
        }
    }
}

fn nullable_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poi_reads_postgrest_row() -> Result<(), serde_json::Error> {
        let poi: Poi = serde_json::from_str(
            r#"{"id": 7, "place_name": "Zilker Park", "description": null,
                "city": "Austin", "state": "TX", "subregion": "Central", "region": "South",
                "lat": 30.26, "lng": -97.77, "tags": ["park", "outdoors"]}"#,
        )?;

        assert_eq!(poi.id, PoiId::Int(7));
        assert_eq!(poi.display_name(), "Zilker Park");
        assert_eq!(poi.location_line(), "Austin, TX");
        assert_eq!(poi.coordinates(), Some(LatLng::new(30.26, -97.77)));
        assert!(poi.has_tag("park"));
        assert!(poi.description().is_none());
        Ok(())
    }

    #[test]
    fn test_null_tags_and_missing_fields() -> Result<(), serde_json::Error> {
        let poi: Poi = serde_json::from_str(r#"{"id": "abc", "tags": null, "lat": 10.0}"#)?;

        assert_eq!(poi.id, PoiId::Text("abc".to_string()));
        assert!(poi.tags.is_empty());
        assert_eq!(poi.display_name(), UNNAMED_LOCATION);
        assert_eq!(poi.location_line(), ", ");
        // One coordinate is not a position
        assert!(poi.coordinates().is_none());
        Ok(())
    }

    #[test]
    fn test_zero_coordinates_are_a_position() {
        let poi = Poi {
            id: PoiId::Int(1),
            name: None,
            description: None,
            city: None,
            state: None,
            subregion: None,
            region: None,
            lat: Some(0.0),
            lng: Some(0.0),
            tags: Vec::new(),
        };
        assert_eq!(poi.coordinates(), Some(LatLng::new(0.0, 0.0)));
    }

    #[test]
    fn test_facet_parse_and_order() {
        assert_eq!(Facet::parse(" Cities "), Some(Facet::City));
        assert_eq!(Facet::parse("tag"), Some(Facet::Tags));
        assert_eq!(Facet::parse("country"), None);

        for (index, facet) in Facet::ALL.iter().enumerate() {
            assert_eq!(Facet::from_index(index), Some(*facet));
            assert_eq!(facet.index(), index);
        }
        assert_eq!(Facet::from_index(5), None);
    }

    #[test]
    fn test_bounds_contains_edges() {
        let bounds = Bounds::new(LatLng::new(10.0, -20.0), LatLng::new(20.0, -10.0));
        assert!(bounds.contains(LatLng::new(10.0, -20.0)));
        assert!(bounds.contains(LatLng::new(15.0, -15.0)));
        assert!(!bounds.contains(LatLng::new(20.1, -15.0)));
        assert_eq!(bounds.center(), LatLng::new(15.0, -15.0));
    }
}
