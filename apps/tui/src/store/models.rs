use poi_core::{Poi, PoiId};
use sqlx::FromRow;

use super::StoreError;

/// One row of the snapshot `enriched_pois` table
#[derive(Debug, Clone, FromRow)]
pub struct PoiRow {
    /// serde_json encoding of the POI id, so integer and text keys survive
    pub id: String,
    pub place_name: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub subregion: Option<String>,
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// JSON array of strings
    pub tags: String,
}

impl TryFrom<PoiRow> for Poi {
    type Error = StoreError;

    fn try_from(row: PoiRow) -> Result<Self, Self::Error> {
        let id: PoiId = serde_json::from_str(&row.id).map_err(|e| StoreError::Corrupt {
            id: row.id.clone(),
            reason: format!("id: {e}"),
        })?;
        let tags: Option<Vec<String>> =
            serde_json::from_str(&row.tags).map_err(|e| StoreError::Corrupt {
                id: row.id.clone(),
                reason: format!("tags: {e}"),
            })?;

        Ok(Self {
            id,
            name: row.place_name,
            description: row.description,
            city: row.city,
            state: row.state,
            subregion: row.subregion,
            region: row.region,
            lat: row.lat,
            lng: row.lng,
            tags: tags.unwrap_or_default(),
        })
    }
}

/// What a snapshot holds and where it came from
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SnapshotInfo {
    pub source: Option<String>,
    pub exported_at: Option<String>,
    pub poi_count: i64,
}
