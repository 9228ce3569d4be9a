pub mod migrations;
pub mod models;
pub mod queries;

use async_trait::async_trait;
use poi_core::filters::FilterQuery;
use poi_core::{FacetRow, Poi};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::source::{PoiSource, SourceError};
pub use models::{PoiRow, SnapshotInfo};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("snapshot row {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Local SQLite copy of the POI table, readable without network access.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
    location: String,
}

impl SnapshotStore {
    /// Open an existing snapshot for reading.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        Self::connect(path, false).await
    }

    /// Open a snapshot for writing, creating the file when missing.
    pub async fn create(path: &str) -> Result<Self, StoreError> {
        Self::connect(path, true).await
    }

    async fn connect(path: &str, create_if_missing: bool) -> Result<Self, StoreError> {
        let url = migrations::database_url(path);
        let pool = migrations::create_database_pool(&url, create_if_missing).await?;
        tracing::debug!(path, "snapshot opened");
        Ok(Self {
            pool,
            location: path.to_string(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub async fn replace_all(&self, pois: &[Poi], source: &str) -> Result<u64, StoreError> {
        let exported_at = chrono::Utc::now().to_rfc3339();
        let inserted = queries::replace_snapshot(&self.pool, pois, source, &exported_at).await?;
        tracing::info!(inserted, source, path = %self.location, "snapshot replaced");
        Ok(inserted)
    }

    pub async fn info(&self) -> Result<SnapshotInfo, StoreError> {
        Ok(queries::snapshot_info(&self.pool).await?)
    }
}

#[async_trait]
impl PoiSource for SnapshotStore {
    fn describe(&self) -> String {
        format!("snapshot {}", self.location)
    }

    async fn fetch_facet_rows(
        &self,
        _access_token: Option<&str>,
    ) -> Result<Vec<FacetRow>, SourceError> {
        Ok(queries::get_facet_rows(&self.pool)
            .await
            .map_err(StoreError::from)?)
    }

    async fn fetch_pois(
        &self,
        query: &FilterQuery,
        _access_token: Option<&str>,
    ) -> Result<Vec<Poi>, SourceError> {
        let rows = queries::get_pois(&self.pool, query)
            .await
            .map_err(StoreError::from)?;
        let pois = rows
            .into_iter()
            .map(Poi::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = pois.len(), filters = %query, "read POIs from snapshot");
        Ok(pois)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poi_core::{FilterSelection, PoiId};

    #[tokio::test]
    async fn test_snapshot_serves_the_source_contract() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pois.db");
        let path = path.to_str().ok_or("non-utf8 temp path")?;

        assert!(SnapshotStore::open(path).await.is_err());

        let store = SnapshotStore::create(path).await?;
        let pois = vec![
            Poi {
                id: PoiId::Text("b".to_string()),
                name: Some("Barton Springs".to_string()),
                description: Some("Spring-fed pool".to_string()),
                city: Some("Austin".to_string()),
                state: Some("TX".to_string()),
                subregion: Some("Central".to_string()),
                region: Some("South".to_string()),
                lat: Some(30.26),
                lng: Some(-97.77),
                tags: vec!["swim".to_string()],
            },
            Poi {
                id: PoiId::Int(7),
                name: None,
                description: None,
                city: None,
                state: None,
                subregion: None,
                region: None,
                lat: None,
                lng: None,
                tags: Vec::new(),
            },
        ];
        store.replace_all(&pois, "https://demo.supabase.co").await?;

        let reopened = SnapshotStore::open(path).await?;
        assert_eq!(reopened.fetch_pois(&FilterQuery::unfiltered(), None).await?, pois);

        let swim = FilterQuery::from_selection(&FilterSelection {
            tags: vec!["swim".to_string()],
            ..FilterSelection::default()
        });
        assert_eq!(reopened.fetch_pois(&swim, Some("ignored")).await?.len(), 1);
        assert_eq!(reopened.fetch_facet_rows(None).await?.len(), 2);
        assert_eq!(reopened.info().await?.poi_count, 2);
        Ok(())
    }
}
