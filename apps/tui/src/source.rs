use async_trait::async_trait;
use poi_core::filters::FilterQuery;
use poi_core::{FacetRow, Poi};
use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where POI rows come from: the hosted table or a local snapshot.
///
/// `access_token` is the signed-in user's bearer token; sources that do not
/// authenticate ignore it.
#[async_trait]
pub trait PoiSource: Send + Sync {
    /// Short label for the status bar and logs.
    fn describe(&self) -> String;

    /// Facet columns of every row, for building the filter domains.
    async fn fetch_facet_rows(&self, access_token: Option<&str>)
        -> Result<Vec<FacetRow>, SourceError>;

    /// Rows matching `query`, in source order.
    async fn fetch_pois(
        &self,
        query: &FilterQuery,
        access_token: Option<&str>,
    ) -> Result<Vec<Poi>, SourceError>;
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use super::*;
    use poi_core::Facet;

    /// In-memory source that applies `eq` / `in` / `cs` like PostgREST and
    /// records every query it receives.
    #[derive(Default)]
    pub struct FakeSource {
        pub pois: Vec<Poi>,
        pub fail_with: Option<String>,
        pub queries: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn new(pois: Vec<Poi>) -> Self {
            Self {
                pois,
                ..Self::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        fn check(&self) -> Result<(), SourceError> {
            match &self.fail_with {
                Some(message) => Err(RemoteError::Status {
                    status: 500,
                    message: message.clone(),
                }
                .into()),
                None => Ok(()),
            }
        }
    }

    fn scalar(poi: &Poi, facet: Facet) -> Option<&str> {
        poi.facet_values(facet).first().copied()
    }

    #[async_trait]
    impl PoiSource for FakeSource {
        fn describe(&self) -> String {
            "fake".to_string()
        }

        async fn fetch_facet_rows(
            &self,
            _access_token: Option<&str>,
        ) -> Result<Vec<FacetRow>, SourceError> {
            self.check()?;
            Ok(self.pois.iter().map(FacetRow::from).collect())
        }

        async fn fetch_pois(
            &self,
            query: &FilterQuery,
            _access_token: Option<&str>,
        ) -> Result<Vec<Poi>, SourceError> {
            self.queries
                .lock()
                .map_err(|_| RemoteError::Callback("poisoned".to_string()))?
                .push(query.to_query_string());
            self.check()?;

            use poi_core::filters::Clause;
            let matches = |poi: &Poi| {
                query.clauses().iter().all(|clause| match clause {
                    Clause::Contains { values, .. } => values.iter().all(|tag| poi.has_tag(tag)),
                    Clause::Eq { field, value } => scalar(poi, *field) == Some(value.as_str()),
                    Clause::In { field, values } => scalar(poi, *field)
                        .is_some_and(|actual| values.iter().any(|value| value == actual)),
                })
            };
            Ok(self.pois.iter().filter(|poi| matches(poi)).cloned().collect())
        }
    }
}
