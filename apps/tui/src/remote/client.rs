use async_trait::async_trait;
use poi_core::config::SupabaseConfig;
use poi_core::filters::FilterQuery;
use poi_core::{FacetRow, Poi};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use super::error::check_response;
use super::RemoteError;
use crate::source::{PoiSource, SourceError};

/// PostgREST client for the POI table.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    rest_url: Option<String>,
    anon_key: Option<String>,
}

impl RestClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            rest_url: config.rest_url(),
            anon_key: config.anon_key.clone(),
        }
    }

    fn anon_key(&self) -> Result<&str, RemoteError> {
        self.anon_key
            .as_deref()
            .ok_or(RemoteError::NotConfigured("POI_SUPABASE_ANON_KEY"))
    }

    /// `{rest_url}?select=<columns>&<filters>`, values form-encoded.
    pub fn request_url(&self, select: &str, query: &FilterQuery) -> Result<Url, RemoteError> {
        let base = self
            .rest_url
            .as_deref()
            .ok_or(RemoteError::NotConfigured("POI_SUPABASE_URL"))?;
        let mut url = Url::parse(base).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", select);
            for (field, value) in query.pairs() {
                pairs.append_pair(field, &value);
            }
        }
        Ok(url)
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        url: Url,
        access_token: Option<&str>,
    ) -> Result<Vec<T>, RemoteError> {
        let anon_key = self.anon_key()?;
        let bearer = access_token.unwrap_or(anon_key);
        tracing::debug!(%url, authenticated = access_token.is_some(), "GET rows");

        let response = self
            .client
            .get(url)
            .header("apikey", anon_key)
            .bearer_auth(bearer)
            .send()
            .await?;
        let rows = check_response(response).await?.json::<Vec<T>>().await?;
        Ok(rows)
    }
}

#[async_trait]
impl PoiSource for RestClient {
    fn describe(&self) -> String {
        self.rest_url
            .clone()
            .unwrap_or_else(|| "remote (not configured)".to_string())
    }

    async fn fetch_facet_rows(
        &self,
        access_token: Option<&str>,
    ) -> Result<Vec<FacetRow>, SourceError> {
        let url = self.request_url(FacetRow::COLUMNS, &FilterQuery::unfiltered())?;
        Ok(self.get_rows(url, access_token).await?)
    }

    async fn fetch_pois(
        &self,
        query: &FilterQuery,
        access_token: Option<&str>,
    ) -> Result<Vec<Poi>, SourceError> {
        let url = self.request_url("*", query)?;
        let pois: Vec<Poi> = self.get_rows(url, access_token).await?;
        tracing::info!(count = pois.len(), filters = %query, "fetched POIs");
        Ok(pois)
    }
}
