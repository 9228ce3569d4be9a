//! Browser `fetch` calls against the hosted table and the auth service.

use std::fmt;

use poi_core::config::SupabaseConfig;
use poi_core::{FacetRow, FilterQuery, Poi, Session, User};
use serde::de::DeserializeOwned;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    NotConfigured(&'static str),
    Browser(String),
    Status { status: u16, message: String },
    Decode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(key) => write!(f, "{key} is not set"),
            Self::Browser(message) => write!(f, "request failed: {message}"),
            Self::Status { status, message } if message.is_empty() => {
                write!(f, "server returned {status}")
            }
            Self::Status { status, message } => write!(f, "server returned {status}: {message}"),
            Self::Decode(message) => write!(f, "unexpected response: {message}"),
        }
    }
}

impl From<JsValue> for FetchError {
    fn from(value: JsValue) -> Self {
        Self::Browser(value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }
}

pub fn encode_component(value: &str) -> String {
    String::from(js_sys::encode_uri_component(value))
}

/// `{rest}/{table}?select=..&<filters>` with every value run through
/// `encode`.
pub fn rest_url(
    config: &SupabaseConfig,
    select: &str,
    query: &FilterQuery,
    encode: impl Fn(&str) -> String,
) -> Result<String, FetchError> {
    let base = config
        .rest_url()
        .ok_or(FetchError::NotConfigured("POI_SUPABASE_URL"))?;
    let mut url = format!("{base}?select={}", encode(select));
    for (key, value) in query.pairs() {
        url.push('&');
        url.push_str(key);
        url.push('=');
        url.push_str(&encode(&value));
    }
    Ok(url)
}

/// The message field of a PostgREST or GoTrue error body, else the body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|field| field.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn anon_key(config: &SupabaseConfig) -> Result<&str, FetchError> {
    config
        .anon_key
        .as_deref()
        .ok_or(FetchError::NotConfigured("POI_SUPABASE_ANON_KEY"))
}

fn auth_url(config: &SupabaseConfig, path: &str) -> Result<String, FetchError> {
    config
        .auth_url()
        .map(|base| format!("{base}/{path}"))
        .ok_or(FetchError::NotConfigured("POI_SUPABASE_URL"))
}

async fn send(
    method: &str,
    url: &str,
    config: &SupabaseConfig,
    bearer: Option<&str>,
    body: Option<String>,
) -> Result<String, FetchError> {
    let window = web_sys::window().ok_or_else(|| FetchError::Browser("no window".to_string()))?;
    let key = anon_key(config)?;

    let headers = Headers::new()?;
    headers.set("apikey", key)?;
    headers.set("Authorization", &format!("Bearer {}", bearer.unwrap_or(key)))?;

    let opts = RequestInit::new();
    opts.set_method(method);
    opts.set_mode(RequestMode::Cors);
    if let Some(body) = body {
        headers.set("Content-Type", "application/json")?;
        opts.set_body(&JsValue::from_str(&body));
    }
    opts.set_headers(&headers);

    let request = Request::new_with_str_and_init(url, &opts)?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await?
        .dyn_into()?;
    let text = JsFuture::from(response.text()?)
        .await?
        .as_string()
        .unwrap_or_default();

    if !response.ok() {
        return Err(FetchError::Status {
            status: response.status(),
            message: error_message(&text),
        });
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, FetchError> {
    serde_json::from_str(text).map_err(|e| FetchError::Decode(e.to_string()))
}

pub async fn fetch_pois(
    config: &SupabaseConfig,
    query: &FilterQuery,
    access_token: Option<&str>,
) -> Result<Vec<Poi>, FetchError> {
    let url = rest_url(config, "*", query, encode_component)?;
    decode(&send("GET", &url, config, access_token, None).await?)
}

pub async fn fetch_facet_rows(
    config: &SupabaseConfig,
    access_token: Option<&str>,
) -> Result<Vec<FacetRow>, FetchError> {
    let url = rest_url(
        config,
        FacetRow::COLUMNS,
        &FilterQuery::unfiltered(),
        encode_component,
    )?;
    decode(&send("GET", &url, config, access_token, None).await?)
}

pub async fn fetch_user(config: &SupabaseConfig, access_token: &str) -> Result<User, FetchError> {
    let url = auth_url(config, "user")?;
    decode(&send("GET", &url, config, Some(access_token), None).await?)
}

pub async fn refresh_session(
    config: &SupabaseConfig,
    refresh_token: &str,
) -> Result<Session, FetchError> {
    let url = auth_url(config, "token?grant_type=refresh_token")?;
    let body = serde_json::json!({ "refresh_token": refresh_token }).to_string();
    decode(&send("POST", &url, config, None, Some(body)).await?)
}

pub async fn sign_out(config: &SupabaseConfig, access_token: &str) -> Result<(), FetchError> {
    let url = auth_url(config, "logout")?;
    send("POST", &url, config, Some(access_token), None).await?;
    Ok(())
}

/// Google sign-in page that sends the browser back to `redirect_to`.
pub fn authorize_url(
    config: &SupabaseConfig,
    redirect_to: &str,
    encode: impl Fn(&str) -> String,
) -> Result<String, FetchError> {
    let base = auth_url(config, "authorize")?;
    Ok(format!("{base}?provider=google&redirect_to={}", encode(redirect_to)))
}

#[cfg(test)]
mod tests {
    use poi_core::FilterSelection;

    use super::*;

    fn config() -> SupabaseConfig {
        SupabaseConfig {
            url: Some("https://demo.supabase.co/".to_string()),
            anon_key: Some("anon".to_string()),
            table: "enriched_pois".to_string(),
        }
    }

    fn spaces(value: &str) -> String {
        value.replace(' ', "%20")
    }

    #[test]
    fn test_rest_url_appends_filter_pairs() {
        let selection = FilterSelection {
            city: vec!["San Antonio".to_string()],
            tags: vec!["park".to_string()],
            ..FilterSelection::default()
        };
        let url = rest_url(
            &config(),
            "*",
            &FilterQuery::from_selection(&selection),
            spaces,
        )
        .expect("configured");

        assert_eq!(
            url,
            "https://demo.supabase.co/rest/v1/enriched_pois?select=*&tags=cs.{park}&city=eq.San%20Antonio"
        );
    }

    #[test]
    fn test_missing_url_is_reported() {
        let config = SupabaseConfig::default();
        let err = rest_url(&config, "*", &FilterQuery::unfiltered(), spaces)
            .expect_err("no url");
        assert_eq!(err, FetchError::NotConfigured("POI_SUPABASE_URL"));
    }

    #[test]
    fn test_error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"code":"42P01","message":"relation does not exist"}"#),
            "relation does not exist"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_authorize_url_carries_redirect() {
        let url = authorize_url(&config(), "https://app.example/map", |value| {
            value.replace(':', "%3A").replace('/', "%2F")
        })
        .expect("configured");
        assert_eq!(
            url,
            "https://demo.supabase.co/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fapp.example%2Fmap"
        );
    }
}
