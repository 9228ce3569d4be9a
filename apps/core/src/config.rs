use thiserror::Error;

use crate::domain::LatLng;

pub const DEFAULT_TABLE: &str = "enriched_pois";
pub const DEFAULT_CENTER: LatLng = LatLng::new(39.0, -98.0);
pub const DEFAULT_ZOOM: u8 = 4;
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_TILE_ATTRIBUTION: &str = "© OpenStreetMap contributors";
pub const DEFAULT_LIST_WIDTH: u16 = 48;
pub const DEFAULT_NARROW_BREAKPOINT: u16 = 100;
pub const DEFAULT_REDIRECT_PORT: u16 = 54321;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be `lat,lng`, got `{value}`")]
    InvalidCenter { key: &'static str, value: String },
    #[error("{key} must be a number, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub table: String,
}

impl SupabaseConfig {
    pub fn rest_url(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(|url| format!("{}/rest/v1/{}", url.trim_end_matches('/'), self.table))
    }

    pub fn auth_url(&self) -> Option<String> {
        self.url
            .as_deref()
            .map(|url| format!("{}/auth/v1", url.trim_end_matches('/')))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayer {
    pub url: String,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub center: LatLng,
    pub zoom: u8,
    pub tiles: TileLayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiConfig {
    /// Width of the list pane in columns when side by side.
    pub list_width: u16,
    /// Below this many columns the list stacks under the map.
    pub narrow_breakpoint: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub supabase: SupabaseConfig,
    pub map: MapConfig,
    pub ui: UiConfig,
    pub redirect_port: u16,
    /// Values that did not parse; their fields kept the defaults.
    pub invalid: Vec<ConfigError>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase: SupabaseConfig {
                url: None,
                anon_key: None,
                table: DEFAULT_TABLE.to_string(),
            },
            map: MapConfig {
                center: DEFAULT_CENTER,
                zoom: DEFAULT_ZOOM,
                tiles: TileLayer {
                    url: DEFAULT_TILE_URL.to_string(),
                    attribution: DEFAULT_TILE_ATTRIBUTION.to_string(),
                },
            },
            ui: UiConfig {
                list_width: DEFAULT_LIST_WIDTH,
                narrow_breakpoint: DEFAULT_NARROW_BREAKPOINT,
            },
            redirect_port: DEFAULT_REDIRECT_PORT,
            invalid: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Build from a key lookup (process environment, build-time env).
    /// Blank values count as unset. A value that does not parse leaves its
    /// field at the default and is recorded in `invalid`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();
        let mut invalid = Vec::new();

        config.supabase.url = get("POI_SUPABASE_URL").or_else(|| get("VITE_SUPABASE_URL"));
        config.supabase.anon_key =
            get("POI_SUPABASE_ANON_KEY").or_else(|| get("VITE_SUPABASE_ANON_KEY"));
        if let Some(table) = get("POI_TABLE") {
            config.supabase.table = table;
        }
        if let Some(url) = get("POI_TILE_URL") {
            config.map.tiles.url = url;
        }
        if let Some(attribution) = get("POI_TILE_ATTRIBUTION") {
            config.map.tiles.attribution = attribution;
        }

        if let Some(center) = get("POI_MAP_CENTER") {
            match parse_center("POI_MAP_CENTER", &center) {
                Ok(center) => config.map.center = center,
                Err(e) => invalid.push(e),
            }
        }
        if let Some(zoom) = get("POI_MAP_ZOOM") {
            keep_number("POI_MAP_ZOOM", &zoom, &mut config.map.zoom, &mut invalid);
        }
        if let Some(width) = get("POI_LIST_WIDTH") {
            keep_number("POI_LIST_WIDTH", &width, &mut config.ui.list_width, &mut invalid);
        }
        if let Some(breakpoint) = get("POI_NARROW_BREAKPOINT") {
            keep_number(
                "POI_NARROW_BREAKPOINT",
                &breakpoint,
                &mut config.ui.narrow_breakpoint,
                &mut invalid,
            );
        }
        if let Some(port) = get("POI_AUTH_REDIRECT_PORT") {
            keep_number(
                "POI_AUTH_REDIRECT_PORT",
                &port,
                &mut config.redirect_port,
                &mut invalid,
            );
        }

        config.invalid = invalid;
        config
    }

    /// Names of required settings that are not set.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.supabase.url.is_none() {
            missing.push("POI_SUPABASE_URL");
        }
        if self.supabase.anon_key.is_none() {
            missing.push("POI_SUPABASE_ANON_KEY");
        }
        missing
    }

    /// Log every missing required setting and every value that fell back
    /// to its default. Never fails: the UI starts and remote calls report
    /// their own errors.
    pub fn validate(&self) -> bool {
        let missing = self.missing_settings();
        for key in &missing {
            tracing::error!(setting = key, "missing required configuration");
        }
        for error in &self.invalid {
            tracing::warn!(%error, "ignoring invalid configuration value, using the default");
        }
        missing.is_empty() && self.invalid.is_empty()
    }
}

fn parse_center(key: &'static str, value: &str) -> Result<LatLng, ConfigError> {
    let invalid = || ConfigError::InvalidCenter {
        key,
        value: value.to_string(),
    };
    let (lat, lng) = value.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok(LatLng::new(lat, lng))
}

fn keep_number<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
    field: &mut T,
    invalid: &mut Vec<ConfigError>,
) {
    match parse_number(key, value) {
        Ok(parsed) => *field = parsed,
        Err(e) => invalid.push(e),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(|_| None);

        assert_eq!(config.map.center, DEFAULT_CENTER);
        assert_eq!(config.map.zoom, 4);
        assert_eq!(config.supabase.table, "enriched_pois");
        assert_eq!(
            config.missing_settings(),
            vec!["POI_SUPABASE_URL", "POI_SUPABASE_ANON_KEY"]
        );
        assert!(!config.validate());
        assert!(config.supabase.rest_url().is_none());
    }

    #[test]
    fn test_vite_names_are_fallbacks() {
        let config = AppConfig::from_lookup(lookup(&[
            ("VITE_SUPABASE_URL", "https://vite.supabase.co"),
            ("POI_SUPABASE_URL", "https://poi.supabase.co/"),
            ("VITE_SUPABASE_ANON_KEY", "anon"),
            ("POI_SUPABASE_ANON_KEY", "  "),
        ]));

        assert_eq!(
            config.supabase.rest_url().as_deref(),
            Some("https://poi.supabase.co/rest/v1/enriched_pois")
        );
        assert_eq!(
            config.supabase.auth_url().as_deref(),
            Some("https://poi.supabase.co/auth/v1")
        );
        assert_eq!(config.supabase.anon_key.as_deref(), Some("anon"));
        assert!(config.missing_settings().is_empty());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("POI_MAP_CENTER", "30.27, -97.74"),
            ("POI_MAP_ZOOM", "12"),
            ("POI_LIST_WIDTH", "60"),
            ("POI_AUTH_REDIRECT_PORT", "8765"),
        ]));
        assert_eq!(config.map.center, LatLng::new(30.27, -97.74));
        assert_eq!(config.map.zoom, 12);
        assert_eq!(config.ui.list_width, 60);
        assert_eq!(config.redirect_port, 8765);
        assert!(config.invalid.is_empty());
    }

    #[test]
    fn test_bad_zoom_keeps_default_zoom() {
        let config = AppConfig::from_lookup(lookup(&[
            ("POI_SUPABASE_URL", "https://poi.supabase.co"),
            ("POI_SUPABASE_ANON_KEY", "anon"),
            ("POI_MAP_ZOOM", "far"),
            ("POI_LIST_WIDTH", "60"),
        ]));

        assert_eq!(config.map.zoom, DEFAULT_ZOOM);
        assert_eq!(config.ui.list_width, 60);
        assert_eq!(
            config.invalid,
            vec![ConfigError::InvalidNumber {
                key: "POI_MAP_ZOOM",
                value: "far".to_string()
            }]
        );
        assert!(config.missing_settings().is_empty());
        assert!(!config.validate());
    }

    #[test]
    fn test_bad_center_keeps_default_center() {
        let config = AppConfig::from_lookup(lookup(&[
            ("POI_MAP_CENTER", "north"),
            ("POI_MAP_ZOOM", "9"),
        ]));

        assert_eq!(config.map.center, DEFAULT_CENTER);
        assert_eq!(config.map.zoom, 9);
        assert!(matches!(
            config.invalid.as_slice(),
            [ConfigError::InvalidCenter { key: "POI_MAP_CENTER", .. }]
        ));
    }
}
