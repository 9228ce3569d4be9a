use std::path::Path;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use poi_core::filters::{FilterQuery, FilterState};
use poi_core::session::{AuthNotifier, SessionManager};
use poi_core::{Facet, FilterSelection, Poi};
use serde::Serialize;

use crate::app::actions::{auth_client, export_snapshot, open_source};
use crate::cli::CliArgs;
use crate::config::Settings;
use crate::remote::RestClient;
use crate::source::PoiSource;

const EXPORT_SIGN_IN_MESSAGE: &str =
    "Sign in from the terminal UI (press `l`) before exporting a snapshot.";

/// Auth messages go to stderr when there is no UI.
struct StderrNotifier;

impl AuthNotifier for StderrNotifier {
    fn show_auth_error(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

#[derive(Debug, Serialize)]
struct HeadlessReport {
    source: String,
    filters: String,
    /// Requested values that no POI carries. They still narrow the query.
    unknown: Vec<String>,
    domains: Vec<(String, Vec<String>)>,
    count: usize,
    pois: Vec<Poi>,
}

/// Run without the terminal UI: print domains and matching POIs, or export
/// a snapshot.
pub async fn run_headless(settings: &Settings, args: &CliArgs) -> Result<()> {
    if let Some(path) = &args.export_snapshot {
        return export(settings, Path::new(path)).await;
    }

    let source = open_source(settings).await?;
    let session = auth_client(settings).restore_session().await;
    let token = session.as_ref().map(|session| session.access_token.as_str());

    let Resolved {
        filters,
        query,
        unknown,
    } = resolve_selection(source.as_ref(), &args.selection(), token).await;
    for value in &unknown {
        tracing::warn!(value = %value, "filter value not present in the data");
        eprintln!("Warning: no POI has {value}");
    }

    if args.query_only {
        println!("{query}");
        return Ok(());
    }

    let pois = source
        .fetch_pois(&query, token)
        .await
        .wrap_err("Failed to load POIs. Please check your connection.")?;

    let report = HeadlessReport {
        source: source.describe(),
        filters: query.to_string(),
        unknown,
        domains: Facet::ALL
            .iter()
            .map(|facet| {
                (
                    facet.as_str().to_string(),
                    filters
                        .domains()
                        .values(*facet)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                )
            })
            .collect(),
        count: pois.len(),
        pois,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

struct Resolved {
    filters: FilterState,
    query: FilterQuery,
    /// Requested values outside the loaded domains, as `facet=value`.
    unknown: Vec<String>,
}

/// Load the facet domains and check the requested values into the form,
/// the same way the filter screen does. When any value cannot be checked
/// (unknown value or no domains), the query is built from the request as
/// typed so it never matches more than was asked for.
async fn resolve_selection(
    source: &dyn PoiSource,
    wanted: &FilterSelection,
    access_token: Option<&str>,
) -> Resolved {
    let mut filters = FilterState::new();
    match source.fetch_facet_rows(access_token).await {
        Ok(rows) => filters.apply_rows(&rows),
        Err(e) => {
            tracing::error!(error = %e, "could not load filter options");
            eprintln!("Warning: could not load filter options: {e}");
        }
    }

    let mut unknown = Vec::new();
    for facet in Facet::ALL {
        for value in wanted.values(facet) {
            if !filters.form_mut().control_mut(facet).set_checked(value, true) {
                unknown.push(format!("{facet}={value}"));
            }
        }
    }

    let query = if unknown.is_empty() {
        filters.build_filter_query()
    } else {
        FilterQuery::from_selection(wanted)
    };
    Resolved {
        filters,
        query,
        unknown,
    }
}

fn print_report(report: &HeadlessReport) {
    println!("\nPOI Tracker");
    println!("===========");
    println!("Source: {}", report.source);
    if report.filters.is_empty() {
        println!("Filters: (none)");
    } else {
        println!("Filters: {}", report.filters);
    }

    println!("\nFacet values:");
    for (facet, values) in &report.domains {
        println!("- {facet} ({}): {}", values.len(), values.join(", "));
    }

    println!("\nMatching POIs: {}", report.count);
    if report.pois.is_empty() {
        println!("{}", poi_core::poi::NO_RESULTS_MESSAGE);
    }
    for poi in &report.pois {
        let position = poi.coordinates().map_or_else(
            || "-".to_string(),
            |position| format!("{:.4},{:.4}", position.lat, position.lng),
        );
        println!(
            "- {} | {} | {} | {}",
            poi.display_name(),
            poi.location_line(),
            position,
            poi.tags.join(", ")
        );
    }
}

async fn export(settings: &Settings, path: &Path) -> Result<()> {
    let session = SessionManager::with_session(auth_client(settings).restore_session().await);
    let token = session
        .require_auth(&mut StderrNotifier, Some(EXPORT_SIGN_IN_MESSAGE), || {
            session.access_token().map(str::to_string)
        })
        .flatten()
        .ok_or_else(|| eyre!("snapshot export requires a signed-in session"))?;

    let remote = RestClient::new(&settings.app.supabase);
    let summary = export_snapshot(&remote, &token, path)
        .await
        .wrap_err("Failed to export snapshot")?;
    println!("Exported {} POIs to {}", summary.count, summary.location);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeSource;
    use poi_core::PoiId;

    fn poi(id: i64, city: &str, tags: &[&str]) -> Poi {
        Poi {
            id: PoiId::Int(id),
            name: Some(format!("Place {id}")),
            description: None,
            city: Some(city.to_string()),
            state: Some("TX".to_string()),
            subregion: None,
            region: None,
            lat: Some(30.0),
            lng: Some(-97.0),
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_cli_values_go_through_the_form() {
        let source = FakeSource::new(vec![
            poi(1, "Austin", &["park", "trail"]),
            poi(2, "Houston", &["museum"]),
        ]);
        let wanted = FilterSelection {
            tags: vec!["trail".to_string(), "park".to_string()],
            city: vec!["Austin".to_string()],
            ..FilterSelection::default()
        };

        let resolved = resolve_selection(&source, &wanted, None).await;

        // Tags follow option order, not command-line order.
        assert_eq!(
            resolved.query.to_query_string(),
            "tags=cs.{park,trail}&city=eq.Austin"
        );
        assert!(resolved.unknown.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_value_still_narrows_the_fetch() {
        let source = FakeSource::new(vec![
            poi(1, "Austin", &["park"]),
            poi(2, "Houston", &["museum"]),
        ]);
        let wanted = FilterSelection {
            city: vec!["Atlantis".to_string()],
            ..FilterSelection::default()
        };

        let resolved = resolve_selection(&source, &wanted, None).await;

        assert_eq!(resolved.unknown, vec!["city=Atlantis"]);
        assert_eq!(resolved.query.to_query_string(), "city=eq.Atlantis");
        let pois = source
            .fetch_pois(&resolved.query, None)
            .await
            .expect("fake fetch");
        assert!(pois.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tag_is_not_dropped_from_contains() {
        let source = FakeSource::new(vec![poi(1, "Austin", &["park"])]);
        let wanted = FilterSelection {
            tags: vec!["park".to_string(), "lighthouse".to_string()],
            ..FilterSelection::default()
        };

        let resolved = resolve_selection(&source, &wanted, None).await;

        assert_eq!(resolved.query.to_query_string(), "tags=cs.{park,lighthouse}");
        let pois = source
            .fetch_pois(&resolved.query, None)
            .await
            .expect("fake fetch");
        assert!(pois.is_empty());
    }

    #[tokio::test]
    async fn test_failed_domain_load_keeps_requested_filters() {
        let source = FakeSource::failing("offline");
        let wanted = FilterSelection {
            region: vec!["West".to_string(), "South".to_string()],
            ..FilterSelection::default()
        };

        let resolved = resolve_selection(&source, &wanted, None).await;

        assert!(resolved.filters.domains().is_empty());
        assert_eq!(resolved.unknown, vec!["region=West", "region=South"]);
        assert_eq!(resolved.query.to_query_string(), "region=in.(West,South)");
    }
}
