use clap::{CommandFactory, Parser};
use poi_core::{Facet, FilterSelection};

#[derive(Debug, Default, Parser)]
#[command(name = "poi-tracker", version, about = "Browse and filter points of interest on a map")]
pub struct CliArgs {
    /// Print facet domains and matching POIs, then exit
    #[arg(long)]
    pub headless: bool,

    /// Print headless output as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Only print the encoded filter query
    #[arg(long = "query-only")]
    pub query_only: bool,

    /// Require a tag (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Filter by city (repeatable)
    #[arg(long = "city", value_name = "CITY")]
    pub cities: Vec<String>,

    /// Filter by state (repeatable)
    #[arg(long = "state", value_name = "STATE")]
    pub states: Vec<String>,

    /// Filter by subregion (repeatable)
    #[arg(long = "subregion", value_name = "SUBREGION")]
    pub subregions: Vec<String>,

    /// Filter by region (repeatable)
    #[arg(long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Read POIs from a local snapshot instead of the hosted table
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<String>,

    /// Copy the hosted table into a snapshot file (requires sign-in)
    #[arg(long = "export-snapshot", value_name = "PATH")]
    pub export_snapshot: Option<String>,

    /// Override the log file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<String>,
}

impl CliArgs {
    pub fn apply_env_overrides(&self) {
        if let Some(path) = &self.snapshot {
            std::env::set_var("POI_SNAPSHOT", path);
        }
        if let Some(path) = &self.log_file {
            std::env::set_var("POI_LOG_FILE", path);
        }
        if self.debug {
            std::env::set_var("DEBUG", "1");
        }
    }

    /// Facet values given on the command line, as typed.
    pub fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::default();
        for facet in Facet::ALL {
            let values = match facet {
                Facet::Tags => &self.tags,
                Facet::City => &self.cities,
                Facet::State => &self.states,
                Facet::Subregion => &self.subregions,
                Facet::Region => &self.regions,
            };
            selection.values_mut(facet).clone_from(values);
        }
        selection
    }

    pub fn help_text() -> String {
        let mut command = Self::command();
        let mut buffer = Vec::new();
        command.write_help(&mut buffer).ok();
        String::from_utf8_lossy(&buffer).to_string()
    }
}
