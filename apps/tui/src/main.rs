use clap::Parser;
use color_eyre::Result;
use poi_tracker::app::actions::open_source;
use poi_tracker::cli::CliArgs;
use poi_tracker::config::{init_app_config, init_logging};
use poi_tracker::{event, terminal, App};

#[tokio::main]
async fn main() -> Result<()> {
    // Setup error handling
    color_eyre::install()?;

    let args = CliArgs::parse();
    args.apply_env_overrides();

    let settings = init_app_config();
    init_logging(&settings.log_file, settings.debug);
    // Bad values were replaced by defaults; log them and any missing
    // endpoint settings. Remote calls report the latter again.
    settings.app.validate();

    // Check if we're running in a terminal
    if args.headless || args.export_snapshot.is_some() || !is_terminal() {
        return event::run_headless(&settings, &args).await;
    }

    let source = open_source(&settings).await?;
    let mut app = App::new(settings, source);

    let mut terminal = terminal::setup()?;
    let result = event::run(&mut terminal, &mut app).await;
    terminal::restore();

    result
}

// Check if we're running in a terminal
fn is_terminal() -> bool {
    atty::is(atty::Stream::Stdout)
}
