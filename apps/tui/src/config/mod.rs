pub mod loader;
pub mod logging;

pub use loader::{init_app_config, Settings};
pub use logging::init_logging;
