// Export our modules for use in the binary and tests
pub mod app;
pub mod cli;
pub mod config;
pub mod event;
pub mod remote;
pub mod source;
pub mod store;
pub mod terminal;
pub mod ui;

pub use app::App;
pub use source::{PoiSource, SourceError};
