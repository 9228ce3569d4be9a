// App module for poi-tracker
// Holds the coordinator state and routes key input and background events

pub mod actions;
pub mod input;
pub mod state;

pub use input::handle_input;
pub use state::{Alert, App, AppEvent, AppScreen, Focus};
