mod setup;

pub use setup::{restore, setup, PoiTerminal};
