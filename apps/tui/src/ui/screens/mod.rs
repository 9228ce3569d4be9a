pub mod details;
pub mod filters;
pub mod main;
