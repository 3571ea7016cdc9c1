#[macro_use]
extern crate tracing;

pub mod config;
pub mod errors;
pub mod logging;
pub mod tui;

pub use config::Args;
pub use tui::App;
