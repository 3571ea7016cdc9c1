#[allow(clippy::module_inception)]
mod component;
pub mod dashboard;
pub mod logs;
pub mod nav_tabs;
pub mod servers;
pub mod status_bar;

pub use component::Component;
