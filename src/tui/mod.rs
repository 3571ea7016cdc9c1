mod action;
mod app;
mod components;
mod keybindings;
pub mod layout;
mod theme;
#[allow(clippy::module_inception)]
mod tui;
mod widgets;

pub(crate) use action::Action;
use action::ActivateAction;
pub use app::App;
pub(crate) use app::FocusedView;
use components::Component;
use theme::Theme;
use tui::Event;
pub use tui::Tui;
