use crate::{
    config::Config,
    tui::{
        keybindings::KeyBindings,
        Action,
        Event,
    },
};
use color_eyre::Result;
use crossterm::event::{
    KeyEvent,
    MouseEvent,
};
use ratatui::{
    layout::{
        Rect,
        Size,
    },
    Frame,
};
use tokio::sync::mpsc::UnboundedSender;

/// A visual and interactive element of the application.
///
/// Components receive every [`Event`] while focused and every [`Action`]
/// always; they draw themselves while visible.
pub trait Component {
    /// Register an action handler that can send actions for processing if necessary.
    fn register_action_handler(&mut self, tx: UnboundedSender<Action>) -> Result<()> {
        let _ = tx; // to appease clippy
        Ok(())
    }

    /// Register a configuration handler that provides configuration settings if necessary.
    fn register_config_handler(&mut self, config: Config, keybindings: KeyBindings) -> Result<()> {
        let _ = config; // to appease clippy
        let _ = keybindings;
        Ok(())
    }

    /// Initialize the component with a specified area if necessary.
    fn init(&mut self, area: Size) -> Result<()> {
        let _ = area; // to appease clippy
        Ok(())
    }

    fn is_visible(&self) -> bool {
        true
    }

    fn is_focused(&self) -> bool {
        false
    }

    /// Handle incoming events and produce actions if necessary.
    fn handle_events(&mut self, event: Option<Event>) -> Result<Option<Action>> {
        let action = match event {
            Some(Event::Key(key_event)) => self.handle_key_event(key_event)?,
            Some(Event::Mouse(mouse_event)) => self.handle_mouse_event(mouse_event)?,
            _ => None,
        };
        Ok(action)
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let _ = key; // to appease clippy
        Ok(None)
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        let _ = mouse; // to appease clippy
        Ok(None)
    }

    /// Update the state of the component based on a received action.
    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        let _ = action; // to appease clippy
        Ok(None)
    }

    /// Render the component on the screen.
    fn draw(&mut self, frame: &mut Frame<'_>, area: Rect) -> Result<()>;
}
