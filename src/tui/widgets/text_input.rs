use crate::tui::layout;
use eyre::Result;
use ratatui::{
    layout::{
        Constraint,
        Rect,
    },
    style::Style,
    widgets::{
        Block,
        Borders,
        Clear,
    },
    Frame,
};
use tui_textarea::TextArea;

/// A single line editor rendered as a centered popup. The current value
/// starts selected, so typing replaces it outright.
#[derive(Debug)]
pub(crate) struct TextInput {
    editor: TextArea<'static>,
}

impl TextInput {
    pub(crate) fn new(title: &'static str, placeholder: &'static str, content: impl ToString) -> Self {
        let mut editor = TextArea::new([content.to_string()].to_vec());
        editor.set_cursor_line_style(Style::default());
        editor.set_placeholder_text(placeholder);
        editor.set_block(Block::default().borders(Borders::ALL).title(title));
        editor.select_all();
        Self { editor }
    }

    pub(crate) fn draw(&mut self, frame: &mut Frame<'_>, _area: Rect) -> Result<()> {
        let area = layout::center(
            frame.area(),
            Constraint::Max(60),
            Constraint::Length(3), // top and bottom border + content
        );
        frame.render_widget(Clear, area);
        frame.render_widget(&self.editor, area);
        Ok(())
    }

    pub(crate) fn handle_key_event(&mut self, key: crossterm::event::KeyEvent) -> bool {
        self.editor.input(key)
    }

    /// Consumes the editor. Fields are single line, so only the first
    /// line survives.
    pub(crate) fn finish(self) -> String {
        self.editor.into_lines().into_iter().next().unwrap_or_default()
    }
}
