use crate::tui::theme::Theme;
use ratatui::{
    prelude::*,
    widgets::*,
};

/// A one line form row: a fixed width label followed by its value. The
/// label stays dimmed, the value carries the selection highlight, and a
/// blank value renders as an `<empty>` marker.
pub(crate) fn label_and_text<'a>(
    label: impl ToString,
    content: impl ToString,
    label_width: usize,
    selected: bool,
    theme: &Theme,
) -> Paragraph<'a> {
    let label = format!("{:width$}", label.to_string(), width = label_width);
    let content = content.to_string();

    let style = if selected {
        theme.text_selected
    } else if content.is_empty() {
        theme.text_dimmed
    } else {
        theme.text_default
    };
    let value = if content.is_empty() {
        "<empty>".to_string()
    } else {
        content
    };

    Paragraph::new(Line::from(
        [Span::styled(label, theme.text_dimmed), Span::styled(value, style)].to_vec(),
    ))
}

pub(crate) fn label_and_bool<'a>(
    label: impl ToString,
    content: bool,
    label_width: usize,
    selected: bool,
    theme: &Theme,
) -> Paragraph<'a> {
    let content = if content { "[x]" } else { "[ ]" };
    label_and_text(label, content, label_width, selected, theme)
}
