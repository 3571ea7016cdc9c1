use eyre::{
    bail,
    Result,
};
use ratatui::{
    layout::{
        Constraint,
        Direction,
        Flex,
        Layout,
    },
    prelude::Rect,
};

/// Split the screen: nav header, main content, and the status line.
pub(crate) fn header_main_and_footer_areas(area: Rect) -> Result<[Rect; 3]> {
    let constraints = vec![
        Constraint::Max(2),    // Header
        Constraint::Min(0),    // Main area
        Constraint::Length(1), // Status line
    ];

    let [header_area, main_area, footer_area] = *Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area)
    else {
        bail!("Failed to split the area");
    };

    Ok([header_area, main_area, footer_area])
}

/// Centers a [`Rect`] within another [`Rect`] using the provided [`Constraint`]s.
///
/// # Examples
///
/// ```rust
/// # use fleetmon::tui::layout::center;
/// use ratatui::layout::{Constraint, Rect};
///
/// let area = Rect::new(0, 0, 100, 100);
/// let horizontal = Constraint::Percentage(20);
/// let vertical = Constraint::Percentage(30);
///
/// let centered = center(area, horizontal, vertical);
/// ```
pub fn center(area: Rect, horizontal: Constraint, vertical: Constraint) -> Rect {
    let [area] = Layout::horizontal([horizontal]).flex(Flex::Center).areas(area);
    let [area] = Layout::vertical([vertical]).flex(Flex::Center).areas(area);
    area
}
