use crate::tui::{
    layout,
    Action,
    ActivateAction,
    Component,
};
use eyre::{
    bail,
    Result,
};
use ratatui::{
    layout::{
        Constraint,
        Direction,
        Layout,
    },
    style::{
        Color,
        Modifier,
        Style,
    },
    widgets::Tabs,
};

#[derive(Debug, Default)]
pub struct NavTabs {
    screen: Screen,
}

#[derive(Debug, Default)]
enum Screen {
    #[default]
    Dashboard,
    Servers,
    Logs,
}

impl Component for NavTabs {
    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Activate(ActivateAction::Dashboard) => {
                self.screen = Screen::Dashboard;
            }
            Action::Activate(ActivateAction::Servers) => {
                self.screen = Screen::Servers;
            }
            Action::Activate(ActivateAction::Logs) => {
                self.screen = Screen::Logs;
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut ratatui::Frame, area: ratatui::prelude::Rect) -> Result<()> {
        let [header_area, _main_area, _footer_area] = layout::header_main_and_footer_areas(area)?;
        let [header_area] = *Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Max(2)])
            .split(header_area)
        else {
            bail!("Failed to split the area");
        };

        let tab_titles = vec!["Dashboard [1]", "Servers [2]", "Logs [3]"];

        let selected_tab = match self.screen {
            Screen::Dashboard => 0,
            Screen::Servers => 1,
            Screen::Logs => 2,
        };

        let tabs = Tabs::new(tab_titles)
            .select(selected_tab)
            .style(Style::default().fg(Color::Gray))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .block(ratatui::widgets::Block::new().borders(ratatui::widgets::Borders::BOTTOM))
            .divider(" | ");

        frame.render_widget(tabs, header_area);

        Ok(())
    }
}
