use crate::{
    config::Config,
    tui::{
        keybindings::{
            KeyBindings,
            Keymap,
        },
        layout::header_main_and_footer_areas,
        Action,
        ActivateAction,
        Component,
        FocusedView,
        Theme,
    },
};
use chrono::TimeDelta;
use color_eyre::Result;
use crossterm::event::KeyCode;
use eyre::{
    bail,
    OptionExt as _,
};
use fleetmon_stats::{
    DashboardSettings,
    FleetStore,
    MergedView,
    ServerId,
};
use ratatui::{
    layout::{
        Constraint,
        Direction,
        Layout,
        Rect,
    },
    style::{
        Color,
        Style,
    },
    text::{
        Line,
        Span,
    },
    widgets::{
        Block,
        Borders,
        Cell,
        Gauge,
        Paragraph,
        Row,
        Table,
        TableState,
    },
    Frame,
};
use strum::Display;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
pub(crate) enum DashboardAction {
    MoveUp,
    MoveDown,
}

/// The landing screen: the resolved per-server stats table, the connect
/// banner, and a capacity gauge for the selected server.
#[derive(Debug)]
pub struct Dashboard {
    focused: bool,
    visible: bool,
    command_tx: Option<UnboundedSender<Action>>,
    store: FleetStore,
    view: MergedView,
    settings: DashboardSettings,
    selected: Option<ServerId>,
    table_state: TableState,
    keymap: Keymap,
}

impl Dashboard {
    pub(crate) fn new(store: FleetStore) -> Self {
        Self {
            focused: true,
            visible: true,
            command_tx: None,
            store,
            view: MergedView::default(),
            settings: DashboardSettings::default(),
            selected: None,
            table_state: TableState::default(),
            keymap: Keymap::default(),
        }
    }

    /// Re-reads everything this screen shows from the store and reports the
    /// fleet totals for the status bar.
    fn refresh(&mut self) {
        self.view = self.store.merged_view();
        self.settings = self.store.settings();
        if let Some(id) = self.selected {
            if self.view.get(&id).is_none() {
                self.selected = self.view.entries.first().map(|entry| entry.server.id);
            }
        }
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(Action::FleetSummaryChanged {
                servers: self.view.len(),
                online: self.view.online(),
                players: self.view.players(),
            });
        }
    }

    fn ids(&self) -> Vec<ServerId> {
        self.view.iter().map(|entry| entry.server.id).collect()
    }

    fn move_up(&mut self) {
        let ids = self.ids();
        if let Some(id) = &self.selected {
            let index = ids.iter().position(|x| x == id);
            if let Some(index) = index {
                if index > 0 {
                    self.selected = ids.get(index - 1).copied();
                }
            }
        }
    }

    fn move_down(&mut self) {
        let ids = self.ids();
        if let Some(id) = &self.selected {
            let index = ids.iter().position(|x| x == id);
            if let Some(index) = index {
                if index < ids.len() - 1 {
                    self.selected = ids.get(index + 1).copied();
                }
            }
        } else {
            self.selected = ids.first().copied();
        }
    }
}

impl Component for Dashboard {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn register_action_handler(&mut self, tx: UnboundedSender<Action>) -> Result<()> {
        self.command_tx = Some(tx);
        Ok(())
    }

    fn register_config_handler(&mut self, _config: Config, keybindings: KeyBindings) -> Result<()> {
        self.keymap = keybindings
            .get(&FocusedView::Dashboard)
            .cloned()
            .ok_or_eyre("No keymap found for Dashboard")?;
        Ok(())
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Activate(ActivateAction::Dashboard) => {
                self.focused = true;
                self.visible = true;
                if self.selected.is_none() {
                    self.selected = self.view.entries.first().map(|entry| entry.server.id);
                }
                return Ok(Some(Action::UpdateGlobalKeybindings(self.keymap.clone())));
            }
            Action::Activate(_) => {
                self.focused = false;
                self.visible = false;
            }
            Action::FleetChanged => self.refresh(),
            Action::DashboardAction(inner) => match inner {
                DashboardAction::MoveUp => self.move_up(),
                DashboardAction::MoveDown => self.move_down(),
            },
            _ => {}
        }
        Ok(None)
    }

    fn handle_key_event(&mut self, key: crossterm::event::KeyEvent) -> Result<Option<Action>> {
        let action = match (key.code, &self.selected) {
            (KeyCode::Char('r'), Some(selected)) => Some(Action::RefreshServer(*selected)),
            (KeyCode::Char('f'), _) => Some(Action::RefreshAll),

            // navigation
            (KeyCode::Up, _) => Some(Action::DashboardAction(DashboardAction::MoveUp)),
            (KeyCode::Down, _) => Some(Action::DashboardAction(DashboardAction::MoveDown)),

            _ => None,
        };

        Ok(action)
    }

    fn draw(&mut self, frame: &mut Frame<'_>, area: Rect) -> Result<()> {
        let theme = Theme::default();
        let [_header_area, area, _footer_area] = header_main_and_footer_areas(area)?;
        let [banner_area, table_area, detail_area] = *Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0), Constraint::Length(4)])
            .split(area)
        else {
            bail!("Failed to split the dashboard");
        };

        let connect = if self.settings.connect_info.is_empty() {
            Span::styled("<not set>", theme.text_dimmed)
        } else {
            Span::styled(self.settings.connect_info.clone(), theme.text_default)
        };
        let banner = vec![
            Line::from(vec![Span::styled("Connect: ", theme.text_dimmed), connect]),
            Line::from(vec![
                Span::styled("MOTD: ", theme.text_dimmed),
                Span::raw(self.settings.motd.clone()),
            ]),
        ];
        frame.render_widget(Paragraph::new(banner), banner_area);

        if self.view.is_empty() {
            let empty = Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border(self.focused))
                .title("No active servers");

            frame.render_widget(empty, table_area);
            return Ok(());
        }

        let help = if self.selected.is_some() {
            " <r>efresh selected, <f>etch all "
        } else {
            " <f>etch all "
        };

        let header_names = [
            "Name", "Status", "Players", "Queue", "Ping", "Uptime", "Load", "Source", "Updated",
        ];
        let header_cells = header_names
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::White)));
        let header = Row::new(header_cells)
            .style(Style::default().bg(Color::DarkGray).fg(Color::White))
            .height(1)
            .bottom_margin(0);

        let now = chrono::Utc::now();
        let rows: Vec<Row> = self
            .view
            .iter()
            .map(|entry| {
                let status = entry.status();
                let players = format!("{}/{}", entry.stats.players_online, entry.stats.max_players);
                let ping = if entry.stats.online {
                    Cell::from(format!("{} ms", entry.stats.ping_ms)).style(theme.ping(entry.stats.ping_ms))
                } else {
                    Cell::from("--")
                };
                let load = match entry.capacity() {
                    Some(ratio) => format!("{:.0}%", ratio * 100.0),
                    None => "--".to_string(),
                };
                let updated = match entry.age(now) {
                    Some(age) => format_age(age),
                    None => "never".to_string(),
                };
                let cells = vec![
                    Cell::from(entry.server.name.clone()),
                    Cell::from(status.as_str()).style(theme.status(status)),
                    Cell::from(players),
                    Cell::from(entry.stats.queue_count.to_string()),
                    ping,
                    Cell::from(format!("{:.1}%", entry.stats.uptime_percent)),
                    Cell::from(load),
                    Cell::from(entry.origin.as_str()),
                    Cell::from(updated),
                ];
                let style = if Some(entry.server.id) == self.selected {
                    theme.text_selected
                } else {
                    theme.text_default
                };
                Row::new(cells).style(style).height(1)
            })
            .collect();

        let widths = [
            Constraint::Percentage(18), // Name
            Constraint::Percentage(9),  // Status
            Constraint::Percentage(9),  // Players
            Constraint::Percentage(7),  // Queue
            Constraint::Percentage(9),  // Ping
            Constraint::Percentage(9),  // Uptime
            Constraint::Percentage(7),  // Load
            Constraint::Percentage(10), // Source
            Constraint::Percentage(22), // Updated
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.border(self.focused))
                    .title("Fleet")
                    .title_bottom(Line::from(help).centered()),
            )
            .column_spacing(1);

        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        if let Some(entry) = self.selected.as_ref().and_then(|id| self.view.get(id)) {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border(self.focused))
                .title(format!(" {} ", entry.server.name));
            let inner = block.inner(detail_area);
            frame.render_widget(block, detail_area);

            let [gauge_area, info_area] = *Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Length(1)])
                .split(inner)
            else {
                bail!("Failed to split the detail panel");
            };

            // Gauge::ratio panics outside 0..=1, and capacity may exceed 1
            // when a queue overflows into the player count.
            let ratio = entry.capacity().unwrap_or(0.0).clamp(0.0, 1.0);
            let label = match entry.capacity() {
                Some(capacity) => format!(
                    "{}/{} ({:.0}%)",
                    entry.stats.players_online,
                    entry.stats.max_players,
                    capacity * 100.0
                ),
                None => "unknown".to_string(),
            };
            let gauge = Gauge::default()
                .gauge_style(theme.capacity(ratio))
                .ratio(ratio)
                .label(label);
            frame.render_widget(gauge, gauge_area);

            let info = format!(
                "source {} | updated {} | queue {}",
                entry.origin.as_str(),
                entry
                    .age(now)
                    .map(format_age)
                    .unwrap_or_else(|| "never".to_string()),
                entry.stats.queue_count,
            );
            frame.render_widget(Paragraph::new(info).style(theme.text_dimmed), info_area);
        }

        Ok(())
    }
}

// Helper function to format reading age
fn format_age(value: TimeDelta) -> String {
    let seconds = value.as_seconds_f32().round() as i32;
    if seconds < 60 {
        format!("{}s ago", seconds)
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else {
        format!("{}h ago", seconds / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmon_stats::ServerRecord;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn dashboard_with_servers(names: &[&str]) -> (TempDir, Dashboard) {
        let dir = TempDir::new().unwrap();
        let store = FleetStore::open(dir.path()).unwrap();
        for (index, name) in names.iter().enumerate() {
            store
                .add_server(ServerRecord::new(*name, "play.example.gg", 30120 + index as u16))
                .unwrap();
        }
        let mut dashboard = Dashboard::new(store);
        dashboard.refresh();
        (dir, dashboard)
    }

    #[test]
    fn selection_moves_through_the_fleet_and_stops_at_the_edges() {
        let (_dir, mut dashboard) = dashboard_with_servers(&["alpha", "beta"]);
        assert_eq!(dashboard.selected, None);

        dashboard.move_down();
        let first = dashboard.selected.unwrap();
        dashboard.move_down();
        let second = dashboard.selected.unwrap();
        assert_ne!(first, second);

        dashboard.move_down();
        assert_eq!(dashboard.selected, Some(second));

        dashboard.move_up();
        assert_eq!(dashboard.selected, Some(first));
        dashboard.move_up();
        assert_eq!(dashboard.selected, Some(first));
    }

    #[test]
    fn removed_servers_lose_their_selection_on_refresh() {
        let (_dir, mut dashboard) = dashboard_with_servers(&["alpha", "beta"]);
        dashboard.move_down();
        dashboard.move_down();
        let removed = dashboard.selected.unwrap();

        dashboard.store.remove_server(&removed).unwrap();
        dashboard.refresh();

        assert_ne!(dashboard.selected, Some(removed));
        assert!(dashboard.selected.is_some());
    }
}
