use crate::{
    config::Config,
    tui::{
        keybindings::{
            KeyBindings,
            Keymap,
        },
        layout::{
            self,
            header_main_and_footer_areas,
        },
        widgets,
        Action,
        ActivateAction,
        Component,
        FocusedView,
        Theme,
    },
};
use color_eyre::Result;
use crossterm::event::KeyCode;
use eyre::OptionExt as _;
use fleetmon_stats::{
    manual_snapshot,
    parse_count,
    parse_percent,
    FleetStore,
    ServerId,
    ServerRecord,
    StatSnapshot,
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
        Modifier,
        Style,
    },
    text::Line,
    widgets::{
        Block,
        Borders,
        Cell,
        Clear,
        Paragraph,
        Row,
        Table,
        TableState,
    },
    Frame,
};
use strum::Display;

const DEFAULT_PORT: u16 = 30120;

#[derive(Debug, Clone, PartialEq, Eq, Display, serde::Serialize, serde::Deserialize)]
pub(crate) enum ServersAction {
    MoveUp,
    MoveDown,
    OpenCreate,
    OpenEdit,
    OpenManualStats,
    OpenGlobalStats,
    OpenSettings,
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-

/// Roster management: add, edit, deactivate, and remove servers, plus the
/// entry forms for manual stats, the global fallback, and connect info.
#[derive(Debug)]
pub struct Servers {
    focused: bool,
    visible: bool,
    store: FleetStore,
    servers: Vec<ServerRecord>,
    selected: Option<ServerId>,
    table_state: TableState,
    keymap: Keymap,
    form: Option<Form>,
}

impl Servers {
    pub(crate) fn new(store: FleetStore) -> Self {
        Self {
            focused: false,
            visible: false,
            store,
            servers: Vec::new(),
            selected: None,
            table_state: TableState::default(),
            keymap: Keymap::default(),
            form: None,
        }
    }

    /// Unlike the dashboard this screen also lists inactive servers, so it
    /// reads the roster directly instead of the merged view.
    fn refresh_roster(&mut self) {
        self.servers = self.store.servers();
        if let Some(id) = self.selected {
            if !self.servers.iter().any(|server| server.id == id) {
                self.selected = self.servers.first().map(|server| server.id);
            }
        }
    }

    fn ids(&self) -> Vec<ServerId> {
        self.servers.iter().map(|server| server.id).collect()
    }

    /// The id to select after the given one disappears.
    fn prev(&self, id: &ServerId) -> Option<ServerId> {
        let ids = self.ids();
        let index = ids.iter().position(|x| x == id)?;
        if index > 0 {
            ids.get(index - 1).copied()
        } else {
            ids.get(1).copied()
        }
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

    fn open_form(&mut self, form: Form) -> Option<Action> {
        self.form = Some(form);
        // An empty keymap routes every key to this component while the form
        // is open; Activate(Servers) on close restores the view keymap.
        Some(Action::UpdateGlobalKeybindings(Keymap::default()))
    }

    fn apply(&mut self, action: ServersAction) -> Result<Option<Action>> {
        match action {
            ServersAction::MoveUp => self.move_up(),
            ServersAction::MoveDown => self.move_down(),
            ServersAction::OpenCreate => return Ok(self.open_form(Form::create_server())),
            ServersAction::OpenEdit => {
                if let Some(record) = self.selected.as_ref().and_then(|id| self.store.server(id)) {
                    return Ok(self.open_form(Form::edit_server(&record)));
                }
            }
            ServersAction::OpenManualStats => {
                if let Some(id) = self.selected {
                    let current = self.store.latest_for(&id).unwrap_or_else(StatSnapshot::fallback);
                    return Ok(self.open_form(Form::manual_stats(id, current)));
                }
            }
            ServersAction::OpenGlobalStats => {
                let current = self.store.global().unwrap_or_else(StatSnapshot::fallback);
                return Ok(self.open_form(Form::global_stats(current)));
            }
            ServersAction::OpenSettings => {
                return Ok(self.open_form(Form::settings(&self.store.settings())));
            }
        }
        Ok(None)
    }

    fn handle_form_key(&mut self, key: crossterm::event::KeyEvent) -> Result<Option<Action>> {
        let Some(form) = self.form.as_mut() else {
            return Ok(None);
        };

        if let Some(mut editor) = form.editing.take() {
            match key.code {
                KeyCode::Enter => {
                    let content = editor.finish();
                    if let Some(field) = form.fields.get_mut(form.cursor) {
                        if let FieldValue::Text(value) = &mut field.value {
                            *value = content;
                        }
                    }
                    return Ok(None);
                }
                KeyCode::Esc => return Ok(None),
                _ => {}
            }
            editor.handle_key_event(key);
            form.editing = Some(editor);
            return Ok(None);
        }

        let cursor = form.cursor;
        let rows = form.fields.len();
        match key.code {
            KeyCode::Esc => {
                self.form = None;
                return Ok(Some(Action::Activate(ActivateAction::Servers)));
            }
            KeyCode::Up => form.cursor = cursor.saturating_sub(1),
            KeyCode::Down => form.cursor = (cursor + 1).min(rows),
            KeyCode::Enter if cursor == rows => return self.submit(),
            KeyCode::Enter => {
                if let Some(field) = form.fields.get_mut(cursor) {
                    match &mut field.value {
                        FieldValue::Text(value) => {
                            form.editing = Some(widgets::TextInput::new(field.label, field.help, value.clone()));
                        }
                        FieldValue::Flag(value) => *value = !*value,
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn submit(&mut self) -> Result<Option<Action>> {
        let Some(form) = self.form.as_ref() else {
            return Ok(None);
        };
        match apply_form(&self.store, form) {
            Ok(()) => {
                self.form = None;
                Ok(Some(Action::Activate(ActivateAction::Servers)))
            }
            Err(message) => {
                if let Some(form) = self.form.as_mut() {
                    form.error = Some(message);
                }
                Ok(None)
            }
        }
    }
}

impl Component for Servers {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn register_config_handler(&mut self, _config: Config, keybindings: KeyBindings) -> Result<()> {
        self.keymap = keybindings
            .get(&FocusedView::Servers)
            .cloned()
            .ok_or_eyre("No keymap found for Servers")?;
        Ok(())
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Activate(ActivateAction::Servers) => {
                self.focused = true;
                self.visible = true;
                self.refresh_roster();
                if self.selected.is_none() {
                    self.selected = self.servers.first().map(|server| server.id);
                }
                return Ok(Some(Action::UpdateGlobalKeybindings(self.keymap.clone())));
            }
            Action::Activate(_) => {
                self.focused = false;
                self.visible = false;
            }
            Action::FleetChanged => self.refresh_roster(),
            Action::ServersAction(inner) => return self.apply(inner),
            _ => {}
        }
        Ok(None)
    }

    fn handle_key_event(&mut self, key: crossterm::event::KeyEvent) -> Result<Option<Action>> {
        if self.form.is_some() {
            return self.handle_form_key(key);
        }

        let action = match (key.code, &self.selected) {
            (KeyCode::Char('a'), _) => Some(Action::ServersAction(ServersAction::OpenCreate)),
            (KeyCode::Char('g'), _) => Some(Action::ServersAction(ServersAction::OpenGlobalStats)),
            (KeyCode::Char('c'), _) => Some(Action::ServersAction(ServersAction::OpenSettings)),
            (KeyCode::Enter, Some(_)) => Some(Action::ServersAction(ServersAction::OpenEdit)),
            (KeyCode::Char('m'), Some(_)) => Some(Action::ServersAction(ServersAction::OpenManualStats)),
            (KeyCode::Char('r'), Some(selected)) => Some(Action::RefreshServer(*selected)),

            (KeyCode::Delete | KeyCode::Backspace, Some(selected)) => {
                let id = *selected;
                let prev = self.prev(&id);
                match self.store.remove_server(&id) {
                    Ok(Some(record)) => info!(server = %record.name, "server removed"),
                    Ok(None) => {}
                    Err(err) => return Ok(Some(Action::Error(err.to_string()))),
                }
                self.selected = prev;
                None
            }

            (KeyCode::Char(' '), Some(selected)) => {
                if let Some(mut record) = self.store.server(selected) {
                    record.active = !record.active;
                    if let Err(err) = self.store.update_server(record) {
                        return Ok(Some(Action::Error(err.to_string())));
                    }
                }
                None
            }

            // navigation
            (KeyCode::Up, _) => Some(Action::ServersAction(ServersAction::MoveUp)),
            (KeyCode::Down, _) => Some(Action::ServersAction(ServersAction::MoveDown)),

            _ => None,
        };

        Ok(action)
    }

    fn draw(&mut self, frame: &mut Frame<'_>, area: Rect) -> Result<()> {
        let theme = Theme::default();
        let [_header_area, area, _footer_area] = header_main_and_footer_areas(area)?;

        let help = if self.form.is_some() {
            " <up>/<down> field, <enter> edit or toggle, <esc> cancel "
        } else if self.selected.is_some() {
            " <a>dd, <enter> edit, <del>ete, <space> toggle, <m>anual stats, <g>lobal stats, <c>onnect info, <r>efresh "
        } else {
            " <a>dd server, <g>lobal stats, <c>onnect info "
        };

        if self.servers.is_empty() {
            let empty = Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border(self.focused))
                .title("No servers")
                .title_bottom(Line::from(help).centered());

            frame.render_widget(empty, area);
        } else {
            let header_names = ["Name", "Endpoint", "Active", "Created"];
            let header_cells = header_names
                .iter()
                .map(|h| Cell::from(*h).style(Style::default().fg(Color::White)));
            let header = Row::new(header_cells)
                .style(Style::default().bg(Color::DarkGray).fg(Color::White))
                .height(1)
                .bottom_margin(0);

            let rows: Vec<Row> = self
                .servers
                .iter()
                .map(|server| {
                    let endpoint = if server.address.is_empty() {
                        "<unset>".to_string()
                    } else {
                        server.endpoint()
                    };
                    let cells = vec![
                        Cell::from(server.name.clone()),
                        Cell::from(endpoint),
                        Cell::from(format_bool(server.active)),
                        Cell::from(server.created_at.format("%Y-%m-%d %H:%M").to_string()),
                    ];
                    let style = if Some(server.id) == self.selected {
                        theme.text_selected
                    } else {
                        theme.text_default
                    };
                    Row::new(cells).style(style).height(1)
                })
                .collect();

            let widths = [
                Constraint::Percentage(40), // Name
                Constraint::Percentage(30), // Endpoint
                Constraint::Percentage(10), // Active
                Constraint::Percentage(20), // Created
            ];
            let table = Table::new(rows, widths)
                .header(header)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(theme.border(self.focused))
                        .title("Servers")
                        .title_bottom(Line::from(help).centered()),
                )
                .column_spacing(1);

            frame.render_stateful_widget(table, area, &mut self.table_state);
        }

        if let Some(form) = &mut self.form {
            form.draw(frame, area, &theme)?;
        }

        Ok(())
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
// Forms

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormKind {
    CreateServer,
    EditServer(ServerId),
    ManualStats(ServerId),
    GlobalStats,
    Settings,
}

#[derive(Debug)]
struct FormField {
    label: &'static str,
    help: &'static str,
    value: FieldValue,
}

#[derive(Debug, Clone)]
enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FormField {
    fn text(label: &'static str, help: &'static str, value: impl ToString) -> Self {
        Self {
            label,
            help,
            value: FieldValue::Text(value.to_string()),
        }
    }

    fn flag(label: &'static str, value: bool) -> Self {
        Self {
            label,
            help: " <enter> to toggle ",
            value: FieldValue::Flag(value),
        }
    }
}

/// A modal form over the roster. The cursor walks the fields top to bottom;
/// one row past the last field is the save row.
#[derive(Debug)]
struct Form {
    kind: FormKind,
    title: &'static str,
    fields: Vec<FormField>,
    cursor: usize,
    error: Option<String>,
    editing: Option<widgets::TextInput>,
}

impl Form {
    fn create_server() -> Self {
        Self::server_form(FormKind::CreateServer, "Add server", "", "", DEFAULT_PORT, true)
    }

    fn edit_server(record: &ServerRecord) -> Self {
        Self::server_form(
            FormKind::EditServer(record.id),
            "Edit server",
            &record.name,
            &record.address,
            record.port,
            record.active,
        )
    }

    fn server_form(kind: FormKind, title: &'static str, name: &str, address: &str, port: u16, active: bool) -> Self {
        Self {
            kind,
            title,
            fields: vec![
                FormField::text("Name:", " Display name, unique within the fleet ", name),
                FormField::text("Address:", " Hostname or IP, empty for manual-only servers ", address),
                FormField::text("Port:", " Game port, usually 30120 ", port),
                FormField::flag("Active:", active),
            ],
            cursor: 0,
            error: None,
            editing: None,
        }
    }

    fn manual_stats(id: ServerId, current: StatSnapshot) -> Self {
        Self::stats_form(FormKind::ManualStats(id), "Manual stats entry", current)
    }

    fn global_stats(current: StatSnapshot) -> Self {
        Self::stats_form(FormKind::GlobalStats, "Global fallback stats", current)
    }

    fn stats_form(kind: FormKind, title: &'static str, current: StatSnapshot) -> Self {
        Self {
            kind,
            title,
            fields: vec![
                FormField::text("Players:", " Players currently on the server ", current.players_online),
                FormField::text("Slots:", " Total player slots ", current.max_players),
                FormField::text("Queue:", " Players waiting to join ", current.queue_count),
                FormField::text("Uptime %:", " Uptime percentage, 0 to 100 ", current.uptime_percent),
                FormField::text("Ping ms:", " Round trip time in milliseconds ", current.ping_ms),
                FormField::flag("Online:", current.online),
            ],
            cursor: 0,
            error: None,
            editing: None,
        }
    }

    fn settings(settings: &fleetmon_stats::DashboardSettings) -> Self {
        Self {
            kind: FormKind::Settings,
            title: "Connect info",
            fields: vec![
                FormField::text("Connect:", " Connect command shown on the dashboard ", &settings.connect_info),
                FormField::text("MOTD:", " Message of the day ", &settings.motd),
            ],
            cursor: 0,
            error: None,
            editing: None,
        }
    }

    fn text(&self, index: usize) -> String {
        match self.fields.get(index).map(|field| &field.value) {
            Some(FieldValue::Text(value)) => value.clone(),
            _ => String::new(),
        }
    }

    fn flag(&self, index: usize) -> bool {
        matches!(self.fields.get(index).map(|field| &field.value), Some(FieldValue::Flag(true)))
    }

    fn selected_help(&self) -> &'static str {
        match self.fields.get(self.cursor) {
            Some(field) => field.help,
            None => " <enter> to save, <esc> to cancel ",
        }
    }

    fn draw(&mut self, frame: &mut Frame<'_>, area: Rect, theme: &Theme) -> Result<()> {
        let height = self.fields.len() as u16 + 4;
        let area = layout::center(area, Constraint::Max(56), Constraint::Length(height));
        frame.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border(true))
            .title(self.title)
            .title_bottom(Line::from(self.selected_help()).centered());
        frame.render_widget(&block, area);
        let inner = block.inner(area);

        let mut constraints = vec![Constraint::Length(1); self.fields.len()];
        constraints.push(Constraint::Length(1)); // save row
        constraints.push(Constraint::Length(1)); // error line
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);

        let label_width = self.fields.iter().map(|field| field.label.len()).max().unwrap_or(0) + 1;

        for (index, field) in self.fields.iter().enumerate() {
            let selected = self.cursor == index;
            let widget = match &field.value {
                FieldValue::Text(value) => widgets::label_and_text(field.label, value, label_width, selected, theme),
                FieldValue::Flag(value) => widgets::label_and_bool(field.label, *value, label_width, selected, theme),
            };
            frame.render_widget(widget, rows[index]);
        }

        let save = Paragraph::new("Save").style(if self.cursor == self.fields.len() {
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        });
        frame.render_widget(save, rows[self.fields.len()]);

        if let Some(error) = &self.error {
            frame.render_widget(
                Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red)),
                rows[self.fields.len() + 1],
            );
        }

        if let Some(editor) = &mut self.editing {
            editor.draw(frame, area)?;
        }

        Ok(())
    }
}

fn apply_form(store: &FleetStore, form: &Form) -> std::result::Result<(), String> {
    match form.kind {
        FormKind::CreateServer => {
            let (name, address, port, active) = server_fields(form)?;
            let mut record = ServerRecord::new(name, address, port);
            record.active = active;
            store.add_server(record).map_err(|err| err.to_string())
        }
        FormKind::EditServer(id) => {
            let (name, address, port, active) = server_fields(form)?;
            let mut record = store.server(&id).ok_or_else(|| "server no longer exists".to_string())?;
            record.name = name;
            record.address = address;
            record.port = port;
            record.active = active;
            store.update_server(record).map_err(|err| err.to_string())
        }
        FormKind::ManualStats(id) => {
            let snapshot = stats_fields(form)?;
            store.record_manual(&id, snapshot).map_err(|err| err.to_string())
        }
        FormKind::GlobalStats => {
            let snapshot = stats_fields(form)?;
            store.set_global(snapshot).map_err(|err| err.to_string())
        }
        FormKind::Settings => {
            let connect_info = form.text(0).trim().to_string();
            let motd = form.text(1).trim().to_string();
            store
                .update_settings(|settings| {
                    settings.connect_info = connect_info;
                    settings.motd = motd;
                })
                .map(|_| ())
                .map_err(|err| err.to_string())
        }
    }
}

fn server_fields(form: &Form) -> std::result::Result<(String, String, u16, bool), String> {
    let name = form.text(0).trim().to_string();
    let address = form.text(1).trim().to_string();
    let port = form
        .text(2)
        .trim()
        .parse::<u16>()
        .map_err(|_| "port must be a number between 0 and 65535".to_string())?;
    Ok((name, address, port, form.flag(3)))
}

fn stats_fields(form: &Form) -> std::result::Result<StatSnapshot, String> {
    let players = parse_count("players", &form.text(0)).map_err(|err| err.to_string())?;
    let slots = parse_count("slots", &form.text(1)).map_err(|err| err.to_string())?;
    let queue = parse_count("queue", &form.text(2)).map_err(|err| err.to_string())?;
    let uptime = parse_percent("uptime", &form.text(3)).map_err(|err| err.to_string())?;
    let ping = parse_count("ping", &form.text(4)).map_err(|err| err.to_string())?;
    manual_snapshot(players, slots, queue, uptime, ping, form.flag(5)).map_err(|err| err.to_string())
}

fn format_bool(value: bool) -> String {
    if value {
        "[x]".to_string()
    } else {
        "[ ]".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn servers_with_store() -> (TempDir, Servers) {
        let dir = TempDir::new().unwrap();
        let store = FleetStore::open(dir.path()).unwrap();
        let servers = Servers::new(store);
        (dir, servers)
    }

    #[test]
    fn the_create_form_adds_a_server_with_the_default_port() {
        let (_dir, mut servers) = servers_with_store();
        let mut form = Form::create_server();
        form.fields[0].value = FieldValue::Text("lobby".to_string());
        form.fields[1].value = FieldValue::Text("play.example.gg".to_string());

        apply_form(&servers.store, &form).unwrap();

        servers.refresh_roster();
        assert_eq!(servers.servers.len(), 1);
        assert_eq!(servers.servers[0].name, "lobby");
        assert_eq!(servers.servers[0].port, DEFAULT_PORT);
        assert!(servers.servers[0].active);
    }

    #[test]
    fn a_bad_port_is_reported_without_touching_the_store() {
        let (_dir, servers) = servers_with_store();
        let mut form = Form::create_server();
        form.fields[0].value = FieldValue::Text("lobby".to_string());
        form.fields[2].value = FieldValue::Text("not-a-port".to_string());

        let err = apply_form(&servers.store, &form).unwrap_err();
        assert!(err.contains("port"), "unexpected error: {err}");
        assert!(servers.store.servers().is_empty());
    }

    #[test]
    fn manual_stats_entries_go_through_field_validation() {
        let (_dir, servers) = servers_with_store();
        let record = ServerRecord::new("lobby", "play.example.gg", 30120);
        let id = record.id;
        servers.store.add_server(record).unwrap();

        let mut form = Form::manual_stats(id, StatSnapshot::fallback());
        form.fields[0].value = FieldValue::Text("12".to_string());
        form.fields[3].value = FieldValue::Text("130".to_string());

        let err = apply_form(&servers.store, &form).unwrap_err();
        assert!(err.contains("uptime"), "unexpected error: {err}");
        assert!(servers.store.latest_for(&id).is_none());

        form.fields[3].value = FieldValue::Text("99.5".to_string());
        apply_form(&servers.store, &form).unwrap();
        assert_eq!(servers.store.latest_for(&id).unwrap().players_online, 12);
    }

    #[test]
    fn the_settings_form_trims_its_fields() {
        let (_dir, servers) = servers_with_store();
        let mut form = Form::settings(&servers.store.settings());
        form.fields[0].value = FieldValue::Text("  connect play.example.gg  ".to_string());
        form.fields[1].value = FieldValue::Text("Welcome!".to_string());

        apply_form(&servers.store, &form).unwrap();

        let settings = servers.store.settings();
        assert_eq!(settings.connect_info, "connect play.example.gg");
        assert_eq!(settings.motd, "Welcome!");
    }
}
