use crate::{
    error::{
        Result,
        StatsError,
    },
    feed::{
        ChangeEvent,
        ChangeFeed,
        ChangeOp,
        ChangeTable,
        FEED_CAPACITY,
    },
    merge::{
        self,
        MergedView,
    },
    record::{
        ServerId,
        ServerRecord,
    },
    settings::DashboardSettings,
    snapshot::StatSnapshot,
};
use std::{
    collections::HashMap,
    fs,
    io::Write as _,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::broadcast;

const SERVERS_FILE: &str = "servers.yaml";
const GLOBAL_STATS_FILE: &str = "global_stats.json";
const SETTINGS_FILE: &str = "settings.yaml";
const HISTORY_DIR: &str = "history";

/// Rows kept in memory per server when reloading an existing history file.
/// The file itself keeps the full append-only log.
const HISTORY_TAIL: usize = 512;

#[derive(Debug, Default)]
struct FleetState {
    servers: Vec<ServerRecord>,
    global: Option<StatSnapshot>,
    history: HashMap<ServerId, Vec<StatSnapshot>>,
    settings: DashboardSettings,
}

/// Shared state for the whole fleet: the server roster, stats histories, the
/// global fallback reading, and dashboard settings. Cloning is cheap and all
/// clones see the same data.
///
/// Every mutation persists to the data directory first, then updates memory,
/// then announces itself on the change feed.
#[derive(Debug, Clone)]
pub struct FleetStore {
    data_dir: PathBuf,
    state: Arc<Mutex<FleetState>>,
    feed: broadcast::Sender<ChangeEvent>,
}

impl FleetStore {
    /// Opens (or initializes) the store in the given data directory. Files
    /// that are missing or unreadable turn into empty defaults with a
    /// warning; the dashboard should come up even with damaged state.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(data_dir.join(HISTORY_DIR))
            .map_err(|err| StatsError::persistence("data directory", err))?;

        let servers = load_servers(&data_dir.join(SERVERS_FILE));
        let history = load_history(&data_dir, &servers);
        let state = FleetState {
            global: load_global(&data_dir.join(GLOBAL_STATS_FILE)),
            settings: load_settings(&data_dir.join(SETTINGS_FILE)),
            servers,
            history,
        };
        info!(dir = %data_dir.display(), servers = state.servers.len(), "fleet store opened");

        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Ok(Self {
            data_dir,
            state: Arc::new(Mutex::new(state)),
            feed,
        })
    }

    pub fn subscribe(&self) -> ChangeFeed {
        self.feed.subscribe()
    }

    fn publish(&self, table: ChangeTable, op: ChangeOp) {
        // Nobody listening is fine, e.g. during tests or startup.
        let _ = self.feed.send(ChangeEvent::new(table, op));
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
    // Reads

    /// All servers in roster order (oldest first).
    pub fn servers(&self) -> Vec<ServerRecord> {
        let mut servers = self.state.lock().unwrap().servers.clone();
        servers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        servers
    }

    pub fn active_servers(&self) -> Vec<ServerRecord> {
        self.servers().into_iter().filter(|server| server.active).collect()
    }

    pub fn server(&self, id: &ServerId) -> Option<ServerRecord> {
        self.state.lock().unwrap().servers.iter().find(|s| &s.id == id).cloned()
    }

    pub fn global(&self) -> Option<StatSnapshot> {
        self.state.lock().unwrap().global.clone()
    }

    pub fn settings(&self) -> DashboardSettings {
        self.state.lock().unwrap().settings.clone()
    }

    /// The newest recorded reading for a server, regardless of its age.
    pub fn latest_for(&self, id: &ServerId) -> Option<StatSnapshot> {
        self.state.lock().unwrap().history.get(id).and_then(|rows| newest(rows)).cloned()
    }

    /// Resolves stats for every active server in one pass over the state.
    pub fn merged_view(&self) -> MergedView {
        let state = self.state.lock().unwrap();
        let latest: HashMap<ServerId, StatSnapshot> = state
            .history
            .iter()
            .filter_map(|(id, rows)| newest(rows).map(|row| (*id, row.clone())))
            .collect();
        merge::compute(&state.servers, state.global.as_ref(), &latest)
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
    // Roster mutations

    pub fn add_server(&self, record: ServerRecord) -> Result<()> {
        record.validate()?;
        let mut state = self.state.lock().unwrap();
        if state
            .servers
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(record.name.trim()))
        {
            return Err(StatsError::invalid("name", "a server with this name already exists"));
        }
        debug!(server = %record.name, "adding server");
        let mut servers = state.servers.clone();
        servers.push(record);
        self.persist_servers(&servers)?;
        state.servers = servers;
        drop(state);
        self.publish(ChangeTable::Servers, ChangeOp::Inserted);
        Ok(())
    }

    pub fn update_server(&self, record: ServerRecord) -> Result<()> {
        record.validate()?;
        let mut state = self.state.lock().unwrap();
        let Some(index) = state.servers.iter().position(|s| s.id == record.id) else {
            return Err(StatsError::invalid("server", "unknown server"));
        };
        if state
            .servers
            .iter()
            .any(|s| s.id != record.id && s.name.eq_ignore_ascii_case(record.name.trim()))
        {
            return Err(StatsError::invalid("name", "a server with this name already exists"));
        }
        debug!(server = %record.name, "updating server");
        let mut servers = state.servers.clone();
        servers[index] = record;
        self.persist_servers(&servers)?;
        state.servers = servers;
        drop(state);
        self.publish(ChangeTable::Servers, ChangeOp::Updated);
        Ok(())
    }

    /// Removes a server along with its stats history file.
    pub fn remove_server(&self, id: &ServerId) -> Result<Option<ServerRecord>> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state.servers.iter().position(|s| &s.id == id) else {
            return Ok(None);
        };
        let mut servers = state.servers.clone();
        let removed = servers.remove(index);
        self.persist_servers(&servers)?;
        state.servers = servers;
        state.history.remove(id);
        drop(state);
        debug!(server = %removed.name, "removed server");

        let path = self.history_file(id);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %err, "could not delete stats history");
            }
        }
        self.publish(ChangeTable::Servers, ChangeOp::Deleted);
        Ok(Some(removed))
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
    // Stats mutations

    /// Appends a fetched reading to the server's history. Remote results
    /// never replace earlier rows; the newest row simply wins at merge time.
    pub fn record_remote(&self, id: &ServerId, snapshot: StatSnapshot) -> Result<()> {
        snapshot.validate()?;
        let mut state = self.state.lock().unwrap();
        if !state.servers.iter().any(|s| &s.id == id) {
            return Err(StatsError::invalid("server", "unknown server"));
        }
        self.append_history(id, &snapshot)?;
        trace!(server = %id, players = snapshot.players_online, "recorded fetched stats");
        state.history.entry(*id).or_default().push(snapshot);
        drop(state);
        self.publish(ChangeTable::Stats, ChangeOp::Inserted);
        Ok(())
    }

    /// Upserts a manually entered reading: it replaces the newest row if one
    /// exists, otherwise it starts the history. Manual entries express
    /// "current truth", not another sample.
    pub fn record_manual(&self, id: &ServerId, snapshot: StatSnapshot) -> Result<()> {
        snapshot.validate()?;
        let mut state = self.state.lock().unwrap();
        if !state.servers.iter().any(|s| &s.id == id) {
            return Err(StatsError::invalid("server", "unknown server"));
        }
        let mut rows = state.history.get(id).cloned().unwrap_or_default();
        let newest_index = rows
            .iter()
            .enumerate()
            .max_by_key(|(_, row)| row.recorded_at)
            .map(|(index, _)| index);
        let op = match newest_index {
            Some(index) => {
                rows[index] = snapshot;
                ChangeOp::Updated
            }
            None => {
                rows.push(snapshot);
                ChangeOp::Inserted
            }
        };
        self.rewrite_history(id, &rows)?;
        debug!(server = %id, "recorded manual stats");
        state.history.insert(*id, rows);
        drop(state);
        self.publish(ChangeTable::Stats, op);
        Ok(())
    }

    /// Replaces the global fallback reading wholesale.
    pub fn set_global(&self, snapshot: StatSnapshot) -> Result<()> {
        snapshot.validate()?;
        let mut state = self.state.lock().unwrap();
        let text = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| StatsError::persistence("global stats", err))?;
        fs::write(self.data_dir.join(GLOBAL_STATS_FILE), text)
            .map_err(|err| StatsError::persistence("global stats", err))?;
        debug!("global fallback stats replaced");
        state.global = Some(snapshot);
        drop(state);
        self.publish(ChangeTable::Stats, ChangeOp::Updated);
        Ok(())
    }

    /// Applies an edit to a copy of the settings, persists it, and swaps it
    /// in. Readers holding the old value keep a consistent (stale) copy.
    pub fn update_settings(&self, apply: impl FnOnce(&mut DashboardSettings)) -> Result<DashboardSettings> {
        let mut state = self.state.lock().unwrap();
        let mut settings = state.settings.clone();
        apply(&mut settings);
        let text = serde_yml::to_string(&settings).map_err(|err| StatsError::persistence("settings", err))?;
        fs::write(self.data_dir.join(SETTINGS_FILE), text)
            .map_err(|err| StatsError::persistence("settings", err))?;
        debug!("dashboard settings updated");
        state.settings = settings.clone();
        drop(state);
        self.publish(ChangeTable::Settings, ChangeOp::Updated);
        Ok(settings)
    }

    // -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
    // Persistence

    fn persist_servers(&self, servers: &[ServerRecord]) -> Result<()> {
        let text = serde_yml::to_string(servers).map_err(|err| StatsError::persistence("server roster", err))?;
        fs::write(self.data_dir.join(SERVERS_FILE), text)
            .map_err(|err| StatsError::persistence("server roster", err))
    }

    fn append_history(&self, id: &ServerId, snapshot: &StatSnapshot) -> Result<()> {
        let line = serde_json::to_string(snapshot).map_err(|err| StatsError::persistence("stats history", err))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_file(id))
            .map_err(|err| StatsError::persistence("stats history", err))?;
        writeln!(file, "{line}").map_err(|err| StatsError::persistence("stats history", err))
    }

    fn rewrite_history(&self, id: &ServerId, rows: &[StatSnapshot]) -> Result<()> {
        let mut text = String::new();
        for row in rows {
            text.push_str(&serde_json::to_string(row).map_err(|err| StatsError::persistence("stats history", err))?);
            text.push('\n');
        }
        fs::write(self.history_file(id), text).map_err(|err| StatsError::persistence("stats history", err))
    }

    fn history_file(&self, id: &ServerId) -> PathBuf {
        self.data_dir.join(HISTORY_DIR).join(format!("{id}.jsonl"))
    }
}

/// On equal timestamps the later row wins, so a just-written row shadows an
/// older one even within the same instant.
fn newest(rows: &[StatSnapshot]) -> Option<&StatSnapshot> {
    rows.iter().max_by_key(|row| row.recorded_at)
}

fn load_servers(path: &Path) -> Vec<ServerRecord> {
    let Some(text) = read_existing(path) else {
        return Vec::new();
    };
    match serde_yml::from_str(&text) {
        Ok(servers) => servers,
        Err(err) => {
            warn!(path = %path.display(), %err, "server roster is unreadable, starting empty");
            Vec::new()
        }
    }
}

fn load_global(path: &Path) -> Option<StatSnapshot> {
    let text = read_existing(path)?;
    match serde_json::from_str(&text) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(path = %path.display(), %err, "global stats are unreadable, ignoring them");
            None
        }
    }
}

fn load_settings(path: &Path) -> DashboardSettings {
    let Some(text) = read_existing(path) else {
        return DashboardSettings::default();
    };
    match serde_yml::from_str(&text) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(path = %path.display(), %err, "settings are unreadable, using defaults");
            DashboardSettings::default()
        }
    }
}

fn load_history(data_dir: &Path, servers: &[ServerRecord]) -> HashMap<ServerId, Vec<StatSnapshot>> {
    let mut history = HashMap::new();
    for server in servers {
        let path = data_dir.join(HISTORY_DIR).join(format!("{}.jsonl", server.id));
        let Some(text) = read_existing(&path) else {
            continue;
        };
        let mut rows = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(row) => rows.push(row),
                Err(err) => warn!(server = %server.name, %err, "skipping unreadable history line"),
            }
        }
        if rows.len() > HISTORY_TAIL {
            rows.drain(..rows.len() - HISTORY_TAIL);
        }
        if !rows.is_empty() {
            history.insert(server.id, rows);
        }
    }
    history
}

fn read_existing(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{
        TimeDelta,
        Utc,
    };
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn open_store() -> (TempDir, FleetStore) {
        let dir = TempDir::new().unwrap();
        let store = FleetStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn reading(players: u32, age_secs: i64) -> StatSnapshot {
        StatSnapshot {
            players_online: players,
            max_players: 48,
            queue_count: 0,
            uptime_percent: 99.0,
            ping_ms: 20,
            online: true,
            recorded_at: Utc::now() - TimeDelta::seconds(age_secs),
        }
    }

    #[test]
    fn roster_round_trips_across_reopen() {
        let (dir, store) = open_store();
        store.add_server(ServerRecord::new("lobby", "a.example.gg", 30120)).unwrap();
        store.add_server(ServerRecord::new("events", "b.example.gg", 30121)).unwrap();

        let reopened = FleetStore::open(dir.path()).unwrap();
        let names: Vec<_> = reopened.servers().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["lobby", "events"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (_dir, store) = open_store();
        store.add_server(ServerRecord::new("lobby", "a.example.gg", 30120)).unwrap();
        let err = store
            .add_server(ServerRecord::new("Lobby", "c.example.gg", 30_122))
            .unwrap_err();
        assert!(matches!(err, StatsError::ValidationFailure { field: "name", .. }));
    }

    #[test]
    fn remote_rows_append_and_newest_wins() {
        let (dir, store) = open_store();
        let record = ServerRecord::new("lobby", "a.example.gg", 30120);
        let id = record.id;
        store.add_server(record).unwrap();

        store.record_remote(&id, reading(5, 60)).unwrap();
        store.record_remote(&id, reading(9, 0)).unwrap();

        assert_eq!(store.latest_for(&id).unwrap().players_online, 9);

        let file = dir.path().join("history").join(format!("{id}.jsonl"));
        let lines = std::fs::read_to_string(file).unwrap();
        assert_eq!(lines.lines().count(), 2);
    }

    #[test]
    fn manual_entry_replaces_only_the_newest_row() {
        let (dir, store) = open_store();
        let record = ServerRecord::new("lobby", "a.example.gg", 30120);
        let id = record.id;
        store.add_server(record).unwrap();

        store.record_remote(&id, reading(5, 60)).unwrap();
        store.record_remote(&id, reading(9, 30)).unwrap();
        store.record_manual(&id, reading(42, 0)).unwrap();

        assert_eq!(store.latest_for(&id).unwrap().players_online, 42);
        let file = dir.path().join("history").join(format!("{id}.jsonl"));
        let lines = std::fs::read_to_string(file).unwrap();
        assert_eq!(lines.lines().count(), 2, "manual entry must not grow the history");
    }

    #[test]
    fn manual_entry_starts_an_empty_history() {
        let (_dir, store) = open_store();
        let record = ServerRecord::new("lobby", "a.example.gg", 30120);
        let id = record.id;
        store.add_server(record).unwrap();

        store.record_manual(&id, reading(7, 0)).unwrap();
        assert_eq!(store.latest_for(&id).unwrap().players_online, 7);
    }

    #[test]
    fn global_stats_overwrite_previous_value() {
        let (dir, store) = open_store();
        store.set_global(reading(10, 60)).unwrap();
        store.set_global(reading(20, 0)).unwrap();
        assert_eq!(store.global().unwrap().players_online, 20);

        let reopened = FleetStore::open(dir.path()).unwrap();
        assert_eq!(reopened.global().unwrap().players_online, 20);
    }

    #[tokio::test]
    async fn mutations_are_announced_on_the_feed() {
        let (_dir, store) = open_store();
        let mut feed = store.subscribe();

        store.add_server(ServerRecord::new("lobby", "a.example.gg", 30120)).unwrap();
        assert_eq!(
            feed.recv().await.unwrap(),
            ChangeEvent::new(ChangeTable::Servers, ChangeOp::Inserted)
        );

        store.update_settings(|s| s.motd = "hello".into()).unwrap();
        assert_eq!(
            feed.recv().await.unwrap(),
            ChangeEvent::new(ChangeTable::Settings, ChangeOp::Updated)
        );
    }

    #[test]
    fn removing_a_server_drops_its_history_file() {
        let (dir, store) = open_store();
        let record = ServerRecord::new("lobby", "a.example.gg", 30120);
        let id = record.id;
        store.add_server(record).unwrap();
        store.record_remote(&id, reading(5, 0)).unwrap();

        let file = dir.path().join("history").join(format!("{id}.jsonl"));
        assert!(file.exists());

        let removed = store.remove_server(&id).unwrap();
        assert_eq!(removed.unwrap().name, "lobby");
        assert!(!file.exists());
        assert!(store.latest_for(&id).is_none());
    }

    #[test]
    fn stats_for_unknown_servers_are_rejected() {
        let (_dir, store) = open_store();
        let err = store.record_remote(&ServerId::new_v4(), reading(5, 0)).unwrap_err();
        assert!(matches!(err, StatsError::ValidationFailure { field: "server", .. }));
    }

    #[test]
    fn unreadable_history_lines_are_skipped_on_load() {
        let (dir, store) = open_store();
        let record = ServerRecord::new("lobby", "a.example.gg", 30120);
        let id = record.id;
        store.add_server(record).unwrap();
        store.record_remote(&id, reading(5, 0)).unwrap();

        let file = dir.path().join("history").join(format!("{id}.jsonl"));
        let mut text = std::fs::read_to_string(&file).unwrap();
        text.push_str("not json\n");
        std::fs::write(&file, text).unwrap();

        let reopened = FleetStore::open(dir.path()).unwrap();
        assert_eq!(reopened.latest_for(&id).unwrap().players_online, 5);
    }
}
