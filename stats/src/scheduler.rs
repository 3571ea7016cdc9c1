use crate::{
    feed::ChangeTable,
    record::{
        ServerId,
        ServerRecord,
    },
    source::StatsSource,
    store::FleetStore,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::{
    sync::{
        broadcast,
        Notify,
    },
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

const POLL_EVENT_CAPACITY: usize = 64;

/// Outcome notices from the background pollers, mainly so the UI can show
/// fetch failures as transient notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Fetched {
        server_id: ServerId,
    },
    Failed {
        server_id: ServerId,
        server_name: String,
        reason: String,
    },
}

/// Drives periodic stat fetches for every active server.
///
/// Polling is reference counted through [`PollHandle`]s: the first
/// subscriber starts one fetch task per active server plus a supervisor
/// that follows roster changes, later subscribers share those tasks, and
/// dropping the last handle stops everything. A failed fetch is reported
/// and then forgotten; the next scheduled tick is the only retry.
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerShared>,
}

struct SchedulerShared {
    store: FleetStore,
    source: Arc<dyn StatsSource>,
    interval: Duration,
    events: broadcast::Sender<PollEvent>,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    subscribers: usize,
    pollers: HashMap<ServerId, Poller>,
    token: CancellationToken,
}

struct Poller {
    record: ServerRecord,
    refresh: Arc<Notify>,
    token: CancellationToken,
}

/// Keeps polling alive while it exists. Dropping the last handle stops all
/// fetch tasks; a fetch already in flight still completes and is stored.
pub struct PollHandle {
    scheduler: PollScheduler,
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.scheduler.release();
    }
}

impl PollScheduler {
    pub fn new(store: FleetStore, source: Arc<dyn StatsSource>, interval: Duration) -> Self {
        let (events, _) = broadcast::channel(POLL_EVENT_CAPACITY);
        Self {
            inner: Arc::new(SchedulerShared {
                store,
                source,
                interval,
                events,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<PollEvent> {
        self.inner.events.subscribe()
    }

    /// Takes a polling subscription. Must be called on the runtime.
    pub fn subscribe(&self) -> PollHandle {
        let mut state = self.inner.state.lock().unwrap();
        state.subscribers += 1;
        if state.subscribers == 1 {
            self.start(&mut state);
        }
        drop(state);
        PollHandle {
            scheduler: self.clone(),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner.state.lock().unwrap().subscribers > 0
    }

    /// Asks every poller to fetch now. A poller busy with a fetch skips the
    /// request instead of queueing a second one.
    pub fn refresh_all(&self) {
        let state = self.inner.state.lock().unwrap();
        debug!(pollers = state.pollers.len(), "manual refresh of all servers");
        for poller in state.pollers.values() {
            poller.refresh.notify_waiters();
        }
    }

    pub fn refresh_server(&self, id: &ServerId) {
        let state = self.inner.state.lock().unwrap();
        if let Some(poller) = state.pollers.get(id) {
            debug!(server = %poller.record.name, "manual refresh");
            poller.refresh.notify_waiters();
        }
    }

    fn release(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.subscribers -= 1;
        if state.subscribers == 0 {
            debug!("last poll subscriber gone, stopping fetch tasks");
            state.token.cancel();
            state.pollers.clear();
        }
    }

    fn start(&self, state: &mut SchedulerState) {
        debug!(interval = ?self.inner.interval, "starting poll tasks");
        state.token = CancellationToken::new();
        for server in self.inner.store.active_servers() {
            self.spawn_poller(state, server);
        }
        let supervisor = self.clone();
        let token = state.token.clone();
        tokio::spawn(async move { supervisor.supervise(token).await });
    }

    fn spawn_poller(&self, state: &mut SchedulerState, record: ServerRecord) {
        let refresh = Arc::new(Notify::new());
        let token = state.token.child_token();
        state.pollers.insert(
            record.id,
            Poller {
                record: record.clone(),
                refresh: refresh.clone(),
                token: token.clone(),
            },
        );
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.poll_server(record, refresh, token).await });
    }

    /// Re-derives the poller set from the store. Added, removed, or edited
    /// servers get their task started, stopped, or restarted.
    fn reconcile(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.subscribers == 0 {
            return;
        }
        let desired: HashMap<ServerId, ServerRecord> = self
            .inner
            .store
            .active_servers()
            .into_iter()
            .map(|server| (server.id, server))
            .collect();

        let stale: Vec<ServerId> = state
            .pollers
            .iter()
            .filter(|(id, poller)| desired.get(id) != Some(&poller.record))
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(poller) = state.pollers.remove(&id) {
                debug!(server = %poller.record.name, "stopping poller");
                poller.token.cancel();
            }
        }
        for (id, record) in desired {
            if !state.pollers.contains_key(&id) {
                debug!(server = %record.name, "starting poller");
                self.spawn_poller(&mut state, record);
            }
        }
    }

    async fn supervise(self, token: CancellationToken) {
        let mut feed = self.inner.store.subscribe();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = feed.recv() => match event {
                    Ok(event) if event.table == ChangeTable::Servers => self.reconcile(),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change feed lagged, re-checking pollers");
                        self.reconcile();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        trace!("poll supervisor stopped");
    }

    async fn poll_server(self, record: ServerRecord, refresh: Arc<Notify>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
                // A manual refresh also restarts the periodic cadence.
                _ = refresh.notified() => ticker.reset(),
            }
            // The fetch itself is never cancelled; a teardown during a slow
            // fetch still lets the reading land in the store.
            self.fetch_one(&record).await;
        }
        trace!(server = %record.name, "poller stopped");
    }

    async fn fetch_one(&self, record: &ServerRecord) {
        match self.inner.source.fetch(record).await {
            Ok(snapshot) => {
                if let Err(err) = self.inner.store.record_remote(&record.id, snapshot) {
                    warn!(server = %record.name, %err, "failed to store fetched stats");
                    self.notify_failed(record, err.to_string());
                } else {
                    let _ = self.inner.events.send(PollEvent::Fetched { server_id: record.id });
                }
            }
            Err(err) => {
                debug!(server = %record.name, %err, "fetch failed");
                self.notify_failed(record, err.to_string());
            }
        }
    }

    fn notify_failed(&self, record: &ServerRecord, reason: String) {
        let _ = self.inner.events.send(PollEvent::Failed {
            server_id: record.id,
            server_name: record.name.clone(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Result,
        snapshot::StatSnapshot,
        source::HttpStatsSource,
    };
    use chrono::Utc;
    use std::{
        future::Future,
        pin::Pin,
        sync::atomic::{
            AtomicUsize,
            Ordering,
        },
    };
    use temp_dir::TempDir;

    fn reading(players: u32) -> StatSnapshot {
        StatSnapshot {
            players_online: players,
            max_players: 48,
            queue_count: 0,
            uptime_percent: 99.0,
            ping_ms: 20,
            online: true,
            recorded_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    impl StatsSource for CountingSource {
        fn fetch<'a>(
            &'a self,
            _server: &'a ServerRecord,
        ) -> Pin<Box<dyn Future<Output = Result<StatSnapshot>> + Send + 'a>> {
            Box::pin(async move {
                self.fetches.fetch_add(1, Ordering::SeqCst);
                Ok(reading(1))
            })
        }
    }

    #[derive(Default)]
    struct RecordingSource {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingSource {
        fn names(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl StatsSource for RecordingSource {
        fn fetch<'a>(
            &'a self,
            server: &'a ServerRecord,
        ) -> Pin<Box<dyn Future<Output = Result<StatSnapshot>> + Send + 'a>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(server.name.clone());
                Ok(reading(1))
            })
        }
    }

    fn fleet_with(names: &[&str]) -> (TempDir, FleetStore, Vec<ServerId>) {
        let dir = TempDir::new().unwrap();
        let store = FleetStore::open(dir.path()).unwrap();
        let mut ids = Vec::new();
        for name in names {
            let record = ServerRecord::new(*name, format!("{name}.example.gg"), 30120);
            ids.push(record.id);
            store.add_server(record).unwrap();
        }
        (dir, store, ids)
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_when_the_last_handle_drops() {
        let (_dir, store, _ids) = fleet_with(&["lobby"]);
        let source = Arc::new(CountingSource::default());
        let scheduler = PollScheduler::new(store, source.clone(), Duration::from_secs(5));

        let first = scheduler.subscribe();
        let second = scheduler.subscribe();
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(source.fetches.load(Ordering::SeqCst) >= 2);

        drop(first);
        assert!(scheduler.is_polling(), "one remaining handle must keep polling alive");
        drop(second);
        assert!(!scheduler.is_polling());

        tokio::time::sleep(Duration::from_millis(10)).await;
        let settled = source.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), settled);

        // A fresh subscription brings polling back.
        let _again = scheduler.subscribe();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(source.fetches.load(Ordering::SeqCst) > settled);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetches_report_and_keep_previous_stats() {
        let dir = TempDir::new().unwrap();
        let store = FleetStore::open(dir.path()).unwrap();
        let record = ServerRecord::new("lobby", "", 0);
        let id = record.id;
        store.add_server(record).unwrap();
        store.record_manual(&id, reading(7)).unwrap();

        let source = Arc::new(HttpStatsSource::new(Duration::from_secs(1)));
        let scheduler = PollScheduler::new(store.clone(), source, Duration::from_secs(5));
        let mut events = scheduler.events();
        let _handle = scheduler.subscribe();

        match events.recv().await.unwrap() {
            PollEvent::Failed {
                server_name, reason, ..
            } => {
                assert_eq!(server_name, "lobby");
                assert!(reason.contains("no address"), "unexpected reason: {reason}");
            }
            other => panic!("expected a failure event, got {other:?}"),
        }
        // The previous reading is untouched.
        assert_eq!(store.latest_for(&id).unwrap().players_online, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn roster_changes_start_and_stop_pollers() {
        let (_dir, store, ids) = fleet_with(&["alpha"]);
        let source = Arc::new(RecordingSource::default());
        let scheduler = PollScheduler::new(store.clone(), source.clone(), Duration::from_secs(5));
        let _handle = scheduler.subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(source.names().contains(&"alpha".to_string()));

        store.add_server(ServerRecord::new("beta", "beta.example.gg", 30121)).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(source.names().contains(&"beta".to_string()));

        let mut alpha = store.server(&ids[0]).unwrap();
        alpha.active = false;
        store.update_server(alpha).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let before = source.names().len();
        tokio::time::sleep(Duration::from_secs(20)).await;
        let tail = source.names().split_off(before);
        assert!(!tail.is_empty(), "the remaining poller must keep fetching");
        assert!(tail.iter().all(|name| name == "beta"), "stopped server must not be fetched: {tail:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_fetches_immediately() {
        let (_dir, store, ids) = fleet_with(&["alpha", "beta"]);
        let source = Arc::new(RecordingSource::default());
        let scheduler = PollScheduler::new(store, source.clone(), Duration::from_secs(60));
        let _handle = scheduler.subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let initial = source.names().len();
        assert_eq!(initial, 2, "both servers fetch once on startup");

        scheduler.refresh_server(&ids[1]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let names = source.names();
        assert_eq!(names.len(), initial + 1);
        assert_eq!(names.last().map(String::as_str), Some("beta"));

        scheduler.refresh_all();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.names().len(), initial + 3);
    }
}
