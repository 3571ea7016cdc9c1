use crate::{
    record::{
        ServerId,
        ServerRecord,
    },
    snapshot::StatSnapshot,
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use std::collections::HashMap;

/// Where a merged row's stats came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOrigin {
    /// The server's own newest reading, regardless of its age.
    PerServer,
    /// The fleet-wide fallback reading.
    Global,
    /// Synthesized because nothing has ever been recorded.
    Fallback,
}

impl StatsOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsOrigin::PerServer => "server",
            StatsOrigin::Global => "global",
            StatsOrigin::Fallback => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Active,
    Idle,
    Offline,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Active => "active",
            ServerStatus::Idle => "idle",
            ServerStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntry {
    pub server: ServerRecord,
    pub stats: StatSnapshot,
    pub origin: StatsOrigin,
}

impl MergedEntry {
    pub fn status(&self) -> ServerStatus {
        if !self.stats.online {
            ServerStatus::Offline
        } else if self.stats.players_online == 0 {
            ServerStatus::Idle
        } else {
            ServerStatus::Active
        }
    }

    /// Fraction of player slots in use, unclamped. `None` when the reading
    /// claims zero slots; the dashboard renders that as unknown instead of
    /// dividing by zero.
    pub fn capacity(&self) -> Option<f64> {
        (self.stats.max_players > 0).then(|| f64::from(self.stats.players_online) / f64::from(self.stats.max_players))
    }

    /// Age of the reading. `None` for synthesized fallback rows, which have
    /// no meaningful timestamp.
    pub fn age(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        (self.origin != StatsOrigin::Fallback).then(|| now - self.stats.recorded_at)
    }
}

/// The resolved dashboard view: one entry per active server, in roster order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedView {
    pub entries: Vec<MergedEntry>,
}

impl MergedView {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &ServerId) -> Option<&MergedEntry> {
        self.entries.iter().find(|entry| &entry.server.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MergedEntry> {
        self.entries.iter()
    }

    pub fn online(&self) -> usize {
        self.entries.iter().filter(|entry| entry.stats.online).count()
    }

    pub fn players(&self) -> u32 {
        self.entries
            .iter()
            .filter(|entry| entry.stats.online)
            .map(|entry| entry.stats.players_online)
            .sum()
    }
}

/// Resolves stats for every active server. Pure: the same inputs always
/// produce the same view, including the synthesized fallback rows.
///
/// Precedence per server: its own newest reading (at any age), then the
/// global fallback, then a synthesized offline row.
pub fn compute(
    servers: &[ServerRecord],
    global: Option<&StatSnapshot>,
    latest: &HashMap<ServerId, StatSnapshot>,
) -> MergedView {
    let mut entries: Vec<MergedEntry> = servers
        .iter()
        .filter(|server| server.active)
        .map(|server| {
            let (stats, origin) = match latest.get(&server.id) {
                Some(row) => (row.clone(), StatsOrigin::PerServer),
                None => match global {
                    Some(row) => (row.clone(), StatsOrigin::Global),
                    None => (StatSnapshot::fallback(), StatsOrigin::Fallback),
                },
            };
            MergedEntry {
                server: server.clone(),
                stats,
                origin,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.server.created_at.cmp(&b.server.created_at));
    MergedView { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::DEFAULT_MAX_PLAYERS;
    use pretty_assertions::assert_eq;

    fn reading(players: u32, max: u32, age_secs: i64) -> StatSnapshot {
        StatSnapshot {
            players_online: players,
            max_players: max,
            queue_count: 0,
            uptime_percent: 99.0,
            ping_ms: 35,
            online: true,
            recorded_at: Utc::now() - TimeDelta::seconds(age_secs),
        }
    }

    #[test]
    fn merging_the_same_inputs_twice_yields_the_same_view() {
        let servers = vec![
            ServerRecord::new("lobby", "a.example.gg", 30120),
            ServerRecord::new("events", "", 0),
        ];
        let mut latest = HashMap::new();
        latest.insert(servers[0].id, reading(12, 48, 5));
        let global = reading(3, 32, 60);

        let first = compute(&servers, Some(&global), &latest);
        let second = compute(&servers, Some(&global), &latest);
        assert_eq!(first, second);

        // Also holds when fallback rows are synthesized.
        let first = compute(&servers, None, &HashMap::new());
        let second = compute(&servers, None, &HashMap::new());
        assert_eq!(first, second);
    }

    #[test]
    fn every_active_server_gets_exactly_one_entry() {
        let mut idle = ServerRecord::new("idle", "b.example.gg", 30121);
        idle.active = false;
        let servers = vec![ServerRecord::new("lobby", "a.example.gg", 30120), idle];

        let view = compute(&servers, None, &HashMap::new());
        assert_eq!(view.len(), 1);
        assert_eq!(view.entries[0].server.name, "lobby");
    }

    #[test]
    fn missing_stats_synthesize_an_offline_default_row() {
        let servers = vec![ServerRecord::new("lobby", "a.example.gg", 30120)];
        let view = compute(&servers, None, &HashMap::new());

        let entry = &view.entries[0];
        assert_eq!(entry.origin, StatsOrigin::Fallback);
        assert_eq!(entry.stats.players_online, 0);
        assert_eq!(entry.stats.max_players, DEFAULT_MAX_PLAYERS);
        assert_eq!(entry.stats.queue_count, 0);
        assert_eq!(entry.stats.uptime_percent, 0.0);
        assert_eq!(entry.stats.ping_ms, 0);
        assert!(!entry.stats.online);
        assert_eq!(entry.status(), ServerStatus::Offline);
        assert_eq!(entry.age(Utc::now()), None);
    }

    #[test]
    fn stale_per_server_reading_beats_a_fresh_global_one() {
        let server = ServerRecord::new("lobby", "a.example.gg", 30120);
        let mut latest = HashMap::new();
        latest.insert(server.id, reading(10, 48, 600));
        let global = reading(99, 48, 10);

        let view = compute(&[server], Some(&global), &latest);
        let entry = &view.entries[0];
        assert_eq!(entry.origin, StatsOrigin::PerServer);
        assert_eq!(entry.stats.players_online, 10);
    }

    #[test]
    fn global_reading_fills_in_when_a_server_has_none() {
        let with_stats = ServerRecord::new("lobby", "a.example.gg", 30120);
        let without = ServerRecord::new("events", "b.example.gg", 30121);
        let mut latest = HashMap::new();
        latest.insert(with_stats.id, reading(10, 48, 5));
        let global = reading(3, 32, 30);

        let view = compute(&[with_stats, without.clone()], Some(&global), &latest);
        let entry = view.get(&without.id).unwrap();
        assert_eq!(entry.origin, StatsOrigin::Global);
        assert_eq!(entry.stats.players_online, 3);
    }

    #[test]
    fn capacity_is_the_players_to_slots_fraction() {
        let server = ServerRecord::new("lobby", "a.example.gg", 30120);
        let mut latest = HashMap::new();
        latest.insert(server.id, reading(24, 48, 0));

        let view = compute(&[server], None, &latest);
        assert_eq!(view.entries[0].capacity(), Some(0.5));
    }

    #[test]
    fn capacity_is_unknown_when_a_reading_claims_zero_slots() {
        let server = ServerRecord::new("lobby", "a.example.gg", 30120);
        let mut latest = HashMap::new();
        latest.insert(server.id, reading(5, 0, 0));

        let view = compute(&[server], None, &latest);
        assert_eq!(view.entries[0].capacity(), None);
    }

    #[test]
    fn status_tracks_online_flag_and_player_count() {
        let server = ServerRecord::new("lobby", "a.example.gg", 30120);
        let mut latest = HashMap::new();

        latest.insert(server.id, reading(3, 48, 0));
        let view = compute(std::slice::from_ref(&server), None, &latest);
        assert_eq!(view.entries[0].status(), ServerStatus::Active);

        latest.insert(server.id, reading(0, 48, 0));
        let view = compute(std::slice::from_ref(&server), None, &latest);
        assert_eq!(view.entries[0].status(), ServerStatus::Idle);

        let mut offline = reading(0, 48, 0);
        offline.online = false;
        latest.insert(server.id, offline);
        let view = compute(&[server], None, &latest);
        assert_eq!(view.entries[0].status(), ServerStatus::Offline);
    }

    #[test]
    fn totals_only_count_online_servers() {
        let a = ServerRecord::new("lobby", "a.example.gg", 30120);
        let b = ServerRecord::new("events", "b.example.gg", 30121);
        let mut latest = HashMap::new();
        latest.insert(a.id, reading(10, 48, 0));
        let mut offline = reading(7, 48, 0);
        offline.online = false;
        latest.insert(b.id, offline);

        let view = compute(&[a, b], None, &latest);
        assert_eq!(view.online(), 1);
        assert_eq!(view.players(), 10);
    }
}
