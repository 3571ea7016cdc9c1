use crate::error::{
    Result,
    StatsError,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Max player slots assumed when nothing has ever been reported for a server.
pub const DEFAULT_MAX_PLAYERS: u32 = 48;

/// A single stats reading, either fetched from a server or entered by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub players_online: u32,
    pub max_players: u32,
    pub queue_count: u32,
    pub uptime_percent: f64,
    pub ping_ms: u32,
    pub online: bool,
    pub recorded_at: DateTime<Utc>,
}

impl StatSnapshot {
    /// The synthesized reading used when a server has neither its own stats
    /// nor a global fallback. The timestamp is fixed at the epoch so that
    /// merging the same inputs always produces the same view.
    pub fn fallback() -> Self {
        Self {
            players_online: 0,
            max_players: DEFAULT_MAX_PLAYERS,
            queue_count: 0,
            uptime_percent: 0.0,
            ping_ms: 0,
            online: false,
            recorded_at: DateTime::UNIX_EPOCH,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.uptime_percent) {
            return Err(StatsError::invalid(
                "uptime",
                format!("must be between 0 and 100, got {}", self.uptime_percent),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fallback_reads_as_empty_offline_server() {
        let fallback = StatSnapshot::fallback();
        assert_eq!(fallback.players_online, 0);
        assert_eq!(fallback.max_players, DEFAULT_MAX_PLAYERS);
        assert_eq!(fallback.queue_count, 0);
        assert_eq!(fallback.uptime_percent, 0.0);
        assert_eq!(fallback.ping_ms, 0);
        assert!(!fallback.online);
        assert_eq!(fallback.recorded_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn uptime_outside_percent_range_is_rejected() {
        let mut snapshot = StatSnapshot::fallback();
        snapshot.uptime_percent = 100.5;
        assert!(matches!(
            snapshot.validate(),
            Err(StatsError::ValidationFailure { field: "uptime", .. })
        ));
        snapshot.uptime_percent = -1.0;
        assert!(snapshot.validate().is_err());
        snapshot.uptime_percent = 100.0;
        assert!(snapshot.validate().is_ok());
    }
}
