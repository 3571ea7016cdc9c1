use crate::{
    error::{
        Result,
        StatsError,
    },
    record::ServerRecord,
    snapshot::StatSnapshot,
};
use chrono::Utc;
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
    time::{
        Duration,
        Instant,
    },
};
use url::Url;

/// Something that can produce a fresh reading for one server. The poll
/// scheduler only knows this trait, so tests can swap in canned sources.
pub trait StatsSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        server: &'a ServerRecord,
    ) -> Pin<Box<dyn Future<Output = Result<StatSnapshot>> + Send + 'a>>;
}

/// Queries the server's public `/dynamic.json` status endpoint over plain
/// HTTP and measures the round trip as ping.
#[derive(Debug)]
pub struct HttpStatsSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStatsSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl StatsSource for HttpStatsSource {
    fn fetch<'a>(
        &'a self,
        server: &'a ServerRecord,
    ) -> Pin<Box<dyn Future<Output = Result<StatSnapshot>> + Send + 'a>> {
        Box::pin(async move {
            if server.address.trim().is_empty() {
                return Err(StatsError::unreachable(
                    server.endpoint(),
                    "server has no address configured",
                ));
            }
            let url = Url::parse(&format!("http://{}/dynamic.json", server.endpoint()))
                .map_err(|err| StatsError::unreachable(server.endpoint(), err))?;
            debug!(server = %server.name, %url, "querying server");

            let started = Instant::now();
            let response = self
                .client
                .get(url)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|err| StatsError::unreachable(server.endpoint(), err))?;
            let ping_ms = started.elapsed().as_millis() as u32;

            if !response.status().is_success() {
                return Err(StatsError::unreachable(
                    server.endpoint(),
                    format!("unexpected status {}", response.status()),
                ));
            }
            let info: DynamicInfo = response
                .json()
                .await
                .map_err(|err| StatsError::unreachable(server.endpoint(), err))?;
            Ok(snapshot_from(info, ping_ms))
        })
    }
}

/// The relevant subset of a `/dynamic.json` answer. Player counts are
/// required; a payload without them counts as a failed fetch.
#[derive(Debug, Deserialize)]
struct DynamicInfo {
    clients: u32,
    #[serde(deserialize_with = "number_or_string")]
    sv_maxclients: u32,
    #[serde(default)]
    queue: u32,
    #[serde(default)]
    uptime: Option<f64>,
}

/// Some server builds report `sv_maxclients` as a quoted number.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom("player slot count out of range")),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a number, got {s:?}"))),
        other => Err(D::Error::custom(format!("expected number or string, got {other}"))),
    }
}

fn snapshot_from(info: DynamicInfo, ping_ms: u32) -> StatSnapshot {
    StatSnapshot {
        players_online: info.clients,
        max_players: info.sv_maxclients,
        queue_count: info.queue,
        // A server that answers but does not report uptime counts as fully up.
        uptime_percent: info.uptime.unwrap_or(100.0),
        ping_ms,
        online: true,
        recorded_at: Utc::now(),
    }
}

// -=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-
// Manual entry

/// Builds a validated snapshot from operator-entered values. Checks are
/// type-level only: counts are already unsigned, uptime must be a percent.
pub fn manual_snapshot(
    players_online: u32,
    max_players: u32,
    queue_count: u32,
    uptime_percent: f64,
    ping_ms: u32,
    online: bool,
) -> Result<StatSnapshot> {
    let snapshot = StatSnapshot {
        players_online,
        max_players,
        queue_count,
        uptime_percent,
        ping_ms,
        online,
        recorded_at: Utc::now(),
    };
    snapshot.validate()?;
    Ok(snapshot)
}

pub fn parse_count(field: &'static str, raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .map_err(|_| StatsError::invalid(field, format!("expected a whole number, got {:?}", raw.trim())))
}

pub fn parse_percent(field: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| StatsError::invalid(field, format!("expected a number, got {:?}", raw.trim())))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(StatsError::invalid(field, "must be between 0 and 100"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn blank_address_fails_without_touching_the_network() {
        let source = HttpStatsSource::new(Duration::from_secs(1));
        let server = ServerRecord::new("manual-only", "", 0);

        let err = source.fetch(&server).await.unwrap_err();
        match err {
            StatsError::SourceUnreachable { reason, .. } => {
                assert!(reason.contains("no address"), "unexpected reason: {reason}");
            }
            other => panic!("expected SourceUnreachable, got {other:?}"),
        }
    }

    #[test]
    fn slot_count_parses_from_number_or_string() {
        let info: DynamicInfo = serde_json::from_value(json!({
            "clients": 12,
            "sv_maxclients": "48"
        }))
        .unwrap();
        assert_eq!(info.sv_maxclients, 48);

        let info: DynamicInfo = serde_json::from_value(json!({
            "clients": 12,
            "sv_maxclients": 64
        }))
        .unwrap();
        assert_eq!(info.sv_maxclients, 64);

        let result: std::result::Result<DynamicInfo, _> = serde_json::from_value(json!({
            "clients": 12,
            "sv_maxclients": "lots"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn payloads_without_player_counts_are_rejected() {
        let result: std::result::Result<DynamicInfo, _> = serde_json::from_value(json!({
            "sv_maxclients": 48
        }));
        assert!(result.is_err());
    }

    #[test]
    fn answered_queries_count_as_online_with_full_uptime_by_default() {
        let info: DynamicInfo = serde_json::from_value(json!({
            "clients": 12,
            "sv_maxclients": 48
        }))
        .unwrap();
        let snapshot = snapshot_from(info, 34);

        assert!(snapshot.online);
        assert_eq!(snapshot.uptime_percent, 100.0);
        assert_eq!(snapshot.queue_count, 0);
        assert_eq!(snapshot.ping_ms, 34);
    }

    #[test]
    fn manual_values_are_validated() {
        assert!(manual_snapshot(5, 48, 0, 99.5, 20, true).is_ok());
        assert!(matches!(
            manual_snapshot(5, 48, 0, 120.0, 20, true),
            Err(StatsError::ValidationFailure { field: "uptime", .. })
        ));
    }

    #[test]
    fn count_and_percent_parsing_reject_junk() {
        assert_eq!(parse_count("players", " 12 ").unwrap(), 12);
        assert!(parse_count("players", "-3").is_err());
        assert!(parse_count("players", "twelve").is_err());

        assert_eq!(parse_percent("uptime", "99.5").unwrap(), 99.5);
        assert!(parse_percent("uptime", "101").is_err());
        assert!(parse_percent("uptime", "").is_err());
    }
}
