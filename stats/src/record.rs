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
use uuid::Uuid;

pub type ServerId = Uuid;

pub const MAX_NAME_LENGTH: usize = 64;

/// One game server as the operator registered it. The address may stay empty
/// for servers that only ever receive manually entered stats; fetching from
/// such a server fails and is reported, but the record itself is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ServerRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            port,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(StatsError::invalid("name", "must not be empty"));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(StatsError::invalid(
                "name",
                format!("must be at most {MAX_NAME_LENGTH} characters"),
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
    fn endpoint_joins_address_and_port() {
        let record = ServerRecord::new("lobby", "play.example.gg", 30120);
        assert_eq!(record.endpoint(), "play.example.gg:30120");
    }

    #[test]
    fn new_records_start_active() {
        let record = ServerRecord::new("lobby", "play.example.gg", 30120);
        assert!(record.active);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        let record = ServerRecord::new("   ", "play.example.gg", 30120);
        assert!(matches!(
            record.validate(),
            Err(StatsError::ValidationFailure { field: "name", .. })
        ));
    }

    #[test]
    fn empty_address_is_allowed() {
        let record = ServerRecord::new("manual-only", "", 0);
        assert!(record.validate().is_ok());
    }
}
