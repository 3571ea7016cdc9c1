use serde::{
    Deserialize,
    Serialize,
};

/// Operator-editable presentation settings shown on the dashboard. Stored as
/// a plain value; updates go through [`crate::FleetStore::update_settings`]
/// and are announced on the change feed like every other mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Connection hint shown to players, e.g. `connect play.example.gg`.
    pub connect_info: String,
    /// Free-form message of the day.
    pub motd: String,
}
