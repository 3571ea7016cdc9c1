use super::components::{
    dashboard,
    servers,
};
use crate::tui::keybindings::Keymap;
use fleetmon_stats::ServerId;
use serde::{
    Deserialize,
    Serialize,
};
use serde_yml::with::singleton_map_recursive;
use strum::Display;

#[derive(Display, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    Tick,
    Render,
    Resize(u16, u16),
    Suspend,
    Resume,
    Quit,
    ClearScreen,
    Error(String),
    DismissNotice,
    UpdateGlobalKeybindings(Keymap),

    Activate(ActivateAction),

    #[allow(clippy::enum_variant_names)]
    #[serde(with = "singleton_map_recursive")]
    #[allow(private_interfaces)]
    DashboardAction(dashboard::DashboardAction),

    #[allow(clippy::enum_variant_names)]
    #[serde(with = "singleton_map_recursive")]
    #[allow(private_interfaces)]
    ServersAction(servers::ServersAction),

    /// The fleet store changed; views re-read what they show.
    FleetChanged,
    RefreshAll,
    RefreshServer(ServerId),
    FleetSummaryChanged {
        servers: usize,
        online: usize,
        players: u32,
    },
}

#[derive(Display, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivateAction {
    Dashboard,
    Servers,
    Logs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn actions_round_trip_through_yaml() {
        for action in [
            Action::Quit,
            Action::Activate(ActivateAction::Servers),
            Action::DashboardAction(dashboard::DashboardAction::MoveDown),
            Action::ServersAction(servers::ServersAction::OpenManualStats),
            Action::Error("lobby: could not reach 10.0.0.1:30120".to_string()),
        ] {
            let raw = serde_yml::to_string(&action).unwrap();
            let parsed: Action = serde_yml::from_str(&raw).unwrap();
            assert_eq!(parsed, action);
        }
    }
}
