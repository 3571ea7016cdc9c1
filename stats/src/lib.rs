//! # Fleetmon Stats
//!
//! Fleet statistics for the admin dashboard: the server roster, stat
//! snapshots, and the machinery that keeps them fresh.
//!
//! ## Architecture
//!
//! - **`record`** / **`snapshot`**: the server roster entries and the stat
//!   readings taken for them
//! - **`store`**: the YAML/JSONL backed [`FleetStore`] with its change feed
//! - **`merge`**: folds roster, per-server history, and the global reading
//!   into one [`MergedView`] row per active server
//! - **`source`**: the [`StatsSource`] trait and the FiveM `/dynamic.json`
//!   HTTP implementation
//! - **`scheduler`**: the reference counted [`PollScheduler`] driving
//!   periodic fetches
//!
//! The store publishes a [`ChangeEvent`] after every mutation; the merge
//! itself is a pure function, so two computations over the same inputs
//! always agree.

#[macro_use]
extern crate tracing;

pub mod error;
pub mod feed;
pub mod merge;
pub mod record;
pub mod scheduler;
pub mod settings;
pub mod snapshot;
pub mod source;
pub mod store;

pub use error::{
    Result,
    StatsError,
};
pub use feed::{
    ChangeEvent,
    ChangeFeed,
    ChangeOp,
    ChangeTable,
};
pub use merge::{
    MergedEntry,
    MergedView,
    ServerStatus,
    StatsOrigin,
};
pub use record::{
    ServerId,
    ServerRecord,
    MAX_NAME_LENGTH,
};
pub use scheduler::{
    PollEvent,
    PollHandle,
    PollScheduler,
};
pub use settings::DashboardSettings;
pub use snapshot::{
    StatSnapshot,
    DEFAULT_MAX_PLAYERS,
};
pub use source::{
    manual_snapshot,
    parse_count,
    parse_percent,
    HttpStatsSource,
    StatsSource,
};
pub use store::FleetStore;
