use tokio::sync::broadcast;

/// Capacity of the change feed. Listeners that fall further behind than this
/// see a lag error and should re-read the store instead of replaying events.
pub(crate) const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeTable {
    Servers,
    Stats,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Inserted,
    Updated,
    Deleted,
}

/// A store mutation notice. Carries no payload; receivers re-read whatever
/// they display rather than patch in deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub(crate) fn new(table: ChangeTable, op: ChangeOp) -> Self {
        Self { table, op }
    }
}

pub type ChangeFeed = broadcast::Receiver<ChangeEvent>;
