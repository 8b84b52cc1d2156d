use crate::{AdmissionPermit, ItemError};

/// A unit of input work, identified by a sequential id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkItem {
    pub id: u64,
}

impl WorkItem {
    pub const fn new(id: u64) -> Self {
        Self { id }
    }
}

/// The outcome of processing one [`WorkItem`].
///
/// Exactly one result is produced per item a worker dequeues, unless the run
/// is cancelled before the worker can hand it to the collector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemResult {
    pub id: u64,
    pub outcome: String,
    pub error: Option<ItemError>,
}

impl ItemResult {
    pub const fn success(id: u64, outcome: String) -> Self {
        Self {
            id,
            outcome,
            error: None,
        }
    }

    pub const fn failure(id: u64, error: ItemError) -> Self {
        Self {
            id,
            outcome: String::new(),
            error: Some(error),
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A work item travelling through the input queue together with the admission
/// permit that was acquired for it.
///
/// Dropping this value anywhere (a cancelled send, a worker that exits early,
/// the input queue being dropped with items still buffered) returns the permit
/// to the gate.
#[derive(Debug)]
pub(crate) struct Admitted {
    pub item: WorkItem,
    pub permit: AdmissionPermit,
}
