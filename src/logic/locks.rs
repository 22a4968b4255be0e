use crate::model::Id;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of per-table mutation locks.
///
/// Mutations on one table are serialized by that table's async mutex;
/// mutations on different tables proceed independently. The registry map
/// itself is guarded by a parking_lot mutex that is only held long enough
/// to clone the Arc out, never across an await point.
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: Mutex<HashMap<Id, Arc<tokio::sync::Mutex<()>>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutation lock for a table.
    pub fn lock_for(&self, table_id: &Id) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(table_id.clone()).or_default().clone()
    }

    /// Drop the registry entry for a deleted table. Holders of the old Arc
    /// finish their acquire normally and then find the table gone.
    pub fn forget(&self, table_id: &Id) {
        let mut locks = self.locks.lock();
        locks.remove(table_id);
    }
}
