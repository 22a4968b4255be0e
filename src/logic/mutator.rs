use crate::logic::contacts::ContactGraph;
use crate::logic::locks::TableLocks;
use crate::model::{
    Id, NewTable, Row, ShareAction, Table, TableAggregate, TableError, TableResult, TableSchema,
    TableUpdate,
};
use crate::store::traits::Store;
use serde_json::{Map, Value};
use std::sync::Arc;

/// What an operation needs to be allowed to do to a table.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Capability {
    /// Row-content edits: granted to the owner and to shared principals.
    EditRows,
    /// Schema, metadata, sharing and deletion: owner only.
    Admin,
}

/// The orchestrating component for every table mutation.
///
/// Each operation is one atomic unit over metadata + schema + rows:
/// acquire the table's mutation lock, load a snapshot, authorize, apply
/// the change in memory, persist with a single atomic store write. A
/// failure at any step leaves the stored state untouched.
pub struct TableMutator<S> {
    store: Arc<S>,
    contacts: Arc<dyn ContactGraph>,
    locks: TableLocks,
}

impl<S: Store> TableMutator<S> {
    pub fn new(store: Arc<S>, contacts: Arc<dyn ContactGraph>) -> Self {
        Self {
            store,
            contacts,
            locks: TableLocks::new(),
        }
    }

    /// Create a table with its initial header list. The table starts with
    /// zero rows, a zero pending counter and no sharing.
    pub async fn create_table(&self, owner_id: &str, new: NewTable) -> TableResult<TableAggregate> {
        if new.name.trim().is_empty() {
            return Err(TableError::invalid_input("'name' must be a non-empty string"));
        }
        TableSchema::validate_new_headers(&new.headers)?;

        let table = Table::new(owner_id.to_string(), new.name.trim().to_string(), new.description);
        let aggregate = TableAggregate::new(table, TableSchema::new(new.headers));
        self.store.put_aggregate(aggregate.clone()).await?;

        log::info!(
            "created table '{}' ({}) with {} headers",
            aggregate.table.name,
            aggregate.table.id,
            aggregate.schema.headers.len()
        );
        Ok(aggregate)
    }

    /// Delete a table owned by the requester, cascading to its schema and
    /// rows. Returns the deleted table's name.
    pub async fn delete_table(&self, requester_id: &str, table_id: &Id) -> TableResult<String> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let table = self.load_owned(requester_id, table_id).await?;
        self.store.delete_table(table_id).await?;
        self.locks.forget(table_id);

        log::info!("deleted table '{}' ({})", table.name, table.id);
        Ok(table.name)
    }

    /// Partial update of name/description/pending_count. Supplying no
    /// recognized field is a caller error, not a silent success.
    pub async fn update_metadata(
        &self,
        requester_id: &str,
        table_id: &Id,
        update: TableUpdate,
    ) -> TableResult<Table> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut table = self.load_owned(requester_id, table_id).await?;
        if !table.apply_update(update) {
            return Err(TableError::NoChange);
        }
        self.store.upsert_table(table.clone()).await?;
        Ok(table)
    }

    /// Share with (or unshare from) a set of principals.
    ///
    /// Sharing admits only mutually-connected contacts of the requester;
    /// one forbidden id fails the whole operation. Unsharing with an empty
    /// list clears all sharing.
    pub async fn share(
        &self,
        requester_id: &str,
        table_id: &Id,
        principal_ids: Vec<Id>,
        action: ShareAction,
    ) -> TableResult<Table> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut table = self.load_owned(requester_id, table_id).await?;

        match action {
            ShareAction::Share => {
                if principal_ids.is_empty() {
                    return Err(TableError::invalid_input(
                        "'principal_ids' must be non-empty when sharing",
                    ));
                }
                for principal in &principal_ids {
                    if principal == requester_id {
                        return Err(TableError::invalid_input(
                            "a table cannot be shared with its owner",
                        ));
                    }
                    if !self.contacts.are_connected(requester_id, principal).await? {
                        return Err(TableError::Forbidden);
                    }
                }
                for principal in principal_ids {
                    if !table.is_shared_with(&principal) {
                        table.shared_with.push(principal);
                    }
                }
            }
            ShareAction::Unshare => {
                if principal_ids.is_empty() {
                    table.shared_with.clear();
                } else {
                    table.shared_with.retain(|p| !principal_ids.contains(p));
                }
            }
        }

        table.recompute_shared_flag();
        table.touch();
        self.store.upsert_table(table.clone()).await?;
        Ok(table)
    }

    /// Append a column; every existing row gains an empty-string value
    /// for it. Returns the updated header list.
    pub async fn add_column(
        &self,
        requester_id: &str,
        table_id: &Id,
        header: &str,
    ) -> TableResult<Vec<String>> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::Admin)?;
        aggregate.add_column(header)?;
        self.store.put_aggregate(aggregate.clone()).await?;
        Ok(aggregate.schema.headers)
    }

    /// Rename a header in place, moving the key in every row that has it.
    pub async fn rename_column(
        &self,
        requester_id: &str,
        table_id: &Id,
        old: &str,
        new: &str,
    ) -> TableResult<Vec<String>> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::Admin)?;
        aggregate.rename_column(old, new)?;
        self.store.put_aggregate(aggregate.clone()).await?;
        Ok(aggregate.schema.headers)
    }

    /// Keep exactly the given headers (in the given order), dropping the
    /// rest from the schema and from every row. Returns the updated
    /// header list and what was removed.
    pub async fn delete_columns(
        &self,
        requester_id: &str,
        table_id: &Id,
        keep: Vec<String>,
    ) -> TableResult<(Vec<String>, Vec<String>)> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::Admin)?;
        let removed = aggregate.retain_columns(&keep)?;
        if !removed.is_empty() {
            self.store.put_aggregate(aggregate.clone()).await?;
        }
        Ok((aggregate.schema.headers, removed))
    }

    /// Remove a single column from the schema and from every row.
    pub async fn delete_column(
        &self,
        requester_id: &str,
        table_id: &Id,
        header: &str,
    ) -> TableResult<Vec<String>> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::Admin)?;
        aggregate.remove_column(header)?;
        self.store.put_aggregate(aggregate.clone()).await?;
        Ok(aggregate.schema.headers)
    }

    /// Validate and store a row document. Returns the stored row, whose
    /// document now carries an "id" entry whether or not the caller
    /// supplied one.
    pub async fn add_row(
        &self,
        requester_id: &str,
        table_id: &Id,
        document: Map<String, Value>,
    ) -> TableResult<Row> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::EditRows)?;
        let row = aggregate.insert_row(document)?;
        self.store.insert_row(&aggregate.table, &row).await?;
        Ok(row)
    }

    /// Merge-patch the row addressed by `locator` (system row_id or the
    /// document's "id" value). Returns the merged row.
    pub async fn update_row(
        &self,
        requester_id: &str,
        table_id: &Id,
        locator: &str,
        patch: Map<String, Value>,
    ) -> TableResult<Row> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::EditRows)?;
        let row = aggregate.patch_row(locator, patch)?.clone();
        self.store.update_row(&aggregate.table, &row).await?;
        Ok(row)
    }

    /// Delete the row addressed by `locator`. Returns the deleted row.
    pub async fn delete_row(
        &self,
        requester_id: &str,
        table_id: &Id,
        locator: &str,
    ) -> TableResult<Row> {
        let lock = self.locks.lock_for(table_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.load_aggregate(table_id).await?;
        authorize(&aggregate.table, requester_id, Capability::EditRows)?;
        let row = aggregate.delete_row(locator)?;
        self.store.delete_row(&aggregate.table, &row.row_id).await?;
        Ok(row)
    }

    async fn load_aggregate(&self, table_id: &Id) -> TableResult<TableAggregate> {
        self.store
            .get_aggregate(table_id)
            .await?
            .ok_or_else(|| TableError::TableNotFound(table_id.clone()))
    }

    /// Load a table for an owner-only operation. A table that exists but
    /// belongs to someone else reads as absent, matching how lookups are
    /// owner-scoped everywhere else.
    async fn load_owned(&self, requester_id: &str, table_id: &Id) -> TableResult<Table> {
        let table = self
            .store
            .get_table(table_id)
            .await?
            .ok_or_else(|| TableError::TableNotFound(table_id.clone()))?;
        if !table.is_owned_by(requester_id) {
            return Err(TableError::TableNotFound(table_id.clone()));
        }
        Ok(table)
    }
}

fn authorize(table: &Table, principal_id: &str, capability: Capability) -> TableResult<()> {
    let allowed = match capability {
        Capability::EditRows => table.is_owned_by(principal_id) || table.is_shared_with(principal_id),
        Capability::Admin => table.is_owned_by(principal_id),
    };
    if allowed {
        Ok(())
    } else {
        Err(TableError::Forbidden)
    }
}
