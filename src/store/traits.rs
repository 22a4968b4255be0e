use crate::model::{Id, Row, Table, TableAggregate};
use anyhow::Result;

/// Catalog-level operations over table metadata records.
#[async_trait::async_trait]
pub trait TableStore: Send + Sync {
    async fn get_table(&self, id: &Id) -> Result<Option<Table>>;
    async fn list_tables_for_owner(&self, owner_id: &str) -> Result<Vec<Table>>;
    async fn list_tables_shared_with(&self, principal_id: &str) -> Result<Vec<Table>>;
    /// Case-insensitive substring match over name or description,
    /// owner-scoped.
    async fn search_tables(&self, owner_id: &str, text: &str) -> Result<Vec<Table>>;
    /// Insert or update the metadata record only (schema and rows are
    /// untouched).
    async fn upsert_table(&self, table: Table) -> Result<()>;
    /// Delete the table and everything it owns, children first (rows,
    /// schema, then the record) in one atomic unit. Returns false when no
    /// such table exists.
    async fn delete_table(&self, id: &Id) -> Result<bool>;
}

/// Content-level operations over one table's schema + rows.
///
/// Every method is one internally-atomic write; a concurrent reader sees
/// the state before or after a call, never in between. Serializing the
/// calls themselves is the mutator's job (per-table lock).
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// A consistent snapshot of metadata, headers and all rows.
    async fn get_aggregate(&self, table_id: &Id) -> Result<Option<TableAggregate>>;
    /// Atomically create or replace the table's full state. Used at
    /// creation and for column mutations, whose row side effects must land
    /// together with the header change.
    async fn put_aggregate(&self, aggregate: TableAggregate) -> Result<()>;
    /// Append one row, persisting the updated metadata record (modified_at)
    /// in the same unit.
    async fn insert_row(&self, table: &Table, row: &Row) -> Result<()>;
    /// Overwrite one existing row by its system row_id, with metadata.
    async fn update_row(&self, table: &Table, row: &Row) -> Result<()>;
    /// Delete one row by its system row_id, with metadata. Returns false
    /// when the row does not exist.
    async fn delete_row(&self, table: &Table, row_id: &Id) -> Result<bool>;
}

pub trait Store: TableStore + ContentStore + Send + Sync {}

impl<T: TableStore + ContentStore + Send + Sync> Store for T {}
