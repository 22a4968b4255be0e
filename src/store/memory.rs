use crate::model::{Id, Row, Table, TableAggregate};
use crate::store::traits::{ContentStore, TableStore};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store backing the server when no database is configured, and
/// the default backend for tests.
///
/// Two-level locking: the registry maps table id to its aggregate behind a
/// per-table RwLock. Writers swap an aggregate under the write guard (one
/// atomic unit); readers clone under the read guard (consistent snapshot).
/// Operations on different tables never contend with each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Id, Arc<RwLock<TableAggregate>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, table_id: &Id) -> Option<Arc<RwLock<TableAggregate>>> {
        let tables = self.tables.read().await;
        tables.get(table_id).cloned()
    }

    async fn snapshot_all(&self) -> Vec<TableAggregate> {
        let entries: Vec<Arc<RwLock<TableAggregate>>> = {
            let tables = self.tables.read().await;
            tables.values().cloned().collect()
        };
        let mut aggregates = Vec::with_capacity(entries.len());
        for entry in entries {
            aggregates.push(entry.read().await.clone());
        }
        aggregates
    }
}

#[async_trait::async_trait]
impl TableStore for MemoryStore {
    async fn get_table(&self, id: &Id) -> Result<Option<Table>> {
        match self.entry(id).await {
            Some(entry) => Ok(Some(entry.read().await.table.clone())),
            None => Ok(None),
        }
    }

    async fn list_tables_for_owner(&self, owner_id: &str) -> Result<Vec<Table>> {
        Ok(self
            .snapshot_all()
            .await
            .into_iter()
            .map(|agg| agg.table)
            .filter(|t| t.is_owned_by(owner_id))
            .collect())
    }

    async fn list_tables_shared_with(&self, principal_id: &str) -> Result<Vec<Table>> {
        Ok(self
            .snapshot_all()
            .await
            .into_iter()
            .map(|agg| agg.table)
            .filter(|t| t.is_shared_with(principal_id))
            .collect())
    }

    async fn search_tables(&self, owner_id: &str, text: &str) -> Result<Vec<Table>> {
        let needle = text.to_lowercase();
        Ok(self
            .snapshot_all()
            .await
            .into_iter()
            .map(|agg| agg.table)
            .filter(|t| t.is_owned_by(owner_id))
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.description
                        .as_ref()
                        .map(|d| d.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .collect())
    }

    async fn upsert_table(&self, table: Table) -> Result<()> {
        if let Some(entry) = self.entry(&table.id).await {
            entry.write().await.table = table;
        }
        // Metadata for a table without an aggregate is never persisted:
        // creation goes through put_aggregate.
        Ok(())
    }

    async fn delete_table(&self, id: &Id) -> Result<bool> {
        let mut tables = self.tables.write().await;
        // Removing the entry drops schema and rows with it in one step,
        // so no reader can see orphaned rows mid-deletion.
        Ok(tables.remove(id).is_some())
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryStore {
    async fn get_aggregate(&self, table_id: &Id) -> Result<Option<TableAggregate>> {
        match self.entry(table_id).await {
            Some(entry) => Ok(Some(entry.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn put_aggregate(&self, aggregate: TableAggregate) -> Result<()> {
        let id = aggregate.table.id.clone();
        if let Some(entry) = self.entry(&id).await {
            *entry.write().await = aggregate;
            return Ok(());
        }
        let mut tables = self.tables.write().await;
        tables.insert(id, Arc::new(RwLock::new(aggregate)));
        Ok(())
    }

    async fn insert_row(&self, table: &Table, row: &Row) -> Result<()> {
        let entry = self
            .entry(&table.id)
            .await
            .ok_or_else(|| anyhow::anyhow!("table '{}' has no stored aggregate", table.id))?;
        let mut aggregate = entry.write().await;
        aggregate.table = table.clone();
        aggregate.rows.push(row.clone());
        Ok(())
    }

    async fn update_row(&self, table: &Table, row: &Row) -> Result<()> {
        let entry = self
            .entry(&table.id)
            .await
            .ok_or_else(|| anyhow::anyhow!("table '{}' has no stored aggregate", table.id))?;
        let mut aggregate = entry.write().await;
        aggregate.table = table.clone();
        match aggregate.rows.iter_mut().find(|r| r.row_id == row.row_id) {
            Some(stored) => {
                *stored = row.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!(
                "row '{}' not present in table '{}'",
                row.row_id,
                table.id
            )),
        }
    }

    async fn delete_row(&self, table: &Table, row_id: &Id) -> Result<bool> {
        let entry = self
            .entry(&table.id)
            .await
            .ok_or_else(|| anyhow::anyhow!("table '{}' has no stored aggregate", table.id))?;
        let mut aggregate = entry.write().await;
        aggregate.table = table.clone();
        let before = aggregate.rows.len();
        aggregate.rows.retain(|r| &r.row_id != row_id);
        Ok(aggregate.rows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableSchema;
    use serde_json::json;

    fn sample_aggregate(owner: &str, name: &str) -> TableAggregate {
        let table = Table::new(owner.to_string(), name.to_string(), Some("demo".to_string()));
        TableAggregate::new(
            table,
            TableSchema::new(vec!["Date".to_string(), "Amount".to_string()]),
        )
    }

    #[tokio::test]
    async fn test_put_and_get_aggregate_roundtrip() {
        let store = MemoryStore::new();
        let aggregate = sample_aggregate("user-1", "Expenses");
        let id = aggregate.table.id.clone();

        store.put_aggregate(aggregate.clone()).await.unwrap();

        let loaded = store.get_aggregate(&id).await.unwrap().unwrap();
        assert_eq!(loaded, aggregate);

        let table = store.get_table(&id).await.unwrap().unwrap();
        assert_eq!(table.name, "Expenses");
    }

    #[tokio::test]
    async fn test_delete_table_removes_everything() {
        let store = MemoryStore::new();
        let mut aggregate = sample_aggregate("user-1", "Expenses");
        aggregate
            .insert_row(json!({"Date": "2024-01-01"}).as_object().unwrap().clone())
            .unwrap();
        let id = aggregate.table.id.clone();
        store.put_aggregate(aggregate).await.unwrap();

        assert!(store.delete_table(&id).await.unwrap());
        assert!(store.get_aggregate(&id).await.unwrap().is_none());
        // Repeat delete reports absence rather than erroring
        assert!(!store.delete_table(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_row_level_writes_persist_metadata() {
        let store = MemoryStore::new();
        let mut aggregate = sample_aggregate("user-1", "Expenses");
        let id = aggregate.table.id.clone();
        store.put_aggregate(aggregate.clone()).await.unwrap();

        let row = aggregate
            .insert_row(json!({"Amount": 12}).as_object().unwrap().clone())
            .unwrap();
        store.insert_row(&aggregate.table, &row).await.unwrap();

        let loaded = store.get_aggregate(&id).await.unwrap().unwrap();
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.table.modified_at, aggregate.table.modified_at);

        assert!(store.delete_row(&aggregate.table, &row.row_id).await.unwrap());
        assert!(!store.delete_row(&aggregate.table, &row.row_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_owner_scoped() {
        let store = MemoryStore::new();
        store
            .put_aggregate(sample_aggregate("user-1", "Grocery Expenses"))
            .await
            .unwrap();
        store
            .put_aggregate(sample_aggregate("user-2", "Grocery List"))
            .await
            .unwrap();

        let hits = store.search_tables("user-1", "grocery").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Grocery Expenses");

        // Description matches too
        let hits = store.search_tables("user-1", "DEMO").await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
