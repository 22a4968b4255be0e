use crate::model::{Id, Table, TableAggregate, TableError, TableResult, TableStats};
use crate::store::traits::Store;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Full content of one table as surfaced to callers: the header list plus
/// every row document annotated with its system row_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    pub table_id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl TableContent {
    fn from_aggregate(aggregate: TableAggregate) -> Self {
        let rows = aggregate.iter_rows().map(|r| r.annotated_data()).collect();
        Self {
            table_id: aggregate.table.id,
            name: aggregate.table.name,
            description: aggregate.table.description,
            headers: aggregate.schema.headers,
            rows,
        }
    }
}

/// Read-side projections over the catalog and table contents.
///
/// Reads never take the mutation lock; they see the consistent snapshot
/// the store guarantees per call.
pub struct QueryFacade<S> {
    store: Arc<S>,
}

impl<S: Store> QueryFacade<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Tables the principal owns plus tables shared with them,
    /// deduplicated, newest first.
    pub async fn list_accessible(&self, principal_id: &str) -> TableResult<Vec<Table>> {
        let owned = self.store.list_tables_for_owner(principal_id).await?;
        let shared = self.store.list_tables_shared_with(principal_id).await?;

        let mut tables: Vec<Table> = owned
            .into_iter()
            .chain(shared)
            .unique_by(|t| t.id.clone())
            .collect();
        tables.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tables)
    }

    /// Case-insensitive substring search over name or description.
    /// Owner-scoped: shared tables are not searched.
    pub async fn search(&self, owner_id: &str, text: &str) -> TableResult<Vec<Table>> {
        Ok(self.store.search_tables(owner_id, text).await?)
    }

    /// Headers + rows for one accessible table, or for every accessible
    /// table when no id is given.
    pub async fn get_content(
        &self,
        principal_id: &str,
        table_id: Option<&Id>,
    ) -> TableResult<Vec<TableContent>> {
        match table_id {
            Some(id) => {
                let aggregate = self.load_accessible(principal_id, id).await?;
                Ok(vec![TableContent::from_aggregate(aggregate)])
            }
            None => {
                let mut contents = Vec::new();
                for table in self.list_accessible(principal_id).await? {
                    // A table deleted between the listing and this read is
                    // simply skipped.
                    if let Some(aggregate) = self.store.get_aggregate(&table.id).await? {
                        contents.push(TableContent::from_aggregate(aggregate));
                    }
                }
                Ok(contents)
            }
        }
    }

    /// Row/column counts and metadata for one or all accessible tables.
    pub async fn get_statistics(
        &self,
        principal_id: &str,
        table_id: Option<&Id>,
    ) -> TableResult<Vec<TableStats>> {
        match table_id {
            Some(id) => {
                let aggregate = self.load_accessible(principal_id, id).await?;
                Ok(vec![stats_of(&aggregate)])
            }
            None => {
                let mut stats = Vec::new();
                for table in self.list_accessible(principal_id).await? {
                    if let Some(aggregate) = self.store.get_aggregate(&table.id).await? {
                        stats.push(stats_of(&aggregate));
                    }
                }
                Ok(stats)
            }
        }
    }

    async fn load_accessible(
        &self,
        principal_id: &str,
        table_id: &Id,
    ) -> TableResult<TableAggregate> {
        let aggregate = self
            .store
            .get_aggregate(table_id)
            .await?
            .ok_or_else(|| TableError::TableNotFound(table_id.clone()))?;
        let table = &aggregate.table;
        if !table.is_owned_by(principal_id) && !table.is_shared_with(principal_id) {
            // Generic denial: the error carries nothing about the table.
            return Err(TableError::Forbidden);
        }
        Ok(aggregate)
    }
}

fn stats_of(aggregate: &TableAggregate) -> TableStats {
    TableStats {
        table_id: aggregate.table.id.clone(),
        name: aggregate.table.name.clone(),
        row_count: aggregate.rows.len(),
        column_count: aggregate.schema.headers.len(),
        pending_count: aggregate.table.pending_count,
        created_at: aggregate.table.created_at,
        modified_at: aggregate.table.modified_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::contacts::StaticContacts;
    use crate::logic::mutator::TableMutator;
    use crate::model::{NewTable, ShareAction};
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    async fn setup() -> (TableMutator<MemoryStore>, QueryFacade<MemoryStore>, Arc<StaticContacts>) {
        let store = Arc::new(MemoryStore::new());
        let contacts = Arc::new(StaticContacts::new());
        (
            TableMutator::new(store.clone(), contacts.clone()),
            QueryFacade::new(store),
            contacts,
        )
    }

    fn new_table(name: &str, headers: &[&str]) -> NewTable {
        NewTable {
            name: name.to_string(),
            description: Some(format!("{name} table")),
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_list_accessible_unions_owned_and_shared() {
        let (mutator, facade, contacts) = setup().await;
        contacts.connect("owner", "viewer");

        let mine = mutator
            .create_table("viewer", new_table("Mine", &["A"]))
            .await
            .unwrap();
        let theirs = mutator
            .create_table("owner", new_table("Theirs", &["B"]))
            .await
            .unwrap();
        mutator
            .share("owner", &theirs.table.id, vec!["viewer".to_string()], ShareAction::Share)
            .await
            .unwrap();

        let accessible = facade.list_accessible("viewer").await.unwrap();
        assert_eq!(accessible.len(), 2);
        let ids: Vec<&str> = accessible.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains(&mine.table.id.as_str()));
        assert!(ids.contains(&theirs.table.id.as_str()));

        // Newest first
        assert!(accessible[0].created_at >= accessible[1].created_at);
    }

    #[tokio::test]
    async fn test_get_content_annotates_rows_with_row_id() {
        let (mutator, facade, _) = setup().await;
        let aggregate = mutator
            .create_table("owner", new_table("Expenses", &["Amount"]))
            .await
            .unwrap();
        let id = aggregate.table.id.clone();
        let row = mutator
            .add_row("owner", &id, json!({"Amount": 42}).as_object().unwrap().clone())
            .await
            .unwrap();

        let contents = facade.get_content("owner", Some(&id)).await.unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].headers, vec!["Amount"]);
        assert_eq!(contents[0].rows[0]["row_id"], json!(row.row_id));
        assert_eq!(contents[0].rows[0]["Amount"], json!(42));
    }

    #[tokio::test]
    async fn test_get_content_authorization() {
        let (mutator, facade, _) = setup().await;
        let aggregate = mutator
            .create_table("owner", new_table("Private", &["A"]))
            .await
            .unwrap();

        let err = facade
            .get_content("stranger", Some(&aggregate.table.id))
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Forbidden));

        let err = facade
            .get_content("owner", Some(&"no-such-table".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_is_owner_scoped() {
        let (mutator, facade, contacts) = setup().await;
        contacts.connect("owner", "viewer");
        let theirs = mutator
            .create_table("owner", new_table("Grocery Budget", &["A"]))
            .await
            .unwrap();
        mutator
            .share("owner", &theirs.table.id, vec!["viewer".to_string()], ShareAction::Share)
            .await
            .unwrap();

        // Shared tables do not show up in the viewer's search
        let hits = facade.search("viewer", "grocery").await.unwrap();
        assert!(hits.is_empty());

        let hits = facade.search("owner", "GROCERY").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_counts() {
        let (mutator, facade, _) = setup().await;
        let aggregate = mutator
            .create_table("owner", new_table("Expenses", &["Date", "Amount"]))
            .await
            .unwrap();
        let id = aggregate.table.id.clone();
        mutator
            .add_row("owner", &id, json!({"Amount": 1}).as_object().unwrap().clone())
            .await
            .unwrap();
        mutator
            .add_row("owner", &id, json!({"Amount": 2}).as_object().unwrap().clone())
            .await
            .unwrap();

        let stats = facade.get_statistics("owner", Some(&id)).await.unwrap();
        assert_eq!(stats[0].row_count, 2);
        assert_eq!(stats[0].column_count, 2);
        assert_eq!(stats[0].pending_count, 0);
    }
}
