use crate::model::{
    generate_row_key, Row, Table, TableError, TableResult, TableSchema, ROW_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One table's complete state: metadata, header list and row documents.
///
/// Every compound mutation (a column change touching N rows, a validated
/// row insert) happens on this value in memory, and the store persists the
/// result as a single atomic write. No caller can ever observe a header
/// list that has gained a column while some rows still lack the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAggregate {
    pub table: Table,
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

impl TableAggregate {
    pub fn new(table: Table, schema: TableSchema) -> Self {
        Self {
            table,
            schema,
            rows: Vec::new(),
        }
    }

    /// Append a header and give every existing row an empty-string value
    /// for it, so the new column is immediately visible in row listings.
    pub fn add_column(&mut self, header: &str) -> TableResult<()> {
        self.schema.add_header(header)?;
        for row in &mut self.rows {
            row.data
                .insert(header.to_string(), Value::String(String::new()));
        }
        self.table.touch();
        Ok(())
    }

    /// Rename a header in place; rows that carry the old key have it moved
    /// to the new name (value preserved), rows without it are untouched.
    pub fn rename_column(&mut self, old: &str, new: &str) -> TableResult<()> {
        self.schema.rename_header(old, new)?;
        if old == new {
            return Ok(());
        }
        for row in &mut self.rows {
            if let Some(value) = row.data.remove(old) {
                row.data.insert(new.to_string(), value);
            }
        }
        self.table.touch();
        Ok(())
    }

    /// Set headers to exactly `keep` and strip the removed keys from every
    /// row. Returns the removed headers; empty means nothing changed.
    pub fn retain_columns(&mut self, keep: &[String]) -> TableResult<Vec<String>> {
        let removed = self.schema.retain_headers(keep)?;
        if removed.is_empty() {
            return Ok(removed);
        }
        for row in &mut self.rows {
            for header in &removed {
                row.data.remove(header);
            }
        }
        self.table.touch();
        Ok(removed)
    }

    /// Remove a single header and strip its key from every row.
    pub fn remove_column(&mut self, header: &str) -> TableResult<()> {
        self.schema.remove_header(header)?;
        for row in &mut self.rows {
            row.data.remove(header);
        }
        self.table.touch();
        Ok(())
    }

    /// Validate and store a new row document.
    ///
    /// Unknown keys are rejected with the current header list attached.
    /// Missing keys stay absent (no defaulting). A document without an
    /// "id" entry gets a fresh short key; a supplied "id" that collides
    /// with an existing row is rejected so later locators stay unambiguous.
    pub fn insert_row(&mut self, mut data: Map<String, Value>) -> TableResult<Row> {
        let unknown: Vec<String> = data
            .keys()
            .filter(|k| k.as_str() != ROW_KEY && !self.schema.contains(k))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(TableError::UnknownColumns {
                unknown,
                expected_headers: self.schema.headers.clone(),
            });
        }

        match data.get(ROW_KEY) {
            Some(supplied) => {
                let key = match supplied {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if self.rows.iter().any(|r| r.embedded_key().as_deref() == Some(key.as_str())) {
                    return Err(TableError::invalid_input(format!(
                        "a row with id '{}' already exists in this table",
                        key
                    )));
                }
            }
            None => {
                data.insert(ROW_KEY.to_string(), Value::String(generate_row_key()));
            }
        }

        let row = Row::new(data);
        self.rows.push(row.clone());
        self.table.touch();
        Ok(row)
    }

    /// Rows in insertion order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn find_row(&self, locator: &str) -> Option<&Row> {
        self.iter_rows().find(|r| r.matches_locator(locator))
    }

    /// Merge-patch the first row matching `locator`.
    pub fn patch_row(&mut self, locator: &str, patch: Map<String, Value>) -> TableResult<&Row> {
        let Some(position) = self.rows.iter().position(|r| r.matches_locator(locator)) else {
            return Err(TableError::RowNotFound(locator.to_string()));
        };
        self.rows[position].merge_patch(patch);
        self.table.touch();
        Ok(&self.rows[position])
    }

    /// Delete the first row matching `locator`, returning it.
    pub fn delete_row(&mut self, locator: &str) -> TableResult<Row> {
        let Some(position) = self.rows.iter().position(|r| r.matches_locator(locator)) else {
            return Err(TableError::RowNotFound(locator.to_string()));
        };
        let row = self.rows.remove(position);
        self.table.touch();
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aggregate(headers: &[&str]) -> TableAggregate {
        let table = Table::new("user-1".to_string(), "Expenses".to_string(), None);
        TableAggregate::new(
            table,
            TableSchema::new(headers.iter().map(|h| h.to_string()).collect()),
        )
    }

    fn doc(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_add_column_backfills_existing_rows_with_empty_string() {
        let mut agg = aggregate(&["Date", "Amount"]);
        agg.insert_row(doc(json!({"Date": "2024-01-01", "Amount": 100})))
            .unwrap();
        agg.insert_row(doc(json!({"Date": "2024-01-02"}))).unwrap();

        agg.add_column("Vendor").unwrap();

        assert_eq!(agg.schema.headers, vec!["Date", "Amount", "Vendor"]);
        for row in &agg.rows {
            assert_eq!(row.data["Vendor"], json!(""));
        }
    }

    #[test]
    fn test_new_column_not_autofilled_on_later_partial_rows() {
        let mut agg = aggregate(&["Date"]);
        agg.add_column("Amount").unwrap();
        let row = agg.insert_row(doc(json!({"Date": "2024-01-01"}))).unwrap();
        // Missing keys are simply absent, never defaulted at insert time
        assert!(!row.data.contains_key("Amount"));
    }

    #[test]
    fn test_rename_column_moves_key_only_where_present() {
        let mut agg = aggregate(&["Amount", "Category"]);
        agg.insert_row(doc(json!({"Amount": 100}))).unwrap();
        agg.insert_row(doc(json!({"Category": "food"}))).unwrap();

        agg.rename_column("Amount", "Cost").unwrap();

        assert_eq!(agg.rows[0].data["Cost"], json!(100));
        assert!(!agg.rows[0].data.contains_key("Amount"));
        // Row without the old key gains nothing
        assert!(!agg.rows[1].data.contains_key("Cost"));
        assert_eq!(agg.rows[1].data["Category"], json!("food"));
    }

    #[test]
    fn test_retain_columns_strips_removed_keys_from_rows() {
        let mut agg = aggregate(&["Date", "Amount", "Vendor"]);
        agg.insert_row(doc(
            json!({"Date": "2024-01-01", "Amount": 100, "Vendor": "Shop"}),
        ))
        .unwrap();

        let removed = agg
            .retain_columns(&["Date".to_string(), "Amount".to_string()])
            .unwrap();

        assert_eq!(removed, vec!["Vendor"]);
        assert_eq!(agg.schema.headers, vec!["Date", "Amount"]);
        let row = &agg.rows[0];
        assert_eq!(row.data["Date"], json!("2024-01-01"));
        assert_eq!(row.data["Amount"], json!(100));
        assert!(!row.data.contains_key("Vendor"));
    }

    #[test]
    fn test_insert_row_rejects_unknown_columns_with_detail() {
        let mut agg = aggregate(&["Date", "Amount"]);
        let err = agg
            .insert_row(doc(json!({"Date": "2024-01-01", "Vendor": "Shop"})))
            .unwrap_err();
        match err {
            TableError::UnknownColumns {
                unknown,
                expected_headers,
            } => {
                assert_eq!(unknown, vec!["Vendor"]);
                assert_eq!(expected_headers, vec!["Date", "Amount"]);
            }
            other => panic!("expected UnknownColumns, got {other:?}"),
        }
        // Nothing was persisted by the failed insert
        assert!(agg.rows.is_empty());
    }

    #[test]
    fn test_insert_row_fills_missing_embedded_id() {
        let mut agg = aggregate(&["Amount"]);
        let row = agg.insert_row(doc(json!({"Amount": 100}))).unwrap();
        let key = row.embedded_key().unwrap();
        assert_eq!(key.len(), 8);
    }

    #[test]
    fn test_insert_row_rejects_colliding_embedded_id() {
        let mut agg = aggregate(&["Amount"]);
        agg.insert_row(doc(json!({"id": "abc", "Amount": 100})))
            .unwrap();
        let err = agg
            .insert_row(doc(json!({"id": "abc", "Amount": 200})))
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidInput(_)));
        assert_eq!(agg.rows.len(), 1);
    }

    #[test]
    fn test_row_keys_subset_of_headers_after_column_delete() {
        let mut agg = aggregate(&["Date", "Amount", "Vendor"]);
        agg.insert_row(doc(
            json!({"id": "r1", "Date": "2024-01-01", "Amount": 100, "Vendor": "Shop"}),
        ))
        .unwrap();
        agg.remove_column("Vendor").unwrap();

        for row in &agg.rows {
            for key in row.data.keys() {
                assert!(key == ROW_KEY || agg.schema.contains(key));
            }
        }
    }

    #[test]
    fn test_patch_row_by_either_locator() {
        let mut agg = aggregate(&["Amount", "Vendor"]);
        agg.insert_row(doc(json!({"id": "abc", "Amount": 100, "Vendor": "Shop"})))
            .unwrap();
        let system_id = agg.rows[0].row_id.clone();

        agg.patch_row("abc", doc(json!({"Amount": 150}))).unwrap();
        let row = agg.patch_row(&system_id, doc(json!({"id": "other"}))).unwrap();

        assert_eq!(row.data["Amount"], json!(150));
        assert_eq!(row.data["Vendor"], json!("Shop"));
        assert_eq!(row.data["id"], json!("abc"));
    }

    #[test]
    fn test_delete_row_removes_exactly_one() {
        let mut agg = aggregate(&["Amount"]);
        agg.insert_row(doc(json!({"id": "r1", "Amount": 1}))).unwrap();
        agg.insert_row(doc(json!({"id": "r2", "Amount": 2}))).unwrap();

        let deleted = agg.delete_row("r1").unwrap();
        assert_eq!(deleted.data["id"], json!("r1"));
        assert_eq!(agg.rows.len(), 1);

        assert!(matches!(
            agg.delete_row("r1"),
            Err(TableError::RowNotFound(_))
        ));
    }
}
