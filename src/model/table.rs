use crate::model::{generate_id, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata record for one user-defined table.
///
/// The header list and row documents live in the table's aggregate; this
/// record carries ownership, sharing and the caller-managed pending counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: Id,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Opaque counter managed entirely by callers (the UI tracks items
    /// awaiting categorization in it). The store never interprets it.
    pub pending_count: i64,
    pub is_shared: bool,
    pub shared_with: Vec<Id>,
}

impl Table {
    pub fn new(owner_id: Id, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            name,
            description,
            owner_id,
            created_at: now,
            modified_at: now,
            pending_count: 0,
            is_shared: false,
            shared_with: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Keep `is_shared` consistent with the shared_with set. Called after
    /// every sharing mutation.
    pub fn recompute_shared_flag(&mut self) {
        self.is_shared = !self.shared_with.is_empty();
    }

    pub fn is_owned_by(&self, principal_id: &str) -> bool {
        self.owner_id == principal_id
    }

    pub fn is_shared_with(&self, principal_id: &str) -> bool {
        self.shared_with.iter().any(|p| p == principal_id)
    }

    /// Apply a partial metadata update, reporting whether any recognized
    /// field was actually supplied.
    pub fn apply_update(&mut self, update: TableUpdate) -> bool {
        let mut updated = false;
        if let Some(name) = update.name {
            self.name = name;
            updated = true;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
            updated = true;
        }
        if let Some(pending_count) = update.pending_count {
            self.pending_count = pending_count;
            updated = true;
        }
        if updated {
            self.touch();
        }
        updated
    }
}

/// Input model for table creation; id and timestamps are set server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub headers: Vec<String>,
}

/// Partial metadata update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareAction {
    Share,
    Unshare,
}

/// Per-table statistics surfaced by the read facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub table_id: Id,
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub pending_count: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_starts_private_with_zero_pending() {
        let table = Table::new("user-1".to_string(), "Expenses".to_string(), None);
        assert_eq!(table.pending_count, 0);
        assert!(!table.is_shared);
        assert!(table.shared_with.is_empty());
        assert!(table.is_owned_by("user-1"));
        assert!(!table.is_owned_by("user-2"));
    }

    #[test]
    fn test_apply_update_reports_no_change_for_empty_patch() {
        let mut table = Table::new("user-1".to_string(), "Expenses".to_string(), None);
        assert!(!table.apply_update(TableUpdate::default()));

        let updated = table.apply_update(TableUpdate {
            name: Some("Budget".to_string()),
            ..Default::default()
        });
        assert!(updated);
        assert_eq!(table.name, "Budget");
    }

    #[test]
    fn test_shared_flag_tracks_shared_with() {
        let mut table = Table::new("user-1".to_string(), "Expenses".to_string(), None);
        table.shared_with.push("user-2".to_string());
        table.recompute_shared_flag();
        assert!(table.is_shared);
        assert!(table.is_shared_with("user-2"));

        table.shared_with.clear();
        table.recompute_shared_flag();
        assert!(!table.is_shared);
    }
}
