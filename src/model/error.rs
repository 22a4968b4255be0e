use crate::model::Id;
use thiserror::Error;

/// Every failure a table operation can surface to a caller.
///
/// Variants are terminal: nothing inside the store retries. Each carries
/// enough detail for an automated caller to self-correct without a human
/// in the loop (current headers on schema violations, the locator forms on
/// row misses).
#[derive(Error, Debug)]
pub enum TableError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("table '{0}' not found")]
    TableNotFound(Id),

    #[error("header '{0}' not found in table")]
    HeaderNotFound(String),

    #[error("no row matching locator '{0}' (tried system row_id, then the row's 'id' value)")]
    RowNotFound(String),

    #[error("header '{0}' already exists in table")]
    DuplicateHeader(String),

    #[error("row keys do not match table headers: {}", .unknown.join(", "))]
    UnknownColumns {
        unknown: Vec<String>,
        expected_headers: Vec<String>,
    },

    #[error("not permitted for the requesting user")]
    Forbidden,

    #[error("no valid fields provided to update")]
    NoChange,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type TableResult<T> = std::result::Result<T, TableError>;

impl TableError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable machine-readable kind, used by the HTTP layer and useful in
    /// structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::TableNotFound(_) => "table_not_found",
            Self::HeaderNotFound(_) => "header_not_found",
            Self::RowNotFound(_) => "row_not_found",
            Self::DuplicateHeader(_) => "duplicate_header",
            Self::UnknownColumns { .. } => "unknown_columns",
            Self::Forbidden => "forbidden",
            Self::NoChange => "no_change",
            Self::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_columns_message_lists_offenders() {
        let err = TableError::UnknownColumns {
            unknown: vec!["Vendor".to_string(), "Notes".to_string()],
            expected_headers: vec!["Date".to_string(), "Amount".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Vendor"));
        assert!(msg.contains("Notes"));
        assert_eq!(err.kind(), "unknown_columns");
    }

    #[test]
    fn test_storage_errors_wrap_transparently() {
        let err: TableError = anyhow::anyhow!("connection refused").into();
        assert_eq!(err.kind(), "storage");
        assert!(err.to_string().contains("connection refused"));
    }
}
