use crate::model::{TableError, TableResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The ordered header list of one table.
///
/// Headers are unique (case-sensitive) and order is significant: it is the
/// column order every caller sees. Row-document side effects of header
/// mutations are applied by the owning aggregate, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub headers: Vec<String>,
}

impl TableSchema {
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers }
    }

    pub fn contains(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }

    /// Validate a header list supplied at table creation.
    pub fn validate_new_headers(headers: &[String]) -> TableResult<()> {
        if headers.is_empty() {
            return Err(TableError::invalid_input("'headers' must be a non-empty list of strings"));
        }
        let mut seen = HashSet::new();
        for header in headers {
            if header.trim().is_empty() {
                return Err(TableError::invalid_input("headers must not be empty strings"));
            }
            if !seen.insert(header.as_str()) {
                return Err(TableError::invalid_input(format!(
                    "duplicate header '{}' in header list",
                    header
                )));
            }
        }
        Ok(())
    }

    /// Append a header to the end of the order.
    pub fn add_header(&mut self, header: &str) -> TableResult<()> {
        if header.trim().is_empty() {
            return Err(TableError::invalid_input("header must be a non-empty string"));
        }
        if self.contains(header) {
            return Err(TableError::DuplicateHeader(header.to_string()));
        }
        self.headers.push(header.to_string());
        Ok(())
    }

    /// Replace `old` with `new` at the same ordinal position.
    ///
    /// Renaming a header to itself is a no-op success.
    pub fn rename_header(&mut self, old: &str, new: &str) -> TableResult<()> {
        if new.trim().is_empty() {
            return Err(TableError::invalid_input("new header must be a non-empty string"));
        }
        let Some(position) = self.headers.iter().position(|h| h == old) else {
            return Err(TableError::HeaderNotFound(old.to_string()));
        };
        if new == old {
            return Ok(());
        }
        if self.contains(new) {
            return Err(TableError::DuplicateHeader(new.to_string()));
        }
        self.headers[position] = new.to_string();
        Ok(())
    }

    /// Set the headers to exactly `keep` (in the caller's order), returning
    /// the headers that were removed. An empty difference is a no-op
    /// success reporting nothing removed.
    pub fn retain_headers(&mut self, keep: &[String]) -> TableResult<Vec<String>> {
        let keep_set: HashSet<&str> = keep.iter().map(String::as_str).collect();
        if keep_set.len() != keep.len() {
            return Err(TableError::invalid_input("duplicate header in keep list"));
        }
        let removed: Vec<String> = self
            .headers
            .iter()
            .filter(|h| !keep_set.contains(h.as_str()))
            .cloned()
            .collect();
        if removed.is_empty() {
            return Ok(removed);
        }
        self.headers = keep.to_vec();
        Ok(removed)
    }

    /// Remove a single header from the order.
    pub fn remove_header(&mut self, header: &str) -> TableResult<()> {
        let Some(position) = self.headers.iter().position(|h| h == header) else {
            return Err(TableError::HeaderNotFound(header.to_string()));
        };
        self.headers.remove(position);
        Ok(())
    }
}
