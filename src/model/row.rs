use crate::model::{generate_id, Id};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The conventional document key callers use as an application-level row
/// identifier. It is exempt from header enforcement and write-protected
/// once set; it is NOT the system row_id.
pub const ROW_KEY: &str = "id";

/// One schemaless row document.
///
/// `row_id` is system-assigned and stable for the row's lifetime. The
/// document may additionally carry its own identifier under `ROW_KEY`; the
/// two identifier spaces are distinct and both usable as locators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_id: Id,
    pub data: Map<String, Value>,
}

impl Row {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            row_id: generate_id(),
            data,
        }
    }

    /// The value under the document's "id" key, stringified for comparison
    /// against locators (callers send both `"7"` and `7`).
    pub fn embedded_key(&self) -> Option<String> {
        self.data.get(ROW_KEY).map(value_to_locator_string)
    }

    pub fn matches_locator(&self, locator: &str) -> bool {
        if self.row_id == locator {
            return true;
        }
        self.embedded_key().as_deref() == Some(locator)
    }

    /// Merge-patch: patch keys overwrite, absent keys are preserved, and
    /// the original "id" value survives even if the patch carries another.
    pub fn merge_patch(&mut self, patch: Map<String, Value>) {
        let original_key = self.data.get(ROW_KEY).cloned();
        for (key, value) in patch {
            self.data.insert(key, value);
        }
        if let Some(original) = original_key {
            self.data.insert(ROW_KEY.to_string(), original);
        }
    }

    /// The document as surfaced at the read boundary, with the system
    /// row_id merged in for caller convenience.
    pub fn annotated_data(&self) -> Map<String, Value> {
        let mut data = self.data.clone();
        data.insert("row_id".to_string(), Value::String(self.row_id.clone()));
        data
    }
}

fn value_to_locator_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
