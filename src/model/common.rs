use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Generate the short key stored under a row document's "id" entry when the
/// caller did not supply one. Eight hex chars is the convention the agent
/// callers already rely on for display and follow-up locators.
pub fn generate_row_key() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
