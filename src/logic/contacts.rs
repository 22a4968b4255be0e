use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Seam to the contact graph consulted by sharing.
///
/// A table may only be shared with principals that are mutually-connected
/// contacts of the owner. The graph itself lives in the user service; the
/// store consumes it through this trait.
#[async_trait::async_trait]
pub trait ContactGraph: Send + Sync {
    async fn are_connected(&self, a: &str, b: &str) -> Result<bool>;
}

/// In-memory contact graph for tests and single-process wiring.
#[derive(Debug, Default)]
pub struct StaticContacts {
    pairs: RwLock<HashSet<(String, String)>>,
}

impl StaticContacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, a: &str, b: &str) {
        let mut pairs = self.pairs.write();
        pairs.insert(Self::pair(a, b));
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }
}

#[async_trait::async_trait]
impl ContactGraph for StaticContacts {
    async fn are_connected(&self, a: &str, b: &str) -> Result<bool> {
        let pairs = self.pairs.read();
        Ok(pairs.contains(&Self::pair(a, b)))
    }
}

/// Contact graph that treats every pair as connected. Stand-in for the
/// user service in deployments that have not wired one up.
#[derive(Debug, Default)]
pub struct OpenContacts;

#[async_trait::async_trait]
impl ContactGraph for OpenContacts {
    async fn are_connected(&self, _a: &str, _b: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_contacts_are_symmetric() {
        let contacts = StaticContacts::new();
        contacts.connect("alice", "bob");

        assert!(contacts.are_connected("alice", "bob").await.unwrap());
        assert!(contacts.are_connected("bob", "alice").await.unwrap());
        assert!(!contacts.are_connected("alice", "carol").await.unwrap());
    }
}
