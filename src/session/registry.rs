//! Client registry
//!
//! The single serialization point for membership. Every mutation and every
//! snapshot goes through the mutex-guarded map here; no other component
//! touches the client set.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::RegistryError;
use crate::session::SessionHandle;

/// The set of identifier-to-session bindings for clients that have completed
/// the connect handshake. At most one live session per identifier.
pub struct Registry {
    capacity: usize,
    clients: Mutex<HashMap<String, SessionHandle>>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Atomic test-and-insert.
    ///
    /// Fails if the identifier is already bound or the registry is at
    /// capacity. On success, returns the handles of the members registered
    /// immediately before the insert: the caller uses that set both for the
    /// accept reply (which must not include the new member) and for the
    /// new-client broadcast (which must reach exactly the prior members).
    pub async fn add(&self, handle: SessionHandle) -> Result<Vec<SessionHandle>, RegistryError> {
        let mut clients = self.clients.lock().await;
        if clients.len() >= self.capacity {
            return Err(RegistryError::Full(self.capacity));
        }
        if clients.contains_key(handle.id()) {
            return Err(RegistryError::IdTaken(handle.id().to_string()));
        }
        let prior = clients.values().cloned().collect();
        clients.insert(handle.id().to_string(), handle);
        Ok(prior)
    }

    /// Removes a binding. Returns the handle if the identifier was bound.
    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.clients.lock().await.remove(id)
    }

    /// Returns the session bound to `id` for point-to-point delivery.
    pub async fn lookup(&self, id: &str) -> Option<SessionHandle> {
        self.clients.lock().await.get(id).cloned()
    }

    /// Consistent point-in-time set of all bound identifiers.
    pub async fn snapshot_ids(&self) -> Vec<String> {
        self.clients.lock().await.keys().cloned().collect()
    }

    /// Consistent point-in-time set of all bound sessions.
    pub async fn snapshot(&self) -> Vec<SessionHandle> {
        self.clients.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn handle(id: &str) -> SessionHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        SessionHandle::new(id, tx)
    }

    #[tokio::test]
    async fn add_returns_the_prior_member_set() {
        let registry = Registry::new(16);

        let prior = registry.add(handle("alice")).await.unwrap();
        assert!(prior.is_empty());

        let prior = registry.add(handle("bob")).await.unwrap();
        let ids: Vec<&str> = prior.iter().map(SessionHandle::id).collect();
        assert_eq!(ids, ["alice"]);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn duplicate_identifier_is_rejected_until_removed() {
        let registry = Registry::new(16);
        registry.add(handle("alice")).await.unwrap();

        let result = registry.add(handle("alice")).await;
        assert!(matches!(result, Err(RegistryError::IdTaken(_))));
        assert_eq!(registry.len().await, 1);

        registry.remove("alice").await.unwrap();
        assert!(registry.add(handle("alice")).await.is_ok());
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let registry = Registry::new(2);
        registry.add(handle("alice")).await.unwrap();
        registry.add(handle("bob")).await.unwrap();

        let result = registry.add(handle("carol")).await;
        assert!(matches!(result, Err(RegistryError::Full(2))));
    }

    #[tokio::test]
    async fn removed_identifier_is_no_longer_routable() {
        let registry = Registry::new(16);
        registry.add(handle("alice")).await.unwrap();

        assert!(registry.lookup("alice").await.is_some());
        registry.remove("alice").await;
        assert!(registry.lookup("alice").await.is_none());
        assert!(registry.snapshot_ids().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_adds_never_bind_one_identifier_twice() {
        let registry = Arc::new(Registry::new(64));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.add(handle("alice")).await.is_ok()
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.len().await, 1);
    }
}
