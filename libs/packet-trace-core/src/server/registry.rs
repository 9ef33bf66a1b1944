//! Registry of connected clients
//!
//! Owns every live [`ClientSession`]. Iteration follows connection order.

use crate::port_filter::PortNumber;
use crate::session::ClientSession;
use crate::traits::{ClientId, SocketId, TraceStream};

/// Monotonic client ID source
#[derive(Debug, Default)]
pub struct ClientIdGenerator(u64);

impl ClientIdGenerator {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn generate(&mut self) -> ClientId {
        self.0 += 1;
        ClientId(self.0)
    }
}

pub struct ClientRegistry<S: TraceStream> {
    sessions: Vec<ClientSession<S>>,
    id_gen: ClientIdGenerator,
}

impl<S: TraceStream> ClientRegistry<S> {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            id_gen: ClientIdGenerator::new(),
        }
    }

    /// Reserve the ID for a connection about to be registered
    pub fn next_id(&mut self) -> ClientId {
        self.id_gen.generate()
    }

    /// Add a session; a session whose ID is already present is handed back
    pub fn insert(&mut self, session: ClientSession<S>) -> Result<(), ClientSession<S>> {
        if self.contains(session.id()) {
            return Err(session);
        }
        self.sessions.push(session);
        Ok(())
    }

    pub fn remove(&mut self, id: ClientId) -> Option<ClientSession<S>> {
        let idx = self.sessions.iter().position(|s| s.id() == id)?;
        Some(self.sessions.remove(idx))
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.sessions.iter().any(|s| s.id() == id)
    }

    pub fn get(&self, id: ClientId) -> Option<&ClientSession<S>> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut ClientSession<S>> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession<S>> {
        self.sessions.iter()
    }

    /// Sessions whose filter contains `port`, in connection order
    pub fn subscribed_mut(
        &mut self,
        port: PortNumber,
    ) -> impl Iterator<Item = &mut ClientSession<S>> {
        self.sessions
            .iter_mut()
            .filter(move |s| s.is_subscribed(port))
    }

    /// True as soon as one session subscribes to `port`
    pub fn any_subscribed(&self, port: PortNumber) -> bool {
        self.sessions.iter().any(|s| s.is_subscribed(port))
    }

    pub fn subscriber_count(&self, port: PortNumber) -> usize {
        self.sessions.iter().filter(|s| s.is_subscribed(port)).count()
    }

    pub fn socket_ids(&self) -> Vec<SocketId> {
        self.sessions.iter().map(|s| s.socket_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S: TraceStream> Default for ClientRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockStream;

    fn new_session(registry: &mut ClientRegistry<MockStream>, fd: SocketId) -> ClientId {
        let id = registry.next_id();
        let session = ClientSession::new(id, MockStream::with_socket_id(fd), 1024, 1024);
        assert!(registry.insert(session).is_ok());
        id
    }

    #[test]
    fn test_id_generation() {
        let mut gen = ClientIdGenerator::new();
        let id1 = gen.generate();
        let id2 = gen.generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_registry_default() {
        let registry = ClientRegistry::<MockStream>::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(!registry.any_subscribed(0));
    }

    #[test]
    fn test_insertion_order() {
        let mut registry = ClientRegistry::new();
        let a = new_session(&mut registry, 7);
        let b = new_session(&mut registry, 5);
        let c = new_session(&mut registry, 9);

        let ids: Vec<_> = registry.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(registry.socket_ids(), vec![7, 5, 9]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut registry = ClientRegistry::new();
        let a = new_session(&mut registry, 7);
        let b = new_session(&mut registry, 5);
        let c = new_session(&mut registry, 9);

        assert!(registry.remove(b).is_some());
        assert!(registry.remove(b).is_none());
        let ids: Vec<_> = registry.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(!registry.contains(b));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut registry = ClientRegistry::new();
        let id = new_session(&mut registry, 7);
        let duplicate = ClientSession::new(id, MockStream::with_socket_id(8), 1024, 1024);
        assert!(registry.insert(duplicate).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_subscription_queries() {
        let mut registry = ClientRegistry::new();
        let a = new_session(&mut registry, 7);
        let _b = new_session(&mut registry, 8);

        let stream = MockStream::new();
        stream.push_inbound(b"add port 5\n");
        let c = registry.next_id();
        let mut session = ClientSession::new(c, stream, 1024, 1024);
        session.on_ready(crate::traits::Readiness::readable());
        registry.insert(session).unwrap_or_else(|_| panic!("duplicate"));

        assert!(registry.any_subscribed(5));
        assert!(!registry.any_subscribed(6));
        assert_eq!(registry.subscriber_count(5), 1);
        let matched: Vec<_> = registry.subscribed_mut(5).map(|s| s.id()).collect();
        assert_eq!(matched, vec![c]);
        assert!(registry.get(a).is_some());
        assert!(registry.get_mut(c).is_some());
    }
}
