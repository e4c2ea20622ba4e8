use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::client::{Client, DeliveryError, Frame};
use crate::metrics::WsMetrics;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client id is empty")]
    EmptyId,
    #[error("client {0} already registered")]
    DuplicateId(String),
    #[error("client {0} not registered")]
    NotFound(String),
}

/// Directory of live connections.
///
/// The only structure mutated from many connection tasks. Reads (broadcast,
/// unicast, counts) share the lock; inserts and removals are exclusive.
/// Delivery never blocks: a full mailbox drops that one message for that
/// one recipient.
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<String, Client>>,
    metrics: Arc<WsMetrics>,
}

impl ConnectionRegistry {
    pub fn new(metrics: Arc<WsMetrics>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Client>> {
        match self.clients.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("connection registry lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Client>> {
        match self.clients.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("connection registry lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn add_client(&self, client: Client) -> Result<(), RegistryError> {
        if client.id().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        let mut clients = self.write();
        if clients.contains_key(client.id()) {
            return Err(RegistryError::DuplicateId(client.id().to_string()));
        }
        tracing::info!(client_id = client.id(), total = clients.len() + 1, "client registered");
        clients.insert(client.id().to_string(), client);
        Ok(())
    }

    /// Deregisters `id` and cancels its write pump.
    pub fn remove_connection(&self, id: &str) -> Result<(), RegistryError> {
        let removed = self.write().remove(id);
        let client = removed.ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        client.cancel();
        tracing::info!(client_id = id, "client removed");
        Ok(())
    }

    /// Enqueues `frame` for every registered client and returns how many
    /// accepted it.
    pub fn broadcast(&self, frame: impl Into<Frame>) -> usize {
        let frame = frame.into();
        let clients = self.read();
        clients
            .values()
            .filter(|client| self.deliver(client, frame.clone()))
            .count()
    }

    /// Enqueues `frame` for one client. Returns false if it is unknown or its
    /// mailbox is full.
    pub fn send_to(&self, id: &str, frame: impl Into<Frame>) -> bool {
        let clients = self.read();
        match clients.get(id) {
            Some(client) => self.deliver(client, frame.into()),
            None => false,
        }
    }

    fn deliver(&self, client: &Client, frame: Frame) -> bool {
        match client.try_deliver(frame) {
            Ok(()) => true,
            Err(DeliveryError::Full) => {
                self.metrics.inc_mailbox_full();
                tracing::warn!(client_id = client.id(), "mailbox full, dropping message");
                false
            }
            Err(DeliveryError::Closed) => {
                tracing::debug!(client_id = client.id(), "mailbox closed");
                false
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.read().len()
    }

    /// Snapshot of registered ids.
    pub fn connections(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Cancels and drops every client. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Client> = self.write().drain().map(|(_, client)| client).collect();
        for client in &drained {
            client.cancel();
        }
        tracing::info!(count = drained.len(), "closed all connections");
        drained.len()
    }
}
