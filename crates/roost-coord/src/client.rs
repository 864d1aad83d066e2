//! The coordination client facade consumed by the lock protocol

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::listener::ChildListener;

/// How a node is created in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Plain node, survives the creating session.
    Persistent,
    /// Survives the creating session; the store appends a per-parent
    /// monotonic sequence number to the node name.
    PersistentSequential,
    /// Removed automatically when the creating session ends.
    Ephemeral,
    /// Ephemeral, with a store-assigned sequence suffix. Lock membership
    /// nodes use this mode.
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral | Self::EphemeralSequential)
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::PersistentSequential | Self::EphemeralSequential)
    }
}

/// Token identifying one registered child-change subscription.
///
/// Minted by the client implementation; opaque to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Narrow async interface to a hierarchical, watchable coordination store.
///
/// One client is shared across many lock instances; implementations must be
/// safe for concurrent use. Child-change notifications are delivered on a
/// task owned by the client, never on a caller's stack.
#[async_trait]
pub trait CoordClient: Send + Sync {
    /// Whether a node exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Create a node and return its actual full path. For sequential modes
    /// the returned path embeds the assigned sequence suffix.
    async fn create(&self, path: &str, payload: Vec<u8>, mode: CreateMode) -> Result<String>;

    /// Read the payload stored at `path`.
    async fn read_data(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete a node. `Ok(true)` if it was removed, `Ok(false)` if it did
    /// not exist.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// List the direct children of `path` (leaf names, lexically ordered).
    async fn get_children(&self, path: &str) -> Result<Vec<String>>;

    /// Register a listener for child changes under `path`.
    async fn subscribe_child_changes(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> Result<SubscriptionId>;

    /// Remove a previously registered listener. Unknown ids are ignored.
    async fn unsubscribe_child_changes(&self, path: &str, id: SubscriptionId) -> Result<()>;
}
