//! In-memory coordination store
//!
//! A single-process implementation of [`CoordClient`] with real session
//! semantics: per-client session ids, ephemeral-node reaping on session
//! expiry, per-parent monotonic sequence counters, and a dedicated delivery
//! task so child-change notifications never run on a mutator's call stack.
//!
//! Used by the test suites and by embedders that want lock semantics without
//! an external store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{CoordClient, CreateMode, SubscriptionId};
use crate::error::{CoordError, Result};
use crate::listener::ChildListener;

/// Width of the zero-padded sequence suffix appended by sequential creates.
const SEQUENCE_WIDTH: usize = 10;

struct Node {
    payload: Vec<u8>,
    /// Session id of the creator for ephemeral nodes.
    ephemeral_owner: Option<u64>,
}

struct StoreInner {
    /// Full path -> node.
    nodes: DashMap<String, Node>,
    /// Parent path -> next sequence number for sequential creates.
    counters: DashMap<String, u64>,
    /// Parent path -> registered child-change listeners.
    watchers: DashMap<String, Vec<(SubscriptionId, Arc<dyn ChildListener>)>>,
    next_subscription: AtomicU64,
    next_session: AtomicU64,
}

impl StoreInner {
    fn node_exists(&self, path: &str) -> bool {
        path == "/" || self.nodes.contains_key(path)
    }

    fn children_of(&self, parent: &str) -> Vec<String> {
        let prefix = if parent == "/" {
            "/".to_string()
        } else {
            format!("{}/", parent)
        };
        let mut names: Vec<String> = self
            .nodes
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(&prefix)?;
                (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
            })
            .collect();
        names.sort();
        names
    }
}

/// Split an absolute path into (parent path, leaf name).
fn split_path(path: &str) -> Result<(String, String)> {
    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') || path.contains("//") {
        return Err(CoordError::BadPath(path.to_string()));
    }
    let Some(idx) = path.rfind('/') else {
        return Err(CoordError::BadPath(path.to_string()));
    };
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Ok((parent.to_string(), path[idx + 1..].to_string()))
}

/// Drains queued parent paths and notifies their listeners with the live
/// child list. Runs until every sender handle is dropped.
async fn delivery_loop(inner: Arc<StoreInner>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(parent) = rx.recv().await {
        // Clone listeners out so callbacks never run under the map guard.
        let listeners: Vec<Arc<dyn ChildListener>> = match inner.watchers.get(&parent) {
            Some(entry) => entry.iter().map(|(_, l)| l.clone()).collect(),
            None => continue,
        };
        let children = inner.children_of(&parent);
        for listener in listeners {
            listener.on_children_changed(&parent, &children);
        }
    }
    debug!("watch delivery task stopped");
}

/// Shared in-memory store. Hand out one [`MemoryCoordClient`] per logical
/// process via [`MemoryCoordStore::client`].
pub struct MemoryCoordStore {
    inner: Arc<StoreInner>,
    events: mpsc::UnboundedSender<String>,
}

impl MemoryCoordStore {
    /// Create a store and spawn its watch-delivery task. Must be called from
    /// within a tokio runtime.
    pub fn new() -> Self {
        let inner = Arc::new(StoreInner {
            nodes: DashMap::new(),
            counters: DashMap::new(),
            watchers: DashMap::new(),
            next_subscription: AtomicU64::new(0),
            next_session: AtomicU64::new(1),
        });
        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(delivery_loop(inner.clone(), rx));
        Self { inner, events }
    }

    /// Open a client with its own session.
    pub fn client(&self) -> MemoryCoordClient {
        let session = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        MemoryCoordClient {
            inner: self.inner.clone(),
            events: self.events.clone(),
            session: AtomicU64::new(session),
        }
    }
}

impl Default for MemoryCoordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One session against a [`MemoryCoordStore`].
pub struct MemoryCoordClient {
    inner: Arc<StoreInner>,
    events: mpsc::UnboundedSender<String>,
    session: AtomicU64,
}

impl MemoryCoordClient {
    /// The current session id.
    pub fn session_id(&self) -> u64 {
        self.session.load(Ordering::Relaxed)
    }

    /// Simulate the server expiring this client's session: every ephemeral
    /// node it created is removed and child-change notifications fire for
    /// each affected parent. The client then continues under a fresh session,
    /// as a reconnecting client would.
    pub fn expire_session(&self) {
        let fresh = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let old = self.session.swap(fresh, Ordering::Relaxed);

        let doomed: Vec<String> = self
            .inner
            .nodes
            .iter()
            .filter(|entry| entry.value().ephemeral_owner == Some(old))
            .map(|entry| entry.key().clone())
            .collect();

        let mut parents: Vec<String> = Vec::new();
        for path in doomed {
            if self.inner.nodes.remove(&path).is_some()
                && let Ok((parent, _)) = split_path(&path)
                && !parents.contains(&parent)
            {
                parents.push(parent);
            }
        }
        for parent in &parents {
            let _ = self.events.send(parent.clone());
        }
        warn!(
            "session {} expired, ephemeral nodes reaped under {} parent(s)",
            old,
            parents.len()
        );
    }
}

#[async_trait]
impl CoordClient for MemoryCoordClient {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.inner.node_exists(path))
    }

    async fn create(&self, path: &str, payload: Vec<u8>, mode: CreateMode) -> Result<String> {
        let (parent, name) = split_path(path)?;
        if !self.inner.node_exists(&parent) {
            return Err(CoordError::NoNode(parent));
        }

        let actual_name = if mode.is_sequential() {
            let seq = {
                let mut counter = self.inner.counters.entry(parent.clone()).or_insert(0);
                let seq = *counter;
                *counter += 1;
                seq
            };
            format!("{}{:0width$}", name, seq, width = SEQUENCE_WIDTH)
        } else {
            name
        };
        let full = if parent == "/" {
            format!("/{}", actual_name)
        } else {
            format!("{}/{}", parent, actual_name)
        };

        let ephemeral_owner = mode
            .is_ephemeral()
            .then(|| self.session.load(Ordering::Relaxed));
        match self.inner.nodes.entry(full.clone()) {
            Entry::Occupied(_) => return Err(CoordError::NodeExists(full)),
            Entry::Vacant(vacant) => {
                vacant.insert(Node {
                    payload,
                    ephemeral_owner,
                });
            }
        }

        let _ = self.events.send(parent);
        debug!("created node: path={}", full);
        Ok(full)
    }

    async fn read_data(&self, path: &str) -> Result<Vec<u8>> {
        self.inner
            .nodes
            .get(path)
            .map(|node| node.payload.clone())
            .ok_or_else(|| CoordError::NoNode(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let (parent, _) = split_path(path)?;
        if self.inner.nodes.remove(path).is_none() {
            return Ok(false);
        }
        let _ = self.events.send(parent);
        debug!("deleted node: path={}", path);
        Ok(true)
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        if !self.inner.node_exists(path) {
            return Err(CoordError::NoNode(path.to_string()));
        }
        Ok(self.inner.children_of(path))
    }

    async fn subscribe_child_changes(
        &self,
        path: &str,
        listener: Arc<dyn ChildListener>,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .watchers
            .entry(path.to_string())
            .or_default()
            .push((id, listener));
        debug!("subscribed to child changes: path={}, id={}", path, id.0);
        Ok(id)
    }

    async fn unsubscribe_child_changes(&self, path: &str, id: SubscriptionId) -> Result<()> {
        if let Some(mut entry) = self.inner.watchers.get_mut(path) {
            entry.retain(|(sid, _)| *sid != id);
        }
        debug!("unsubscribed from child changes: path={}, id={}", path, id.0);
        Ok(())
    }
}
