//! Common test utilities for the lock protocol suites
//!
//! All suites run against the in-memory store, which delivers child-change
//! notifications on its own task exactly like a remote store would.

use std::sync::Arc;
use std::time::Duration;

use roost_coord::{CoordClient, CreateMode, MemoryCoordStore};

/// Stand up a store with `path` (and its ancestors) pre-created.
pub async fn store_with_path(path: &str) -> MemoryCoordStore {
    let store = MemoryCoordStore::new();
    let admin = store.client();
    let mut prefix = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);
        admin
            .create(&prefix, Vec::new(), CreateMode::Persistent)
            .await
            .expect("pre-create lock path");
    }
    store
}

/// Open a fresh session against the store as a trait object.
pub fn client_of(store: &MemoryCoordStore) -> Arc<dyn CoordClient> {
    Arc::new(store.client())
}

/// Poll until `path` has exactly `len` children; panics after five seconds.
pub async fn wait_for_children(client: &Arc<dyn CoordClient>, path: &str, len: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let count = client.get_children(path).await.expect("get_children").len();
        if count == len {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "queue under {} never reached {} entries (saw {})",
            path,
            len,
            count
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
