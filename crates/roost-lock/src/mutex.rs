//! The distributed mutex
//!
//! One `DistributedMutex` is one acquisition lifecycle: construct it against
//! a pre-existing lock path, acquire, do the guarded work, release. The
//! borrow checker enforces single-attempt-at-a-time use (`acquire` and
//! `release` take `&mut self`); tasks wanting the same lock each build their
//! own instance over the shared client.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use roost_coord::{ChildListener, CoordClient, CoordError, CreateMode, SubscriptionId};

use crate::error::{LockError, Result};
use crate::rank;

/// Name stem of membership nodes; the store appends the sequence digits.
const MEMBER_STEM: &str = "member-";

/// State shared between an instance and its notification listener.
///
/// `member` is the child name of the current attempt's membership node;
/// `gate` is the attempt's single-permit wake channel. Both are `None`
/// outside an attempt, which makes late notifications no-ops.
#[derive(Default)]
struct AttemptState {
    member: Mutex<Option<String>>,
    gate: Mutex<Option<mpsc::Sender<()>>>,
}

/// Child-change handler: re-evaluates this instance's rank against the full
/// delivered sibling set and releases the gate when the rank has become
/// lowest. Runs on the store's delivery task, so it only checks and signals.
struct RankListener {
    state: Arc<AttemptState>,
}

impl ChildListener for RankListener {
    fn on_children_changed(&self, _parent_path: &str, children: &[String]) {
        let member = self.state.member.lock().clone();
        let Some(member) = member else {
            return;
        };
        if rank::is_lowest(&member, children)
            && let Some(gate) = self.state.gate.lock().as_ref()
        {
            // A full channel means a wake is already pending; redundant
            // notifications collapse into the one permit.
            let _ = gate.try_send(());
        }
    }
}

/// A fair distributed mutex over a watchable coordination store.
///
/// At any instant the contender whose membership node carries the smallest
/// sequence number under the lock path owns the lock. Waiters are woken by
/// child-change notifications, never by polling.
pub struct DistributedMutex {
    client: Arc<dyn CoordClient>,
    lock_path: String,
    payload: Vec<u8>,
    state: Arc<AttemptState>,
    subscription: SubscriptionId,
}

impl std::fmt::Debug for DistributedMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedMutex")
            .field("lock_path", &self.lock_path)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl DistributedMutex {
    /// Create an instance for `lock_path` and register its child-change
    /// subscription.
    ///
    /// The lock path must already exist; a missing path is a configuration
    /// error surfaced as [`LockError::NoSuchPath`], never papered over by
    /// auto-creation.
    pub async fn new(client: Arc<dyn CoordClient>, lock_path: impl Into<String>) -> Result<Self> {
        let lock_path = lock_path.into();
        if !client.exists(&lock_path).await? {
            return Err(LockError::NoSuchPath(lock_path));
        }

        let state = Arc::new(AttemptState::default());
        let listener = Arc::new(RankListener {
            state: state.clone(),
        });
        let subscription = client.subscribe_child_changes(&lock_path, listener).await?;
        debug!("watching lock path: {}", lock_path);

        Ok(Self {
            client,
            lock_path,
            payload: Vec::new(),
            state,
            subscription,
        })
    }

    /// Attach opaque payload bytes to the membership node created by the next
    /// acquisition, e.g. a diagnostic identity of the would-be holder. Has no
    /// effect on the protocol.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// The lock path this instance competes under.
    pub fn lock_path(&self) -> &str {
        &self.lock_path
    }

    /// Child name of the current membership node, if an attempt created one.
    pub fn member_name(&self) -> Option<String> {
        self.state.member.lock().clone()
    }

    /// Acquire the lock, waiting indefinitely. Returns `Ok(true)` once the
    /// lock is held.
    pub async fn acquire(&mut self) -> Result<bool> {
        self.acquire_inner(None).await
    }

    /// Acquire the lock, waiting at most `timeout`. Returns `Ok(false)` when
    /// the window elapses first; the attempt's membership node stays behind
    /// until [`release`](Self::release) or session end removes it.
    pub async fn acquire_timeout(&mut self, timeout: Duration) -> Result<bool> {
        self.acquire_inner(Some(timeout)).await
    }

    async fn acquire_inner(&mut self, timeout: Option<Duration>) -> Result<bool> {
        if self.state.member.lock().is_some() {
            warn!(
                "acquire on {} with a membership node already present; release the previous attempt first",
                self.lock_path
            );
        }

        // Fresh gate per attempt: a stale permit from an earlier attempt can
        // never leak into this one. Installed before the node exists so no
        // notification between creation and the first rank check is missed.
        let (gate, mut wake) = mpsc::channel(1);
        *self.state.gate.lock() = Some(gate);

        let stem = format!("{}/{}", self.lock_path, MEMBER_STEM);
        let created = match self
            .client
            .create(&stem, self.payload.clone(), CreateMode::EphemeralSequential)
            .await
        {
            Ok(path) => path,
            Err(err @ (CoordError::ConnectionLoss(_) | CoordError::SessionExpired)) => {
                // The node may or may not exist now; a blind retry could
                // enqueue two membership nodes for one logical attempt.
                *self.state.gate.lock() = None;
                return Err(LockError::AmbiguousCreate(err));
            }
            Err(err) => {
                *self.state.gate.lock() = None;
                return Err(err.into());
            }
        };
        let member = created
            .rsplit('/')
            .next()
            .unwrap_or(created.as_str())
            .to_string();
        *self.state.member.lock() = Some(member.clone());

        let siblings = self.client.get_children(&self.lock_path).await?;
        if rank::is_lowest(&member, &siblings) {
            *self.state.gate.lock() = None;
            debug!("acquired {} immediately as {}", self.lock_path, member);
            return Ok(true);
        }

        let acquired = match timeout {
            None => match wake.recv().await {
                Some(()) => true,
                None => {
                    *self.state.gate.lock() = None;
                    return Err(LockError::WaitInterrupted);
                }
            },
            Some(window) => match tokio::time::timeout(window, wake.recv()).await {
                Ok(Some(())) => true,
                Ok(None) => {
                    *self.state.gate.lock() = None;
                    return Err(LockError::WaitInterrupted);
                }
                Err(_elapsed) => false,
            },
        };
        *self.state.gate.lock() = None;

        if acquired {
            debug!("acquired {} as {}", self.lock_path, member);
        } else {
            debug!("timed out waiting for {} as {}", self.lock_path, member);
        }
        Ok(acquired)
    }

    /// Release the lock: unsubscribe the change listener, then delete the
    /// membership node.
    ///
    /// `Ok(false)` means the node was already gone, which is the expected
    /// outcome when the session died first and the store reaped the node;
    /// the crash already released the lock. Also safe after a failed or
    /// timed-out acquisition, where it cleans up the leftover node.
    pub async fn release(&mut self) -> Result<bool> {
        self.client
            .unsubscribe_child_changes(&self.lock_path, self.subscription)
            .await?;
        *self.state.gate.lock() = None;

        let member = self.state.member.lock().take();
        let Some(member) = member else {
            debug!("release on {} with no membership node", self.lock_path);
            return Ok(false);
        };
        let node_path = format!("{}/{}", self.lock_path, member);
        let deleted = self.client.delete(&node_path).await?;
        if deleted {
            debug!("released {}", node_path);
        } else {
            debug!("{} already gone, session released it", node_path);
        }
        Ok(deleted)
    }

    /// All membership nodes currently queued under the lock path, in true
    /// acquisition order (numeric by sequence suffix). Diagnostic only; an
    /// absent path yields an empty list rather than an error.
    pub async fn participants(&self) -> Result<Vec<String>> {
        let mut names = match self.client.get_children(&self.lock_path).await {
            Ok(names) => names,
            Err(CoordError::NoNode(_)) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        rank::sort_by_rank(&mut names);
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roost_coord::{MemoryCoordStore, Result as CoordResult};

    #[tokio::test]
    async fn test_missing_lock_path_is_fatal() {
        let store = MemoryCoordStore::new();
        let client: Arc<dyn CoordClient> = Arc::new(store.client());

        let err = DistributedMutex::new(client, "/locks/res1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NoSuchPath(path) if path == "/locks/res1"));
    }

    /// Client whose creates always fail mid-flight with a connection loss.
    struct DisconnectingClient;

    #[async_trait]
    impl CoordClient for DisconnectingClient {
        async fn exists(&self, _path: &str) -> CoordResult<bool> {
            Ok(true)
        }

        async fn create(
            &self,
            _path: &str,
            _payload: Vec<u8>,
            _mode: CreateMode,
        ) -> CoordResult<String> {
            Err(CoordError::ConnectionLoss("connection reset".to_string()))
        }

        async fn read_data(&self, path: &str) -> CoordResult<Vec<u8>> {
            Err(CoordError::NoNode(path.to_string()))
        }

        async fn delete(&self, _path: &str) -> CoordResult<bool> {
            Ok(false)
        }

        async fn get_children(&self, _path: &str) -> CoordResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn subscribe_child_changes(
            &self,
            _path: &str,
            _listener: Arc<dyn ChildListener>,
        ) -> CoordResult<SubscriptionId> {
            Ok(SubscriptionId(0))
        }

        async fn unsubscribe_child_changes(
            &self,
            _path: &str,
            _id: SubscriptionId,
        ) -> CoordResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_disconnect_during_create_is_ambiguous_not_retried() {
        let client: Arc<dyn CoordClient> = Arc::new(DisconnectingClient);
        let mut mutex = DistributedMutex::new(client, "/locks/res1").await.unwrap();

        let err = mutex.acquire().await.unwrap_err();
        assert!(matches!(err, LockError::AmbiguousCreate(_)));
        // No membership node was recorded; release is a clean no-op.
        assert_eq!(mutex.member_name(), None);
        assert!(!mutex.release().await.unwrap());
    }

    #[tokio::test]
    async fn test_redundant_notifications_collapse_into_one_wake() {
        let state = Arc::new(AttemptState::default());
        let (gate, mut wake) = mpsc::channel(1);
        *state.member.lock() = Some("member-0000000000".to_string());
        *state.gate.lock() = Some(gate);
        let listener = RankListener {
            state: state.clone(),
        };

        let children = vec!["member-0000000000".to_string()];
        listener.on_children_changed("/locks/res1", &children);
        listener.on_children_changed("/locks/res1", &children);
        listener.on_children_changed("/locks/res1", &children);

        assert!(wake.try_recv().is_ok());
        assert!(wake.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_without_attempt_is_a_noop() {
        let state = Arc::new(AttemptState::default());
        let listener = RankListener {
            state: state.clone(),
        };
        // No member, no gate: must not panic or record anything.
        listener.on_children_changed("/locks/res1", &["member-0000000000".to_string()]);

        // Gate present but member cleared (released instance): still a no-op.
        let (gate, mut wake) = mpsc::channel(1);
        *state.gate.lock() = Some(gate);
        listener.on_children_changed("/locks/res1", &["member-0000000000".to_string()]);
        assert!(wake.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_for_non_lowest_member_does_not_wake() {
        let state = Arc::new(AttemptState::default());
        let (gate, mut wake) = mpsc::channel(1);
        *state.member.lock() = Some("member-0000000005".to_string());
        *state.gate.lock() = Some(gate);
        let listener = RankListener {
            state: state.clone(),
        };

        listener.on_children_changed(
            "/locks/res1",
            &[
                "member-0000000002".to_string(),
                "member-0000000005".to_string(),
            ],
        );
        assert!(wake.try_recv().is_err());

        // A member absent from the sibling set is not an owner either.
        listener.on_children_changed("/locks/res1", &["member-0000000007".to_string()]);
        assert!(wake.try_recv().is_err());
    }
}
