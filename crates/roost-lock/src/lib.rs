//! Roost Lock - fair distributed mutual exclusion
//!
//! This crate provides:
//! - `DistributedMutex`: a FIFO-fair, crash-safe mutex over any
//!   [`roost_coord::CoordClient`] implementation
//! - `LockError`: typed failures of the lock protocol
//! - `rank`: the pure ordering rules membership nodes are judged by
//!
//! Each contender creates one ephemeral-sequential membership node under a
//! pre-existing lock path; the contender holding the numerically smallest
//! sequence owns the lock. Waiters park on a single-permit gate that the
//! store's child-change notifications release once their own node has become
//! the minimum. A crashed holder's node is reaped by its session, which wakes
//! the next contender without any explicit unlock.

pub mod error;
pub mod mutex;
pub mod rank;

pub use error::{LockError, Result};
pub use mutex::DistributedMutex;
