//! Roost Coord - coordination-store client facade
//!
//! This crate provides:
//! - `CoordClient`: the narrow async interface the lock protocol consumes
//!   (existence checks, ephemeral-sequential creation, deletion, child
//!   listing, child-change subscriptions)
//! - `ChildListener` and `FnChildListener` for receiving change notifications
//! - `CoordError`: typed errors for store operations
//! - `MemoryCoordStore`: a complete in-memory store with session semantics,
//!   usable for tests and single-process embedding

pub mod client;
pub mod error;
pub mod listener;
pub mod memory;

pub use client::{CoordClient, CreateMode, SubscriptionId};
pub use error::{CoordError, Result};
pub use listener::{ChildListener, FnChildListener};
pub use memory::{MemoryCoordClient, MemoryCoordStore};
