//! Profile storage for the persona profile service.
//!
//! The store holds one document per profile plus a logically separate set of
//! viewer records per profile. Counter mutations go through a single
//! optimistic transaction primitive: take a [`TxnSnapshot`], compute a
//! [`TxnWrite`], then [`ProfileStore::commit`] it. A commit lands as a whole
//! or not at all, and fails with [`StoreError::Conflict`] if another commit
//! touched the same profile since the snapshot was taken.
//!
//! # Storage Backends
//!
//! All backends implement the [`ProfileStore`] trait:
//!
//! - [`InMemoryProfileStore`] -- `HashMap`-based store for tests and embedding
//! - [`DurableProfileStore`] -- in-memory table backed by a write-ahead log
//!
//! # Design Rules
//!
//! 1. Every committed write bumps the profile's version; snapshots carry the
//!    version they observed.
//! 2. Viewer records are created once and never updated or deleted.
//! 3. `created_at` is immutable; counters never decrease.
//! 4. The store never interprets profile payloads.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod durable;
pub mod error;
mod lock;
pub mod memory;
mod table;
pub mod traits;
pub mod txn;
pub mod wal;

pub use durable::DurableProfileStore;
pub use error::{StoreError, StoreResult};
pub use lock::LOCK_FILE_NAME;
pub use memory::InMemoryProfileStore;
pub use traits::ProfileStore;
pub use txn::{TxnSnapshot, TxnWrite};
pub use wal::{StoreEvent, SyncMode, WalConfig, WriteAheadLog};
