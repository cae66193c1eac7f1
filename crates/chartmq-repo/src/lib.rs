//! chartmq repository store
//!
//! Durable table of chart repositories. Each entry keeps its password as hex
//! encoded AES-GCM ciphertext produced by [`chartmq_core::CredentialCodec`],
//! the same text `chartmq seal` prints. The plaintext form only exists
//! transiently as a [`chartmq_core::RepositorySpec`].
//!
//! Two implementations of [`RepositoryStore`] are provided:
//!
//! - [`SqliteRepositoryStore`]: SQLite file in WAL mode, used by the worker
//! - [`MemoryRepositoryStore`]: in-process map with operation counters, for tests

pub mod entry;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use entry::RepositoryEntry;
pub use error::{RepoError, Result};
pub use memory::{MemoryRepositoryStore, StoreOperationCounts};
pub use sqlite::SqliteRepositoryStore;
pub use store::RepositoryStore;
