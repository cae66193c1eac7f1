//! Repository store abstraction

use async_trait::async_trait;

use crate::entry::RepositoryEntry;
use crate::error::Result;

/// Durable table of repository entries keyed by name
///
/// Implementations never see plaintext passwords; callers seal and unseal
/// entries with the credential codec.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Insert the entry, or replace url/username/password of the entry with
    /// the same name
    async fn upsert(&self, entry: &RepositoryEntry) -> Result<()>;

    /// Every stored entry, ordered by name
    async fn list_all(&self) -> Result<Vec<RepositoryEntry>>;

    /// Look up a single entry
    async fn get(&self, name: &str) -> Result<Option<RepositoryEntry>>;

    /// Remove the entry; returns whether a row existed
    ///
    /// Removing an absent name is not an error.
    async fn delete(&self, name: &str) -> Result<bool>;
}
