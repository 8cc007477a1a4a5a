//! Set-semantics key-value storage for fingerprints.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::StoreError;

pub mod database;

/// Database URL that selects [`MemoryStore`] instead of SQLite.
pub const MEMORY_URL: &str = "memory";

/// The four set operations the matcher needs from a store.
///
/// Every call is independent and atomic on its own; nothing spans calls.
#[async_trait::async_trait]
pub trait SetStore: Send + Sync {
    /// Add `members` to the set at `key`, creating it if needed.
    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    /// All members of the set at `key`; empty if the set does not exist.
    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), StoreError>;
}

/// Open the store named by `url`.
pub async fn open(url: &str, max_connections: u32) -> Result<Arc<dyn SetStore>, StoreError> {
    if url == MEMORY_URL {
        info!("using in-memory fingerprint store");
        return Ok(Arc::new(MemoryStore::default()));
    }

    let database = database::Database::init(url, max_connections).await?;
    info!(url, "connected to fingerprint database");
    Ok(Arc::new(database))
}

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

#[async_trait::async_trait]
impl SetStore for MemoryStore {
    async fn add_members(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        self.sets
            .lock()
            .await
            .entry(key.to_owned())
            .or_default()
            .extend(members.iter().cloned());
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sets
            .lock()
            .await
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.sets.lock().await.remove(key);
        Ok(())
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut sets = self.sets.lock().await;
        if let Some(set) = sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }
}
