//! In-process object storage, for local runs and tests.

use super::{ObjectStorage, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps uploaded bytes in memory. URLs use the `memory://` scheme.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: DashMap<String, Vec<u8>>,
    unavailable: AtomicBool,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a provider outage: every call fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Provider("object storage unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        self.check_available()?;
        let bytes = tokio::fs::read(local_path).await?;
        self.objects.insert(key.to_string(), bytes);
        Ok(format!("memory://{}", key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.objects.remove(key);
        Ok(())
    }
}
