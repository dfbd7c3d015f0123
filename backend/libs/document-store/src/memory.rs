//! In-process adapter backed by `DashMap`.

use crate::{Document, DocumentCollection, Filter, StoreError, StoreResult, Versioned};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Versioned documents held in memory. Cheap to construct; one instance per collection.
pub struct MemoryCollection<T: Document> {
    docs: DashMap<String, Versioned<T>>,
}

impl<T: Document> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn force_bump(&self, id: &str) {
        if let Some(mut entry) = self.docs.get_mut(id) {
            entry.version += 1;
        }
    }

    fn matching(&self, filter: &Filter) -> StoreResult<Vec<Versioned<T>>> {
        let mut found = Vec::new();
        for entry in self.docs.iter() {
            let value = serde_json::to_value(&entry.doc)?;
            if filter.matches(&value) {
                found.push(entry.value().clone());
            }
        }
        found.sort_by(|a, b| a.doc.id().cmp(b.doc.id()));
        Ok(found)
    }
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Document> DocumentCollection<T> for MemoryCollection<T> {
    async fn get(&self, id: &str) -> StoreResult<Option<Versioned<T>>> {
        Ok(self.docs.get(id).map(|entry| entry.value().clone()))
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Versioned<T>>> {
        self.matching(filter)
    }

    async fn insert(&self, doc: T) -> StoreResult<Versioned<T>> {
        match self.docs.entry(doc.id().to_string()) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists {
                collection: T::COLLECTION,
                id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let stored = Versioned { version: 1, doc };
                entry.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn replace(&self, doc: T, expected_version: u64) -> StoreResult<Versioned<T>> {
        let id = doc.id().to_string();
        let Some(mut entry) = self.docs.get_mut(&id) else {
            return Err(StoreError::NotFound {
                collection: T::COLLECTION,
                id,
            });
        };

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                collection: T::COLLECTION,
                id,
                expected: expected_version,
            });
        }

        entry.version += 1;
        entry.doc = doc;
        Ok(entry.value().clone())
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<T>> {
        Ok(self.docs.remove(id).map(|(_, stored)| stored.doc))
    }

    async fn delete_many(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        let mut removed = Vec::new();
        for stored in self.matching(filter)? {
            if let Some((_, gone)) = self.docs.remove(stored.doc.id()) {
                removed.push(gone.doc);
            }
        }
        Ok(removed)
    }
}
