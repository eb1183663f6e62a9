//! In-process Mapping Store.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::StoreError;

use super::store::MappingStore;
use super::types::MappingRecord;

/// Mapping Store kept in memory, records in insertion order per collection.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    collections: DashMap<String, Vec<MappingRecord>>,
    unique: bool,
}

impl MemoryMappingStore {
    /// Create an empty store.
    ///
    /// With `unique` set, inserting a second record for a target already
    /// present in the same collection fails.
    pub fn new(unique: bool) -> Self {
        Self {
            collections: DashMap::new(),
            unique,
        }
    }

    /// Load a store from a JSON seed file.
    pub fn from_seed_file(
        path: impl AsRef<Path>,
        default_collection: &str,
        unique: bool,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let seed_error = |reason: String| StoreError::Seed {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| seed_error(e.to_string()))?;
        let store = Self::from_seed_str(&raw, default_collection, unique).map_err(|e| match e {
            StoreError::Decode(reason) => seed_error(reason),
            other => other,
        })?;

        info!(path = %path.display(), collections = store.collections.len(), "Loaded mapping seed file");
        Ok(store)
    }

    /// Load a store from seed JSON text.
    ///
    /// The seed is either a bare record list, loaded into `default_collection`,
    /// or an object of collection name to record list.
    pub fn from_seed_str(
        raw: &str,
        default_collection: &str,
        unique: bool,
    ) -> Result<Self, StoreError> {
        let seed: Value =
            serde_json::from_str(raw).map_err(|e| StoreError::Decode(e.to_string()))?;

        let store = Self::new(unique);
        match seed {
            Value::Array(records) => store.insert_seed(default_collection, Value::Array(records))?,
            Value::Object(collections) => {
                for (collection, records) in collections {
                    store.insert_seed(&collection, records)?;
                }
            }
            _ => {
                return Err(StoreError::Decode(
                    "seed must be a record list or an object of record lists".to_string(),
                ))
            }
        }

        Ok(store)
    }

    fn insert_seed(&self, collection: &str, records: Value) -> Result<(), StoreError> {
        let records: Vec<MappingRecord> = serde_json::from_value(records)
            .map_err(|e| StoreError::Decode(format!("collection {}: {}", collection, e)))?;

        for record in records {
            self.insert(collection, record)?;
        }
        Ok(())
    }

    /// Append a record to a collection.
    pub fn insert(&self, collection: &str, record: MappingRecord) -> Result<(), StoreError> {
        let mut records = self.collections.entry(collection.to_string()).or_default();

        if self.unique && records.iter().any(|r| r.target == record.target) {
            return Err(StoreError::DuplicateTarget {
                target: record.target,
            });
        }

        debug!(collection, target_id = %record.target, "Inserted mapping");
        records.push(record);
        Ok(())
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|records| records.len())
            .unwrap_or(0)
    }

    /// Whether a collection holds no records.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn find_by_target(
        &self,
        collection: &str,
        target_id: &str,
    ) -> Result<Vec<MappingRecord>, StoreError> {
        let matches = self
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.target == target_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(matches)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
