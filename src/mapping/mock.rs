//! Mock Mapping Store for unit testing.
//!
//! This module provides a store that can fail or stall on demand, and counts
//! the queries it receives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::StoreError;

use super::store::MappingStore;
use super::types::MappingRecord;

/// Configuration for mock store behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether to fail lookups.
    pub fail_queries: bool,
    /// Whether to fail pings.
    pub fail_ping: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// Mock Mapping Store for testing.
#[derive(Debug, Clone, Default)]
pub struct MockMappingStore {
    /// Mock configuration.
    config: MockConfig,
    /// Records as (collection, record), in insertion order.
    records: Arc<Mutex<Vec<(String, MappingRecord)>>>,
    /// Number of lookups served.
    queries: Arc<AtomicUsize>,
}

impl MockMappingStore {
    /// Create a new mock store with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock store with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Add a record to a collection.
    pub fn add(&self, collection: &str, record: MappingRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((collection.to_string(), record));
    }

    /// Number of lookups served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

#[async_trait]
impl MappingStore for MockMappingStore {
    async fn find_by_target(
        &self,
        collection: &str,
        target_id: &str,
    ) -> Result<Vec<MappingRecord>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.fail_queries {
            return Err(StoreError::Unreachable("Mock store failure".to_string()));
        }

        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|(c, r)| c == collection && r.target == target_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.config.fail_ping {
            return Err(StoreError::Unreachable("Mock ping failure".to_string()));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}
