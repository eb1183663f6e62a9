//! Mapping Store: routing rules keyed by target identifier.
//!
//! This module handles:
//! - The routing rule record type
//! - The `MappingStore` trait the resolver queries
//! - In-memory and ArangoDB implementations
//! - Mock store for testing

pub mod arango;
pub mod memory;
pub mod mock;
pub mod store;
pub mod types;

use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::error::Result;

pub use arango::ArangoMappingStore;
pub use memory::MemoryMappingStore;
pub use mock::{MockConfig, MockMappingStore};
pub use store::MappingStore;
pub use types::MappingRecord;

/// Build the configured store.
pub fn build_store(config: &Config) -> Result<Arc<dyn MappingStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            let store = match &config.mappings_file {
                Some(path) => MemoryMappingStore::from_seed_file(
                    path,
                    &config.maps_collection,
                    config.mappings_unique,
                )?,
                None => MemoryMappingStore::new(config.mappings_unique),
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Arango => Ok(Arc::new(ArangoMappingStore::new(config)?)),
    }
}
