//! The Mapping Store seam.

use async_trait::async_trait;

use crate::error::StoreError;

use super::types::MappingRecord;

/// Read access to a collection of routing rules.
///
/// `find_by_target` returns every record whose `target` equals the given
/// identifier, in the store's natural return order. Callers that need a single
/// record take the first one; which record that is among duplicates is only
/// defined by the implementation.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Exact-match lookup on the `target` field.
    async fn find_by_target(
        &self,
        collection: &str,
        target_id: &str,
    ) -> Result<Vec<MappingRecord>, StoreError>;

    /// Check that the store can be reached.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
