//! Target identifier resolution.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::{ResolveError, UnresolvableReason};
use crate::mapping::MappingStore;
use crate::metrics;

/// Resolves target identifiers to downstream base URLs.
#[derive(Clone)]
pub struct Resolver {
    /// Routing rule source.
    store: Arc<dyn MappingStore>,
    /// Collection holding the routing rules.
    collection: String,
    /// Upper bound on one store query.
    timeout: Duration,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("store", &self.store.backend())
            .field("collection", &self.collection)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Resolver {
    /// Create a resolver over the given store and collection.
    pub fn new(store: Arc<dyn MappingStore>, collection: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            collection: collection.into(),
            timeout,
        }
    }

    /// Create a resolver using the collection and timeout from config.
    pub fn from_config(store: Arc<dyn MappingStore>, config: &Config) -> Self {
        Self::new(store, config.maps_collection.clone(), config.store_timeout())
    }

    /// The collection queried.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    /// Resolve a target identifier to its redirect URL.
    ///
    /// The first candidate returned by the store wins. Among duplicate
    /// targets, which one that is depends on the store's return order.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn resolve(&self, target_id: &str) -> Result<String, ResolveError> {
        if target_id.trim().is_empty() {
            return Err(unresolvable(target_id, UnresolvableReason::EmptyTarget));
        }

        let _timer = metrics::timer_resolve();

        let candidates = tokio::time::timeout(
            self.timeout,
            self.store.find_by_target(&self.collection, target_id),
        )
        .await
        .map_err(|_| {
            metrics::inc_store_errors();
            warn!(timeout_ms = self.timeout.as_millis() as u64, "Store query timed out");
            ResolveError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        })?
        .map_err(|e| {
            metrics::inc_store_errors();
            ResolveError::Store(e)
        })?;

        if candidates.len() > 1 {
            warn!(count = candidates.len(), "Duplicate mappings for target, using the first");
        }

        let record = candidates
            .first()
            .ok_or_else(|| unresolvable(target_id, UnresolvableReason::NoMapping))?;

        let url = record
            .usable_redirect_url()
            .ok_or_else(|| unresolvable(target_id, UnresolvableReason::MissingRedirectUrl))?;

        debug!(redirect_url = %url, "Resolved target");
        Ok(url.to_string())
    }
}

fn unresolvable(target_id: &str, reason: UnresolvableReason) -> ResolveError {
    metrics::inc_resolution_failures(reason.into());
    ResolveError::TargetNotResolvable {
        target: target_id.to_string(),
        reason,
    }
}
