//! HTTP API handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::RouterError;
use crate::mapping::MappingStore;
use crate::metrics;
use crate::routing::{has_content, Forwarder, InboundQuery, MalformedQuery, Resolver, TargetSource};

use super::error::QueryError;

/// Per-request settings derived from config.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    /// Name of the identifier field.
    pub target_field: String,
    /// Identifier `GET /query` falls back to when the request has none.
    pub get_default_target: Option<String>,
    /// Status for unresolved targets.
    pub resolution_failure_status: StatusCode,
}

impl QuerySettings {
    /// Settings from config.
    pub fn from_config(config: &Config) -> Result<Self, RouterError> {
        Ok(Self {
            target_field: config.target_field.clone(),
            get_default_target: config
                .get_query_default_target
                .clone()
                .filter(|t| !t.trim().is_empty()),
            resolution_failure_status: config
                .resolution_failure_status()
                .map_err(RouterError::InvalidConfig)?,
        })
    }
}

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether the Mapping Store has been reached.
    pub ready: Arc<AtomicBool>,
    /// Target resolution.
    pub resolver: Resolver,
    /// Downstream relay.
    pub forwarder: Forwarder,
    /// Request handling settings.
    pub settings: Arc<QuerySettings>,
    /// Prometheus render handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(resolver: Resolver, forwarder: Forwarder, settings: QuerySettings) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            resolver,
            forwarder,
            settings: Arc::new(settings),
            metrics: None,
        }
    }

    /// Build state from config around an existing store.
    pub fn from_config(store: Arc<dyn MappingStore>, config: &Config) -> Result<Self, RouterError> {
        Ok(Self::new(
            Resolver::from_config(store, config),
            Forwarder::new(config)?,
            QuerySettings::from_config(config)?,
        ))
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Store backend name.
    pub store: &'static str,
    /// Collection holding the routing rules.
    pub collection: String,
}

/// Root handler - `{"ok": true}`.
pub async fn root() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadyResponse {
        ready: is_ready,
        store: state.resolver.store().backend(),
        collection: state.resolver.collection().to_string(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Prometheus exposition.
pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `POST /query` - identifier from the JSON body, body relayed as received.
pub async fn post_query(State(state): State<AppState>, body: Bytes) -> Result<Response, QueryError> {
    metrics::inc_queries_received("POST");

    let query = InboundQuery::parse(body, &state.settings.target_field)?;
    relay(&state, query).await
}

/// `GET /query` - same identifier rules as POST.
///
/// The identifier comes from the JSON body when one is sent, else from the
/// query string parameter of the same name. The configured default target is
/// used only when neither carries one.
pub async fn get_query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Response, QueryError> {
    metrics::inc_queries_received("GET");

    let field = state.settings.target_field.as_str();
    let fallback = match params.get(field) {
        Some(target) if target.trim().is_empty() => {
            return Err(MalformedQuery::InvalidField(field.to_string()).into());
        }
        Some(target) => Some(target.as_str()),
        None => state.settings.get_default_target.as_deref(),
    };

    let query = if has_content(&body) {
        InboundQuery::parse_with_fallback(body, field, fallback)?
    } else {
        let target = fallback.ok_or_else(|| MalformedQuery::MissingField(field.to_string()))?;
        InboundQuery::synthesize(target, field)
    };

    if query.source == TargetSource::Fallback
        && params.get(field).is_none()
        && state.settings.get_default_target.is_some()
    {
        warn!(target_id = %query.target, "GET /query without identifier, using the configured default target");
    }

    relay(&state, query).await
}

/// Resolve, forward, and relay the downstream answer verbatim.
async fn relay(state: &AppState, query: InboundQuery) -> Result<Response, QueryError> {
    let redirect_url = state.resolver.resolve(&query.target).await.map_err(|e| {
        QueryError::from_resolve(
            e,
            &state.settings.target_field,
            state.settings.resolution_failure_status,
        )
    })?;

    let downstream = state.forwarder.forward(&redirect_url, query.body).await?;

    metrics::inc_queries_forwarded();
    info!(target_id = %query.target, status = %downstream.status, "Relayed query");

    Ok((
        downstream.status,
        [(header::CONTENT_TYPE, "application/json")],
        downstream.body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MemoryMappingStore;

    fn test_state() -> AppState {
        let store = Arc::new(MemoryMappingStore::new(true));
        AppState::from_config(store, &Config::default()).unwrap()
    }

    #[test]
    fn app_state_ready_toggle() {
        let state = test_state();
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[test]
    fn blank_default_target_is_ignored() {
        let config = Config {
            get_query_default_target: Some("  ".to_string()),
            ..Config::default()
        };
        let settings = QuerySettings::from_config(&config).unwrap();
        assert!(settings.get_default_target.is_none());
    }
}
