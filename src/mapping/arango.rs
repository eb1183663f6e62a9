//! Mapping Store backed by the ArangoDB HTTP cursor API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::StoreError;

use super::store::MappingStore;
use super::types::MappingRecord;

/// Exact-match filter on the `target` field of a routing collection.
const FIND_BY_TARGET_AQL: &str = "FOR doc IN @@maps FILTER doc.target == @target RETURN doc";

/// Records fetched per cursor round trip.
const CURSOR_BATCH_SIZE: u32 = 100;

/// ArangoDB client for routing rule lookups.
#[derive(Debug, Clone)]
pub struct ArangoMappingStore {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Server base URL, without trailing slash.
    base_url: String,
    /// Database name.
    database: String,
    /// Basic auth user.
    username: Option<String>,
    /// Basic auth password.
    password: Option<String>,
}

/// Cursor API response.
#[derive(Debug, Deserialize)]
struct CursorResponse {
    #[serde(default)]
    result: Vec<MappingRecord>,
    #[serde(default, rename = "hasMore")]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

/// Error envelope returned by ArangoDB.
#[derive(Debug, Deserialize)]
struct ArangoErrorBody {
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
    #[serde(default, rename = "errorNum")]
    error_num: Option<u32>,
}

impl ArangoMappingStore {
    /// Create a store client from config.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.store_timeout())
            .connect_timeout(config.connect_timeout())
            .tcp_nodelay(true)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: config.arango_url.trim_end_matches('/').to_string(),
            database: config.arango_database.clone(),
            username: config.arango_username.clone(),
            password: config.arango_password.clone(),
        })
    }

    /// Database-scoped API URL.
    fn api_url(&self, path: &str) -> String {
        format!("{}/_db/{}/_api/{}", self.base_url, self.database, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    /// Turn a non-success response into a store error.
    async fn query_failed(response: reqwest::Response) -> StoreError {
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ArangoErrorBody>(&body) {
            Ok(ArangoErrorBody {
                error_message: Some(message),
                error_num,
            }) => match error_num {
                Some(num) => format!("{} (errorNum {})", message, num),
                None => message,
            },
            _ => body,
        };

        StoreError::QueryFailed { code, message }
    }

    /// Release a server-side cursor we will not read to the end.
    async fn drop_cursor(&self, id: &str) {
        let url = self.api_url(&format!("cursor/{}", id));
        match self.authorize(self.http.delete(&url)).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(cursor = id, "Released cursor");
            }
            Ok(response) => warn!(cursor = id, status = %response.status(), "Failed to release cursor"),
            Err(e) => warn!(cursor = id, error = %e, "Failed to release cursor"),
        }
    }
}

#[async_trait]
impl MappingStore for ArangoMappingStore {
    /// Returns the first cursor batch; later batches are released unread.
    #[instrument(skip(self), fields(database = %self.database))]
    async fn find_by_target(
        &self,
        collection: &str,
        target_id: &str,
    ) -> Result<Vec<MappingRecord>, StoreError> {
        let body = json!({
            "query": FIND_BY_TARGET_AQL,
            "bindVars": {
                "@maps": collection,
                "target": target_id,
            },
            "batchSize": CURSOR_BATCH_SIZE,
        });

        let response = self
            .authorize(self.http.post(self.api_url("cursor")))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::query_failed(response).await);
        }

        let cursor: CursorResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if cursor.has_more {
            if let Some(id) = cursor.id.as_deref() {
                self.drop_cursor(id).await;
            }
        }

        debug!(count = cursor.result.len(), "Fetched mapping candidates");
        Ok(cursor.result)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .authorize(self.http.get(self.api_url("version")))
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::query_failed(response).await)
        }
    }

    fn backend(&self) -> &'static str {
        "arango"
    }
}
