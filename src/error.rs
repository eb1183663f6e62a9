//! Unified error types for the query router.

use axum::http::StatusCode;
use thiserror::Error;

/// Unified error type for the query router.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration validation error.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Mapping store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Mapping store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// The store answered with an error.
    #[error("store query failed (code {code}): {message}")]
    QueryFailed {
        /// Status or error code reported by the store.
        code: u16,
        /// Error message reported by the store.
        message: String,
    },

    /// The store answered with something that is not a record list.
    #[error("failed to decode store response: {0}")]
    Decode(String),

    /// A second record was inserted for a target in a unique store.
    #[error("duplicate mapping for target {target}")]
    DuplicateTarget {
        /// The duplicated target identifier.
        target: String,
    },

    /// The seed file could not be read or parsed.
    #[error("failed to load mappings from {path}: {reason}")]
    Seed {
        /// Path of the seed file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// Why a target identifier could not be turned into a redirect URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum UnresolvableReason {
    /// The identifier was empty.
    #[strum(serialize = "empty identifier")]
    EmptyTarget,
    /// No record matched the identifier.
    #[strum(serialize = "no mapping")]
    NoMapping,
    /// The matching record had no usable redirect URL.
    #[strum(serialize = "missing redirect url")]
    MissingRedirectUrl,
}

/// Resolver errors.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No usable mapping exists for the target.
    #[error("target {target:?} not resolvable: {reason}")]
    TargetNotResolvable {
        /// The requested target identifier.
        target: String,
        /// Why resolution failed.
        reason: UnresolvableReason,
    },

    /// The store query failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store query did not finish in time.
    #[error("store query timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },
}

/// Forwarder errors.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// The redirect URL does not form a valid downstream URL.
    #[error("invalid downstream url {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Connection or transport failure.
    #[error("downstream {url} unreachable: {reason}")]
    Unreachable {
        /// Downstream URL.
        url: String,
        /// Transport error message.
        reason: String,
    },

    /// The downstream did not answer within the configured timeout.
    #[error("downstream {url} timed out")]
    Timeout {
        /// Downstream URL.
        url: String,
    },

    /// The downstream answered with a non-success status.
    #[error("downstream {url} returned HTTP {status}")]
    Status {
        /// Downstream URL.
        url: String,
        /// Status returned by the downstream.
        status: StatusCode,
        /// Response body, as text.
        body: String,
    },

    /// The downstream answered 2xx with a body that is not JSON.
    #[error("downstream {url} returned a non-JSON body: {reason}")]
    InvalidJson {
        /// Downstream URL.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl ForwardError {
    /// Short machine-readable kind, used for metrics labels and error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Unreachable { .. } => "unreachable",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "bad_status",
            Self::InvalidJson { .. } => "invalid_json",
        }
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, RouterError>;
