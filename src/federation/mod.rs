//! Federation - one logical query over many independent collections.
//!
//! The backend cannot search several collections in one call, so
//! [`FederatedSearch`] fans the query out concurrently, waits for every
//! collection (or the deadline), and merges the per-collection results into
//! a single ranked [`FederatedResult`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use federated_catalog::{FederatedSearch, FederationMode, InMemoryBackend, Query};
//!
//! let search = FederatedSearch::new(Arc::new(InMemoryBackend::new()))
//!     .with_mode(FederationMode::BestEffort);
//! let result = search
//!     .search(&Query::new(json!({ "match_all": {} })), &["products-eu".into(), "products-us".into()])
//!     .await?;
//! if result.is_partial() {
//!     eprintln!("missing collections: {:?}", result.failed_collections());
//! }
//! ```

mod coordinator;
mod merge;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::backend::{BackendError, CollectionName};

pub use coordinator::{FederatedSearch, FederationConfig};
pub use merge::merge_responses;

/// What to do when a single collection fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationMode {
    /// Any failure (or the deadline) fails the whole call.
    #[default]
    Strict,
    /// Failed collections are left out of the merge and reported on the result.
    BestEffort,
}

/// One merged match, attributed to the collection it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub collection: CollectionName,
    pub id: String,
    pub score: f64,
    pub source: Value,
}

/// Why a collection is missing from a best-effort result.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Backend(BackendError),
    DeadlineExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedCollection {
    pub collection: CollectionName,
    pub reason: FailureReason,
}

/// Merged outcome of a federated query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FederatedResult {
    /// Sorted by score, highest first.
    pub hits: Vec<Hit>,
    /// Sum of every successful collection's exact match count.
    pub total_count: u64,
    /// Sum of every successful collection's reported search time.
    pub elapsed: Duration,
    /// Always empty in strict mode.
    pub failed: Vec<FailedCollection>,
}

impl FederatedResult {
    /// True when at least one collection is missing from the merge.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn failed_collections(&self) -> Vec<&CollectionName> {
        self.failed.iter().map(|f| &f.collection).collect()
    }
}

/// Error type for federated search.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FederationError {
    /// Caller error, such as an empty collection set or a malformed query.
    #[error("invalid federated search: {0}")]
    InvalidArgument(String),

    /// A collection failed in strict mode.
    #[error("search failed on collection {collection}: {source}")]
    Backend {
        collection: CollectionName,
        #[source]
        source: BackendError,
    },

    /// The deadline elapsed in strict mode before these collections answered.
    #[error("federated search timed out waiting for {pending:?}")]
    Timeout { pending: Vec<CollectionName> },

    #[error("federated search cancelled")]
    Cancelled,
}
