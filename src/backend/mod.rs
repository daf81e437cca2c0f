//! Backend - the capability boundary between the catalog core and a search service.
//!
//! The core never talks to a search service directly. Everything it needs
//! (search, versioned reads, conditional writes, collection provisioning)
//! goes through the [`SearchBackend`] trait, so the real service client and
//! the [`InMemoryBackend`] test double are interchangeable.
//!
//! ## Example
//!
//! ```ignore
//! use federated_catalog::{InMemoryBackend, Query, SearchBackend};
//! use serde_json::json;
//!
//! let backend = InMemoryBackend::new();
//! backend.insert_document("products-eu", "p1", json!({ "name": "bolt" }))?;
//!
//! let response = backend
//!     .search(&"products-eu".into(), &Query::new(json!({ "match_all": {} })))
//!     .await?;
//! assert_eq!(response.total_count, 1);
//! ```

mod in_memory;
mod query;
mod store;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use in_memory::InMemoryBackend;
pub use store::SearchBackend;

/// Name of one independently addressed backend partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> Self {
        CollectionName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionName {
    fn from(name: &str) -> Self {
        CollectionName::new(name)
    }
}

impl From<String> for CollectionName {
    fn from(name: String) -> Self {
        CollectionName(name)
    }
}

/// A backend-specific query payload plus pagination hints.
///
/// The body is never interpreted by the core; it is handed unchanged to
/// every collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,
}

impl Query {
    pub fn new(body: Value) -> Self {
        Query {
            body,
            size: None,
            from: None,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }
}

/// One match as reported by a single collection. Carries no provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub id: String,
    pub score: f64,
    pub source: Value,
}

/// What a single collection returns for a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    pub hits: Vec<RawHit>,
    /// Exact number of matches in the collection, not just those returned.
    pub total_count: u64,
    pub elapsed: Duration,
}

/// Optimistic concurrency token identifying one exact document revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcurrencyToken {
    pub seq_no: u64,
    pub primary_term: u64,
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary_term, self.seq_no)
    }
}

/// A document body together with the token of the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub id: String,
    pub body: Value,
    pub token: ConcurrencyToken,
}

/// Errors surfaced by a [`SearchBackend`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The service could not be reached or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The service did not answer in time.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    #[error("document not found: {collection}:{id}")]
    DocumentNotFound { collection: CollectionName, id: String },

    /// The presented token no longer matches the stored revision.
    #[error("version conflict on {collection}:{id} (expected {expected}, actual {actual})")]
    VersionConflict {
        collection: CollectionName,
        id: String,
        expected: ConcurrencyToken,
        actual: ConcurrencyToken,
    },

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    /// The backend rejected the query body.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl BackendError {
    /// Transient infrastructure failures, as opposed to document-level outcomes.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout(_))
    }
}
