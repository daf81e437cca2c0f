//! SearchBackend - the operations the catalog core needs from a search service.

use async_trait::async_trait;
use serde_json::Value;

use super::{BackendError, CollectionName, ConcurrencyToken, Query, SearchResponse, VersionedDocument};

/// Abstract document store with search and optimistic-concurrency writes.
///
/// Implementations must enforce the token check in `conditional_put`
/// atomically; the core never locks documents itself.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `query` against a single collection.
    async fn search(
        &self,
        collection: &CollectionName,
        query: &Query,
    ) -> Result<SearchResponse, BackendError>;

    /// Read a document along with the token of the revision read.
    async fn get_document(
        &self,
        collection: &CollectionName,
        id: &str,
    ) -> Result<VersionedDocument, BackendError>;

    /// Replace an existing document if its current revision matches `expected`.
    ///
    /// Returns the token of the newly written revision.
    async fn conditional_put(
        &self,
        collection: &CollectionName,
        id: &str,
        body: &Value,
        expected: ConcurrencyToken,
    ) -> Result<ConcurrencyToken, BackendError>;

    async fn collection_exists(&self, collection: &CollectionName) -> Result<bool, BackendError>;

    /// Provision a collection with the given (backend-defined) schema.
    async fn create_collection(
        &self,
        collection: &CollectionName,
        schema: &Value,
    ) -> Result<(), BackendError>;
}
