//! Catalog - the caller-facing entry point tying search, cache and updates together.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::{BackendError, CollectionName, Query, SearchBackend};
use crate::cache::{CachedFederatedSearch, ResultCache};
use crate::config::{CatalogConfig, ConfigError};
use crate::federation::{FederatedResult, FederatedSearch, FederationError, FederationMode};
use crate::update::{ConditionalUpdater, PriceWindow, UpdateError, UpdateOutcome, UpsertAction};

/// Product catalog operations over any [`SearchBackend`].
pub struct Catalog<B: ?Sized> {
    backend: Arc<B>,
    search: CachedFederatedSearch<B>,
    updater: ConditionalUpdater<B>,
    default_ttl: Duration,
}

impl<B: SearchBackend + ?Sized> Catalog<B> {
    /// Build a catalog with default settings.
    pub fn new(backend: Arc<B>) -> Self {
        let config = CatalogConfig::default();
        Self::assemble(backend, &config)
    }

    /// Build a catalog from a validated configuration.
    pub fn from_config(backend: Arc<B>, config: &CatalogConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(backend, config))
    }

    fn assemble(backend: Arc<B>, config: &CatalogConfig) -> Self {
        let mut cache = ResultCache::new();
        if let Some(max_entries) = config.cache.max_entries {
            cache = cache.with_max_entries(max_entries);
        }

        let search = CachedFederatedSearch::new(
            FederatedSearch::new(Arc::clone(&backend)).with_config(config.federation_config()),
        )
        .with_cache(Arc::new(cache));
        let updater =
            ConditionalUpdater::new(Arc::clone(&backend)).with_policy(config.retry_policy());

        Catalog {
            backend,
            search,
            updater,
            default_ttl: config.cache_ttl(),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn cache(&self) -> &Arc<ResultCache<FederatedResult>> {
        self.search.cache()
    }

    /// Uncached federated search with an explicit failure mode.
    pub async fn federated_search(
        &self,
        query: &Query,
        collections: &[CollectionName],
        mode: FederationMode,
    ) -> Result<FederatedResult, FederationError> {
        self.search
            .inner()
            .search_with_mode(query, collections, mode)
            .await
    }

    /// Uncached federated search in the configured mode that stops when `cancel` fires.
    pub async fn federated_search_with_cancel(
        &self,
        query: &Query,
        collections: &[CollectionName],
        cancel: &CancellationToken,
    ) -> Result<FederatedResult, FederationError> {
        self.search
            .inner()
            .search_with_cancel(query, collections, cancel)
            .await
    }

    /// Federated search in the configured mode, reusing results younger than `ttl`.
    pub async fn cached_federated_search(
        &self,
        query: &Query,
        collections: &[CollectionName],
        ttl: Duration,
    ) -> Result<FederatedResult, FederationError> {
        self.search.search(query, collections, ttl).await
    }

    /// [`cached_federated_search`](Self::cached_federated_search) with the configured TTL.
    pub async fn cached_search(
        &self,
        query: &Query,
        collections: &[CollectionName],
    ) -> Result<FederatedResult, FederationError> {
        self.search.search(query, collections, self.default_ttl).await
    }

    /// Upsert a price window, retrying version conflicts up to `max_attempts` cycles.
    pub async fn update_price_window(
        &self,
        collection: &CollectionName,
        document_id: &str,
        window: PriceWindow,
        max_attempts: u32,
    ) -> Result<UpdateOutcome<UpsertAction>, UpdateError> {
        self.updater
            .clone()
            .with_max_attempts(max_attempts)
            .update_price_window(collection, document_id, window)
            .await
    }

    /// Create `collection` with `schema` unless it already exists.
    ///
    /// Returns whether the collection was created by this call.
    pub async fn ensure_collection(
        &self,
        collection: &CollectionName,
        schema: &Value,
    ) -> Result<bool, BackendError> {
        if self.backend.collection_exists(collection).await? {
            return Ok(false);
        }
        self.backend.create_collection(collection, schema).await?;
        info!(%collection, "collection created");
        Ok(true)
    }
}
