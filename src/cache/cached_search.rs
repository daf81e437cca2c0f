//! CachedFederatedSearch - a federated search wrapped in a result cache.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::backend::{CollectionName, Query, SearchBackend};
use crate::federation::{FederatedResult, FederatedSearch, FederationError, FederationMode};

use super::{CacheKey, ResultCache};

#[derive(Serialize)]
struct SearchArgs<'a> {
    query: &'a Query,
    collections: &'a [CollectionName],
    mode: FederationMode,
}

/// Memoizes [`FederatedSearch`] results per (query, collections, mode).
///
/// Partial best-effort results are returned but not cached, so a recovered
/// collection shows up on the next call instead of after the TTL.
pub struct CachedFederatedSearch<B: ?Sized> {
    search: FederatedSearch<B>,
    cache: Arc<ResultCache<FederatedResult>>,
}

impl<B: ?Sized> CachedFederatedSearch<B> {
    pub fn new(search: FederatedSearch<B>) -> Self {
        CachedFederatedSearch {
            search,
            cache: Arc::new(ResultCache::new()),
        }
    }

    /// Share an existing cache table, e.g. one with a capacity bound.
    pub fn with_cache(mut self, cache: Arc<ResultCache<FederatedResult>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache<FederatedResult>> {
        &self.cache
    }

    pub fn inner(&self) -> &FederatedSearch<B> {
        &self.search
    }
}

impl<B: SearchBackend + ?Sized> CachedFederatedSearch<B> {
    /// Search with the inner search's configured mode, reusing results younger than `ttl`.
    pub async fn search(
        &self,
        query: &Query,
        collections: &[CollectionName],
        ttl: Duration,
    ) -> Result<FederatedResult, FederationError> {
        let mode = self.search.config().mode;
        let key = CacheKey::derive(&SearchArgs {
            query,
            collections,
            mode,
        })
        .map_err(|e| FederationError::InvalidArgument(format!("unhashable query: {}", e)))?;

        self.cache
            .get_or_try_insert_if(
                key,
                ttl,
                || self.search.search_with_mode(query, collections, mode),
                |result| !result.is_partial(),
            )
            .await
    }
}
