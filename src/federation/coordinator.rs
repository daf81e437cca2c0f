//! FederatedSearch - concurrent fan-out with deadline, cancellation and merge.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{BackendError, CollectionName, Query, SearchBackend, SearchResponse};

use super::merge::merge_responses;
use super::{FailedCollection, FailureReason, FederatedResult, FederationError, FederationMode};

const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Tunables for a [`FederatedSearch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FederationConfig {
    pub mode: FederationMode,
    /// Overall budget for one federated call.
    pub deadline: Duration,
    /// Maximum in-flight collection searches. `None` means one per collection.
    pub max_concurrency: Option<usize>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        FederationConfig {
            mode: FederationMode::Strict,
            deadline: DEFAULT_DEADLINE,
            max_concurrency: None,
        }
    }
}

/// Runs one query against a caller-supplied set of collections.
pub struct FederatedSearch<B: ?Sized> {
    backend: Arc<B>,
    config: FederationConfig,
}

impl<B: ?Sized> Clone for FederatedSearch<B> {
    fn clone(&self) -> Self {
        FederatedSearch {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
        }
    }
}

impl<B: ?Sized> FederatedSearch<B> {
    pub fn new(backend: Arc<B>) -> Self {
        FederatedSearch {
            backend,
            config: FederationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FederationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: FederationMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = deadline;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: SearchBackend + ?Sized> FederatedSearch<B> {
    /// Search every collection using the configured mode.
    pub async fn search(
        &self,
        query: &Query,
        collections: &[CollectionName],
    ) -> Result<FederatedResult, FederationError> {
        self.run(query, collections, self.config.mode, &CancellationToken::new())
            .await
    }

    /// Search with an explicit mode, overriding the configured one.
    pub async fn search_with_mode(
        &self,
        query: &Query,
        collections: &[CollectionName],
        mode: FederationMode,
    ) -> Result<FederatedResult, FederationError> {
        self.run(query, collections, mode, &CancellationToken::new())
            .await
    }

    /// Search until done, the deadline passes, or `cancel` fires.
    ///
    /// Cancelling drops every in-flight collection search.
    pub async fn search_with_cancel(
        &self,
        query: &Query,
        collections: &[CollectionName],
        cancel: &CancellationToken,
    ) -> Result<FederatedResult, FederationError> {
        self.run(query, collections, self.config.mode, cancel).await
    }

    async fn run(
        &self,
        query: &Query,
        collections: &[CollectionName],
        mode: FederationMode,
        cancel: &CancellationToken,
    ) -> Result<FederatedResult, FederationError> {
        validate(collections)?;

        let limit = self
            .config
            .max_concurrency
            .unwrap_or(collections.len())
            .max(1);
        debug!(
            collections = collections.len(),
            limit,
            ?mode,
            "dispatching federated search"
        );

        let backend = &self.backend;
        let mut in_flight = stream::iter(collections.iter().enumerate())
            .map(|(index, collection)| async move {
                (index, backend.search(collection, query).await)
            })
            .buffer_unordered(limit);

        let deadline = tokio::time::sleep(self.config.deadline);
        tokio::pin!(deadline);

        let mut responses: Vec<Option<SearchResponse>> = vec![None; collections.len()];
        let mut settled = vec![false; collections.len()];
        let mut failed = Vec::new();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("federated search cancelled");
                    return Err(FederationError::Cancelled);
                }

                _ = &mut deadline => {
                    let pending: Vec<CollectionName> = collections
                        .iter()
                        .zip(&settled)
                        .filter(|(_, done)| !**done)
                        .map(|(collection, _)| collection.clone())
                        .collect();
                    warn!(?pending, "federated search deadline exceeded");

                    if mode == FederationMode::Strict {
                        return Err(FederationError::Timeout { pending });
                    }
                    failed.extend(pending.into_iter().map(|collection| FailedCollection {
                        collection,
                        reason: FailureReason::DeadlineExceeded,
                    }));
                    break;
                }

                next = in_flight.next() => {
                    let Some((index, outcome)) = next else { break };
                    settled[index] = true;
                    let collection = &collections[index];

                    match outcome {
                        Ok(response) => responses[index] = Some(response),
                        // Caller error: the same query fails everywhere, in every mode.
                        Err(BackendError::InvalidQuery(reason)) => {
                            debug!(%collection, %reason, "query rejected");
                            return Err(FederationError::InvalidArgument(format!(
                                "query rejected by {}: {}",
                                collection, reason
                            )));
                        }
                        Err(err) => {
                            warn!(%collection, error = %err, "collection search failed");
                            if mode == FederationMode::Strict {
                                return Err(FederationError::Backend {
                                    collection: collection.clone(),
                                    source: err,
                                });
                            }
                            failed.push(FailedCollection {
                                collection: collection.clone(),
                                reason: FailureReason::Backend(err),
                            });
                        }
                    }
                }
            }
        }
        drop(in_flight);

        // Report failures in caller order, not completion order.
        failed.sort_by_key(|f: &FailedCollection| {
            collections
                .iter()
                .position(|c| c == &f.collection)
                .unwrap_or(usize::MAX)
        });

        let mut result = merge_responses(
            collections
                .iter()
                .cloned()
                .zip(responses)
                .filter_map(|(collection, response)| response.map(|r| (collection, r))),
        );
        result.failed = failed;

        debug!(
            hits = result.hits.len(),
            total_count = result.total_count,
            failed = result.failed.len(),
            "federated search merged"
        );
        Ok(result)
    }
}

fn validate(collections: &[CollectionName]) -> Result<(), FederationError> {
    if collections.is_empty() {
        return Err(FederationError::InvalidArgument(
            "at least one collection is required".into(),
        ));
    }

    let mut seen = HashSet::with_capacity(collections.len());
    for collection in collections {
        if !seen.insert(collection) {
            return Err(FederationError::InvalidArgument(format!(
                "collection {} listed more than once",
                collection
            )));
        }
    }
    Ok(())
}
