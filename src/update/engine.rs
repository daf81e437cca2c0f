//! ConditionalUpdater - the read/mutate/conditional-write loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, CollectionName, SearchBackend};

use super::price_window::upsert_price_window;
use super::{PriceWindow, RetryPolicy, UpdateError, UpdateOutcome, UpsertAction};

/// Applies logical mutations to single documents with optimistic concurrency.
pub struct ConditionalUpdater<B: ?Sized> {
    backend: Arc<B>,
    policy: RetryPolicy,
}

impl<B: ?Sized> Clone for ConditionalUpdater<B> {
    fn clone(&self) -> Self {
        ConditionalUpdater {
            backend: Arc::clone(&self.backend),
            policy: self.policy.clone(),
        }
    }
}

impl<B: ?Sized> ConditionalUpdater<B> {
    pub fn new(backend: Arc<B>) -> Self {
        ConditionalUpdater {
            backend,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.policy.deadline = Some(deadline);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<B: SearchBackend + ?Sized> ConditionalUpdater<B> {
    /// Upsert `window` into the document's price windows, keyed by billing reference.
    ///
    /// An existing window with the same key is replaced at its index; otherwise
    /// the window is appended.
    pub async fn update_price_window(
        &self,
        collection: &CollectionName,
        document_id: &str,
        window: PriceWindow,
    ) -> Result<UpdateOutcome<UpsertAction>, UpdateError> {
        let window = window.with_derived_instants()?;
        let outcome = self
            .update_document(collection, document_id, |body| {
                upsert_price_window(body, &window)
            })
            .await?;

        info!(
            %collection,
            document_id,
            billing_reference_id = %window.billing_reference_id,
            change = ?outcome.change,
            attempts = outcome.attempts,
            "price window upserted"
        );
        Ok(outcome)
    }

    /// Run `mutate` against the latest revision and write it back conditionally.
    ///
    /// `mutate` may run once per attempt and must only depend on the body it
    /// is given. Errors it returns abort the update without writing.
    pub async fn update_document<T, F>(
        &self,
        collection: &CollectionName,
        document_id: &str,
        mut mutate: F,
    ) -> Result<UpdateOutcome<T>, UpdateError>
    where
        F: FnMut(&mut Value) -> Result<T, UpdateError>,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let not_found = || UpdateError::ProductNotFound {
            collection: collection.clone(),
            document_id: document_id.to_string(),
        };
        let conflict = |attempts| UpdateError::UpdateConflict {
            collection: collection.clone(),
            document_id: document_id.to_string(),
            attempts,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = match self.backend.get_document(collection, document_id).await {
                Ok(doc) => doc,
                Err(BackendError::DocumentNotFound { .. }) => return Err(not_found()),
                Err(err) => return Err(UpdateError::Backend(err)),
            };

            let mut body = current.body;
            let change = mutate(&mut body)?;

            match self
                .backend
                .conditional_put(collection, document_id, &body, current.token)
                .await
            {
                Ok(token) => {
                    debug!(%collection, document_id, %token, attempt, "conditional write accepted");
                    return Ok(UpdateOutcome {
                        change,
                        token,
                        attempts: attempt,
                    });
                }
                Err(BackendError::VersionConflict { actual, .. }) => {
                    if attempt >= max_attempts {
                        warn!(%collection, document_id, attempt, "giving up after repeated conflicts");
                        return Err(conflict(attempt));
                    }

                    let delay = self.policy.backoff(attempt);
                    if let Some(deadline) = self.policy.deadline {
                        if started.elapsed() + delay >= deadline {
                            warn!(%collection, document_id, attempt, "conflict retry deadline exceeded");
                            return Err(conflict(attempt));
                        }
                    }

                    debug!(
                        %collection,
                        document_id,
                        read = %current.token,
                        %actual,
                        attempt,
                        ?delay,
                        "version conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                // Deleted between our read and our write.
                Err(BackendError::DocumentNotFound { .. }) => return Err(not_found()),
                Err(err) => return Err(UpdateError::Backend(err)),
            }
        }
    }
}
