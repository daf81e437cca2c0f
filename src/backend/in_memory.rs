//! InMemoryBackend - HashMap-backed search backend for testing and development.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use super::query;
use super::{
    BackendError, CollectionName, ConcurrencyToken, Query, RawHit, SearchBackend, SearchResponse,
    VersionedDocument,
};

const DEFAULT_PAGE_SIZE: usize = 10;

struct StoredDocument {
    body: Value,
    seq_no: u64,
}

struct StoredCollection {
    schema: Value,
    primary_term: u64,
    next_seq_no: u64,
    // BTreeMap keeps search output deterministic for equal scores.
    documents: BTreeMap<String, StoredDocument>,
}

impl StoredCollection {
    fn new(schema: Value, primary_term: u64) -> Self {
        StoredCollection {
            schema,
            primary_term,
            next_seq_no: 0,
            documents: BTreeMap::new(),
        }
    }

    fn token(&self, doc: &StoredDocument) -> ConcurrencyToken {
        ConcurrencyToken {
            seq_no: doc.seq_no,
            primary_term: self.primary_term,
        }
    }

    fn write(&mut self, id: &str, body: Value) -> ConcurrencyToken {
        let seq_no = self.next_seq_no;
        self.next_seq_no += 1;
        self.documents
            .insert(id.to_string(), StoredDocument { body, seq_no });
        ConcurrencyToken {
            seq_no,
            primary_term: self.primary_term,
        }
    }
}

#[derive(Default)]
struct CallCounters {
    search: AtomicUsize,
    get: AtomicUsize,
    put: AtomicUsize,
}

/// In-memory backend with per-collection fault and latency injection.
///
/// Token checks in `conditional_put` happen under a single write lock, so
/// concurrent writers see the same guarantees a real service gives.
/// Clone-friendly via Arc; clones share storage, faults and counters.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    collections: Arc<RwLock<HashMap<CollectionName, StoredCollection>>>,
    faults: Arc<RwLock<HashMap<CollectionName, BackendError>>>,
    latency: Arc<RwLock<HashMap<CollectionName, Duration>>>,
    calls: Arc<CallCounters>,
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("in-memory store lock poisoned".into())
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a document, creating the collection if needed.
    ///
    /// Overwriting bumps the revision, which invalidates outstanding tokens.
    pub fn insert_document(
        &self,
        collection: impl Into<CollectionName>,
        id: &str,
        body: Value,
    ) -> Result<ConcurrencyToken, BackendError> {
        let collection = collection.into();
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let next_term = collections.len() as u64 + 1;
        let stored = collections
            .entry(collection)
            .or_insert_with(|| StoredCollection::new(Value::Null, next_term));
        Ok(stored.write(id, body))
    }

    /// Inspect the current body of a document without counting a call.
    pub fn document(&self, collection: &CollectionName, id: &str) -> Option<Value> {
        let collections = self.collections.read().ok()?;
        collections
            .get(collection)?
            .documents
            .get(id)
            .map(|doc| doc.body.clone())
    }

    /// The schema a collection was provisioned with (`Null` when seeded implicitly).
    pub fn schema(&self, collection: &CollectionName) -> Option<Value> {
        let collections = self.collections.read().ok()?;
        collections.get(collection).map(|stored| stored.schema.clone())
    }

    /// Make every call against `collection` fail with `error` until healed.
    pub fn fail_collection(&self, collection: impl Into<CollectionName>, error: BackendError) {
        if let Ok(mut faults) = self.faults.write() {
            faults.insert(collection.into(), error);
        }
    }

    pub fn heal_collection(&self, collection: &CollectionName) {
        if let Ok(mut faults) = self.faults.write() {
            faults.remove(collection);
        }
    }

    /// Delay every call against `collection` by `delay`.
    pub fn set_latency(&self, collection: impl Into<CollectionName>, delay: Duration) {
        if let Ok(mut latency) = self.latency.write() {
            latency.insert(collection.into(), delay);
        }
    }

    pub fn search_calls(&self) -> usize {
        self.calls.search.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.calls.get.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.calls.put.load(Ordering::SeqCst)
    }

    /// Apply injected latency, then injected faults.
    async fn simulate(&self, collection: &CollectionName) -> Result<(), BackendError> {
        let delay = self
            .latency
            .read()
            .map_err(|_| poisoned())?
            .get(collection)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fault = self
            .faults
            .read()
            .map_err(|_| poisoned())?
            .get(collection)
            .cloned();
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn search(
        &self,
        collection: &CollectionName,
        query: &Query,
    ) -> Result<SearchResponse, BackendError> {
        self.calls.search.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        self.simulate(collection).await?;
        // Empty collections must still reject a malformed query.
        query::validate(&query.body)?;

        let collections = self.collections.read().map_err(|_| poisoned())?;
        let stored = collections
            .get(collection)
            .ok_or_else(|| BackendError::CollectionNotFound(collection.clone()))?;

        let mut matches = Vec::new();
        for (id, doc) in &stored.documents {
            if let Some(score) = query::score(&query.body, &doc.body)? {
                matches.push(RawHit {
                    id: id.clone(),
                    score,
                    source: doc.body.clone(),
                });
            }
        }
        drop(collections);

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        let total_count = matches.len() as u64;
        let hits = matches
            .into_iter()
            .skip(query.from.unwrap_or(0))
            .take(query.size.unwrap_or(DEFAULT_PAGE_SIZE))
            .collect();

        Ok(SearchResponse {
            hits,
            total_count,
            elapsed: started.elapsed(),
        })
    }

    async fn get_document(
        &self,
        collection: &CollectionName,
        id: &str,
    ) -> Result<VersionedDocument, BackendError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.simulate(collection).await?;

        let collections = self.collections.read().map_err(|_| poisoned())?;
        let stored = collections
            .get(collection)
            .ok_or_else(|| BackendError::CollectionNotFound(collection.clone()))?;
        let doc = stored
            .documents
            .get(id)
            .ok_or_else(|| BackendError::DocumentNotFound {
                collection: collection.clone(),
                id: id.to_string(),
            })?;

        Ok(VersionedDocument {
            id: id.to_string(),
            body: doc.body.clone(),
            token: stored.token(doc),
        })
    }

    async fn conditional_put(
        &self,
        collection: &CollectionName,
        id: &str,
        body: &Value,
        expected: ConcurrencyToken,
    ) -> Result<ConcurrencyToken, BackendError> {
        self.calls.put.fetch_add(1, Ordering::SeqCst);
        self.simulate(collection).await?;

        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| BackendError::CollectionNotFound(collection.clone()))?;

        let actual = stored
            .documents
            .get(id)
            .map(|doc| stored.token(doc))
            .ok_or_else(|| BackendError::DocumentNotFound {
                collection: collection.clone(),
                id: id.to_string(),
            })?;

        if actual != expected {
            return Err(BackendError::VersionConflict {
                collection: collection.clone(),
                id: id.to_string(),
                expected,
                actual,
            });
        }

        Ok(stored.write(id, body.clone()))
    }

    async fn collection_exists(&self, collection: &CollectionName) -> Result<bool, BackendError> {
        self.simulate(collection).await?;
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.contains_key(collection))
    }

    async fn create_collection(
        &self,
        collection: &CollectionName,
        schema: &Value,
    ) -> Result<(), BackendError> {
        self.simulate(collection).await?;
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let next_term = collections.len() as u64 + 1;
        collections
            .entry(collection.clone())
            .or_insert_with(|| StoredCollection::new(schema.clone(), next_term));
        Ok(())
    }
}
