//! Client-side federation, result caching and conditional upserts for a
//! product catalog stored on a managed search backend.
//!
//! The backend can neither search several collections at once nor upsert
//! safely everywhere. This crate compensates from the client side:
//!
//! - [`FederatedSearch`] fans a query out to many collections concurrently and
//!   merges the results into one ranked, counted [`FederatedResult`];
//! - [`ResultCache`] memoizes those results for a bounded time;
//! - [`ConditionalUpdater`] emulates upserts with optimistic concurrency
//!   tokens and bounded conflict retry.
//!
//! [`Catalog`] bundles all three behind one caller-facing API.

mod backend;
mod cache;
mod catalog;
mod config;
mod federation;
mod update;

pub use backend::{
    BackendError, CollectionName, ConcurrencyToken, InMemoryBackend, Query, RawHit, SearchBackend,
    SearchResponse, VersionedDocument,
};
pub use cache::{CacheKey, CacheStats, CachedFederatedSearch, ResultCache};
pub use catalog::Catalog;
pub use config::{CacheSettings, CatalogConfig, ConfigError, FederationSettings, UpdateSettings};
pub use federation::{
    merge_responses, FailedCollection, FailureReason, FederatedResult, FederatedSearch,
    FederationConfig, FederationError, FederationMode, Hit,
};
pub use update::{
    upsert_price_window, ConditionalUpdater, PriceWindow, RetryPolicy, UpdateError, UpdateOutcome,
    UpsertAction, PRICE_WINDOWS_FIELD,
};

// Re-exported so callers can cancel federated searches without a direct dependency.
pub use tokio_util::sync::CancellationToken;
