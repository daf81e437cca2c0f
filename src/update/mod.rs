//! Conditional updates - upsert semantics on a backend without native upsert.
//!
//! Every update is a Read → Mutate → Write cycle. The mutate step is a pure
//! function of the freshly read body, and the write presents the token from
//! the read, so a concurrent writer makes the write fail with a conflict
//! instead of being overwritten. On conflict the whole cycle runs again from
//! a fresh read, up to the [`RetryPolicy`] bounds.
//!
//! ## Example
//!
//! ```ignore
//! let updater = ConditionalUpdater::new(backend);
//! let window = PriceWindow::new("2").with_validity("2024-04-02", "2050-12-31");
//! let outcome = updater
//!     .update_price_window(&"bolt-ons".into(), "BOLTON-TRUTV-TCM", window)
//!     .await?;
//! assert_eq!(outcome.change, UpsertAction::Appended { index: 1 });
//! ```

mod engine;
mod price_window;
mod retry;

use thiserror::Error;

use crate::backend::{BackendError, CollectionName, ConcurrencyToken};

pub use engine::ConditionalUpdater;
pub use price_window::{upsert_price_window, PriceWindow, PRICE_WINDOWS_FIELD};
pub use retry::RetryPolicy;

/// Where an upserted element ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Appended { index: usize },
    Replaced { index: usize },
}

/// Result of a successful conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome<T> {
    /// Whatever the mutate step reported for the attempt that was written.
    pub change: T,
    /// Token of the revision just written.
    pub token: ConcurrencyToken,
    /// Read-modify-write cycles used, including the successful one.
    pub attempts: u32,
}

/// Error type for conditional updates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    /// Caller error; never retried.
    #[error("invalid update: {0}")]
    InvalidArgument(String),

    #[error("product not found: {collection}:{document_id}")]
    ProductNotFound {
        collection: CollectionName,
        document_id: String,
    },

    /// The stored document does not have the expected shape.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Every attempt lost a race with another writer. Safe to retry later.
    #[error("update conflict on {collection}:{document_id} after {attempts} attempts")]
    UpdateConflict {
        collection: CollectionName,
        document_id: String,
        attempts: u32,
    },

    #[error("backend error: {0}")]
    Backend(#[source] BackendError),
}
