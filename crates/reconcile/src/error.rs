//! Error taxonomy for cart reconciliation.
//!
//! Absence is not an error: `CartStore::get` returns `Option` and callers
//! treat a missing cart as empty. `Conflict` is recovered locally by the
//! merge trigger via bounded retry; everything else propagates to the caller
//! as a typed result.

use thiserror::Error;

/// Errors from the cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic-concurrency write collision: the caller's base version no
    /// longer matches the stored version. Re-read and retry.
    #[error("version conflict on {owner}: base version {base} is stale (store at {found})")]
    Conflict {
        /// Storage key of the cart that was written.
        owner: String,
        /// The caller's base version.
        base: u64,
        /// The version currently committed in the store.
        found: u64,
    },

    /// Persisted state violates the cart invariants (duplicate identity key,
    /// non-positive quantity). Indicates a bug in an upstream writer; never
    /// silently repaired.
    #[error("corrupt cart state: {0}")]
    Corruption(String),

    /// Underlying database failure.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored line items could not be (de)serialized.
    #[cfg(feature = "postgres")]
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the inventory lookup collaborator.
///
/// `Clone` so cached lookups can hand the same failure to concurrent waiters.
#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    /// The lookup collaborator is unreachable or failed. The affected item
    /// is neither removed nor capped; it is reported as unknown and the
    /// cart's validity is forced false.
    #[error("inventory lookup unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the merge trigger after its internal recovery.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Every read-merge-write attempt lost the compare-and-set race.
    /// Both carts are left intact and retryable on the next login.
    #[error("merge abandoned after {attempts} conflicting write attempts")]
    RetriesExhausted { attempts: u32 },

    /// A non-conflict store failure during the merge sequence.
    #[error(transparent)]
    Store(#[from] StoreError),
}
