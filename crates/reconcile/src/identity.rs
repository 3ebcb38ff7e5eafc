//! Identity provider interface.
//!
//! Session and token issuance live outside this crate; the reconciliation
//! core only needs to know who is currently signed in and when a guest
//! session transitioned into a user login.

use cartsync_core::{SessionId, UserId};

/// A guest session transitioning into an authenticated login.
///
/// One event is emitted per login; the merge trigger deduplicates on the
/// `(previous_session, user)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoginEvent {
    /// The guest session active before authentication.
    pub previous_session: SessionId,
    /// The user the session authenticated as.
    pub user: UserId,
}

/// Supplies the currently authenticated user, if any.
pub trait IdentityProvider: Send + Sync {
    /// The active user identity, or `None` when signed out.
    fn current_user(&self) -> Option<UserId>;
}
