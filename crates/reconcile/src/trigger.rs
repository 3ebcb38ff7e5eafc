//! Merge trigger: run the login merge exactly once per login event.
//!
//! UI re-renders can fire the login hook several times for the same login,
//! and the checkout preloader may race a merge that is still in flight. The
//! trigger therefore keeps an explicit per-event state machine
//! (`Merging -> Merged | Failed`, both terminal) instead of relying on
//! call-site discipline; re-entrant calls are deduplicated to no-ops.
//!
//! A `Conflict` from the store means another writer touched the user cart
//! between our read and our write. The whole read-merge-write sequence is
//! retried up to a fixed bound, then the event transitions to failed with
//! both carts left intact for the next login attempt.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use cartsync_core::{Cart, MergeResult, OwnerKey, SessionId, UserId};

use crate::error::{StoreError, TriggerError};
use crate::identity::{IdentityProvider, LoginEvent};
use crate::merge::merge;
use crate::store::CartStore;

/// Where a login event's merge stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePhase {
    /// The read-merge-write sequence is in flight.
    Merging,
    /// The merged cart was committed and the guest cart deleted. Terminal.
    Merged,
    /// Every attempt failed; carts untouched. Terminal for this event.
    Failed,
}

/// What a call to [`MergeTrigger::on_login`] did.
#[derive(Debug)]
pub enum MergeOutcome {
    /// This call performed the merge; the committed result is attached.
    Merged(MergeResult),
    /// Another call for the same event is mid-merge; this one was a no-op.
    AlreadyInFlight,
    /// The event was already merged earlier; no-op.
    AlreadyMerged,
    /// The event already failed terminally; a fresh login event is required.
    AlreadyFailed,
    /// The merge completed but the session no longer belongs to this user;
    /// the result was discarded and the guest cart retained.
    Superseded,
}

/// Login-event-driven controller that invokes the merge engine at most once
/// per distinct login and writes the result back to the cart store.
pub struct MergeTrigger<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
    max_attempts: u32,
    states: Mutex<HashMap<(SessionId, UserId), MergePhase>>,
}

impl<S, I> MergeTrigger<S, I>
where
    S: CartStore,
    I: IdentityProvider,
{
    /// Create a trigger. `max_attempts` bounds the read-merge-write retries
    /// per login event (at least 1).
    #[must_use]
    pub fn new(store: Arc<S>, identity: Arc<I>, max_attempts: u32) -> Self {
        Self {
            store,
            identity,
            max_attempts: max_attempts.max(1),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// The recorded phase for a login event, if the trigger has seen it.
    pub async fn phase(&self, event: &LoginEvent) -> Option<MergePhase> {
        let states = self.states.lock().await;
        states
            .get(&(event.previous_session.clone(), event.user.clone()))
            .copied()
    }

    /// Handle a login transition.
    ///
    /// Deduplicates concurrent and repeated calls for the same event, then
    /// runs the merge sequence: read both carts, merge, compare-and-set
    /// write under the user key, delete the guest cart.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::RetriesExhausted`] when every attempt lost
    /// the write race, or [`TriggerError::Store`] on a non-conflict store
    /// failure. Either way the event is marked failed and both carts are
    /// left untouched.
    #[instrument(skip(self, event), fields(session = %event.previous_session, user = %event.user))]
    pub async fn on_login(&self, event: &LoginEvent) -> Result<MergeOutcome, TriggerError> {
        let key = (event.previous_session.clone(), event.user.clone());
        {
            let mut states = self.states.lock().await;
            match states.get(&key) {
                Some(MergePhase::Merging) => return Ok(MergeOutcome::AlreadyInFlight),
                Some(MergePhase::Merged) => return Ok(MergeOutcome::AlreadyMerged),
                Some(MergePhase::Failed) => return Ok(MergeOutcome::AlreadyFailed),
                None => {
                    states.insert(key.clone(), MergePhase::Merging);
                }
            }
        }

        match self.run_merge(event).await {
            Ok(Some(result)) => {
                self.set_phase(&key, MergePhase::Merged).await;
                info!("login merge complete");
                Ok(MergeOutcome::Merged(result))
            }
            Ok(None) => {
                // The login was superseded mid-merge; clear the entry so a
                // later re-login for the same pair can merge.
                let mut states = self.states.lock().await;
                states.remove(&key);
                info!("login superseded, merge result discarded");
                Ok(MergeOutcome::Superseded)
            }
            Err(err) => {
                self.set_phase(&key, MergePhase::Failed).await;
                warn!(error = %err, "login merge failed, carts left untouched");
                Err(err)
            }
        }
    }

    async fn set_phase(&self, key: &(SessionId, UserId), phase: MergePhase) {
        let mut states = self.states.lock().await;
        states.insert(key.clone(), phase);
    }

    /// The read-merge-write sequence. `Ok(None)` means the result was
    /// discarded because the active identity moved on.
    async fn run_merge(&self, event: &LoginEvent) -> Result<Option<MergeResult>, TriggerError> {
        let guest_key = OwnerKey::Guest(event.previous_session.clone());
        let user_key = OwnerKey::User(event.user.clone());

        for attempt in 1..=self.max_attempts {
            let (guest, user) =
                tokio::join!(self.store.get(&guest_key), self.store.get(&user_key));
            let guest = guest?.unwrap_or_else(|| Cart::empty(guest_key.clone()));
            let user = user?.unwrap_or_else(|| Cart::empty(user_key.clone()));

            let result = merge(&guest, &user);

            // Finish the in-flight merge, but never apply it for a stale
            // identity (logout or re-login raced us).
            if self.identity.current_user().as_ref() != Some(&event.user) {
                return Ok(None);
            }

            match self.store.put(&user_key, result.merged_cart.clone()).await {
                Ok(committed) => {
                    self.store.delete(&guest_key).await?;
                    return Ok(Some(MergeResult {
                        merged_cart: committed,
                        ..result
                    }));
                }
                Err(StoreError::Conflict { found, .. }) => {
                    warn!(attempt, found, "concurrent cart write, re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(TriggerError::RetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use cartsync_core::{CurrencyCode, ItemKey, LineItem, Price, ProductId};

    use super::*;
    use crate::store::MemoryCartStore;

    /// Identity provider whose answer can be swapped mid-test.
    struct FixedIdentity {
        user: StdMutex<Option<UserId>>,
    }

    impl FixedIdentity {
        fn logged_in(user: &str) -> Self {
            Self {
                user: StdMutex::new(Some(UserId::new(user))),
            }
        }

        fn set(&self, user: Option<UserId>) {
            *self.user.lock().unwrap() = user;
        }
    }

    impl IdentityProvider for FixedIdentity {
        fn current_user(&self) -> Option<UserId> {
            self.user.lock().unwrap().clone()
        }
    }

    fn item(product: &str, quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(product),
            variant_id: None,
            quantity,
            unit_price: Price::new(Decimal::new(9_99, 2), CurrencyCode::USD),
            added_at: Utc::now(),
        }
    }

    fn event() -> LoginEvent {
        LoginEvent {
            previous_session: SessionId::new("s-1"),
            user: UserId::new("u-1"),
        }
    }

    async fn seed(store: &MemoryCartStore, owner: OwnerKey, items: Vec<LineItem>) {
        let cart = Cart::with_items(owner.clone(), items);
        store.put(&owner, cart).await.unwrap();
    }

    fn trigger(store: &Arc<MemoryCartStore>) -> MergeTrigger<MemoryCartStore, FixedIdentity> {
        MergeTrigger::new(
            Arc::clone(store),
            Arc::new(FixedIdentity::logged_in("u-1")),
            3,
        )
    }

    #[tokio::test]
    async fn test_login_merges_and_deletes_guest_cart() {
        let store = Arc::new(MemoryCartStore::new());
        let event = event();
        let guest_key = OwnerKey::Guest(event.previous_session.clone());
        let user_key = OwnerKey::User(event.user.clone());
        seed(&store, guest_key.clone(), vec![item("a", 2), item("b", 1)]).await;
        seed(&store, user_key.clone(), vec![item("b", 3), item("c", 1)]).await;

        let trigger = trigger(&store);
        let outcome = trigger.on_login(&event).await.unwrap();

        let MergeOutcome::Merged(result) = outcome else {
            panic!("expected a merge, got {outcome:?}");
        };
        assert_eq!(result.merged_cart.total_quantity(), 7);
        assert_eq!(result.merged_cart.version, 2);

        assert!(store.get(&guest_key).await.unwrap().is_none());
        let stored = store.get(&user_key).await.unwrap().unwrap();
        assert_eq!(stored.item(&ItemKey::new("b", None)).unwrap().quantity, 4);
        assert_eq!(trigger.phase(&event).await, Some(MergePhase::Merged));
    }

    #[tokio::test]
    async fn test_login_with_no_user_cart_reowns_guest_items() {
        let store = Arc::new(MemoryCartStore::new());
        let event = event();
        seed(
            &store,
            OwnerKey::Guest(event.previous_session.clone()),
            vec![item("a", 2)],
        )
        .await;

        let trigger = trigger(&store);
        trigger.on_login(&event).await.unwrap();

        let stored = store
            .get(&OwnerKey::User(event.user.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_quantity(), 2);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_login_with_both_carts_absent_persists_empty_cart() {
        let store = Arc::new(MemoryCartStore::new());
        let event = event();

        let trigger = trigger(&store);
        trigger.on_login(&event).await.unwrap();

        // Idempotent no-op merge, but still versioned as a write.
        let stored = store
            .get(&OwnerKey::User(event.user.clone()))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_empty());
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_repeated_login_event_is_deduplicated() {
        let store = Arc::new(MemoryCartStore::new());
        let event = event();
        seed(
            &store,
            OwnerKey::Guest(event.previous_session.clone()),
            vec![item("a", 2)],
        )
        .await;

        let trigger = trigger(&store);
        assert!(matches!(
            trigger.on_login(&event).await.unwrap(),
            MergeOutcome::Merged(_)
        ));
        assert!(matches!(
            trigger.on_login(&event).await.unwrap(),
            MergeOutcome::AlreadyMerged
        ));

        // No double-count: the user cart still holds 2 units.
        let stored = store
            .get(&OwnerKey::User(event.user.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_quantity(), 2);
    }

    #[tokio::test]
    async fn test_distinct_login_events_merge_independently() {
        let store = Arc::new(MemoryCartStore::new());
        let trigger = trigger(&store);

        let first = event();
        trigger.on_login(&first).await.unwrap();

        // Same user logging in from a fresh guest session is a new event.
        let second = LoginEvent {
            previous_session: SessionId::new("s-2"),
            user: first.user.clone(),
        };
        seed(
            &store,
            OwnerKey::Guest(second.previous_session.clone()),
            vec![item("z", 1)],
        )
        .await;

        assert!(matches!(
            trigger.on_login(&second).await.unwrap(),
            MergeOutcome::Merged(_)
        ));
    }

    #[tokio::test]
    async fn test_superseded_login_discards_result_and_keeps_guest_cart() {
        let store = Arc::new(MemoryCartStore::new());
        let event = event();
        let guest_key = OwnerKey::Guest(event.previous_session.clone());
        seed(&store, guest_key.clone(), vec![item("a", 2)]).await;

        let identity = Arc::new(FixedIdentity::logged_in("u-1"));
        identity.set(None); // logged out before the merge ran
        let trigger = MergeTrigger::new(Arc::clone(&store), identity, 3);

        let outcome = trigger.on_login(&event).await.unwrap();
        assert!(matches!(outcome, MergeOutcome::Superseded));

        // Nothing was applied: guest cart intact, no user cart.
        assert!(store.get(&guest_key).await.unwrap().is_some());
        assert!(
            store
                .get(&OwnerKey::User(event.user.clone()))
                .await
                .unwrap()
                .is_none()
        );
        // The event slot is cleared so a later re-login can merge.
        assert_eq!(trigger.phase(&event).await, None);
    }

    #[tokio::test]
    async fn test_conflict_retries_against_fresh_read() {
        use std::sync::atomic::{AtomicBool, Ordering};

        /// Store that simulates a concurrent tab: the first put finds the
        /// user cart already bumped by another writer.
        struct RacingStore {
            inner: MemoryCartStore,
            raced: AtomicBool,
        }

        #[async_trait::async_trait]
        impl CartStore for RacingStore {
            async fn get(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError> {
                self.inner.get(owner).await
            }

            async fn put(&self, owner: &OwnerKey, cart: Cart) -> Result<Cart, StoreError> {
                if owner.is_guest() || self.raced.swap(true, Ordering::SeqCst) {
                    return self.inner.put(owner, cart).await;
                }
                // Another writer commits between the trigger's read and write.
                let fresh = self
                    .inner
                    .get(owner)
                    .await?
                    .unwrap_or_else(|| Cart::empty(owner.clone()));
                self.inner.put(owner, fresh).await?;
                self.inner.put(owner, cart).await
            }

            async fn delete(&self, owner: &OwnerKey) -> Result<(), StoreError> {
                self.inner.delete(owner).await
            }
        }

        let store = Arc::new(RacingStore {
            inner: MemoryCartStore::new(),
            raced: AtomicBool::new(false),
        });
        let event = event();
        let user_key = OwnerKey::User(event.user.clone());
        seed(
            &store.inner,
            OwnerKey::Guest(event.previous_session.clone()),
            vec![item("a", 1)],
        )
        .await;
        seed(&store.inner, user_key.clone(), vec![item("b", 1)]).await;

        let trigger = MergeTrigger::new(
            Arc::clone(&store),
            Arc::new(FixedIdentity::logged_in("u-1")),
            3,
        );
        let outcome = trigger.on_login(&event).await.unwrap();

        // First attempt conflicted; the retry re-read and committed.
        let MergeOutcome::Merged(result) = outcome else {
            panic!("expected a merge, got {outcome:?}");
        };
        assert!(store.raced.load(Ordering::SeqCst));
        assert_eq!(result.merged_cart.version, 3);
        assert_eq!(result.merged_cart.total_quantity(), 2);
    }

    #[tokio::test]
    async fn test_failed_event_is_terminal_and_leaves_carts_intact() {
        /// Store whose puts always conflict.
        struct ContestedStore {
            inner: MemoryCartStore,
        }

        #[async_trait::async_trait]
        impl CartStore for ContestedStore {
            async fn get(&self, owner: &OwnerKey) -> Result<Option<Cart>, StoreError> {
                self.inner.get(owner).await
            }

            async fn put(&self, owner: &OwnerKey, cart: Cart) -> Result<Cart, StoreError> {
                Err(StoreError::Conflict {
                    owner: owner.storage_key(),
                    base: cart.version,
                    found: cart.version + 1,
                })
            }

            async fn delete(&self, owner: &OwnerKey) -> Result<(), StoreError> {
                self.inner.delete(owner).await
            }
        }

        let store = Arc::new(ContestedStore {
            inner: MemoryCartStore::new(),
        });
        let event = event();
        let guest_key = OwnerKey::Guest(event.previous_session.clone());
        store
            .inner
            .put(
                &guest_key,
                Cart::with_items(guest_key.clone(), vec![item("a", 1)]),
            )
            .await
            .unwrap();

        let trigger = MergeTrigger::new(
            Arc::clone(&store),
            Arc::new(FixedIdentity::logged_in("u-1")),
            3,
        );

        let err = trigger.on_login(&event).await.unwrap_err();
        assert!(matches!(
            err,
            TriggerError::RetriesExhausted { attempts: 3 }
        ));
        assert_eq!(trigger.phase(&event).await, Some(MergePhase::Failed));
        // Guest cart untouched for manual retry.
        assert!(store.get(&guest_key).await.unwrap().is_some());

        // Re-firing the failed event is a no-op.
        assert!(matches!(
            trigger.on_login(&event).await.unwrap(),
            MergeOutcome::AlreadyFailed
        ));
    }
}
