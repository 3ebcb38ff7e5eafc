//! Integration tests for compare-and-set contention on the cart store.
//!
//! Multiple tabs and the merge trigger can write the same owner key
//! concurrently; the version check must admit exactly one writer per base
//! version, with every loser observing a conflict.

use std::sync::Arc;

use cartsync_core::{Cart, OwnerKey, UserId};
use cartsync_integration_tests::{init_tracing, line_item};
use cartsync_reconcile::{CartStore, MemoryCartStore, StoreError};

#[tokio::test]
async fn many_writers_same_base_version_admit_one() {
    init_tracing();

    let store = Arc::new(MemoryCartStore::new());
    let owner = OwnerKey::User(UserId::new("u-1"));
    let base = Cart::with_items(owner.clone(), vec![line_item("a", 1, 9_99)]);
    let base = store.put(&owner, base).await.unwrap();

    let mut handles = Vec::new();
    for n in 0..8_u32 {
        let store = Arc::clone(&store);
        let owner = owner.clone();
        let mut cart = base.clone();
        handles.push(tokio::spawn(async move {
            // Each tab writes its own quantity against the same base.
            cart.items[0].quantity = n + 1;
            store.put(&owner, cart).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(committed) => {
                successes += 1;
                assert_eq!(committed.version, base.version + 1);
            }
            Err(StoreError::Conflict { found, .. }) => {
                conflicts += 1;
                assert_eq!(found, base.version + 1);
            }
            Err(other) => panic!("unexpected store error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn reread_after_conflict_succeeds() {
    init_tracing();

    let store = MemoryCartStore::new();
    let owner = OwnerKey::User(UserId::new("u-1"));
    let committed = store
        .put(
            &owner,
            Cart::with_items(owner.clone(), vec![line_item("a", 1, 9_99)]),
        )
        .await
        .unwrap();

    // A second writer with the stale base loses...
    let stale = Cart::with_items(owner.clone(), vec![line_item("a", 5, 9_99)]);
    assert!(matches!(
        store.put(&owner, stale).await,
        Err(StoreError::Conflict { .. })
    ));

    // ...then re-reads and wins.
    let mut fresh = store.get(&owner).await.unwrap().unwrap();
    fresh.items[0].quantity = 5;
    let rewritten = store.put(&owner, fresh).await.unwrap();
    assert_eq!(rewritten.version, committed.version + 1);
    assert_eq!(rewritten.total_quantity(), 5);
}

#[tokio::test]
async fn writes_to_distinct_owners_do_not_contend() {
    init_tracing();

    let store = Arc::new(MemoryCartStore::new());
    let mut handles = Vec::new();
    for n in 0..8_u32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let owner = OwnerKey::User(UserId::new(format!("u-{n}")));
            let cart = Cart::with_items(owner.clone(), vec![line_item("a", 1, 9_99)]);
            store.put(&owner, cart).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}
