use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::test_utils::enable_logger;
use crate::test_utils::mutex_with_cancellation;
use crate::test_utils::mutex_with_store;
use crate::Error;
use crate::LeaseId;
use crate::LockError;
use crate::MockLeaseStore;
use crate::StoreError;

fn granting_store() -> MockLeaseStore {
    let mut store = MockLeaseStore::new();
    store.expect_is_valid_duration().return_const(true);
    store
}

#[tokio::test]
async fn try_lock_rejects_empty_name_without_store_contact() {
    // No expectations registered: any store call would panic the test.
    let store = MockLeaseStore::new();
    let mut mutex = mutex_with_store(Arc::new(store));

    let result = mutex.try_lock("", None).await;
    assert!(matches!(result, Err(Error::Lock(LockError::EmptyName))));
}

#[tokio::test]
async fn try_lock_rejects_out_of_range_duration_without_store_contact() {
    let mut store = MockLeaseStore::new();
    store.expect_is_valid_duration().return_const(false);
    store.expect_register().times(0);
    let mut mutex = mutex_with_store(Arc::new(store));

    let result = mutex.try_lock("job", Some(Duration::from_secs(5))).await;
    assert!(matches!(
        result,
        Err(Error::Lock(LockError::InvalidLeaseDuration { .. }))
    ));
    assert!(!mutex.is_held());
}

#[tokio::test]
async fn redundant_try_lock_skips_store_and_keeps_lease_id() {
    let mut store = granting_store();
    store
        .expect_register()
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L1"))));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex.try_lock("job", None).await.unwrap());
    let first_id = mutex.lease_id().unwrap();

    // Second acquisition of the held name must not hit the store; the
    // times(1) expectation above enforces it.
    assert!(mutex.try_lock("job", None).await.unwrap());
    assert_eq!(mutex.lease_id().unwrap(), first_id);
}

#[tokio::test]
async fn try_lock_different_name_releases_previous_lease() {
    let mut store = granting_store();
    store
        .expect_register()
        .withf(|_, name, _| name.as_str() == "first")
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L1"))));
    store
        .expect_unregister()
        .withf(|state| state.lock_name() == Some("first"))
        .times(1)
        .returning(|state| Ok(state.cleared()));
    store
        .expect_register()
        .withf(|_, name, _| name.as_str() == "second")
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L2"))));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex.try_lock("first", None).await.unwrap());
    let first_id = mutex.lease_id().unwrap();

    assert!(mutex.try_lock("second", None).await.unwrap());
    assert_eq!(mutex.lock_name().as_deref(), Some("second"));
    assert_ne!(mutex.lease_id().unwrap(), first_id);
}

#[tokio::test]
async fn contention_maps_to_unsuccessful_attempt() {
    let mut store = granting_store();
    store.expect_register().times(1).returning(|state, name, _| {
        Err(StoreError::Conflict {
            object: state.location().object_path(&name),
        })
    });
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(!mutex.try_lock("job", None).await.unwrap());
    assert!(!mutex.is_held());
    // The loser stays bound to the name so a recovery force_unlock knows
    // which object to break.
    assert_eq!(mutex.lock_name().as_deref(), Some("job"));
}

#[tokio::test]
async fn transport_fault_during_register_propagates() {
    let mut store = granting_store();
    store
        .expect_register()
        .times(1)
        .returning(|_, _, _| Err(StoreError::Backend("boom".to_string())));
    let mut mutex = mutex_with_store(Arc::new(store));

    let result = mutex.try_lock("job", None).await;
    assert!(matches!(result, Err(Error::Store(StoreError::Backend(_)))));
}

#[tokio::test]
async fn unlock_without_lease_skips_store() {
    let mut store = MockLeaseStore::new();
    store.expect_unregister().times(0);
    let mut mutex = mutex_with_store(Arc::new(store));

    mutex.unlock().await.unwrap();
    assert!(!mutex.is_held());
}

#[tokio::test]
async fn unlock_swallows_not_found_and_clears_state() {
    let mut store = granting_store();
    store
        .expect_register()
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L1"))));
    store.expect_unregister().times(1).returning(|state| {
        Err(StoreError::NotFound {
            object: state.object_path().unwrap_or_default(),
        })
    });
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex.try_lock("job", None).await.unwrap());
    mutex.unlock().await.unwrap();
    assert!(!mutex.is_held());
    assert_eq!(mutex.lock_name(), None);
}

#[tokio::test]
async fn unlock_propagates_backend_failure_and_keeps_state() {
    let mut store = granting_store();
    store
        .expect_register()
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L1"))));
    store
        .expect_unregister()
        .times(1)
        .returning(|_| Err(StoreError::Backend("io".to_string())));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex.try_lock("job", None).await.unwrap());
    let result = mutex.unlock().await;
    assert!(matches!(result, Err(Error::Store(StoreError::Backend(_)))));
    // State retained so the caller may retry the release.
    assert!(mutex.is_held());
}

#[tokio::test]
async fn force_unlock_breaks_when_not_holding() {
    let mut store = granting_store();
    store.expect_register().times(1).returning(|state, name, _| {
        Err(StoreError::Conflict {
            object: state.location().object_path(&name),
        })
    });
    store
        .expect_break_lease()
        .withf(|state| state.lock_name() == Some("job"))
        .times(1)
        .returning(|state| Ok(state.cleared()));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(!mutex.try_lock("job", None).await.unwrap());
    mutex.force_unlock(true).await.unwrap();
    assert_eq!(mutex.lock_name(), None);
}

#[tokio::test]
async fn force_unlock_degrades_to_unlock_when_holding() {
    let mut store = granting_store();
    store
        .expect_register()
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L1"))));
    store
        .expect_unregister()
        .times(1)
        .returning(|state| Ok(state.cleared()));
    store.expect_break_lease().times(0);
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex.try_lock("job", None).await.unwrap());
    mutex.force_unlock(true).await.unwrap();
    assert!(!mutex.is_held());
}

#[tokio::test]
async fn force_unlock_swallows_benign_break_failures() {
    let mut store = granting_store();
    store.expect_register().times(1).returning(|state, name, _| {
        Err(StoreError::Conflict {
            object: state.location().object_path(&name),
        })
    });
    store.expect_break_lease().times(1).returning(|state| {
        Err(StoreError::NotFound {
            object: state.object_path().unwrap_or_default(),
        })
    });
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(!mutex.try_lock("job", None).await.unwrap());
    mutex.force_unlock(true).await.unwrap();
    assert_eq!(mutex.lock_name(), None);
}

#[tokio::test]
async fn force_unlock_propagates_transport_fault_only_when_asked() {
    let mut store = granting_store();
    store.expect_register().times(1).returning(|state, name, _| {
        Err(StoreError::Conflict {
            object: state.location().object_path(&name),
        })
    });
    store
        .expect_break_lease()
        .times(2)
        .returning(|_| Err(StoreError::Backend("io".to_string())));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(!mutex.try_lock("job", None).await.unwrap());
    let result = mutex.force_unlock(true).await;
    assert!(matches!(result, Err(Error::Store(StoreError::Backend(_)))));

    // Same failure with propagation off is logged and swallowed.
    mutex.force_unlock(false).await.unwrap();
}

#[tokio::test]
async fn dispose_is_idempotent_and_blocks_reuse() {
    let mut store = granting_store();
    store
        .expect_register()
        .times(1)
        .returning(|state, name, _| Ok(state.holding(name, LeaseId::new("L1"))));
    store
        .expect_unregister()
        .times(1)
        .returning(|state| Ok(state.cleared()));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex.try_lock("job", None).await.unwrap());
    mutex.dispose().await;
    mutex.dispose().await;

    let result = mutex.try_lock("job", None).await;
    assert!(matches!(result, Err(Error::Lock(LockError::Disposed))));
}

#[tokio::test(start_paused = true)]
async fn lock_retries_on_fixed_interval_until_acquired() {
    enable_logger();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    let mut store = granting_store();
    store.expect_register().times(3).returning(move |state, name, _| {
        if seen.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(StoreError::Conflict {
                object: state.location().object_path(&name),
            })
        } else {
            Ok(state.holding(name, LeaseId::new("L1")))
        }
    });
    let mut mutex = mutex_with_store(Arc::new(store));

    let started = Instant::now();
    assert!(mutex.lock("job", None, None).await.unwrap());

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // Two waits at the 3s default interval.
    assert!(started.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn lock_clamps_retry_interval_to_one_second() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();

    let mut store = granting_store();
    store.expect_register().times(2).returning(move |state, name, _| {
        if seen.fetch_add(1, Ordering::SeqCst) < 1 {
            Err(StoreError::Conflict {
                object: state.location().object_path(&name),
            })
        } else {
            Ok(state.holding(name, LeaseId::new("L1")))
        }
    });
    let mut mutex = mutex_with_store(Arc::new(store));

    let started = Instant::now();
    assert!(mutex
        .lock("job", None, Some(Duration::from_millis(10)))
        .await
        .unwrap());

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1));
    assert!(waited < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn failed_renewal_makes_the_next_acquire_re_register() {
    let registers = Arc::new(AtomicUsize::new(0));
    let seen = registers.clone();

    let mut store = granting_store();
    store.expect_register().times(2).returning(move |state, name, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(state.holding(name, LeaseId::new("L1")))
    });
    store
        .expect_renew()
        .times(1)
        .returning(|state| {
            Err(StoreError::NotFound {
                object: state.object_path().unwrap_or_default(),
            })
        });
    store
        .expect_unregister()
        .times(1)
        .returning(|state| Ok(state.cleared()));
    let mut mutex = mutex_with_store(Arc::new(store));

    assert!(mutex
        .try_lock("job", Some(Duration::from_secs(16)))
        .await
        .unwrap());

    // The renewal fires at 12s and fails; the engine stops claiming the
    // lease.
    sleep(Duration::from_secs(13)).await;
    assert!(!mutex.is_held());

    // Same name, but no short-circuit this time: the store is contacted
    // again.
    assert!(mutex
        .try_lock("job", Some(Duration::from_secs(16)))
        .await
        .unwrap());
    assert_eq!(registers.load(Ordering::SeqCst), 2);

    mutex.unlock().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn lock_returns_without_lease_on_cancellation() {
    let mut store = granting_store();
    store.expect_register().returning(|state, name, _| {
        Err(StoreError::Conflict {
            object: state.location().object_path(&name),
        })
    });

    let token = CancellationToken::new();
    let mut mutex = mutex_with_cancellation(Arc::new(store), &token);

    let canceller = token.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(10)).await;
        canceller.cancel();
    });

    // Cancellation is an outcome, not a fault.
    assert!(!mutex.lock("job", None, None).await.unwrap());
    assert!(!mutex.is_held());
}
