use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use d_lock::LockFactory;
use d_lock::StoreLocation;

use commons::factory_on;
use commons::memory_store;

#[tokio::test(start_paused = true)]
async fn renewal_keeps_a_held_lock_alive_past_its_duration() {
    let factory = factory_on(memory_store());

    let mut holder = factory.mutex();
    assert!(holder
        .try_lock("test_lock", Some(Duration::from_secs(15)))
        .await
        .unwrap());

    // Well past the nominal 15s duration; the renewal loop fired at 11.25s
    // and pushed expiry out.
    sleep(Duration::from_secs(20)).await;

    let mut contender = factory.mutex();
    assert!(!contender
        .try_lock("test_lock", Some(Duration::from_secs(15)))
        .await
        .unwrap());

    holder.unlock().await.unwrap();
    assert!(contender
        .try_lock("test_lock", Some(Duration::from_secs(15)))
        .await
        .unwrap());

    contender.unlock().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn a_lapsed_lease_is_claimable_once_renewal_stops() {
    let store = memory_store();
    let token = CancellationToken::new();
    let factory = LockFactory::builder(StoreLocation::new(commons::LOCK_LOCATION), store.clone())
        .cancellation(token.clone())
        .build();

    let mut holder = factory.mutex();
    assert!(holder
        .try_lock("test_lock", Some(Duration::from_secs(15)))
        .await
        .unwrap());

    // Engine-wide cancellation stops the renewal loop; the holder's lease
    // then lapses on the store's clock.
    token.cancel();
    sleep(Duration::from_secs(20)).await;

    let other_factory = factory_on(store);
    let mut contender = other_factory.mutex();
    assert!(contender
        .try_lock("test_lock", Some(Duration::from_secs(15)))
        .await
        .unwrap());

    // The stale holder's release observes the lease is no longer its own
    // and still succeeds.
    holder.unlock().await.unwrap();
    assert!(!holder.is_held());

    contender.unlock().await.unwrap();
}
