use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::InMemoryLeaseStore;
use crate::LeaseMutex;
use crate::LeaseStore;
use crate::LockFactory;
use crate::StoreLocation;

pub const TEST_LOCATION: &str = "mem://locks";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Factory over a fresh in-memory store, plus the store for direct
/// manipulation from tests.
pub fn memory_factory() -> (LockFactory, Arc<InMemoryLeaseStore>) {
    let store = Arc::new(InMemoryLeaseStore::new());
    let factory = LockFactory::new(StoreLocation::new(TEST_LOCATION), store.clone());
    (factory, store)
}

/// Engine wired to an arbitrary store, with its own root token.
pub fn mutex_with_store(store: Arc<dyn LeaseStore>) -> LeaseMutex {
    LeaseMutex::new(
        StoreLocation::new(TEST_LOCATION),
        store,
        CancellationToken::new(),
    )
}

/// Engine whose token is a child of `token`, so tests can cancel it.
pub fn mutex_with_cancellation(
    store: Arc<dyn LeaseStore>,
    token: &CancellationToken,
) -> LeaseMutex {
    LeaseMutex::new(
        StoreLocation::new(TEST_LOCATION),
        store,
        token.child_token(),
    )
}
