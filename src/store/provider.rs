use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::LeaseState;
use crate::StoreError;

/// Capability interface to a lease-capable object store.
///
/// This is the sole seam between the mutex engine and a concrete backend.
/// Every operation takes the current [`LeaseState`] and returns the updated
/// one; implementations must treat the state as caller-owned and must not
/// cache it across calls.
///
/// Conformance rules:
/// - `register` creates the backing object if it does not exist yet, then
///   acquires the lease on it.
/// - `unregister` and `break_lease` are safe to call when no lease is
///   currently believed held.
/// - Backend conflict and not-found conditions surface as
///   [`StoreError::Conflict`] / [`StoreError::NotFound`] so callers can
///   discriminate them from transport faults.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    /// Acquire a lease on the object `new_name` maps to under the state's
    /// location. A `duration` of `None` requests the store's unbounded or
    /// default lease.
    async fn register(
        &self,
        state: LeaseState,
        new_name: String,
        duration: Option<Duration>,
    ) -> std::result::Result<LeaseState, StoreError>;

    /// Re-assert the lease the state claims to hold.
    async fn renew(
        &self,
        state: LeaseState,
    ) -> std::result::Result<LeaseState, StoreError>;

    /// Give up the lease the state claims to hold.
    async fn unregister(
        &self,
        state: LeaseState,
    ) -> std::result::Result<LeaseState, StoreError>;

    /// Remove whatever lease exists on the targeted object, whether or not
    /// this caller owns it.
    async fn break_lease(
        &self,
        state: LeaseState,
    ) -> std::result::Result<LeaseState, StoreError>;

    /// Whether the store accepts `duration` for a new lease. `None` is
    /// always acceptable and requests the unbounded/default lease.
    fn is_valid_duration(
        &self,
        duration: Option<Duration>,
    ) -> bool;
}
