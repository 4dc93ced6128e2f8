use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::renewal::RenewalHandle;
use crate::constants::DEFAULT_RETRY_INTERVAL;
use crate::constants::MAX_LEASE_DURATION;
use crate::constants::MIN_LEASE_DURATION;
use crate::constants::MIN_RETRY_INTERVAL;
use crate::LeaseId;
use crate::LeaseState;
use crate::LeaseStore;
use crate::LockError;
use crate::Result;
use crate::StoreError;
use crate::StoreLocation;

/// Distributed mutual-exclusion primitive backed by a store-held lease.
///
/// At most one engine, across any number of processes sharing the same
/// backend, can hold an active lease for a given lock name under a given
/// [`StoreLocation`] at a time. The engine owns its [`LeaseState`], runs
/// the background renewal loop for bounded leases, and maps store
/// contention to an unsuccessful attempt rather than an error.
///
/// Calls on one engine must be serialized by the caller; `&mut self`
/// enforces that at compile time. Racing *different* engines for the same
/// name is the scenario the store-level conflict check protects.
///
/// # Examples
/// ```rust,ignore
/// let mut mutex = factory.mutex();
/// if mutex.try_lock("orders-reaper", Some(Duration::from_secs(30))).await? {
///     // critical section
///     mutex.unlock().await?;
/// }
/// ```
pub struct LeaseMutex {
    state: Arc<Mutex<LeaseState>>,
    store: Arc<dyn LeaseStore>,
    cancel: CancellationToken,
    renewal: Option<RenewalHandle>,
    disposed: bool,
}

impl LeaseMutex {
    pub(crate) fn new(
        location: StoreLocation,
        store: Arc<dyn LeaseStore>,
        cancel: CancellationToken,
    ) -> Self {
        LeaseMutex {
            state: Arc::new(Mutex::new(LeaseState::new(location))),
            store,
            cancel,
            renewal: None,
            disposed: false,
        }
    }

    /// Name of the lock this engine is bound to, if any.
    pub fn lock_name(&self) -> Option<String> {
        self.state.lock().lock_name().map(str::to_string)
    }

    /// Identifier of the lease this engine currently holds, if any.
    pub fn lease_id(&self) -> Option<LeaseId> {
        self.state.lock().lease_id().cloned()
    }

    /// Whether this engine believes it holds an active lease.
    pub fn is_held(&self) -> bool {
        self.state.lock().lease_id().is_some()
    }

    /// Single acquisition attempt, returns immediately.
    ///
    /// Re-acquiring the name already held reports success without a store
    /// round-trip and leaves the lease id unchanged. Holding a different
    /// name releases it first. Contention maps to `Ok(false)`, never an
    /// error. An out-of-range `duration` is a contract violation and fails
    /// before any store interaction; `None` requests the store's
    /// unbounded/default lease.
    pub async fn try_lock(
        &mut self,
        name: &str,
        duration: Option<Duration>,
    ) -> Result<bool> {
        self.ensure_usable()?;
        if name.is_empty() {
            return Err(LockError::EmptyName.into());
        }
        if !self.store.is_valid_duration(duration) {
            return Err(LockError::InvalidLeaseDuration {
                requested: duration.unwrap_or_default(),
                min: MIN_LEASE_DURATION,
                max: MAX_LEASE_DURATION,
            }
            .into());
        }

        {
            let state = self.state.lock();
            if state.lease_id().is_some() && state.lock_name() == Some(name) {
                debug!("lease on {:?} already held, skipping store round-trip", name);
                return Ok(true);
            }
        }
        if self.is_held() {
            // One engine holds one lease at a time; switching names gives
            // the old one up first.
            self.unlock().await?;
        }

        let snapshot = self.state.lock().clone();
        match self.store.register(snapshot, name.to_string(), duration).await {
            Ok(registered) => {
                *self.state.lock() = registered;
                if let Some(lease_duration) = duration {
                    self.renewal = Some(RenewalHandle::spawn(
                        self.store.clone(),
                        self.state.clone(),
                        lease_duration,
                        &self.cancel,
                    ));
                }
                debug!("lease on {:?} acquired", name);
                Ok(true)
            }
            Err(StoreError::Conflict { .. }) => {
                // Keep the target so a recovery force_unlock knows which
                // object to break.
                let mut state = self.state.lock();
                *state = state.clone().targeting(name);
                debug!("lease on {:?} is held elsewhere", name);
                Ok(false)
            }
            Err(e) => {
                error!("registering lease on {:?} failed: {:?}", name, e);
                Err(e.into())
            }
        }
    }

    /// Suspend until the lease is acquired or the engine's cancellation
    /// token fires.
    ///
    /// Retries on a fixed interval, default 3 seconds, floored at 1 second.
    /// A fired token reports `Ok(false)`: cancellation is an outcome here,
    /// not a fault.
    pub async fn lock(
        &mut self,
        name: &str,
        duration: Option<Duration>,
        retry_interval: Option<Duration>,
    ) -> Result<bool> {
        let interval = retry_interval
            .unwrap_or(DEFAULT_RETRY_INTERVAL)
            .max(MIN_RETRY_INTERVAL);

        loop {
            if self.cancel.is_cancelled() {
                debug!("acquisition of {:?} cancelled", name);
                return Ok(false);
            }
            if self.try_lock(name, duration).await? {
                return Ok(true);
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("acquisition of {:?} cancelled while waiting", name);
                    return Ok(false);
                }
                _ = sleep(interval) => {}
            }
        }
    }

    /// Give up the held lease, if any. Idempotent.
    ///
    /// The renewal loop is stopped and joined before the store is
    /// contacted, so a renew cannot revive a lease this call just released.
    /// Conflict/not-found outcomes mean the lease is already gone and are
    /// swallowed; other provider failures re-raise with the state retained
    /// so the caller may retry.
    pub async fn unlock(&mut self) -> Result<()> {
        if let Some(renewal) = self.renewal.take() {
            renewal.shutdown().await;
        }

        let snapshot = self.state.lock().clone();
        if snapshot.lease_id().is_none() {
            // Nothing held; drop any leftover target binding.
            let mut state = self.state.lock();
            *state = state.clone().cleared();
            return Ok(());
        }

        match self.store.unregister(snapshot).await {
            Ok(released) => {
                *self.state.lock() = released.cleared();
                Ok(())
            }
            Err(e) if e.lease_already_gone() => {
                debug!("lease was already gone on release: {:?}", e);
                let mut state = self.state.lock();
                *state = state.clone().cleared();
                Ok(())
            }
            Err(e) => {
                error!("releasing lease failed: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Remove the lease on the targeted object even if this engine cannot
    /// prove it is the holder, the recovery path for crashed holders.
    ///
    /// With a held lease this degrades to [`unlock`](Self::unlock).
    /// Conflict/not-found responses are treated as already released. Any
    /// other failure is logged, and re-raised only when `propagate_errors`
    /// is set.
    pub async fn force_unlock(
        &mut self,
        propagate_errors: bool,
    ) -> Result<()> {
        match self.force_unlock_inner().await {
            Ok(()) => Ok(()),
            Err(e) if propagate_errors => Err(e),
            Err(_) => Ok(()),
        }
    }

    async fn force_unlock_inner(&mut self) -> Result<()> {
        if self.is_held() {
            return self.unlock().await;
        }

        let snapshot = self.state.lock().clone();
        if snapshot.lock_name().is_none() {
            return Ok(());
        }
        match self.store.break_lease(snapshot).await {
            Ok(broken) => {
                *self.state.lock() = broken.cleared();
                Ok(())
            }
            Err(e) if e.lease_already_gone() => {
                debug!("no lease left to break: {:?}", e);
                let mut state = self.state.lock();
                *state = state.clone().cleared();
                Ok(())
            }
            Err(e) => {
                error!("breaking lease failed: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Idempotent teardown. Runs the forced-release path with failures
    /// logged, never raised; the provider handle is released when the
    /// engine value drops. After this the engine refuses new acquisitions.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        // Errors are logged inside; teardown must not raise.
        let _ = self.force_unlock(false).await;
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.disposed {
            return Err(LockError::Disposed.into());
        }
        Ok(())
    }
}

impl Drop for LeaseMutex {
    fn drop(&mut self) {
        if let Some(renewal) = self.renewal.take() {
            renewal.abandon();
        }
        if self.disposed {
            return;
        }
        let snapshot = self.state.lock().clone();
        if snapshot.lease_id().is_none() {
            return;
        }
        warn!(
            "mutex on {:?} dropped while holding a lease, releasing best-effort",
            snapshot.lock_name()
        );
        let store = self.store.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = store.unregister(snapshot).await {
                    error!("best-effort release on drop failed: {:?}", e);
                }
            });
        }
    }
}
