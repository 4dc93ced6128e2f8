use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;

use crate::LeaseState;
use crate::LeaseStore;

/// How far into a lease's duration the next renew fires.
pub(crate) fn renewal_interval(lease_duration: Duration) -> Duration {
    lease_duration * 3 / 4
}

/// Handle to the background task re-asserting a held bounded lease.
///
/// The task's token is a child of the engine-wide one, so engine-level
/// cancellation and a lock-specific [`shutdown`](Self::shutdown) both stop
/// the loop. There is no hard-kill; the loop observes the token at each
/// wake point.
pub(crate) struct RenewalHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RenewalHandle {
    pub(crate) fn spawn(
        store: Arc<dyn LeaseStore>,
        state: Arc<Mutex<LeaseState>>,
        lease_duration: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let interval = renewal_interval(lease_duration);
        let handle = tokio::spawn(async move {
            renewal_loop(store, state, interval, token).await;
        });
        RenewalHandle { cancel, handle }
    }

    /// Cancel the loop and wait until it observed the cancellation, so no
    /// renew call can race whatever the caller does next.
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!("renewal task did not shut down cleanly: {:?}", e);
        }
    }

    /// Cancellation without joining, for teardown paths that cannot await.
    pub(crate) fn abandon(self) {
        self.cancel.cancel();
    }
}

async fn renewal_loop(
    store: Arc<dyn LeaseStore>,
    state: Arc<Mutex<LeaseState>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(interval) => {}
        }
        // Release may have fired while this task was parked on the timer.
        if cancel.is_cancelled() {
            break;
        }

        let snapshot = state.lock().clone();
        let name = snapshot.lock_name().unwrap_or("").to_string();
        if snapshot.lease_id().is_none() {
            break;
        }
        match store.renew(snapshot).await {
            Ok(renewed) => {
                debug!("lease on {:?} renewed", name);
                *state.lock() = renewed;
            }
            Err(e) => {
                // No auto-retry. The lease id is dropped so the owner no
                // longer claims the lease; its next acquire on this name
                // re-registers once the store lets the lease lapse.
                error!("lease renewal on {:?} failed, renewal stops: {:?}", name, e);
                let mut guard = state.lock();
                *guard = guard.clone().targeting(name);
                break;
            }
        }
    }
}
