use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use nanoid::nanoid;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::MAX_LEASE_DURATION;
use crate::constants::MIN_LEASE_DURATION;
use crate::LeaseId;
use crate::LeaseState;
use crate::LeaseStore;
use crate::StoreError;

/// One active lease in the table.
#[derive(Debug, Clone)]
struct LeaseRecord {
    lease_id: LeaseId,
    duration: Option<Duration>,
    expires_at: Option<Instant>,
}

impl LeaseRecord {
    fn issue(duration: Option<Duration>) -> Self {
        LeaseRecord {
            lease_id: LeaseId::new(nanoid!()),
            duration,
            expires_at: duration.map(|d| Instant::now() + d),
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.map_or(false, |at| at <= Instant::now())
    }
}

/// Process-local lease store, the conforming adapter shipped with the crate.
///
/// Keeps the lease table in a [`DashMap`] keyed by object path; entry access
/// makes check-and-claim atomic against racing registrations. Expiry runs on
/// the tokio clock, so paused-clock tests exercise the same code path as
/// wall-clock deployments. Expired records are left in place and reclaimed
/// by the next `register` on the same object.
pub struct InMemoryLeaseStore {
    leases: DashMap<String, LeaseRecord>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        InMemoryLeaseStore {
            leases: DashMap::new(),
        }
    }
}

impl Default for InMemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn register(
        &self,
        state: LeaseState,
        new_name: String,
        duration: Option<Duration>,
    ) -> std::result::Result<LeaseState, StoreError> {
        let object = state.location().object_path(&new_name);

        match self.leases.entry(object.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().expired() {
                    return Err(StoreError::Conflict { object });
                }
                let record = LeaseRecord::issue(duration);
                let lease_id = record.lease_id.clone();
                occupied.insert(record);
                debug!("expired lease on {} reclaimed", object);
                Ok(state.holding(new_name, lease_id))
            }
            Entry::Vacant(vacant) => {
                let record = LeaseRecord::issue(duration);
                let lease_id = record.lease_id.clone();
                vacant.insert(record);
                Ok(state.holding(new_name, lease_id))
            }
        }
    }

    async fn renew(
        &self,
        state: LeaseState,
    ) -> std::result::Result<LeaseState, StoreError> {
        let object = state.object_path().ok_or_else(|| StoreError::NotFound {
            object: state.location().to_string(),
        })?;
        let lease_id = state.lease_id().cloned().ok_or_else(|| StoreError::NotFound {
            object: object.clone(),
        })?;

        let mut record = self
            .leases
            .get_mut(&object)
            .ok_or_else(|| StoreError::NotFound {
                object: object.clone(),
            })?;
        if record.expired() {
            return Err(StoreError::NotFound { object });
        }
        if record.lease_id != lease_id {
            return Err(StoreError::Conflict { object });
        }

        let extended = record.duration.map(|d| Instant::now() + d);
        record.expires_at = extended;
        Ok(state)
    }

    async fn unregister(
        &self,
        state: LeaseState,
    ) -> std::result::Result<LeaseState, StoreError> {
        let (object, lease_id) = match (state.object_path(), state.lease_id().cloned()) {
            (Some(object), Some(lease_id)) => (object, lease_id),
            // Nothing believed held; releasing is a no-op.
            _ => return Ok(state.cleared()),
        };

        match self.leases.entry(object.clone()) {
            Entry::Occupied(occupied) => {
                if occupied.get().expired() {
                    return Err(StoreError::NotFound { object });
                }
                if occupied.get().lease_id != lease_id {
                    return Err(StoreError::Conflict { object });
                }
                occupied.remove();
                Ok(state.cleared())
            }
            Entry::Vacant(_) => Err(StoreError::NotFound { object }),
        }
    }

    async fn break_lease(
        &self,
        state: LeaseState,
    ) -> std::result::Result<LeaseState, StoreError> {
        let object = match state.object_path() {
            Some(object) => object,
            // Nothing targeted; breaking is a no-op.
            None => return Ok(state.cleared()),
        };

        match self.leases.remove(&object) {
            Some(_) => {
                debug!("lease on {} broken", object);
                Ok(state.cleared())
            }
            None => Err(StoreError::NotFound { object }),
        }
    }

    fn is_valid_duration(
        &self,
        duration: Option<Duration>,
    ) -> bool {
        match duration {
            None => true,
            Some(d) => d >= MIN_LEASE_DURATION && d <= MAX_LEASE_DURATION,
        }
    }
}
