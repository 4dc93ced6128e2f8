use std::fmt;

/// Opaque token returned by the store on successful lease acquisition.
///
/// Required to renew, release, or prove ownership. The engine never
/// interprets it beyond equality comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseId(String);

impl LeaseId {
    pub fn new(id: impl Into<String>) -> Self {
        LeaseId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope in the backing store under which leased objects live.
///
/// A lock name maps to exactly one object below this root; the pair
/// `(location, name)` identifies the resource the store serializes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation(String);

impl StoreLocation {
    pub fn new(root: impl Into<String>) -> Self {
        StoreLocation(root.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the object a lock name leases under this location.
    pub fn object_path(
        &self,
        name: &str,
    ) -> String {
        format!("{}/{}", self.0.trim_end_matches('/'), name)
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutable record of one lock attempt.
///
/// The engine exclusively owns its instance; providers take it by value and
/// return the updated copy, never retaining a reference across calls.
///
/// Invariant: `lease_id` is non-empty exactly when the owning engine
/// believes it holds an active lease, and `lock_name` tracks which logical
/// resource that lease protects.
#[derive(Debug, Clone)]
pub struct LeaseState {
    location: StoreLocation,
    lock_name: Option<String>,
    lease_id: Option<LeaseId>,
}

impl LeaseState {
    pub fn new(location: StoreLocation) -> Self {
        LeaseState {
            location,
            lock_name: None,
            lease_id: None,
        }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn lock_name(&self) -> Option<&str> {
        self.lock_name.as_deref()
    }

    pub fn lease_id(&self) -> Option<&LeaseId> {
        self.lease_id.as_ref()
    }

    /// Path of the object this state currently targets, if any.
    pub fn object_path(&self) -> Option<String> {
        self.lock_name
            .as_deref()
            .map(|name| self.location.object_path(name))
    }

    /// State after the store granted a lease on `name`.
    pub fn holding(
        mut self,
        name: impl Into<String>,
        lease_id: LeaseId,
    ) -> Self {
        self.lock_name = Some(name.into());
        self.lease_id = Some(lease_id);
        self
    }

    /// State bound to `name` without owning its lease, e.g. after losing a
    /// registration race.
    pub fn targeting(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.lock_name = Some(name.into());
        self.lease_id = None;
        self
    }

    /// State with no resource bound and no lease held.
    pub fn cleared(mut self) -> Self {
        self.lock_name = None;
        self.lease_id = None;
        self
    }
}
