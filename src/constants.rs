use std::time::Duration;

// -
// Lease duration domain

/// Shortest bounded lease the store contract accepts
pub(crate) const MIN_LEASE_DURATION: Duration = Duration::from_secs(15);
/// Longest bounded lease the store contract accepts
pub(crate) const MAX_LEASE_DURATION: Duration = Duration::from_secs(60);

// -
// Blocking acquisition retry cadence

pub(crate) const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);
pub(crate) const MIN_RETRY_INTERVAL: Duration = Duration::from_secs(1);
