//! Entry points that bind a store location and a provider once, then hand
//! out ready-to-use [`LeaseMutex`] engines per call.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::LeaseMutex;
use crate::LeaseStore;
use crate::LockConfig;
use crate::Result;
use crate::StoreLocation;


/// Hands out [`LeaseMutex`] engines wired to one shared provider.
///
/// No pooling and no caching: every call constructs a fresh engine. Custom
/// lease defaults and cancellation come in through
/// [`builder`](Self::builder).
///
/// # Examples
/// ```rust,ignore
/// let factory = LockFactory::new(StoreLocation::new("mem://locks"), store);
///
/// let (mutex, acquired) = factory.try_create("nightly-compaction").await?;
/// if acquired {
///     // critical section
/// }
/// ```
pub struct LockFactory {
    location: StoreLocation,
    store: Arc<dyn LeaseStore>,
    config: LockConfig,
    cancel: CancellationToken,
}

impl LockFactory {
    /// Factory with default configuration and its own root token.
    pub fn new(
        location: StoreLocation,
        store: Arc<dyn LeaseStore>,
    ) -> Self {
        Self::builder(location, store).build()
    }

    /// Start factory construction with a location and provider; chain
    /// configuration methods before calling
    /// [`build()`](LockFactoryBuilder::build).
    pub fn builder(
        location: StoreLocation,
        store: Arc<dyn LeaseStore>,
    ) -> LockFactoryBuilder {
        LockFactoryBuilder {
            location,
            store,
            config: None,
            cancel: None,
        }
    }

    /// Fresh engine bound to this factory's location and provider, not yet
    /// holding anything.
    pub fn mutex(&self) -> LeaseMutex {
        LeaseMutex::new(
            self.location.clone(),
            self.store.clone(),
            self.cancel.child_token(),
        )
    }

    /// One acquisition attempt with the configured default lease duration.
    pub async fn try_create(
        &self,
        name: &str,
    ) -> Result<(LeaseMutex, bool)> {
        self.try_create_with_duration(name, self.config.lease.duration()).await
    }

    /// One acquisition attempt with an explicit lease duration.
    pub async fn try_create_with_duration(
        &self,
        name: &str,
        duration: Option<Duration>,
    ) -> Result<(LeaseMutex, bool)> {
        let mut mutex = self.mutex();
        let acquired = mutex.try_lock(name, duration).await?;
        Ok((mutex, acquired))
    }

    /// Engine holding `name`, suspending until acquired or cancelled, with
    /// the configured default lease duration. On cancellation the engine
    /// comes back unheld; check [`LeaseMutex::is_held`].
    pub async fn create(
        &self,
        name: &str,
    ) -> Result<LeaseMutex> {
        self.create_with_duration(name, self.config.lease.duration()).await
    }

    /// Engine holding `name`, suspending until acquired or cancelled, with
    /// an explicit lease duration.
    pub async fn create_with_duration(
        &self,
        name: &str,
        duration: Option<Duration>,
    ) -> Result<LeaseMutex> {
        let mut mutex = self.mutex();
        mutex
            .lock(name, duration, Some(self.config.retry.interval()))
            .await?;
        Ok(mutex)
    }
}

/// Configurable factory construction, hiding the config/cancellation
/// overload surface behind a small builder.
pub struct LockFactoryBuilder {
    location: StoreLocation,
    store: Arc<dyn LeaseStore>,
    config: Option<LockConfig>,
    cancel: Option<CancellationToken>,
}

impl LockFactoryBuilder {
    pub fn config(
        mut self,
        config: LockConfig,
    ) -> Self {
        self.config = Some(config);
        self
    }

    /// Root token every engine's token derives from; cancelling it stops
    /// all pending acquisitions and renewal loops handed out by the
    /// factory.
    pub fn cancellation(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> LockFactory {
        LockFactory {
            location: self.location,
            store: self.store,
            config: self.config.unwrap_or_default(),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}
