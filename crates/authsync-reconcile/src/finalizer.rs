//! Finalizer protocol
//!
//! A finalizer on a local record means "remote side effects exist". It is
//! attached after the first successful convergence and released only after
//! the remote object has been deleted, so the local record can never
//! disappear first.
//!
//! Both mutations re-read the record right before writing. A concurrent
//! write surfaces as `LocalConflict` for the caller to retry.

use tracing::{debug, info};

use authsync_core::{ObjectKey, ResourceSpec, ResourceStore, Result};

pub const DEFAULT_FINALIZER: &str = "authsync.io/finalizer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalizer {
    name: String,
}

impl Default for Finalizer {
    fn default() -> Self {
        Self::new(DEFAULT_FINALIZER)
    }
}

impl Finalizer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the finalizer unless it is already present.
    ///
    /// Returns `true` if the record was written.
    pub async fn ensure_attached<S, St>(&self, store: &St, key: &ObjectKey) -> Result<bool>
    where
        S: ResourceSpec,
        St: ResourceStore,
    {
        let Some(mut resource) = store.get::<S>(key).await? else {
            return Ok(false);
        };
        if resource.metadata.is_deleting() || !resource.metadata.add_finalizer(&self.name) {
            return Ok(false);
        }

        store.update(&resource).await?;
        debug!(kind = %S::KIND, %key, finalizer = %self.name, "Attached finalizer");
        Ok(true)
    }

    /// Remove the finalizer. Reentrant: a record that is gone or no longer
    /// carries the finalizer is left alone.
    ///
    /// Returns `true` if the record was written.
    pub async fn release<S, St>(&self, store: &St, key: &ObjectKey) -> Result<bool>
    where
        S: ResourceSpec,
        St: ResourceStore,
    {
        let Some(mut resource) = store.get::<S>(key).await? else {
            return Ok(false);
        };
        if !resource.metadata.remove_finalizer(&self.name) {
            return Ok(false);
        }

        store.update(&resource).await?;
        info!(kind = %S::KIND, %key, finalizer = %self.name, "Released finalizer");
        Ok(true)
    }
}
