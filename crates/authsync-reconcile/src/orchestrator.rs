//! Reconcile orchestrator
//!
//! One state machine for every kind. The record's deletion marker selects
//! the path:
//!
//! - Live: lookup by natural key, resolve dependencies and create when
//!   absent, handle drift per [`UpdatePolicy`], synchronize relationships,
//!   attach the finalizer.
//! - Deleting: if the finalizer is present, delete remotely and then
//!   release it; otherwise there is nothing left to do.
//!
//! Any failure aborts the reconciliation before the finalizer is touched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use authsync_core::{
    AuthSyncError, IdentityApi, ObjectKey, Resource, ResourceKind, ResourceSpec, ResourceStore,
    Result,
};

use crate::finalizer::{Finalizer, DEFAULT_FINALIZER};
use crate::kinds::{ApplicationKind, GroupKind, ProviderKind, UserKind};
use crate::membership::MembershipChanges;

// =============================================================================
// Configuration
// =============================================================================

/// What to do when an existing remote record differs from its spec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Leave existing records alone and log the drift
    #[default]
    CreateOnly,
    /// Issue an update for kinds that support it
    UpdateExisting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub finalizer: String,
    pub update_policy: UpdatePolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            finalizer: DEFAULT_FINALIZER.to_string(),
            update_policy: UpdatePolicy::default(),
        }
    }
}

// =============================================================================
// Per-kind capabilities
// =============================================================================

/// The operations that make one resource kind reconcilable
#[async_trait]
pub trait ReconcileKind: Send + Sync + 'static {
    type Spec: ResourceSpec;
    type Remote: fmt::Debug + Send + Sync;
    type Dependencies: Send + Sync;

    /// Whether existing remote records may be updated in place
    const UPDATABLE: bool = true;

    async fn lookup<C: IdentityApi>(&self, api: &C, spec: &Self::Spec)
        -> Result<Option<Self::Remote>>;

    async fn resolve_dependencies<C: IdentityApi>(
        &self,
        api: &C,
        spec: &Self::Spec,
    ) -> Result<Self::Dependencies>;

    async fn create<C: IdentityApi>(
        &self,
        api: &C,
        spec: &Self::Spec,
        dependencies: &Self::Dependencies,
    ) -> Result<Self::Remote>;

    /// Spec field names whose remote value differs
    fn drift(&self, _spec: &Self::Spec, _remote: &Self::Remote) -> Vec<&'static str> {
        Vec::new()
    }

    /// Reference fields that point at a different remote record than the
    /// resolved dependencies. Only consulted when updates are enabled.
    fn reference_drift(
        &self,
        _dependencies: &Self::Dependencies,
        _remote: &Self::Remote,
    ) -> Vec<&'static str> {
        Vec::new()
    }

    async fn update<C: IdentityApi>(
        &self,
        _api: &C,
        _spec: &Self::Spec,
        _dependencies: &Self::Dependencies,
        _remote: &Self::Remote,
    ) -> Result<Self::Remote> {
        Err(AuthSyncError::internal_error(format!(
            "{} records are never updated",
            Self::Spec::KIND
        )))
    }

    /// Converge set-valued relationships and auxiliary records
    async fn sync_relationships<C: IdentityApi, St: ResourceStore>(
        &self,
        _api: &C,
        _store: &St,
        _resource: &Resource<Self::Spec>,
        _remote: &Self::Remote,
    ) -> Result<MembershipChanges> {
        Ok(MembershipChanges::default())
    }

    /// Delete the remote counterpart; absent is success.
    async fn delete<C: IdentityApi>(&self, api: &C, spec: &Self::Spec) -> Result<()>;
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The local record no longer exists
    Missing,
    Converged {
        created: bool,
        updated: bool,
        membership: MembershipChanges,
        finalizer_attached: bool,
    },
    /// Remote object deleted and finalizer released
    Finalized,
    /// Deleting record without our finalizer
    Skipped,
}

pub struct Reconciler<K, C, St> {
    kind: K,
    api: Arc<C>,
    store: Arc<St>,
    finalizer: Finalizer,
    update_policy: UpdatePolicy,
}

impl<K, C, St> Reconciler<K, C, St>
where
    K: ReconcileKind,
    C: IdentityApi + 'static,
    St: ResourceStore + 'static,
{
    pub fn new(kind: K, api: Arc<C>, store: Arc<St>, config: &ReconcilerConfig) -> Self {
        Self {
            kind,
            api,
            store,
            finalizer: Finalizer::new(config.finalizer.clone()),
            update_policy: config.update_policy,
        }
    }

    #[instrument(skip(self), fields(kind = %K::Spec::KIND))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let Some(resource) = self.store.get::<K::Spec>(key).await? else {
            debug!("Resource not found, ignoring since it must be deleted");
            return Ok(ReconcileOutcome::Missing);
        };

        if resource.metadata.is_deleting() {
            self.finalize(&resource).await
        } else {
            self.converge(&resource).await
        }
    }

    async fn converge(&self, resource: &Resource<K::Spec>) -> Result<ReconcileOutcome> {
        let spec = &resource.spec;
        spec.validate()?;
        let api = self.api.as_ref();

        let mut created = false;
        let mut updated = false;
        let remote = match self.kind.lookup(api, spec).await? {
            Some(existing) => {
                let mut drift = self.kind.drift(spec, &existing);
                if K::UPDATABLE && self.update_policy == UpdatePolicy::UpdateExisting {
                    let dependencies = self.kind.resolve_dependencies(api, spec).await?;
                    for field in self.kind.reference_drift(&dependencies, &existing) {
                        if !drift.contains(&field) {
                            drift.push(field);
                        }
                    }
                    if drift.is_empty() {
                        existing
                    } else {
                        let remote = self
                            .kind
                            .update(api, spec, &dependencies, &existing)
                            .await?;
                        info!(natural_key = %spec.natural_key(), ?drift, "Updated remote record");
                        updated = true;
                        remote
                    }
                } else {
                    if !drift.is_empty() {
                        warn!(
                            natural_key = %spec.natural_key(),
                            ?drift,
                            "Remote record differs from spec, leaving it unchanged"
                        );
                    }
                    existing
                }
            }
            None => {
                let dependencies = self.kind.resolve_dependencies(api, spec).await?;
                let remote = self.kind.create(api, spec, &dependencies).await?;
                info!(natural_key = %spec.natural_key(), "Created remote record");
                created = true;
                remote
            }
        };

        let membership = self
            .kind
            .sync_relationships(api, self.store.as_ref(), resource, &remote)
            .await?;

        let finalizer_attached = self
            .finalizer
            .ensure_attached::<K::Spec, St>(self.store.as_ref(), &resource.key())
            .await?;

        Ok(ReconcileOutcome::Converged {
            created,
            updated,
            membership,
            finalizer_attached,
        })
    }

    async fn finalize(&self, resource: &Resource<K::Spec>) -> Result<ReconcileOutcome> {
        if !resource.metadata.has_finalizer(self.finalizer.name()) {
            return Ok(ReconcileOutcome::Skipped);
        }

        self.kind.delete(self.api.as_ref(), &resource.spec).await?;
        info!(natural_key = %resource.spec.natural_key(), "Deleted remote record");

        self.finalizer
            .release::<K::Spec, St>(self.store.as_ref(), &resource.key())
            .await?;
        Ok(ReconcileOutcome::Finalized)
    }
}

/// Kind-erased reconciler, as dispatched by the controller
#[async_trait]
pub trait Reconcile: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome>;
}

#[async_trait]
impl<K, C, St> Reconcile for Reconciler<K, C, St>
where
    K: ReconcileKind,
    C: IdentityApi + 'static,
    St: ResourceStore + 'static,
{
    fn kind(&self) -> ResourceKind {
        K::Spec::KIND
    }

    async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        Reconciler::reconcile(self, key).await
    }
}

/// One reconciler per kind, sharing the client and the store
pub fn build_reconcilers<C, St>(
    api: Arc<C>,
    store: Arc<St>,
    config: &ReconcilerConfig,
) -> Vec<Arc<dyn Reconcile>>
where
    C: IdentityApi + 'static,
    St: ResourceStore + 'static,
{
    let application: Arc<dyn Reconcile> = Arc::new(Reconciler::new(
        ApplicationKind,
        api.clone(),
        store.clone(),
        config,
    ));
    let group: Arc<dyn Reconcile> =
        Arc::new(Reconciler::new(GroupKind, api.clone(), store.clone(), config));
    let provider: Arc<dyn Reconcile> =
        Arc::new(Reconciler::new(ProviderKind, api.clone(), store.clone(), config));
    let user: Arc<dyn Reconcile> = Arc::new(Reconciler::new(UserKind, api, store, config));

    vec![application, group, provider, user]
}
