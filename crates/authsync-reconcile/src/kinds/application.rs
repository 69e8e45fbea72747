use async_trait::async_trait;
use tracing::{debug, info};

use authsync_core::{
    ApplicationSpec, AuthSyncError, IdentityApi, NewApplication, ObjectKey, OwnerReference,
    RemoteApplication, RemoteProvider, Resource, ResourceKind, ResourceStore, Result,
    SecretRecord,
};

use crate::membership::{synchronize, ApplicationGroupBindings, MembershipChanges};
use crate::orchestrator::ReconcileKind;
use crate::resolver::DependencyResolver;

/// Applications are keyed by slug. Besides the remote record they own the
/// group bindings named in `userGroups` and a local secret carrying the
/// provider's client credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationKind;

fn desired(spec: &ApplicationSpec, provider: &RemoteProvider) -> NewApplication {
    NewApplication {
        name: spec.name.clone(),
        slug: spec.slug.clone(),
        group: spec.group.clone(),
        provider: Some(provider.pk.clone()),
    }
}

/// Create the credential secret once; an existing secret is never touched.
async fn ensure_secret<C: IdentityApi, St: ResourceStore>(
    api: &C,
    store: &St,
    resource: &Resource<ApplicationSpec>,
) -> Result<bool> {
    let key = ObjectKey::new(
        resource.metadata.namespace.clone(),
        resource.spec.secret_name.clone(),
    );
    if store.get_secret(&key).await?.is_some() {
        debug!(secret = %key, "Credential secret already exists");
        return Ok(false);
    }

    let provider = DependencyResolver::new(api)
        .provider(&resource.spec.provider)
        .await?;
    let (Some(client_id), Some(client_secret)) = (&provider.client_id, &provider.client_secret)
    else {
        return Err(AuthSyncError::remote_rejected(
            422,
            format!("provider '{}' has no client credentials", provider.name),
        ));
    };

    let owner = OwnerReference {
        kind: ResourceKind::Application,
        name: resource.metadata.name.clone(),
        uid: resource.metadata.uid,
        controller: true,
    };
    store
        .create_secret(&SecretRecord::oauth_credentials(
            &key,
            owner,
            client_id,
            client_secret,
        ))
        .await?;
    info!(secret = %key, "Created credential secret");
    Ok(true)
}

#[async_trait]
impl ReconcileKind for ApplicationKind {
    type Spec = ApplicationSpec;
    type Remote = RemoteApplication;
    /// The referenced provider
    type Dependencies = RemoteProvider;

    async fn lookup<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ApplicationSpec,
    ) -> Result<Option<RemoteApplication>> {
        api.get_application(&spec.slug).await
    }

    async fn resolve_dependencies<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ApplicationSpec,
    ) -> Result<RemoteProvider> {
        DependencyResolver::new(api).provider(&spec.provider).await
    }

    async fn create<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ApplicationSpec,
        provider: &RemoteProvider,
    ) -> Result<RemoteApplication> {
        api.create_application(&desired(spec, provider)).await
    }

    fn drift(&self, spec: &ApplicationSpec, remote: &RemoteApplication) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if remote.name != spec.name {
            fields.push("name");
        }
        if remote.group.as_deref().unwrap_or_default() != spec.group {
            fields.push("group");
        }
        if remote.provider.is_none() {
            fields.push("provider");
        }
        fields
    }

    fn reference_drift(
        &self,
        provider: &RemoteProvider,
        remote: &RemoteApplication,
    ) -> Vec<&'static str> {
        if remote.provider.as_ref() == Some(&provider.pk) {
            Vec::new()
        } else {
            vec!["provider"]
        }
    }

    async fn update<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ApplicationSpec,
        provider: &RemoteProvider,
        _remote: &RemoteApplication,
    ) -> Result<RemoteApplication> {
        api.update_application(&spec.slug, &desired(spec, provider))
            .await
    }

    async fn sync_relationships<C: IdentityApi, St: ResourceStore>(
        &self,
        api: &C,
        store: &St,
        resource: &Resource<ApplicationSpec>,
        remote: &RemoteApplication,
    ) -> Result<MembershipChanges> {
        let bindings = ApplicationGroupBindings::new(api, &remote.pk);
        let changes = synchronize(&bindings, &resource.spec.user_groups).await?;
        ensure_secret(api, store, resource).await?;
        Ok(changes)
    }

    async fn delete<C: IdentityApi>(&self, api: &C, spec: &ApplicationSpec) -> Result<()> {
        if api.get_application(&spec.slug).await?.is_none() {
            return Ok(());
        }
        api.delete_application(&spec.slug).await
    }
}
