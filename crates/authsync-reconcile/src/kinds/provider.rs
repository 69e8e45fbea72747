use async_trait::async_trait;

use authsync_core::{IdentityApi, NewProvider, ProviderSpec, RemoteProvider, Result};

use crate::orchestrator::ReconcileKind;
use crate::resolver::{DependencyResolver, ProviderDependencies};

/// OAuth2 providers. Once a provider with this name exists remotely it is
/// never modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderKind;

#[async_trait]
impl ReconcileKind for ProviderKind {
    type Spec = ProviderSpec;
    type Remote = RemoteProvider;
    type Dependencies = ProviderDependencies;

    const UPDATABLE: bool = false;

    async fn lookup<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ProviderSpec,
    ) -> Result<Option<RemoteProvider>> {
        api.get_provider(&spec.name).await
    }

    async fn resolve_dependencies<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ProviderSpec,
    ) -> Result<ProviderDependencies> {
        DependencyResolver::new(api).provider_dependencies(spec).await
    }

    async fn create<C: IdentityApi>(
        &self,
        api: &C,
        spec: &ProviderSpec,
        dependencies: &ProviderDependencies,
    ) -> Result<RemoteProvider> {
        let provider = NewProvider {
            name: spec.name.clone(),
            authentication_flow: dependencies.authentication_flow.clone(),
            authorization_flow: dependencies.authorization_flow.clone(),
            client_type: spec.client_type.as_str().to_string(),
            redirect_uris: spec.redirect_uri.clone(),
            property_mappings: dependencies.scope_mappings.clone(),
        };
        api.create_provider(&provider).await
    }

    fn drift(&self, spec: &ProviderSpec, remote: &RemoteProvider) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if remote.client_type.as_deref() != Some(spec.client_type.as_str()) {
            fields.push("clientType");
        }
        if remote.redirect_uris.as_deref() != Some(spec.redirect_uri.as_str()) {
            fields.push("redirectUri");
        }
        fields
    }

    async fn delete<C: IdentityApi>(&self, api: &C, spec: &ProviderSpec) -> Result<()> {
        match api.get_provider(&spec.name).await? {
            Some(provider) => api.delete_provider(&provider.pk).await,
            None => Ok(()),
        }
    }
}
