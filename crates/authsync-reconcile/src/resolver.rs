//! Dependency resolution
//!
//! Turns named references in a spec into remote primary keys. Every lookup
//! that finds nothing fails with `DependencyNotFound`; nothing is ever
//! created here.

use tracing::{debug, instrument};

use authsync_core::{
    AuthSyncError, FlowDesignation, FlowPk, GroupPk, GroupSpec, IdentityApi, ProviderSpec,
    RemoteGroup, RemoteProvider, Result, ScopeMappingPk,
};

/// Remote identifiers a provider is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDependencies {
    pub authentication_flow: FlowPk,
    pub authorization_flow: FlowPk,
    /// In `scopes` order
    pub scope_mappings: Vec<ScopeMappingPk>,
}

pub struct DependencyResolver<'a, C> {
    api: &'a C,
}

impl<'a, C: IdentityApi> DependencyResolver<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self { api }
    }

    pub async fn flow(&self, slug: &str, designation: FlowDesignation) -> Result<FlowPk> {
        self.api
            .get_flow(slug, designation)
            .await?
            .map(|flow| flow.pk)
            .ok_or_else(|| {
                AuthSyncError::dependency_not_found(format!("Flow ({})", designation), slug)
            })
    }

    pub async fn scope_mapping(&self, scope_name: &str) -> Result<ScopeMappingPk> {
        self.api
            .get_scope_mapping(scope_name)
            .await?
            .map(|mapping| mapping.pk)
            .ok_or_else(|| AuthSyncError::dependency_not_found("ScopeMapping", scope_name))
    }

    /// Authentication flow, then authorization flow, then each scope
    /// mapping; stops at the first one missing.
    #[instrument(skip(self, spec), fields(provider = %spec.name))]
    pub async fn provider_dependencies(&self, spec: &ProviderSpec) -> Result<ProviderDependencies> {
        let authentication_flow = self
            .flow(&spec.authentication_flow, FlowDesignation::Authentication)
            .await?;
        let authorization_flow = self
            .flow(&spec.authorization_flow, FlowDesignation::Authorization)
            .await?;

        let mut scope_mappings = Vec::with_capacity(spec.scope_mappings.len());
        for scope_name in &spec.scope_mappings {
            scope_mappings.push(self.scope_mapping(scope_name).await?);
        }

        debug!(scopes = scope_mappings.len(), "Resolved provider dependencies");
        Ok(ProviderDependencies {
            authentication_flow,
            authorization_flow,
            scope_mappings,
        })
    }

    pub async fn provider(&self, name: &str) -> Result<RemoteProvider> {
        self.api
            .get_provider(name)
            .await?
            .ok_or_else(|| AuthSyncError::dependency_not_found("Provider", name))
    }

    pub async fn group(&self, name: &str) -> Result<RemoteGroup> {
        self.api
            .get_group(name)
            .await?
            .ok_or_else(|| AuthSyncError::dependency_not_found("Group", name))
    }

    /// `None` for a group without a parent; an unresolved parent is an error.
    pub async fn parent_group(&self, spec: &GroupSpec) -> Result<Option<GroupPk>> {
        match &spec.parent {
            Some(parent) => Ok(Some(self.group(parent).await?.pk)),
            None => Ok(None),
        }
    }
}
