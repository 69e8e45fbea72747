//! Collaborator traits for the reconciliation engine
//!
//! The engine talks to two collaborators: the remote identity service (one
//! trait per kind, composed into [`IdentityApi`]) and the local resource
//! store ([`ResourceStore`]).

use crate::{error::Result, ids::*, models::*, remote::*};
use async_trait::async_trait;

// =============================================================================
// Remote Identity API
// =============================================================================
//
// Lookups return `Ok(None)` when nothing matches; an `Err` always means the
// lookup itself failed. Deletes succeed when the object is already gone.

#[async_trait]
pub trait ApplicationApi: Send + Sync {
    async fn get_application(&self, slug: &str) -> Result<Option<RemoteApplication>>;
    async fn create_application(&self, application: &NewApplication) -> Result<RemoteApplication>;
    async fn update_application(
        &self,
        slug: &str,
        application: &NewApplication,
    ) -> Result<RemoteApplication>;
    async fn delete_application(&self, slug: &str) -> Result<()>;
}

#[async_trait]
pub trait GroupApi: Send + Sync {
    async fn get_group(&self, name: &str) -> Result<Option<RemoteGroup>>;
    async fn get_group_by_pk(&self, pk: &GroupPk) -> Result<Option<RemoteGroup>>;
    async fn create_group(&self, group: &NewGroup) -> Result<RemoteGroup>;
    async fn update_group(&self, pk: &GroupPk, group: &NewGroup) -> Result<RemoteGroup>;
    async fn delete_group(&self, pk: &GroupPk) -> Result<()>;
    async fn add_user_to_group(&self, group: &GroupPk, user: &UserPk) -> Result<()>;
    async fn remove_user_from_group(&self, group: &GroupPk, user: &UserPk) -> Result<()>;
}

#[async_trait]
pub trait UserApi: Send + Sync {
    async fn get_user(&self, name: &str) -> Result<Option<RemoteUser>>;
    async fn create_user(&self, user: &NewUser) -> Result<RemoteUser>;
    async fn update_user(&self, pk: &UserPk, user: &NewUser) -> Result<RemoteUser>;
    async fn delete_user(&self, pk: &UserPk) -> Result<()>;
}

/// OAuth2 providers are create-only: there is deliberately no update.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn get_provider(&self, name: &str) -> Result<Option<RemoteProvider>>;
    async fn create_provider(&self, provider: &NewProvider) -> Result<RemoteProvider>;
    async fn delete_provider(&self, pk: &ProviderPk) -> Result<()>;
}

#[async_trait]
pub trait FlowApi: Send + Sync {
    async fn get_flow(&self, slug: &str, designation: FlowDesignation) -> Result<Option<Flow>>;
}

#[async_trait]
pub trait ScopeMappingApi: Send + Sync {
    async fn get_scope_mapping(&self, scope_name: &str) -> Result<Option<ScopeMapping>>;
}

#[async_trait]
pub trait PolicyBindingApi: Send + Sync {
    async fn list_bindings(&self, target: &ApplicationPk) -> Result<Vec<PolicyBinding>>;
    async fn create_binding(&self, binding: &NewPolicyBinding) -> Result<PolicyBinding>;
    async fn delete_binding(&self, pk: &PolicyBindingPk) -> Result<()>;
}

/// Everything the engine needs from the remote identity service
pub trait IdentityApi:
    ApplicationApi + GroupApi + UserApi + ProviderApi + FlowApi + ScopeMappingApi + PolicyBindingApi
{
}

impl<T> IdentityApi for T where
    T: ApplicationApi
        + GroupApi
        + UserApi
        + ProviderApi
        + FlowApi
        + ScopeMappingApi
        + PolicyBindingApi
{
}

// =============================================================================
// Local Resource Store
// =============================================================================

/// Local record store with optimistic concurrency
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get<S: ResourceSpec>(&self, key: &ObjectKey) -> Result<Option<Resource<S>>>;

    /// Writes the record back. Fails with `LocalConflict` when the stored
    /// `resource_version` no longer matches the one that was read.
    async fn update<S: ResourceSpec>(&self, resource: &Resource<S>) -> Result<Resource<S>>;

    async fn list_keys(&self, kind: ResourceKind) -> Result<Vec<ObjectKey>>;

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<SecretRecord>>;

    /// Fails with `LocalConflict` if a secret with that key already exists.
    async fn create_secret(&self, secret: &SecretRecord) -> Result<SecretRecord>;
}
