//! authentik implementation of the identity API traits

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, instrument};

use authsync_core::{
    ApplicationApi, ApplicationPk, Flow, FlowApi, FlowDesignation, GroupApi, GroupPk,
    NewApplication, NewGroup, NewPolicyBinding, NewProvider, NewUser, PolicyBinding,
    PolicyBindingApi, PolicyBindingPk, ProviderApi, ProviderPk, RemoteApplication, RemoteGroup,
    RemoteProvider, RemoteUser, Result, ScopeMapping, ScopeMappingApi, UserApi, UserPk,
};

use crate::config::AuthentikConfig;
use crate::http::{pk_value, HttpClient};

const APPLICATIONS: &str = "/core/applications/";
const GROUPS: &str = "/core/groups/";
const USERS: &str = "/core/users/";
const OAUTH2_PROVIDERS: &str = "/providers/oauth2/";
const FLOWS: &str = "/flows/instances/";
const SCOPE_MAPPINGS: &str = "/propertymappings/scope/";
const POLICY_BINDINGS: &str = "/policies/bindings/";

/// Typed client for one authentik instance
#[derive(Clone)]
pub struct AuthentikClient {
    http: HttpClient,
}

impl AuthentikClient {
    pub fn new(config: &AuthentikConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    /// Filtered list lookup. authentik filters are applied server side; the
    /// exact-match check guards against filters that match loosely.
    async fn find_one<T, F>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        matches: F,
    ) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let items: Vec<T> = self.http.list(path, query).await?;
        Ok(items.into_iter().find(|item| matches(item)))
    }
}

// =============================================================================
// Applications
// =============================================================================

#[async_trait]
impl ApplicationApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn get_application(&self, slug: &str) -> Result<Option<RemoteApplication>> {
        self.find_one(APPLICATIONS, &[("slug", slug)], |a: &RemoteApplication| {
            a.slug == slug
        })
        .await
    }

    #[instrument(skip(self, application), fields(slug = %application.slug))]
    async fn create_application(&self, application: &NewApplication) -> Result<RemoteApplication> {
        let created: RemoteApplication = self.http.post(APPLICATIONS, application).await?;
        info!(pk = %created.pk, "Created authentik application");
        Ok(created)
    }

    #[instrument(skip(self, application))]
    async fn update_application(
        &self,
        slug: &str,
        application: &NewApplication,
    ) -> Result<RemoteApplication> {
        self.http
            .put(&format!("{}{}/", APPLICATIONS, slug), application)
            .await
    }

    #[instrument(skip(self))]
    async fn delete_application(&self, slug: &str) -> Result<()> {
        self.http.delete(&format!("{}{}/", APPLICATIONS, slug)).await
    }
}

// =============================================================================
// Groups
// =============================================================================

#[async_trait]
impl GroupApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn get_group(&self, name: &str) -> Result<Option<RemoteGroup>> {
        self.find_one(GROUPS, &[("name", name)], |g: &RemoteGroup| g.name == name)
            .await
    }

    #[instrument(skip(self))]
    async fn get_group_by_pk(&self, pk: &GroupPk) -> Result<Option<RemoteGroup>> {
        self.http.get_optional(&format!("{}{}/", GROUPS, pk)).await
    }

    #[instrument(skip(self, group), fields(name = %group.name))]
    async fn create_group(&self, group: &NewGroup) -> Result<RemoteGroup> {
        let created: RemoteGroup = self.http.post(GROUPS, group).await?;
        info!(pk = %created.pk, "Created authentik group");
        Ok(created)
    }

    #[instrument(skip(self, group))]
    async fn update_group(&self, pk: &GroupPk, group: &NewGroup) -> Result<RemoteGroup> {
        self.http.put(&format!("{}{}/", GROUPS, pk), group).await
    }

    #[instrument(skip(self))]
    async fn delete_group(&self, pk: &GroupPk) -> Result<()> {
        self.http.delete(&format!("{}{}/", GROUPS, pk)).await
    }

    #[instrument(skip(self))]
    async fn add_user_to_group(&self, group: &GroupPk, user: &UserPk) -> Result<()> {
        debug!("Adding user to group");
        self.http
            .post_no_content(
                &format!("{}{}/add_user/", GROUPS, group),
                &json!({ "pk": pk_value(user.as_str()) }),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn remove_user_from_group(&self, group: &GroupPk, user: &UserPk) -> Result<()> {
        debug!("Removing user from group");
        self.http
            .post_no_content(
                &format!("{}{}/remove_user/", GROUPS, group),
                &json!({ "pk": pk_value(user.as_str()) }),
            )
            .await
    }
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn get_user(&self, name: &str) -> Result<Option<RemoteUser>> {
        self.find_one(USERS, &[("name", name)], |u: &RemoteUser| u.name == name)
            .await
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn create_user(&self, user: &NewUser) -> Result<RemoteUser> {
        let created: RemoteUser = self.http.post(USERS, user).await?;
        info!(pk = %created.pk, "Created authentik user");
        Ok(created)
    }

    #[instrument(skip(self, user))]
    async fn update_user(&self, pk: &UserPk, user: &NewUser) -> Result<RemoteUser> {
        self.http.put(&format!("{}{}/", USERS, pk), user).await
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, pk: &UserPk) -> Result<()> {
        self.http.delete(&format!("{}{}/", USERS, pk)).await
    }
}

// =============================================================================
// Providers, flows and scope mappings
// =============================================================================

#[async_trait]
impl ProviderApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn get_provider(&self, name: &str) -> Result<Option<RemoteProvider>> {
        self.find_one(OAUTH2_PROVIDERS, &[("name", name)], |p: &RemoteProvider| {
            p.name == name
        })
        .await
    }

    #[instrument(skip(self, provider), fields(name = %provider.name))]
    async fn create_provider(&self, provider: &NewProvider) -> Result<RemoteProvider> {
        let created: RemoteProvider = self.http.post(OAUTH2_PROVIDERS, provider).await?;
        info!(pk = %created.pk, "Created authentik OAuth2 provider");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn delete_provider(&self, pk: &ProviderPk) -> Result<()> {
        self.http.delete(&format!("{}{}/", OAUTH2_PROVIDERS, pk)).await
    }
}

#[async_trait]
impl FlowApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn get_flow(&self, slug: &str, designation: FlowDesignation) -> Result<Option<Flow>> {
        self.find_one(
            FLOWS,
            &[("slug", slug), ("designation", designation.as_str())],
            |f: &Flow| f.slug == slug && f.designation == designation,
        )
        .await
    }
}

#[async_trait]
impl ScopeMappingApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn get_scope_mapping(&self, scope_name: &str) -> Result<Option<ScopeMapping>> {
        self.find_one(
            SCOPE_MAPPINGS,
            &[("scope_name", scope_name)],
            |m: &ScopeMapping| m.scope_name == scope_name,
        )
        .await
    }
}

// =============================================================================
// Policy bindings
// =============================================================================

#[async_trait]
impl PolicyBindingApi for AuthentikClient {
    #[instrument(skip(self))]
    async fn list_bindings(&self, target: &ApplicationPk) -> Result<Vec<PolicyBinding>> {
        self.http
            .list(POLICY_BINDINGS, &[("target", target.as_str())])
            .await
    }

    #[instrument(skip(self, binding), fields(target = %binding.target, group = %binding.group))]
    async fn create_binding(&self, binding: &NewPolicyBinding) -> Result<PolicyBinding> {
        self.http.post(POLICY_BINDINGS, binding).await
    }

    #[instrument(skip(self))]
    async fn delete_binding(&self, pk: &PolicyBindingPk) -> Result<()> {
        self.http.delete(&format!("{}{}/", POLICY_BINDINGS, pk)).await
    }
}
