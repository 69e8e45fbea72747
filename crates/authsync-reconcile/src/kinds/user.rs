use async_trait::async_trait;

use authsync_core::{IdentityApi, NewUser, RemoteUser, Resource, ResourceStore, Result, UserSpec};

use crate::membership::{synchronize, MembershipChanges, UserGroupMembership};
use crate::orchestrator::ReconcileKind;

/// Users are keyed by name. Their groups resolve lazily, one at a time,
/// while membership is synchronized.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserKind;

fn desired(spec: &UserSpec) -> NewUser {
    NewUser {
        username: spec.username.clone(),
        name: spec.name.clone(),
        email: spec.email.clone(),
        is_active: true,
    }
}

#[async_trait]
impl ReconcileKind for UserKind {
    type Spec = UserSpec;
    type Remote = RemoteUser;
    type Dependencies = ();

    async fn lookup<C: IdentityApi>(
        &self,
        api: &C,
        spec: &UserSpec,
    ) -> Result<Option<RemoteUser>> {
        api.get_user(&spec.name).await
    }

    async fn resolve_dependencies<C: IdentityApi>(&self, _api: &C, _spec: &UserSpec) -> Result<()> {
        Ok(())
    }

    async fn create<C: IdentityApi>(
        &self,
        api: &C,
        spec: &UserSpec,
        _dependencies: &(),
    ) -> Result<RemoteUser> {
        api.create_user(&desired(spec)).await
    }

    fn drift(&self, spec: &UserSpec, remote: &RemoteUser) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if remote.username != spec.username {
            fields.push("username");
        }
        if remote.email != spec.email {
            fields.push("email");
        }
        fields
    }

    async fn update<C: IdentityApi>(
        &self,
        api: &C,
        spec: &UserSpec,
        _dependencies: &(),
        remote: &RemoteUser,
    ) -> Result<RemoteUser> {
        api.update_user(&remote.pk, &desired(spec)).await
    }

    async fn sync_relationships<C: IdentityApi, St: ResourceStore>(
        &self,
        api: &C,
        _store: &St,
        resource: &Resource<UserSpec>,
        remote: &RemoteUser,
    ) -> Result<MembershipChanges> {
        synchronize(&UserGroupMembership::new(api, remote), &resource.spec.groups).await
    }

    async fn delete<C: IdentityApi>(&self, api: &C, spec: &UserSpec) -> Result<()> {
        match api.get_user(&spec.name).await? {
            Some(user) => api.delete_user(&user.pk).await,
            None => Ok(()),
        }
    }
}
