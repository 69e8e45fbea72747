use async_trait::async_trait;

use authsync_core::{GroupPk, GroupSpec, IdentityApi, NewGroup, RemoteGroup, Result};

use crate::orchestrator::ReconcileKind;
use crate::resolver::DependencyResolver;

/// Groups are keyed by name; the parent must exist before creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupKind;

fn desired(spec: &GroupSpec, parent: &Option<GroupPk>) -> NewGroup {
    NewGroup {
        name: spec.name.clone(),
        is_superuser: spec.is_admin,
        parent: parent.clone(),
    }
}

#[async_trait]
impl ReconcileKind for GroupKind {
    type Spec = GroupSpec;
    type Remote = RemoteGroup;
    /// Parent group, if any
    type Dependencies = Option<GroupPk>;

    async fn lookup<C: IdentityApi>(
        &self,
        api: &C,
        spec: &GroupSpec,
    ) -> Result<Option<RemoteGroup>> {
        api.get_group(&spec.name).await
    }

    async fn resolve_dependencies<C: IdentityApi>(
        &self,
        api: &C,
        spec: &GroupSpec,
    ) -> Result<Option<GroupPk>> {
        DependencyResolver::new(api).parent_group(spec).await
    }

    async fn create<C: IdentityApi>(
        &self,
        api: &C,
        spec: &GroupSpec,
        parent: &Option<GroupPk>,
    ) -> Result<RemoteGroup> {
        api.create_group(&desired(spec, parent)).await
    }

    fn drift(&self, spec: &GroupSpec, remote: &RemoteGroup) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if remote.is_superuser != spec.is_admin {
            fields.push("isAdmin");
        }
        if remote.parent.is_some() != spec.parent.is_some() {
            fields.push("parent");
        }
        fields
    }

    fn reference_drift(
        &self,
        parent: &Option<GroupPk>,
        remote: &RemoteGroup,
    ) -> Vec<&'static str> {
        if &remote.parent == parent {
            Vec::new()
        } else {
            vec!["parent"]
        }
    }

    async fn update<C: IdentityApi>(
        &self,
        api: &C,
        spec: &GroupSpec,
        parent: &Option<GroupPk>,
        remote: &RemoteGroup,
    ) -> Result<RemoteGroup> {
        api.update_group(&remote.pk, &desired(spec, parent)).await
    }

    async fn delete<C: IdentityApi>(&self, api: &C, spec: &GroupSpec) -> Result<()> {
        match api.get_group(&spec.name).await? {
            Some(group) => api.delete_group(&group.pk).await,
            None => Ok(()),
        }
    }
}
