//! Membership synchronization
//!
//! Converges a set-valued relationship by set difference over names. All
//! removals are issued before any addition. Names are compared exactly:
//! case-sensitive, no normalization.

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use authsync_core::{
    ApplicationPk, GroupPk, IdentityApi, NewPolicyBinding, PolicyBindingPk, RemoteUser, Result,
};

use crate::resolver::DependencyResolver;

// =============================================================================
// Set Difference
// =============================================================================

/// `to_remove = current - desired`, `to_add = desired - current`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub to_remove: Vec<String>,
    pub to_add: Vec<String>,
}

impl MembershipDiff {
    /// Keeps the input order and drops duplicates.
    pub fn compute(current: &[String], desired: &[String]) -> Self {
        let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
        let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

        Self {
            to_remove: ordered_difference(current, &desired_set),
            to_add: ordered_difference(desired, &current_set),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

fn ordered_difference(items: &[String], exclude: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| !exclude.contains(item.as_str()) && seen.insert(item.as_str()))
        .cloned()
        .collect()
}

/// What a synchronization actually changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChanges {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl MembershipChanges {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

// =============================================================================
// Targets
// =============================================================================

/// A container whose members are named
#[async_trait]
pub trait MembershipTarget: Send + Sync {
    /// Names currently related on the remote side
    async fn current(&self) -> Result<Vec<String>>;

    async fn remove(&self, name: &str) -> Result<()>;

    /// Resolves `name` afresh; a name that does not resolve is
    /// `DependencyNotFound`.
    async fn add(&self, name: &str) -> Result<()>;
}

/// Issue the minimal remove/add calls to make `target` match `desired`.
///
/// The first failing call aborts the rest. Rerunning with the same desired
/// set only issues the calls still needed.
pub async fn synchronize<T: MembershipTarget>(
    target: &T,
    desired: &[String],
) -> Result<MembershipChanges> {
    let current = target.current().await?;
    let diff = MembershipDiff::compute(&current, desired);
    if diff.is_empty() {
        debug!("Membership already converged");
        return Ok(MembershipChanges::default());
    }

    let mut changes = MembershipChanges::default();
    for name in diff.to_remove {
        target.remove(&name).await?;
        changes.removed.push(name);
    }
    for name in diff.to_add {
        target.add(&name).await?;
        changes.added.push(name);
    }

    info!(removed = ?changes.removed, added = ?changes.added, "Synchronized membership");
    Ok(changes)
}

/// Group membership of one remote user
pub struct UserGroupMembership<'a, C> {
    api: &'a C,
    user: &'a RemoteUser,
}

impl<'a, C: IdentityApi> UserGroupMembership<'a, C> {
    pub fn new(api: &'a C, user: &'a RemoteUser) -> Self {
        Self { api, user }
    }
}

#[async_trait]
impl<C: IdentityApi> MembershipTarget for UserGroupMembership<'_, C> {
    #[instrument(skip(self), fields(user = %self.user.username))]
    async fn current(&self) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(self.user.groups.len());
        for pk in &self.user.groups {
            match self.api.get_group_by_pk(pk).await? {
                Some(group) => names.push(group.name),
                None => debug!(group_pk = %pk, "Skipping group that no longer exists"),
            }
        }
        Ok(names)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        match self.api.get_group(name).await? {
            Some(group) => {
                self.api
                    .remove_user_from_group(&group.pk, &self.user.pk)
                    .await
            }
            // Gone remotely, so the user is no longer a member either.
            None => Ok(()),
        }
    }

    async fn add(&self, name: &str) -> Result<()> {
        let group = DependencyResolver::new(self.api).group(name).await?;
        self.api.add_user_to_group(&group.pk, &self.user.pk).await
    }
}

/// Groups bound to an application through policy bindings
pub struct ApplicationGroupBindings<'a, C> {
    api: &'a C,
    application: &'a ApplicationPk,
}

impl<'a, C: IdentityApi> ApplicationGroupBindings<'a, C> {
    pub fn new(api: &'a C, application: &'a ApplicationPk) -> Self {
        Self { api, application }
    }

    async fn bound_groups(&self) -> Result<Vec<(GroupPk, PolicyBindingPk)>> {
        Ok(self
            .api
            .list_bindings(self.application)
            .await?
            .into_iter()
            .filter_map(|binding| binding.group.map(|group| (group, binding.pk)))
            .collect())
    }
}

#[async_trait]
impl<C: IdentityApi> MembershipTarget for ApplicationGroupBindings<'_, C> {
    #[instrument(skip(self), fields(application = %self.application))]
    async fn current(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for (group, _) in self.bound_groups().await? {
            match self.api.get_group_by_pk(&group).await? {
                Some(group) => names.push(group.name),
                None => debug!(group_pk = %group, "Skipping binding to a missing group"),
            }
        }
        Ok(names)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let Some(group) = self.api.get_group(name).await? else {
            return Ok(());
        };
        for (bound, binding) in self.bound_groups().await? {
            if bound == group.pk {
                self.api.delete_binding(&binding).await?;
            }
        }
        Ok(())
    }

    async fn add(&self, name: &str) -> Result<()> {
        let group = DependencyResolver::new(self.api).group(name).await?;
        self.api
            .create_binding(&NewPolicyBinding::for_group(
                self.application.clone(),
                group.pk,
            ))
            .await?;
        Ok(())
    }
}
