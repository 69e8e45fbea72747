//! Remote record model
//!
//! Mirrors the payloads of the authentik API. Records are fetched fresh on
//! every reconciliation and are never cached.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::*;

// =============================================================================
// Core objects
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteApplication {
    pub pk: ApplicationPk,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderPk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub name: String,
    pub slug: String,
    pub group: String,
    pub provider: Option<ProviderPk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGroup {
    pub pk: GroupPk,
    pub name: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub parent: Option<GroupPk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub is_superuser: bool,
    pub parent: Option<GroupPk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub pk: UserPk,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_active: bool,
    /// Primary keys of the groups the user belongs to
    #[serde(default)]
    pub groups: Vec<GroupPk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
}

// =============================================================================
// Providers and their dependencies
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProvider {
    pub pk: ProviderPk,
    pub name: String,
    #[serde(default)]
    pub authentication_flow: Option<FlowPk>,
    pub authorization_flow: FlowPk,
    #[serde(default)]
    pub client_type: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uris: Option<String>,
    #[serde(default)]
    pub property_mappings: Vec<ScopeMappingPk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProvider {
    pub name: String,
    pub authentication_flow: FlowPk,
    pub authorization_flow: FlowPk,
    pub client_type: String,
    pub redirect_uris: String,
    pub property_mappings: Vec<ScopeMappingPk>,
}

/// What a flow is used for; flows are looked up by slug plus designation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDesignation {
    Authentication,
    Authorization,
}

impl FlowDesignation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
        }
    }
}

impl fmt::Display for FlowDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub pk: FlowPk,
    pub slug: String,
    pub designation: FlowDesignation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeMapping {
    pub pk: ScopeMappingPk,
    pub name: String,
    pub scope_name: String,
}

// =============================================================================
// Policy bindings
// =============================================================================

/// Binds a group (or user, or policy) to a target such as an application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBinding {
    pub pk: PolicyBindingPk,
    pub target: ApplicationPk,
    #[serde(default)]
    pub group: Option<GroupPk>,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPolicyBinding {
    pub target: ApplicationPk,
    pub group: GroupPk,
    pub order: i32,
    pub enabled: bool,
}

impl NewPolicyBinding {
    pub fn for_group(target: ApplicationPk, group: GroupPk) -> Self {
        Self {
            target,
            group,
            order: 0,
            enabled: true,
        }
    }
}
