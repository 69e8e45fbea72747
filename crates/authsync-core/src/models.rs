//! Local resource model
//!
//! Resources are desired-state records owned by the resource store. The
//! reconciler reads them and only ever writes back finalizers and, for
//! applications, the generated credential secret.

use crate::{error::Result, ids::ResourceUid, AuthSyncError};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Kinds and Keys
// =============================================================================

/// The resource kinds managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Application,
    Group,
    Provider,
    User,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Application,
        ResourceKind::Group,
        ResourceKind::Provider,
        ResourceKind::User,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => write!(f, "Application"),
            Self::Group => write!(f, "Group"),
            Self::Provider => write!(f, "Provider"),
            Self::User => write!(f, "User"),
        }
    }
}

/// Namespace-qualified name of a local record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Change notification delivered by the resource store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceEvent {
    pub kind: ResourceKind,
    pub key: ObjectKey,
}

impl ResourceEvent {
    pub fn new(kind: ResourceKind, key: ObjectKey) -> Self {
        Self { kind, key }
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Garbage-collection link from a dependent record to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: ResourceKind,
    pub name: String,
    pub uid: ResourceUid,
    #[serde(default)]
    pub controller: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: ResourceUid,
    /// Bumped by the store on every write; stale writes are rejected
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(key: &ObjectKey) -> Self {
        Self {
            name: key.name.clone(),
            namespace: key.namespace.clone(),
            uid: ResourceUid::new(),
            resource_version: 0,
            finalizers: Vec::new(),
            deletion_timestamp: None,
            owner_references: Vec::new(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Returns `true` if the finalizer was not present yet.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Returns `true` if the finalizer was present.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        before != self.finalizers.len()
    }

    pub fn is_owned_by(&self, uid: ResourceUid) -> bool {
        self.owner_references.iter().any(|o| o.uid == uid)
    }
}

/// A local record: metadata plus the desired-state spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource<S> {
    pub metadata: ObjectMeta,
    pub spec: S,
}

impl<S: ResourceSpec> Resource<S> {
    pub fn new(key: &ObjectKey, spec: S) -> Self {
        Self {
            metadata: ObjectMeta::new(key),
            spec,
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn kind(&self) -> ResourceKind {
        S::KIND
    }
}

/// Desired-state spec of one resource kind
pub trait ResourceSpec:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const KIND: ResourceKind;

    /// The externally meaningful key used to find the remote record
    fn natural_key(&self) -> &str;

    /// Structural checks that do not need the remote service
    fn validate(&self) -> Result<()> {
        if self.natural_key().trim().is_empty() {
            return Err(AuthSyncError::invalid_spec(format!(
                "{} has an empty natural key",
                Self::KIND
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Application
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub name: String,
    /// Stable remote lookup key
    pub slug: String,
    #[serde(default)]
    pub group: String,
    /// Provider name
    pub provider: String,
    /// Local secret receiving the provider's OAuth client credentials
    pub secret_name: String,
    #[serde(default)]
    pub user_groups: Vec<String>,
}

impl ResourceSpec for ApplicationSpec {
    const KIND: ResourceKind = ResourceKind::Application;

    fn natural_key(&self) -> &str {
        &self.slug
    }

    fn validate(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(AuthSyncError::invalid_spec("application slug is empty"));
        }
        if self.provider.trim().is_empty() {
            return Err(AuthSyncError::invalid_spec(format!(
                "application '{}' does not reference a provider",
                self.slug
            )));
        }
        if self.secret_name.trim().is_empty() {
            return Err(AuthSyncError::invalid_spec(format!(
                "application '{}' has no secret name",
                self.slug
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Group
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ResourceSpec for GroupSpec {
    const KIND: ResourceKind = ResourceKind::Group;

    fn natural_key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AuthSyncError::invalid_spec("group name is empty"));
        }
        if self.parent.as_deref() == Some(self.name.as_str()) {
            return Err(AuthSyncError::invalid_spec(format!(
                "group '{}' cannot be its own parent",
                self.name
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Provider
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Oauth2,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    #[default]
    Confidential,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Immutable once the provider exists remotely
    pub name: String,
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,
    /// Slug of the flow with designation "authentication"
    pub authentication_flow: String,
    /// Slug of the flow with designation "authorization"
    pub authorization_flow: String,
    #[serde(default)]
    pub client_type: ClientType,
    pub redirect_uri: String,
    #[serde(rename = "scopes", default)]
    pub scope_mappings: Vec<String>,
}

impl ResourceSpec for ProviderSpec {
    const KIND: ResourceKind = ResourceKind::Provider;

    fn natural_key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AuthSyncError::invalid_spec("provider name is empty"));
        }
        if self.authentication_flow.is_empty() || self.authorization_flow.is_empty() {
            return Err(AuthSyncError::invalid_spec(format!(
                "provider '{}' must reference both an authentication and an authorization flow",
                self.name
            )));
        }
        Ok(())
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl ResourceSpec for UserSpec {
    const KIND: ResourceKind = ResourceKind::User;

    fn natural_key(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.username.trim().is_empty() {
            return Err(AuthSyncError::invalid_spec(
                "user requires both a name and a username",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Secrets
// =============================================================================

pub const OAUTH_CLIENT_ID: &str = "OAUTH_CLIENT_ID";
pub const OAUTH_CLIENT_SECRET: &str = "OAUTH_CLIENT_SECRET";

/// Auxiliary record carrying generated credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRecord {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub immutable: bool,
    #[serde(default)]
    pub string_data: BTreeMap<String, String>,
}

impl SecretRecord {
    /// Immutable secret holding an OAuth client id and secret, owned by `owner`
    pub fn oauth_credentials(
        key: &ObjectKey,
        owner: OwnerReference,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        let mut metadata = ObjectMeta::new(key);
        metadata.owner_references.push(owner);

        let mut string_data = BTreeMap::new();
        string_data.insert(OAUTH_CLIENT_ID.to_string(), client_id.to_string());
        string_data.insert(OAUTH_CLIENT_SECRET.to_string(), client_secret.to_string());

        Self {
            metadata,
            immutable: true,
            string_data,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.string_data.get(field).map(String::as_str)
    }
}
