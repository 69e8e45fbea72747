//! YAML manifests
//!
//! A manifest file holds one or more `---`-separated documents of the form
//! `{kind, metadata: {name, namespace}, spec}`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use authsync_core::{
    ApplicationSpec, AuthSyncError, GroupSpec, ObjectKey, ProviderSpec, ResourceKind, Result,
    UserSpec,
};

use crate::memory::MemoryStore;

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl ManifestMeta {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Manifest {
    Application {
        metadata: ManifestMeta,
        spec: ApplicationSpec,
    },
    Group {
        metadata: ManifestMeta,
        spec: GroupSpec,
    },
    Provider {
        metadata: ManifestMeta,
        spec: ProviderSpec,
    },
    User {
        metadata: ManifestMeta,
        spec: UserSpec,
    },
}

impl Manifest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Application { .. } => ResourceKind::Application,
            Self::Group { .. } => ResourceKind::Group,
            Self::Provider { .. } => ResourceKind::Provider,
            Self::User { .. } => ResourceKind::User,
        }
    }

    pub fn metadata(&self) -> &ManifestMeta {
        match self {
            Self::Application { metadata, .. }
            | Self::Group { metadata, .. }
            | Self::Provider { metadata, .. }
            | Self::User { metadata, .. } => metadata,
        }
    }

    /// Create or replace the record in the store
    pub async fn apply(self, store: &MemoryStore) -> Result<ObjectKey> {
        let key = self.metadata().key();
        match self {
            Self::Application { spec, .. } => {
                store.apply(&key, spec).await?;
            }
            Self::Group { spec, .. } => {
                store.apply(&key, spec).await?;
            }
            Self::Provider { spec, .. } => {
                store.apply(&key, spec).await?;
            }
            Self::User { spec, .. } => {
                store.apply(&key, spec).await?;
            }
        }
        Ok(key)
    }
}

/// Parse every document of a YAML string
pub fn load_str(source: &str) -> Result<Vec<Manifest>> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(source) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| AuthSyncError::invalid_spec(format!("Invalid YAML document: {}", e)))?;
        if value.is_null() {
            continue;
        }
        let manifest = serde_yaml::from_value(value)
            .map_err(|e| AuthSyncError::invalid_spec(format!("Invalid manifest: {}", e)))?;
        manifests.push(manifest);
    }
    Ok(manifests)
}

/// Load every `*.yaml` / `*.yml` file of a directory, in file-name order
pub fn load_dir(dir: &Path) -> Result<Vec<Manifest>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        AuthSyncError::config_error(format!(
            "Cannot read manifest directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        let source = std::fs::read_to_string(&path).map_err(|e| {
            AuthSyncError::config_error(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let loaded = load_str(&source).map_err(|e| {
            AuthSyncError::invalid_spec(format!("{}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), count = loaded.len(), "Loaded manifests");
        manifests.extend(loaded);
    }

    info!(dir = %dir.display(), count = manifests.len(), "Loaded manifest directory");
    Ok(manifests)
}
