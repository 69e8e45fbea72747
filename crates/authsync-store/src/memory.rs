//! In-memory resource store
//!
//! Behaves like a declarative API server: writes are versioned, stale writes
//! are rejected, deletion of a record with finalizers only marks it, and
//! removing a record garbage-collects the secrets it owns.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, instrument};

use authsync_core::{
    AuthSyncError, ObjectKey, ObjectMeta, Resource, ResourceEvent, ResourceKind, ResourceSpec,
    ResourceStore, ResourceUid, Result, SecretRecord,
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct StoredResource {
    metadata: ObjectMeta,
    spec: serde_json::Value,
}

#[derive(Debug, Default)]
struct StoreState {
    resources: BTreeMap<(ResourceKind, ObjectKey), StoredResource>,
    secrets: BTreeMap<ObjectKey, SecretRecord>,
    last_version: u64,
}

impl StoreState {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    /// Remove every secret owned by `uid`; returns how many were removed
    fn collect_garbage(&mut self, uid: ResourceUid) -> usize {
        let before = self.secrets.len();
        self.secrets.retain(|_, s| !s.metadata.is_owned_by(uid));
        before - self.secrets.len()
    }
}

/// In-memory [`ResourceStore`] with change notifications
pub struct MemoryStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<ResourceEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Subscribe to change events for every kind
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    fn notify(&self, kind: ResourceKind, key: ObjectKey) {
        // No subscribers is fine: nobody is watching yet.
        let _ = self.events.send(ResourceEvent::new(kind, key));
    }

    fn encode<S: ResourceSpec>(spec: &S) -> Result<serde_json::Value> {
        serde_json::to_value(spec).map_err(|e| {
            AuthSyncError::internal_error(format!("Failed to encode {} spec: {}", S::KIND, e))
        })
    }

    fn decode<S: ResourceSpec>(stored: &StoredResource) -> Result<Resource<S>> {
        let spec = serde_json::from_value(stored.spec.clone()).map_err(|e| {
            AuthSyncError::internal_error(format!("Failed to decode {} spec: {}", S::KIND, e))
        })?;
        Ok(Resource {
            metadata: stored.metadata.clone(),
            spec,
        })
    }

    /// Create a record or replace an existing record's `spec`
    #[instrument(skip(self, spec), fields(kind = %S::KIND, key = %key))]
    pub async fn apply<S: ResourceSpec>(&self, key: &ObjectKey, spec: S) -> Result<Resource<S>> {
        let encoded = Self::encode(&spec)?;
        let mut state = self.state.write().await;
        let version = state.next_version();

        let entry = state
            .resources
            .entry((S::KIND, key.clone()))
            .or_insert_with(|| StoredResource {
                metadata: ObjectMeta::new(key),
                spec: serde_json::Value::Null,
            });
        entry.spec = encoded;
        entry.metadata.resource_version = version;
        let resource = Self::decode(entry)?;
        drop(state);

        debug!(version, "Applied resource");
        self.notify(S::KIND, key.clone());
        Ok(resource)
    }

    /// Request deletion. Records holding finalizers are only marked.
    #[instrument(skip(self))]
    pub async fn delete(&self, kind: ResourceKind, key: &ObjectKey) -> Result<()> {
        let mut state = self.state.write().await;
        let map_key = (kind, key.clone());

        let Some(stored) = state.resources.get(&map_key) else {
            return Err(AuthSyncError::not_found(kind, key));
        };

        if stored.metadata.finalizers.is_empty() {
            let uid = stored.metadata.uid;
            state.resources.remove(&map_key);
            let collected = state.collect_garbage(uid);
            info!(collected, "Removed resource");
        } else {
            let version = state.next_version();
            if let Some(stored) = state.resources.get_mut(&map_key) {
                if stored.metadata.deletion_timestamp.is_none() {
                    stored.metadata.deletion_timestamp = Some(Utc::now());
                }
                stored.metadata.resource_version = version;
                debug!(finalizers = ?stored.metadata.finalizers, "Marked resource for deletion");
            }
        }
        drop(state);

        self.notify(kind, key.clone());
        Ok(())
    }

    pub async fn contains(&self, kind: ResourceKind, key: &ObjectKey) -> bool {
        self.state
            .read()
            .await
            .resources
            .contains_key(&(kind, key.clone()))
    }

    pub async fn secret_count(&self) -> usize {
        self.state.read().await.secrets.len()
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get<S: ResourceSpec>(&self, key: &ObjectKey) -> Result<Option<Resource<S>>> {
        let state = self.state.read().await;
        state
            .resources
            .get(&(S::KIND, key.clone()))
            .map(Self::decode)
            .transpose()
    }

    #[instrument(skip(self, resource), fields(kind = %S::KIND, key = %resource.key()))]
    async fn update<S: ResourceSpec>(&self, resource: &Resource<S>) -> Result<Resource<S>> {
        let key = resource.key();
        let map_key = (S::KIND, key.clone());
        let encoded = Self::encode(&resource.spec)?;

        let mut state = self.state.write().await;
        let current_version = match state.resources.get(&map_key) {
            Some(stored) => stored.metadata.resource_version,
            None => return Err(AuthSyncError::not_found(S::KIND, &key)),
        };
        if current_version != resource.metadata.resource_version {
            return Err(AuthSyncError::local_conflict(
                S::KIND,
                &key,
                format!(
                    "resource version {} is stale (current {})",
                    resource.metadata.resource_version, current_version
                ),
            ));
        }

        let version = state.next_version();
        let mut metadata = resource.metadata.clone();
        metadata.resource_version = version;

        // A deleting record whose last finalizer is gone disappears.
        let removed = metadata.is_deleting() && metadata.finalizers.is_empty();
        let updated = if removed {
            state.resources.remove(&map_key);
            let collected = state.collect_garbage(metadata.uid);
            info!(collected, "Finalized and removed resource");
            Resource {
                metadata,
                spec: resource.spec.clone(),
            }
        } else {
            let stored = StoredResource {
                metadata,
                spec: encoded,
            };
            let updated = Self::decode(&stored)?;
            state.resources.insert(map_key, stored);
            updated
        };
        drop(state);

        self.notify(S::KIND, key);
        Ok(updated)
    }

    async fn list_keys(&self, kind: ResourceKind) -> Result<Vec<ObjectKey>> {
        let state = self.state.read().await;
        Ok(state
            .resources
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn get_secret(&self, key: &ObjectKey) -> Result<Option<SecretRecord>> {
        Ok(self.state.read().await.secrets.get(key).cloned())
    }

    #[instrument(skip(self, secret), fields(key = %secret.metadata.key()))]
    async fn create_secret(&self, secret: &SecretRecord) -> Result<SecretRecord> {
        let key = secret.metadata.key();
        let mut state = self.state.write().await;

        if state.secrets.contains_key(&key) {
            return Err(AuthSyncError::local_conflict(
                "Secret",
                &key,
                "secret already exists",
            ));
        }

        let mut created = secret.clone();
        created.metadata.resource_version = state.next_version();
        state.secrets.insert(key, created.clone());
        info!("Created secret");
        Ok(created)
    }
}
