//! Unit tests for authsync-store

use authsync_core::{
    AuthSyncError, GroupSpec, ObjectKey, OwnerReference, ResourceKind, ResourceStore,
    SecretRecord, UserSpec,
};

use crate::{load_dir, load_str, Manifest, MemoryStore};

const FINALIZER: &str = "authsync.io/finalizer";

fn group(name: &str) -> GroupSpec {
    GroupSpec {
        name: name.to_string(),
        is_admin: false,
        parent: None,
    }
}

// =============================================================================
// Memory Store Tests
// =============================================================================

#[cfg(test)]
mod memory_tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_and_get() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "eng");

        let applied = store.apply(&key, group("eng")).await.unwrap();
        let fetched = store.get::<GroupSpec>(&key).await.unwrap().unwrap();

        assert_eq!(fetched.spec, group("eng"));
        assert_eq!(fetched.metadata.resource_version, applied.metadata.resource_version);
        assert!(store.get::<UserSpec>(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "eng");
        let first = store.apply(&key, group("eng")).await.unwrap();

        let mut winner = first.clone();
        winner.metadata.add_finalizer(FINALIZER);
        store.update(&winner).await.unwrap();

        let mut loser = first;
        loser.metadata.add_finalizer("other.io/finalizer");
        let err = store.update(&loser).await.unwrap_err();
        assert!(matches!(err, AuthSyncError::LocalConflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_without_finalizer_removes() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "eng");
        store.apply(&key, group("eng")).await.unwrap();

        store.delete(ResourceKind::Group, &key).await.unwrap();
        assert!(!store.contains(ResourceKind::Group, &key).await);
    }

    #[tokio::test]
    async fn test_delete_with_finalizer_marks_then_removes() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "eng");
        let mut resource = store.apply(&key, group("eng")).await.unwrap();
        resource.metadata.add_finalizer(FINALIZER);
        store.update(&resource).await.unwrap();

        store.delete(ResourceKind::Group, &key).await.unwrap();
        let mut marked = store.get::<GroupSpec>(&key).await.unwrap().unwrap();
        assert!(marked.metadata.is_deleting());

        marked.metadata.remove_finalizer(FINALIZER);
        store.update(&marked).await.unwrap();
        assert!(!store.contains(ResourceKind::Group, &key).await);
    }

    #[tokio::test]
    async fn test_removal_collects_owned_secrets() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "grafana");
        let owner = store.apply(&key, group("grafana")).await.unwrap();

        let secret = SecretRecord::oauth_credentials(
            &ObjectKey::new("default", "grafana-oauth"),
            OwnerReference {
                kind: ResourceKind::Group,
                name: "grafana".to_string(),
                uid: owner.metadata.uid,
                controller: true,
            },
            "id",
            "secret",
        );
        store.create_secret(&secret).await.unwrap();
        assert_eq!(store.secret_count().await, 1);

        store.delete(ResourceKind::Group, &key).await.unwrap();
        assert_eq!(store.secret_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_secret_twice_conflicts() {
        let store = MemoryStore::new();
        let secret = SecretRecord::oauth_credentials(
            &ObjectKey::new("default", "s"),
            OwnerReference {
                kind: ResourceKind::Application,
                name: "a".to_string(),
                uid: Default::default(),
                controller: true,
            },
            "id",
            "secret",
        );
        store.create_secret(&secret).await.unwrap();
        assert!(store.create_secret(&secret).await.is_err());
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let store = MemoryStore::new();
        let mut events = store.subscribe();
        let key = ObjectKey::new("default", "eng");

        store.apply(&key, group("eng")).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, ResourceKind::Group);
        assert_eq!(event.key, key);
    }

    #[tokio::test]
    async fn test_list_keys_by_kind() {
        let store = MemoryStore::new();
        store
            .apply(&ObjectKey::new("default", "eng"), group("eng"))
            .await
            .unwrap();
        store
            .apply(&ObjectKey::new("default", "ops"), group("ops"))
            .await
            .unwrap();

        assert_eq!(store.list_keys(ResourceKind::Group).await.unwrap().len(), 2);
        assert!(store.list_keys(ResourceKind::User).await.unwrap().is_empty());
    }
}

// =============================================================================
// Manifest Tests
// =============================================================================

#[cfg(test)]
mod manifest_tests {
    use super::*;

    const MANIFESTS: &str = r#"
kind: Group
metadata:
  name: eng
spec:
  name: eng
  isAdmin: false
---
kind: User
metadata:
  name: jane
  namespace: people
spec:
  name: Jane Doe
  username: jane
  email: jane@example.com
  groups: [eng]
"#;

    #[test]
    fn test_load_multi_document() {
        let manifests = load_str(MANIFESTS).unwrap();
        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].kind(), ResourceKind::Group);
        assert_eq!(manifests[0].metadata().namespace, "default");
        assert_eq!(manifests[1].metadata().key(), ObjectKey::new("people", "jane"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = load_str("kind: Secret\nmetadata: {name: x}\nspec: {}\n").unwrap_err();
        assert!(matches!(err, AuthSyncError::InvalidSpec { .. }));
    }

    #[test]
    fn test_load_dir_reads_yaml_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("10-groups.yaml"), MANIFESTS).unwrap();
        std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let manifests = load_dir(dir.path()).unwrap();
        assert_eq!(manifests.len(), 2);
    }

    #[test]
    fn test_bundled_manifests_parse() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../manifests");
        let manifests = load_dir(&dir).unwrap();
        for kind in ResourceKind::ALL {
            assert!(manifests.iter().any(|m| m.kind() == kind), "no {} manifest", kind);
        }
    }

    #[tokio::test]
    async fn test_apply_manifest_into_store() {
        let store = MemoryStore::new();
        for manifest in load_str(MANIFESTS).unwrap() {
            manifest.apply(&store).await.unwrap();
        }

        let user = store
            .get::<UserSpec>(&ObjectKey::new("people", "jane"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.spec.groups, vec!["eng"]);
        assert!(matches!(
            load_str(MANIFESTS).unwrap().remove(0),
            Manifest::Group { .. }
        ));
    }
}
