//! Cluster Snapshots
//!
//! A YAML document holding the objects a scheduling simulation needs, and an
//! in-memory [`ClusterLookup`] serving them.

use super::select_default_storage_class;
use crate::domain::ports::ClusterLookup;
use crate::error::{Error, Result};
use crate::translation::{InTreeTranslator, StaticTranslator};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim, Pod};
use k8s_openapi::api::storage::v1::{CSINode, StorageClass};
use kube::ResourceExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

// =============================================================================
// Snapshot Document
// =============================================================================

/// A node taking part in the simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub name: String,
    /// Explicit per-driver limits
    #[serde(default)]
    pub limits: BTreeMap<String, i64>,
    /// CSINode whose allocatable counts become limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi_node: Option<CSINode>,
}

/// Cluster state for an offline simulation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    /// Extra in-tree -> CSI translations, layered over the built-in table
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    #[serde(default)]
    pub storage_classes: Vec<StorageClass>,
    #[serde(default)]
    pub persistent_volumes: Vec<PersistentVolume>,
    #[serde(default)]
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
    /// Pods in placement order
    #[serde(default)]
    pub pods: Vec<Pod>,
}

impl ClusterSnapshot {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let snapshot: ClusterSnapshot = serde_yaml::from_str(yaml)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    /// Translator for this snapshot: its own table over the built-in one
    pub fn translator(&self) -> StaticTranslator {
        StaticTranslator::from_pairs(self.translations.clone()).with_fallback(InTreeTranslator)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(Error::Snapshot("node without a name".into()));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(Error::Snapshot(format!("duplicate node {}", node.name)));
            }
        }
        if let Some(pod) = self.pods.iter().find(|p| p.metadata.name.is_none()) {
            return Err(Error::Snapshot(format!(
                "pod without a name in namespace {}",
                pod.namespace().unwrap_or_default()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Snapshot Lookup
// =============================================================================

#[derive(Debug, Default)]
struct SnapshotObjects {
    claims: HashMap<(String, String), PersistentVolumeClaim>,
    volumes: HashMap<String, PersistentVolume>,
    classes: HashMap<String, StorageClass>,
    default_class_error: Option<String>,
}

/// In-memory [`ClusterLookup`]
///
/// Objects can be added after construction; lookups see the latest state.
#[derive(Debug, Default)]
pub struct SnapshotLookup {
    objects: RwLock<SnapshotObjects>,
}

impl SnapshotLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        let lookup = Self::new();
        for class in &snapshot.storage_classes {
            lookup.insert_storage_class(class.clone());
        }
        for volume in &snapshot.persistent_volumes {
            lookup.insert_persistent_volume(volume.clone());
        }
        for claim in &snapshot.persistent_volume_claims {
            lookup.insert_persistent_volume_claim(claim.clone());
        }
        lookup
    }

    /// Claims without a namespace are filed under `default`
    pub fn insert_persistent_volume_claim(&self, claim: PersistentVolumeClaim) {
        let key = (
            claim.namespace().unwrap_or_else(|| "default".to_string()),
            claim.name_any(),
        );
        self.objects.write().claims.insert(key, claim);
    }

    pub fn insert_persistent_volume(&self, volume: PersistentVolume) {
        self.objects.write().volumes.insert(volume.name_any(), volume);
    }

    pub fn insert_storage_class(&self, class: StorageClass) {
        self.objects.write().classes.insert(class.name_any(), class);
    }

    /// Make default storage class discovery fail with `reason`
    ///
    /// Used to rehearse how a scheduler copes with an unreachable API.
    pub fn fail_default_class_discovery(&self, reason: impl Into<String>) {
        self.objects.write().default_class_error = Some(reason.into());
    }
}

#[async_trait]
impl ClusterLookup for SnapshotLookup {
    async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        self.objects
            .read()
            .claims
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("PersistentVolumeClaim", format!("{}/{}", namespace, name)))
    }

    async fn get_persistent_volume(&self, name: &str) -> Result<PersistentVolume> {
        self.objects
            .read()
            .volumes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("PersistentVolume", name))
    }

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass> {
        self.objects
            .read()
            .classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("StorageClass", name))
    }

    async fn default_storage_class_name(&self) -> Result<Option<String>> {
        let objects = self.objects.read();
        if let Some(reason) = &objects.default_class_error {
            return Err(Error::Internal(reason.clone()));
        }
        let classes: Vec<StorageClass> = objects.classes.values().cloned().collect();
        Ok(select_default_storage_class(&classes))
    }
}
