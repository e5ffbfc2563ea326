//! Driver Resolver
//!
//! Works out which CSI driver attaches a volume. The bound persistent volume
//! wins over the storage class: a statically provisioned volume may not match
//! whatever its class provisions today.

use crate::domain::ports::{ClusterLookupRef, DriverNameTranslatorRef};
use crate::error::Result;
use crate::translation::{
    AWS_EBS_DRIVER_NAME, AZURE_DISK_DRIVER_NAME, AZURE_FILE_DRIVER_NAME, CINDER_DRIVER_NAME,
    GCE_PD_DRIVER_NAME, PORTWORX_DRIVER_NAME, RBD_DRIVER_NAME, VSPHERE_DRIVER_NAME,
};
use k8s_openapi::api::core::v1::PersistentVolumeSpec;
use tracing::trace;

/// Resolves volumes to driver names through the cluster lookup port
#[derive(Clone)]
pub struct DriverResolver {
    lookup: ClusterLookupRef,
    translator: DriverNameTranslatorRef,
}

impl DriverResolver {
    pub fn new(lookup: ClusterLookupRef, translator: DriverNameTranslatorRef) -> Self {
        Self { lookup, translator }
    }

    pub fn lookup(&self) -> &ClusterLookupRef {
        &self.lookup
    }

    /// Resolve the driver for a volume
    ///
    /// Order:
    ///  1. the CSI driver (or recognized in-tree source) of the bound volume
    ///  2. the translated provisioner of the storage class
    ///
    /// `Ok(None)` means the volume is not managed by a known driver and
    /// should not count against any limit.
    pub async fn resolve_driver(
        &self,
        volume_name: Option<&str>,
        storage_class_name: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(volume_name) = volume_name.filter(|n| !n.is_empty()) {
            if let Some(driver) = self.driver_from_volume(volume_name).await? {
                return Ok(Some(driver));
            }
        }
        if let Some(class_name) = storage_class_name.filter(|n| !n.is_empty()) {
            if let Some(driver) = self.driver_from_storage_class(class_name).await? {
                return Ok(Some(driver));
            }
        }
        Ok(None)
    }

    /// Driver named by the storage class provisioner, after in-tree translation
    async fn driver_from_storage_class(&self, class_name: &str) -> Result<Option<String>> {
        let class = self.lookup.get_storage_class(class_name).await?;
        if class.provisioner.is_empty() {
            return Ok(None);
        }
        let driver = self.translator.translate_or_passthrough(&class.provisioner);
        trace!(
            storage_class = %class_name,
            provisioner = %class.provisioner,
            driver = %driver,
            "Resolved driver from storage class"
        );
        Ok(Some(driver))
    }

    /// Driver named in the persistent volume spec
    async fn driver_from_volume(&self, volume_name: &str) -> Result<Option<String>> {
        let volume = self.lookup.get_persistent_volume(volume_name).await?;
        let driver = volume.spec.as_ref().and_then(driver_from_volume_spec);
        trace!(volume = %volume_name, driver = ?driver, "Resolved driver from volume");
        Ok(driver)
    }
}

impl std::fmt::Debug for DriverResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverResolver").finish_non_exhaustive()
    }
}

/// CSI driver for a volume spec, mapping in-tree sources to their CSI driver
pub fn driver_from_volume_spec(spec: &PersistentVolumeSpec) -> Option<String> {
    if let Some(csi) = &spec.csi {
        return (!csi.driver.is_empty()).then(|| csi.driver.clone());
    }
    let in_tree = if spec.aws_elastic_block_store.is_some() {
        AWS_EBS_DRIVER_NAME
    } else if spec.gce_persistent_disk.is_some() {
        GCE_PD_DRIVER_NAME
    } else if spec.azure_disk.is_some() {
        AZURE_DISK_DRIVER_NAME
    } else if spec.azure_file.is_some() {
        AZURE_FILE_DRIVER_NAME
    } else if spec.cinder.is_some() {
        CINDER_DRIVER_NAME
    } else if spec.vsphere_volume.is_some() {
        VSPHERE_DRIVER_NAME
    } else if spec.portworx_volume.is_some() {
        PORTWORX_DRIVER_NAME
    } else if spec.rbd.is_some() {
        RBD_DRIVER_NAME
    } else {
        return None;
    };
    Some(in_tree.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SnapshotLookup;
    use crate::error::Error;
    use crate::translation::{InTreeTranslator, StaticTranslator};
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::PersistentVolume;
    use k8s_openapi::api::storage::v1::StorageClass;
    use serde_json::json;
    use std::sync::Arc;

    fn storage_class(name: &str, provisioner: &str) -> StorageClass {
        serde_json::from_value(json!({
            "metadata": { "name": name },
            "provisioner": provisioner,
        }))
        .unwrap()
    }

    fn volume(name: &str, spec: serde_json::Value) -> PersistentVolume {
        serde_json::from_value(json!({
            "metadata": { "name": name },
            "spec": spec,
        }))
        .unwrap()
    }

    fn resolver(lookup: SnapshotLookup) -> DriverResolver {
        DriverResolver::new(Arc::new(lookup), Arc::new(InTreeTranslator))
    }

    #[tokio::test]
    async fn test_csi_volume_wins_over_class() {
        let lookup = SnapshotLookup::new();
        lookup.insert_storage_class(storage_class("gp3", "kubernetes.io/aws-ebs"));
        lookup.insert_persistent_volume(volume(
            "pv-1",
            json!({ "csi": { "driver": "csi.example.com", "volumeHandle": "vol-1" } }),
        ));

        let driver = resolver(lookup)
            .resolve_driver(Some("pv-1"), Some("gp3"))
            .await
            .unwrap();
        assert_eq!(driver.as_deref(), Some("csi.example.com"));
    }

    #[tokio::test]
    async fn test_in_tree_volume_source() {
        let lookup = SnapshotLookup::new();
        lookup.insert_persistent_volume(volume(
            "pv-ebs",
            json!({ "awsElasticBlockStore": { "volumeID": "vol-0abc" } }),
        ));

        let driver = resolver(lookup)
            .resolve_driver(Some("pv-ebs"), None)
            .await
            .unwrap();
        assert_eq!(driver.as_deref(), Some(AWS_EBS_DRIVER_NAME));
    }

    #[tokio::test]
    async fn test_unrecognized_volume_falls_back_to_class() {
        let lookup = SnapshotLookup::new();
        lookup.insert_storage_class(storage_class("local", "kubernetes.io/aws-ebs"));
        lookup.insert_persistent_volume(volume(
            "pv-host",
            json!({ "hostPath": { "path": "/data" } }),
        ));

        let driver = resolver(lookup)
            .resolve_driver(Some("pv-host"), Some("local"))
            .await
            .unwrap();
        assert_eq!(driver.as_deref(), Some(AWS_EBS_DRIVER_NAME));
    }

    #[tokio::test]
    async fn test_class_provisioner_without_translation() {
        let lookup = SnapshotLookup::new();
        lookup.insert_storage_class(storage_class("nfs", "example.com/nfs"));

        let resolver = DriverResolver::new(Arc::new(lookup), Arc::new(StaticTranslator::new()));
        let driver = resolver.resolve_driver(None, Some("nfs")).await.unwrap();
        assert_eq!(driver.as_deref(), Some("example.com/nfs"));
    }

    #[tokio::test]
    async fn test_nothing_resolves() {
        let lookup = SnapshotLookup::new();
        lookup.insert_persistent_volume(volume("pv-nfs", json!({ "nfs": { "server": "10.0.0.1", "path": "/" } })));
        lookup.insert_storage_class(storage_class("empty", ""));

        let resolver = resolver(lookup);
        assert_eq!(resolver.resolve_driver(None, None).await.unwrap(), None);
        assert_eq!(resolver.resolve_driver(Some(""), Some("")).await.unwrap(), None);
        assert_eq!(
            resolver.resolve_driver(Some("pv-nfs"), Some("empty")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_missing_objects_are_errors() {
        let resolver = resolver(SnapshotLookup::new());

        let err = resolver.resolve_driver(Some("pv-gone"), None).await.unwrap_err();
        assert_matches!(err, Error::ResourceNotFound { ref kind, .. } if kind == "PersistentVolume");

        let err = resolver.resolve_driver(None, Some("gone")).await.unwrap_err();
        assert_matches!(err, Error::ResourceNotFound { ref kind, .. } if kind == "StorageClass");
    }

    #[test]
    fn test_driver_from_volume_spec() {
        let spec: PersistentVolumeSpec =
            serde_json::from_value(json!({ "gcePersistentDisk": { "pdName": "disk-1" } })).unwrap();
        assert_eq!(driver_from_volume_spec(&spec).as_deref(), Some(GCE_PD_DRIVER_NAME));

        let spec = PersistentVolumeSpec::default();
        assert_eq!(driver_from_volume_spec(&spec), None);
    }
}
