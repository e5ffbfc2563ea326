//! Domain Ports - Boundaries between admission logic and the cluster
//!
//! Volume admission never talks to the API server directly. Object lookups
//! and in-tree driver name translation come in through these traits so the
//! same logic runs against a live cluster or an offline snapshot.

use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::api::storage::v1::StorageClass;
use std::sync::Arc;

// =============================================================================
// Cluster Lookup Port
// =============================================================================

/// Read-only access to the objects needed to resolve a pod's volumes
///
/// Every method fails with an error when the object cannot be fetched.
/// Implementations must not retry.
#[async_trait]
pub trait ClusterLookup: Send + Sync {
    /// Fetch a claim by namespace and name
    async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim>;

    /// Fetch a persistent volume by name
    async fn get_persistent_volume(&self, name: &str) -> Result<PersistentVolume>;

    /// Fetch a storage class by name
    async fn get_storage_class(&self, name: &str) -> Result<StorageClass>;

    /// Name of the cluster's default storage class, `None` if there is none
    async fn default_storage_class_name(&self) -> Result<Option<String>>;
}

// =============================================================================
// Driver Name Translation Port
// =============================================================================

/// Maps in-tree volume plugin names to CSI driver names
pub trait DriverNameTranslator: Send + Sync {
    /// Returns the CSI driver name for an in-tree plugin, `None` when the
    /// name is not a known in-tree plugin
    fn translate(&self, in_tree_name: &str) -> Option<String>;

    /// Translate, falling back to the input unchanged
    fn translate_or_passthrough(&self, name: &str) -> String {
        self.translate(name).unwrap_or_else(|| name.to_string())
    }
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterLookupRef = Arc<dyn ClusterLookup>;
pub type DriverNameTranslatorRef = Arc<dyn DriverNameTranslator>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl DriverNameTranslator for Upper {
        fn translate(&self, in_tree_name: &str) -> Option<String> {
            (in_tree_name == "legacy").then(|| "LEGACY".to_string())
        }
    }

    #[test]
    fn test_translate_or_passthrough() {
        assert_eq!(Upper.translate_or_passthrough("legacy"), "LEGACY");
        assert_eq!(Upper.translate_or_passthrough("csi.example.com"), "csi.example.com");
    }
}
