//! In-Tree Plugin Translators
//!
//! `InTreeTranslator` carries the Kubernetes migration table.
//! `StaticTranslator` holds an explicit table and is what tests and snapshot
//! overrides use.

use crate::domain::ports::DriverNameTranslator;
use std::collections::BTreeMap;

// =============================================================================
// CSI Driver Names
// =============================================================================

pub const AWS_EBS_DRIVER_NAME: &str = "ebs.csi.aws.com";
pub const GCE_PD_DRIVER_NAME: &str = "pd.csi.storage.gke.io";
pub const CINDER_DRIVER_NAME: &str = "cinder.csi.openstack.org";
pub const AZURE_DISK_DRIVER_NAME: &str = "disk.csi.azure.com";
pub const AZURE_FILE_DRIVER_NAME: &str = "file.csi.azure.com";
pub const VSPHERE_DRIVER_NAME: &str = "csi.vsphere.vmware.com";
pub const PORTWORX_DRIVER_NAME: &str = "pxd.portworx.com";
pub const RBD_DRIVER_NAME: &str = "rbd.csi.ceph.com";

// =============================================================================
// In-Tree Plugin Names
// =============================================================================

pub const AWS_EBS_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/aws-ebs";
pub const GCE_PD_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/gce-pd";
pub const CINDER_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/cinder";
pub const AZURE_DISK_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/azure-disk";
pub const AZURE_FILE_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/azure-file";
pub const VSPHERE_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/vsphere-volume";
pub const PORTWORX_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/portworx-volume";
pub const RBD_IN_TREE_PLUGIN_NAME: &str = "kubernetes.io/rbd";

const IN_TREE_TO_CSI: &[(&str, &str)] = &[
    (AWS_EBS_IN_TREE_PLUGIN_NAME, AWS_EBS_DRIVER_NAME),
    (GCE_PD_IN_TREE_PLUGIN_NAME, GCE_PD_DRIVER_NAME),
    (CINDER_IN_TREE_PLUGIN_NAME, CINDER_DRIVER_NAME),
    (AZURE_DISK_IN_TREE_PLUGIN_NAME, AZURE_DISK_DRIVER_NAME),
    (AZURE_FILE_IN_TREE_PLUGIN_NAME, AZURE_FILE_DRIVER_NAME),
    (VSPHERE_IN_TREE_PLUGIN_NAME, VSPHERE_DRIVER_NAME),
    (PORTWORX_IN_TREE_PLUGIN_NAME, PORTWORX_DRIVER_NAME),
    (RBD_IN_TREE_PLUGIN_NAME, RBD_DRIVER_NAME),
];

// =============================================================================
// In-Tree Translator
// =============================================================================

/// Translator backed by the built-in Kubernetes migration table
#[derive(Debug, Clone, Copy, Default)]
pub struct InTreeTranslator;

impl InTreeTranslator {
    pub fn new() -> Self {
        Self
    }

    /// In-tree plugin names this translator knows about
    pub fn plugin_names() -> impl Iterator<Item = &'static str> {
        IN_TREE_TO_CSI.iter().map(|(in_tree, _)| *in_tree)
    }
}

impl DriverNameTranslator for InTreeTranslator {
    fn translate(&self, in_tree_name: &str) -> Option<String> {
        IN_TREE_TO_CSI
            .iter()
            .find(|(in_tree, _)| *in_tree == in_tree_name)
            .map(|(_, csi)| csi.to_string())
    }
}

// =============================================================================
// Static Translator
// =============================================================================

/// Translator over a fixed table
///
/// Optionally layered over another translator; entries in the table win.
#[derive(Default)]
pub struct StaticTranslator {
    table: BTreeMap<String, String>,
    fallback: Option<Box<dyn DriverNameTranslator>>,
}

impl StaticTranslator {
    /// Empty table, every name passes through
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(in_tree, csi)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            table: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            fallback: None,
        }
    }

    /// Consult `fallback` for names missing from the table
    pub fn with_fallback(mut self, fallback: impl DriverNameTranslator + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn insert(&mut self, in_tree: impl Into<String>, csi: impl Into<String>) {
        self.table.insert(in_tree.into(), csi.into());
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl std::fmt::Debug for StaticTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTranslator")
            .field("table", &self.table)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl DriverNameTranslator for StaticTranslator {
    fn translate(&self, in_tree_name: &str) -> Option<String> {
        self.table
            .get(in_tree_name)
            .cloned()
            .or_else(|| self.fallback.as_ref()?.translate(in_tree_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_tree_translation() {
        let translator = InTreeTranslator::new();
        assert_eq!(
            translator.translate("kubernetes.io/aws-ebs").as_deref(),
            Some(AWS_EBS_DRIVER_NAME)
        );
        assert_eq!(
            translator.translate("kubernetes.io/gce-pd").as_deref(),
            Some(GCE_PD_DRIVER_NAME)
        );
        assert_eq!(translator.translate("ebs.csi.aws.com"), None);
        assert_eq!(
            translator.translate_or_passthrough("example.com/nfs"),
            "example.com/nfs"
        );
        assert_eq!(InTreeTranslator::plugin_names().count(), 8);
    }

    #[test]
    fn test_empty_static_translator_passes_through() {
        let translator = StaticTranslator::new();
        assert!(translator.is_empty());
        assert_eq!(translator.translate("kubernetes.io/aws-ebs"), None);
        assert_eq!(
            translator.translate_or_passthrough("kubernetes.io/aws-ebs"),
            "kubernetes.io/aws-ebs"
        );
    }

    #[test]
    fn test_static_translator_overrides_fallback() {
        let translator = StaticTranslator::from_pairs([
            ("kubernetes.io/aws-ebs", "custom.ebs.example.com"),
            ("example.com/legacy", "csi.example.com"),
        ])
        .with_fallback(InTreeTranslator);

        assert_eq!(translator.len(), 2);
        assert_eq!(
            translator.translate("kubernetes.io/aws-ebs").as_deref(),
            Some("custom.ebs.example.com")
        );
        assert_eq!(
            translator.translate("example.com/legacy").as_deref(),
            Some("csi.example.com")
        );
        assert_eq!(
            translator.translate("kubernetes.io/cinder").as_deref(),
            Some(CINDER_DRIVER_NAME)
        );
        assert_eq!(translator.translate("unknown"), None);
    }
}
