//! Per-Node Volume Usage
//!
//! The number of volumes a node can attach varies per driver (and per
//! instance type). `VolumeUsage` tracks what is already committed to one node
//! so the scheduler can tell which pods still fit there.

use super::volumes::Volumes;
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::storage::v1::CSINode;
use kube::ResourceExt;
use std::collections::HashMap;
use tracing::debug;

// =============================================================================
// Pod Key
// =============================================================================

/// Namespace and name of a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key for a pod object, pods without a namespace land in `default`
    pub fn from_pod(pod: &Pod) -> Self {
        Self {
            namespace: pod.namespace().unwrap_or_else(|| "default".to_string()),
            name: pod.name_any(),
        }
    }
}

impl std::fmt::Display for PodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl From<&Pod> for PodKey {
    fn from(pod: &Pod) -> Self {
        Self::from_pod(pod)
    }
}

// =============================================================================
// Volume Usage
// =============================================================================

/// Volume usage and per-driver limits for a single node
///
/// Not synchronized: a tracker is driven by one scheduling thread at a time.
/// Clone it to simulate a placement on a projected node.
#[derive(Debug, Clone, Default)]
pub struct VolumeUsage {
    /// Union of every pod's volumes
    volumes: Volumes,
    pod_volumes: HashMap<PodKey, Volumes>,
    limits: HashMap<String, i64>,
}

impl VolumeUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of volumes `driver` may attach on this node
    ///
    /// Zero or negative values are stored as-is and reject every volume of
    /// that driver.
    pub fn add_limit(&mut self, driver: impl Into<String>, max: i64) {
        self.limits.insert(driver.into(), max);
    }

    /// Load limits from the allocatable counts a CSINode reports
    ///
    /// Drivers without an allocatable count are left unconstrained. Returns
    /// the number of limits applied.
    pub fn limits_from_csi_node(&mut self, csi_node: &CSINode) -> usize {
        let mut applied = 0;
        for driver in &csi_node.spec.drivers {
            if let Some(count) = driver.allocatable.as_ref().and_then(|a| a.count) {
                self.add_limit(driver.name.clone(), i64::from(count));
                applied += 1;
            }
        }
        applied
    }

    /// Check whether adding `candidate` keeps every driver within its limit
    ///
    /// Committed state is never modified. Drivers are checked in name order
    /// and the first one over its limit is reported.
    pub fn check_admission(&self, candidate: &Volumes) -> Result<()> {
        let proposed = self.volumes.union(candidate);
        for (driver, ids) in &proposed {
            let Some(&limit) = self.limits.get(driver) else {
                continue;
            };
            if ids.len() as i64 > limit {
                debug!(driver = %driver, proposed = ids.len(), limit, "Volume limit exceeded");
                return Err(Error::VolumeLimitExceeded {
                    driver: driver.clone(),
                    proposed: ids.len(),
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Record `volumes` as the pod's contribution to this node
    ///
    /// Limits are not re-checked; call [`check_admission`](Self::check_admission)
    /// first. Committing an existing key replaces its previous volumes.
    pub fn commit(&mut self, pod: PodKey, volumes: Volumes) {
        self.volumes.insert(&volumes);
        if self.pod_volumes.insert(pod, volumes).is_some() {
            // the old contribution may hold identifiers the new one dropped
            self.rebuild();
        }
    }

    /// Forget a pod's volumes
    ///
    /// Unknown keys are a no-op.
    pub fn remove(&mut self, pod: &PodKey) {
        if self.pod_volumes.remove(pod).is_some() {
            self.rebuild();
        }
    }

    /// Recompute the aggregate from scratch
    ///
    /// Identifiers can be shared by several pods (one claim mounted twice),
    /// so subtracting a pod's set would drop volumes still in use.
    fn rebuild(&mut self) {
        let mut volumes = Volumes::new();
        for contribution in self.pod_volumes.values() {
            volumes.insert(contribution);
        }
        self.volumes = volumes;
    }

    /// Aggregate volumes across all tracked pods
    pub fn volumes(&self) -> &Volumes {
        &self.volumes
    }

    pub fn pod_volumes(&self, pod: &PodKey) -> Option<&Volumes> {
        self.pod_volumes.get(pod)
    }

    pub fn limit(&self, driver: &str) -> Option<i64> {
        self.limits.get(driver).copied()
    }

    pub fn limits(&self) -> &HashMap<String, i64> {
        &self.limits
    }

    pub fn pod_count(&self) -> usize {
        self.pod_volumes.len()
    }

    pub fn contains_pod(&self, pod: &PodKey) -> bool {
        self.pod_volumes.contains_key(pod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const EBS: &str = "ebs.csi.aws.com";

    fn vols(ids: &[&str]) -> Volumes {
        ids.iter().map(|id| (EBS, *id)).collect()
    }

    fn key(name: &str) -> PodKey {
        PodKey::new("ns", name)
    }

    #[test]
    fn test_limit_scenario() {
        let mut usage = VolumeUsage::new();
        usage.add_limit(EBS, 2);

        let a = vols(&["ns/pvc-1"]);
        assert!(usage.check_admission(&a).is_ok());
        usage.commit(key("a"), a);

        let b = vols(&["ns/pvc-2"]);
        assert!(usage.check_admission(&b).is_ok());
        usage.commit(key("b"), b);

        let c = vols(&["ns/pvc-3"]);
        let err = usage.check_admission(&c).unwrap_err();
        assert_matches!(
            err,
            Error::VolumeLimitExceeded { ref driver, proposed: 3, limit: 2 } if driver == EBS
        );
        assert_eq!(usage.volumes().count(EBS), 2);
    }

    #[test]
    fn test_check_admission_does_not_mutate() {
        let mut usage = VolumeUsage::new();
        usage.add_limit(EBS, 1);
        usage.commit(key("a"), vols(&["ns/pvc-1"]));
        let before = usage.clone();

        assert!(usage.check_admission(&vols(&["ns/pvc-2"])).is_err());
        assert!(usage.check_admission(&vols(&["ns/pvc-1"])).is_ok());

        assert_eq!(usage.volumes(), before.volumes());
        assert_eq!(usage.limits(), before.limits());
        assert_eq!(usage.pod_volumes(&key("a")), before.pod_volumes(&key("a")));
        assert_eq!(usage.pod_count(), before.pod_count());
    }

    #[test]
    fn test_shared_claim_counted_once() {
        let mut usage = VolumeUsage::new();
        usage.commit(key("a"), vols(&["ns/shared"]));
        usage.commit(key("b"), vols(&["ns/shared"]));

        assert_eq!(usage.volumes().count(EBS), 1);

        // still mounted by b
        usage.remove(&key("a"));
        assert_eq!(usage.volumes().count(EBS), 1);
        usage.remove(&key("b"));
        assert!(usage.volumes().is_empty());
    }

    #[test]
    fn test_remove_rebuilds_from_remaining() {
        let mut usage = VolumeUsage::new();
        usage.commit(key("a"), vols(&["ns/1", "ns/2"]));
        usage.commit(key("b"), vols(&["ns/2", "ns/3"]));
        usage.commit(key("c"), [("pd.csi.storage.gke.io", "ns/4")].into_iter().collect());

        usage.remove(&key("b"));

        let mut expected = vols(&["ns/1", "ns/2"]);
        expected.insert(&[("pd.csi.storage.gke.io", "ns/4")].into_iter().collect());
        assert_eq!(usage.volumes(), &expected);
        assert!(!usage.contains_pod(&key("b")));

        // unknown key
        usage.remove(&key("never-added"));
        assert_eq!(usage.volumes(), &expected);
        assert_eq!(usage.pod_count(), 2);
    }

    #[test]
    fn test_commit_replaces_previous_contribution() {
        let mut usage = VolumeUsage::new();
        usage.commit(key("a"), vols(&["ns/old"]));
        usage.commit(key("a"), vols(&["ns/new"]));

        assert_eq!(usage.pod_count(), 1);
        assert!(!usage.volumes().contains(EBS, "ns/old"));
        assert!(usage.volumes().contains(EBS, "ns/new"));
    }

    #[test]
    fn test_unlimited_and_non_positive_limits() {
        let mut usage = VolumeUsage::new();
        usage.commit(key("a"), vols(&["ns/1", "ns/2", "ns/3"]));
        assert!(usage.check_admission(&vols(&["ns/4"])).is_ok());

        usage.add_limit("disk.csi.azure.com", 0);
        let azure: Volumes = [("disk.csi.azure.com", "ns/disk")].into_iter().collect();
        assert_matches!(
            usage.check_admission(&azure),
            Err(Error::VolumeLimitExceeded { proposed: 1, limit: 0, .. })
        );

        // an empty candidate is always admitted
        usage.add_limit(EBS, 3);
        assert!(usage.check_admission(&Volumes::new()).is_ok());
        assert_eq!(usage.limit(EBS), Some(3));
    }

    #[test]
    fn test_limits_from_csi_node() {
        let csi_node: CSINode = serde_json::from_value(json!({
            "metadata": { "name": "node-a" },
            "spec": { "drivers": [
                { "name": EBS, "nodeID": "i-123", "allocatable": { "count": 25 } },
                { "name": "efs.csi.aws.com", "nodeID": "i-123" },
            ] },
        }))
        .unwrap();

        let mut usage = VolumeUsage::new();
        assert_eq!(usage.limits_from_csi_node(&csi_node), 1);
        assert_eq!(usage.limit(EBS), Some(25));
        assert_eq!(usage.limit("efs.csi.aws.com"), None);
    }

    #[test]
    fn test_pod_key() {
        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "web-0", "namespace": "shop" },
        }))
        .unwrap();
        assert_eq!(PodKey::from(&pod), PodKey::new("shop", "web-0"));
        assert_eq!(PodKey::from(&pod).to_string(), "shop/web-0");

        let pod: Pod = serde_json::from_value(json!({ "metadata": { "name": "solo" } })).unwrap();
        assert_eq!(PodKey::from_pod(&pod).namespace, "default");
    }
}
