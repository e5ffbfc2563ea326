//! Pod Volume Discovery
//!
//! Builds the [`Volumes`] a pod would attach to a node. Claim-backed and
//! generic ephemeral volumes are counted; everything else (emptyDir,
//! configMap, inline in-tree sources...) never goes through a CSI attach
//! limit and is ignored.

use super::metrics::AdmissionMetrics;
use super::resolver::DriverResolver;
use super::usage::PodKey;
use super::volumes::Volumes;
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{Pod, Volume};
use std::sync::Arc;
use tracing::{debug, Instrument};

// =============================================================================
// Discovery Report
// =============================================================================

/// A claim that resolved to no known driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedVolume {
    /// Volume name in the pod spec
    pub volume: String,
    /// Claim identity the volume would have been tracked under
    pub claim_id: String,
}

/// Result of discovering a pod's volumes
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub volumes: Volumes,
    pub skipped: Vec<SkippedVolume>,
}

// =============================================================================
// Claim Reference
// =============================================================================

/// What a pod volume tells us before any lookup
struct ClaimRef {
    id: String,
    storage_class_name: Option<String>,
    volume_name: Option<String>,
}

// =============================================================================
// Volume Discovery
// =============================================================================

/// Discovers pod volumes and resolves their drivers
#[derive(Debug, Clone)]
pub struct VolumeDiscovery {
    resolver: DriverResolver,
    metrics: Arc<AdmissionMetrics>,
}

impl VolumeDiscovery {
    pub fn new(resolver: DriverResolver) -> Self {
        Self::with_metrics(resolver, Arc::new(AdmissionMetrics::new()))
    }

    pub fn with_metrics(resolver: DriverResolver, metrics: Arc<AdmissionMetrics>) -> Self {
        Self { resolver, metrics }
    }

    pub fn metrics(&self) -> &Arc<AdmissionMetrics> {
        &self.metrics
    }

    /// Volumes the pod would attach, keyed by driver
    pub async fn discover_volumes(&self, pod: &Pod) -> Result<Volumes> {
        Ok(self.discover_with_report(pod).await?.volumes)
    }

    /// Like [`discover_volumes`](Self::discover_volumes), also listing the
    /// claims that were skipped
    ///
    /// Any lookup failure aborts the whole pod; no partial report is returned.
    pub async fn discover_with_report(&self, pod: &Pod) -> Result<DiscoveryReport> {
        let key = PodKey::from_pod(pod);
        let span = tracing::debug_span!("discover_volumes", pod = %key);
        let report = self.discover_inner(pod, &key).instrument(span).await?;

        self.metrics.record_resolved(report.volumes.total() as u64);
        if !report.skipped.is_empty() {
            self.metrics.record_skipped(report.skipped.len() as u64);
        }
        Ok(report)
    }

    async fn discover_inner(&self, pod: &Pod, key: &PodKey) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        let pod_volumes = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.volumes.as_deref())
            .unwrap_or_default();

        // once per pod, before any volume
        let default_class = self
            .resolver
            .lookup()
            .default_storage_class_name()
            .await
            .map_err(|e| Error::DefaultStorageClass(Box::new(e)))?;

        for volume in pod_volumes {
            let Some(claim) = self.claim_ref(key, volume).await? else {
                continue;
            };

            let storage_class_name = claim
                .storage_class_name
                .filter(|name| !name.is_empty())
                .or_else(|| default_class.clone());

            let driver = self
                .resolver
                .resolve_driver(claim.volume_name.as_deref(), storage_class_name.as_deref())
                .await?;

            match driver {
                Some(driver) => {
                    debug!(volume = %volume.name, driver = %driver, claim = %claim.id, "Tracking volume");
                    report.volumes.add(driver, claim.id);
                }
                None => {
                    // might be a non-CSI driver, not something we track
                    debug!(volume = %volume.name, claim = %claim.id, "No driver resolved, skipping volume");
                    report.skipped.push(SkippedVolume {
                        volume: volume.name.clone(),
                        claim_id: claim.id,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Claim identity plus class and volume names for a pod volume
    async fn claim_ref(&self, key: &PodKey, volume: &Volume) -> Result<Option<ClaimRef>> {
        if let Some(source) = &volume.persistent_volume_claim {
            let claim = self
                .resolver
                .lookup()
                .get_persistent_volume_claim(&key.namespace, &source.claim_name)
                .await?;
            let spec = claim.spec.unwrap_or_default();
            return Ok(Some(ClaimRef {
                id: format!("{}/{}", key.namespace, source.claim_name),
                storage_class_name: spec.storage_class_name,
                volume_name: spec.volume_name,
            }));
        }

        if let Some(ephemeral) = &volume.ephemeral {
            let spec = ephemeral
                .volume_claim_template
                .as_ref()
                .map(|template| template.spec.clone())
                .unwrap_or_default();
            // generated claim name is <pod>-<volume>
            return Ok(Some(ClaimRef {
                id: format!("{}/{}-{}", key.namespace, key.name, volume.name),
                storage_class_name: spec.storage_class_name,
                volume_name: spec.volume_name,
            }));
        }

        Ok(None)
    }
}
