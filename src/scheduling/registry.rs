//! Node Usage Registry
//!
//! Holds one [`VolumeUsage`] per node. Different nodes can be evaluated from
//! different threads; check-then-commit on one node happens under that
//! node's shard lock so two placements can't both squeeze into the last slot.

use super::metrics::AdmissionMetrics;
use super::usage::{PodKey, VolumeUsage};
use super::volumes::Volumes;
use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of per-node volume usage
#[derive(Debug)]
pub struct NodeUsageRegistry {
    nodes: DashMap<String, VolumeUsage>,
    metrics: Arc<AdmissionMetrics>,
}

impl Default for NodeUsageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeUsageRegistry {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(AdmissionMetrics::new()))
    }

    pub fn with_metrics(metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            nodes: DashMap::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<AdmissionMetrics> {
        &self.metrics
    }

    /// Start tracking a node, replacing any previous usage for it
    pub fn insert_node(&self, node: impl Into<String>, usage: VolumeUsage) {
        let node = node.into();
        info!(node = %node, pods = usage.pod_count(), "Tracking node volume usage");
        self.nodes.insert(node, usage);
    }

    /// Stop tracking a node, returning its usage
    pub fn remove_node(&self, node: &str) -> Option<VolumeUsage> {
        self.nodes.remove(node).map(|(_, usage)| usage)
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    /// Tracked node names, sorted
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn add_limit(&self, node: &str, driver: impl Into<String>, max: i64) -> Result<()> {
        let mut usage = self.node_mut(node)?;
        usage.add_limit(driver, max);
        Ok(())
    }

    /// Non-mutating admission check against a node
    pub fn check_admission(&self, node: &str, candidate: &Volumes) -> Result<()> {
        let usage = self.nodes.get(node).ok_or_else(|| Error::NodeNotFound {
            node: node.to_string(),
        })?;
        self.record(usage.check_admission(candidate))
    }

    /// Check and commit while holding the node's lock
    ///
    /// On rejection the node is left untouched.
    pub fn try_place(&self, node: &str, pod: PodKey, volumes: Volumes) -> Result<()> {
        let mut usage = self.node_mut(node)?;
        self.record(usage.check_admission(&volumes))?;
        debug!(node = %node, pod = %pod, volumes = volumes.total(), "Committing pod volumes");
        usage.commit(pod, volumes);
        self.metrics.record_commit();
        Ok(())
    }

    /// Remove a pod's contribution from a node
    pub fn remove_pod(&self, node: &str, pod: &PodKey) -> Result<()> {
        let mut usage = self.node_mut(node)?;
        if usage.contains_pod(pod) {
            usage.remove(pod);
            self.metrics.record_removal();
            debug!(node = %node, pod = %pod, "Removed pod volumes");
        }
        Ok(())
    }

    /// Copy of a node's usage, for what-if simulation
    pub fn snapshot(&self, node: &str) -> Option<VolumeUsage> {
        self.nodes.get(node).map(|usage| usage.value().clone())
    }

    fn node_mut(&self, node: &str) -> Result<dashmap::mapref::one::RefMut<'_, String, VolumeUsage>> {
        self.nodes.get_mut(node).ok_or_else(|| Error::NodeNotFound {
            node: node.to_string(),
        })
    }

    fn record(&self, decision: Result<()>) -> Result<()> {
        match &decision {
            Ok(()) => self.metrics.record_admitted(),
            Err(e) if e.is_admission_rejection() => self.metrics.record_rejected(),
            Err(_) => {}
        }
        decision
    }
}
