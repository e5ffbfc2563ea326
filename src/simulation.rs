//! Placement Simulation
//!
//! Replays a [`ClusterSnapshot`] through volume discovery and the node
//! registry. Each pod goes to its pinned node (`spec.nodeName`) or to the
//! first node whose limits admit it; pods carrying a deletion timestamp are
//! taken back off the node they were placed on.

use crate::cluster::{ClusterSnapshot, NodeSnapshot};
use crate::error::Result;
use crate::scheduling::{
    AdmissionMetricsSnapshot, NodeUsageRegistry, PodKey, VolumeDiscovery, VolumeUsage, Volumes,
};
use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to one pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum PlacementOutcome {
    /// Committed to `node`
    Placed { pod: String, node: String, volumes: usize },
    /// No node admitted the pod; `reasons` holds one rejection per node
    Unschedulable { pod: String, reasons: Vec<String> },
    /// Removed from `node`
    Removed { pod: String, node: String },
    /// Volume discovery failed
    Failed { pod: String, error: String },
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub outcomes: Vec<PlacementOutcome>,
    /// Identifiers per driver per node after the run
    pub usage: HashMap<String, HashMap<String, usize>>,
    pub metrics: AdmissionMetricsSnapshot,
}

// =============================================================================
// Simulator
// =============================================================================

/// Drives placements against a [`NodeUsageRegistry`]
pub struct Simulator {
    discovery: VolumeDiscovery,
    registry: Arc<NodeUsageRegistry>,
    /// Node each placed pod went to
    placements: HashMap<PodKey, String>,
}

impl Simulator {
    /// Share the discovery metrics with the registry so one snapshot covers both
    pub fn new(discovery: VolumeDiscovery) -> Self {
        let registry = Arc::new(NodeUsageRegistry::with_metrics(Arc::clone(
            discovery.metrics(),
        )));
        Self {
            discovery,
            registry,
            placements: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<NodeUsageRegistry> {
        &self.registry
    }

    /// Register a node and its limits
    pub fn add_node(&self, node: &NodeSnapshot) {
        let mut usage = VolumeUsage::new();
        if let Some(csi_node) = &node.csi_node {
            usage.limits_from_csi_node(csi_node);
        }
        // explicit limits override CSINode values
        for (driver, max) in &node.limits {
            usage.add_limit(driver.clone(), *max);
        }
        self.registry.insert_node(node.name.clone(), usage);
    }

    /// Run every pod of the snapshot in order
    ///
    /// Volumes for all pods are discovered concurrently before placement
    /// starts. A pod whose discovery fails is reported and skipped; deleted
    /// pods are removed whatever their discovery result.
    pub async fn run(&mut self, snapshot: &ClusterSnapshot) -> SimulationSummary {
        for node in &snapshot.nodes {
            self.add_node(node);
        }

        let discovery = &self.discovery;
        let discovered: Vec<Result<Volumes>> =
            join_all(snapshot.pods.iter().map(|pod| discovery.discover_volumes(pod))).await;

        let node_order: Vec<String> = snapshot.nodes.iter().map(|n| n.name.clone()).collect();
        let mut outcomes = Vec::with_capacity(snapshot.pods.len());
        for (pod, volumes) in snapshot.pods.iter().zip(discovered) {
            let key = PodKey::from_pod(pod);
            if pod.metadata.deletion_timestamp.is_some() {
                outcomes.push(self.remove(key));
                continue;
            }
            let outcome = match volumes {
                Ok(volumes) => self.place(pod, key, volumes, &node_order),
                Err(e) => {
                    warn!(pod = %key, error = %e, "Volume discovery failed");
                    PlacementOutcome::Failed {
                        pod: key.to_string(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        SimulationSummary {
            outcomes,
            usage: self.usage_by_node(),
            metrics: self.discovery.metrics().snapshot(),
        }
    }

    fn place(&mut self, pod: &Pod, key: PodKey, volumes: Volumes, nodes: &[String]) -> PlacementOutcome {
        // a pod seen again replaces its earlier placement
        if let Some(previous) = self.placements.remove(&key) {
            debug!(pod = %key, node = %previous, "Releasing earlier placement");
            if let Err(e) = self.registry.remove_pod(&previous, &key) {
                warn!(pod = %key, node = %previous, error = %e, "Failed to release earlier placement");
            }
        }

        let pinned = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.clone())
            .filter(|n| !n.is_empty());
        let candidates: Vec<String> = match pinned {
            Some(node) => vec![node],
            None => nodes.to_vec(),
        };

        let mut reasons = Vec::new();
        for node in candidates {
            match self.registry.try_place(&node, key.clone(), volumes.clone()) {
                Ok(()) => {
                    info!(pod = %key, node = %node, volumes = volumes.total(), "Placed pod");
                    self.placements.insert(key.clone(), node.clone());
                    return PlacementOutcome::Placed {
                        pod: key.to_string(),
                        node,
                        volumes: volumes.total(),
                    };
                }
                Err(e) => {
                    debug!(pod = %key, node = %node, reason = %e, "Node rejected pod");
                    reasons.push(format!("{}: {}", node, e));
                }
            }
        }

        info!(pod = %key, "No node admits pod");
        PlacementOutcome::Unschedulable {
            pod: key.to_string(),
            reasons,
        }
    }

    fn remove(&mut self, key: PodKey) -> PlacementOutcome {
        let Some(node) = self.placements.remove(&key) else {
            return PlacementOutcome::Failed {
                pod: key.to_string(),
                error: "pod is not placed on any node".into(),
            };
        };
        match self.registry.remove_pod(&node, &key) {
            Ok(()) => {
                info!(pod = %key, node = %node, "Removed pod");
                PlacementOutcome::Removed {
                    pod: key.to_string(),
                    node,
                }
            }
            Err(e) => PlacementOutcome::Failed {
                pod: key.to_string(),
                error: e.to_string(),
            },
        }
    }

    fn usage_by_node(&self) -> HashMap<String, HashMap<String, usize>> {
        self.registry
            .node_names()
            .into_iter()
            .filter_map(|node| {
                let usage = self.registry.snapshot(&node)?;
                let counts = usage
                    .volumes()
                    .iter()
                    .map(|(driver, ids)| (driver.clone(), ids.len()))
                    .collect();
                Some((node, counts))
            })
            .collect()
    }
}
