//! Volume Admission - CSI attachment limits for scheduling simulation
//!
//! Answers "if this pod lands on this node, does any CSI driver go over its
//! per-node volume limit?" without attaching anything.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Scheduling Loop / Simulator                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐     ┌──────────────────────────────────┐   │
//! │  │ Volume Discovery │────▶│  Node Usage Registry             │   │
//! │  │  (per pod)       │     │  VolumeUsage per node            │   │
//! │  └────────┬─────────┘     │  check_admission / commit /      │   │
//! │           │               │  remove                          │   │
//! │  ┌────────┴─────────┐     └──────────────────────────────────┘   │
//! │  │ Driver Resolver  │                                            │
//! │  │  PV -> SC        │──▶ Driver Name Translator (in-tree -> CSI) │
//! │  └────────┬─────────┘                                            │
//! ├───────────┼──────────────────────────────────────────────────────┤
//! │           ▼           Cluster Lookup                             │
//! │  ┌─────────────────────────┐  ┌─────────────────────────────┐    │
//! │  │  Live (kube::Client)    │  │  Snapshot (YAML, in-memory) │    │
//! │  └─────────────────────────┘  └─────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`scheduling`]: volume sets, discovery, resolution and per-node usage
//! - [`translation`]: in-tree plugin to CSI driver names
//! - [`cluster`]: cluster lookup adapters and snapshots
//! - [`simulation`]: replaying a snapshot through the registry
//! - [`domain`]: port traits
//! - [`error`]: error types

pub mod cluster;
pub mod domain;
pub mod error;
pub mod scheduling;
pub mod simulation;
pub mod translation;

// Re-export commonly used types
pub use cluster::{ClusterSnapshot, KubeClusterLookup, NodeSnapshot, SnapshotLookup};

pub use domain::ports::{
    ClusterLookup, ClusterLookupRef, DriverNameTranslator, DriverNameTranslatorRef,
};

pub use error::{Error, Result};

pub use scheduling::{
    AdmissionMetrics, DiscoveryReport, DriverResolver, NodeUsageRegistry, PodKey, SkippedVolume,
    VolumeDiscovery, VolumeUsage, Volumes,
};

pub use simulation::{PlacementOutcome, SimulationSummary, Simulator};

pub use translation::{InTreeTranslator, StaticTranslator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
