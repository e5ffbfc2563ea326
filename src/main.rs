//! Volume Admission Simulator
//!
//! Replays a cluster snapshot through the volume admission logic and prints
//! where each pod would land and which driver limits turned it away.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use volume_admission::{
    ClusterLookupRef, ClusterSnapshot, DriverResolver, Error, KubeClusterLookup, PlacementOutcome,
    Result, SimulationSummary, Simulator, SnapshotLookup, VolumeDiscovery,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Volume Admission - simulate CSI volume limits for pod placement
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster snapshot (YAML) with nodes, pods and storage objects
    #[arg(long, env = "SNAPSHOT")]
    snapshot: PathBuf,

    /// Resolve claims, volumes and storage classes against the live cluster
    #[arg(long, env = "LIVE")]
    live: bool,

    /// Print the summary as JSON
    #[arg(long, env = "OUTPUT_JSON")]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting volume admission simulation");
    info!("  Version: {}", volume_admission::VERSION);
    info!("  Snapshot: {}", args.snapshot.display());
    info!("  Live lookups: {}", args.live);

    let snapshot = ClusterSnapshot::from_path(&args.snapshot)?;
    info!(
        "Loaded snapshot: {} nodes, {} pods, {} storage classes",
        snapshot.nodes.len(),
        snapshot.pods.len(),
        snapshot.storage_classes.len()
    );

    let lookup: ClusterLookupRef = if args.live {
        Arc::new(KubeClusterLookup::try_default().await?)
    } else {
        Arc::new(SnapshotLookup::from_snapshot(&snapshot))
    };
    let resolver = DriverResolver::new(lookup, Arc::new(snapshot.translator()));

    let mut simulator = Simulator::new(VolumeDiscovery::new(resolver));
    let summary = simulator.run(&snapshot).await;

    if args.json {
        let out = serde_json::to_string_pretty(&summary)
            .map_err(|e| Error::Internal(format!("Failed to encode summary: {}", e)))?;
        println!("{}", out);
    } else {
        print_summary(&summary);
    }

    info!("Simulation complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directive = |d: &str| {
        d.parse::<tracing_subscriber::filter::Directive>()
            .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", d, e)))
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("kube=info")?)
        .add_directive(directive("tower=warn")?);

    // logs go to stderr so the summary on stdout stays parseable
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_summary(summary: &SimulationSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            PlacementOutcome::Placed { pod, node, volumes } => {
                println!("PLACED         {} -> {} ({} volumes)", pod, node, volumes);
            }
            PlacementOutcome::Unschedulable { pod, reasons } => {
                println!("UNSCHEDULABLE  {}", pod);
                for reason in reasons {
                    println!("                 {}", reason);
                }
            }
            PlacementOutcome::Removed { pod, node } => {
                println!("REMOVED        {} from {}", pod, node);
            }
            PlacementOutcome::Failed { pod, error } => {
                println!("FAILED         {}: {}", pod, error);
            }
        }
    }

    println!();
    let mut nodes: Vec<_> = summary.usage.iter().collect();
    nodes.sort_by(|a, b| a.0.cmp(b.0));
    for (node, drivers) in nodes {
        let mut drivers: Vec<_> = drivers.iter().collect();
        drivers.sort();
        let usage: Vec<String> = drivers
            .iter()
            .map(|(driver, count)| format!("{}={}", driver, count))
            .collect();
        println!("{:<16} {}", node, usage.join(" "));
    }

    let m = &summary.metrics;
    println!();
    println!(
        "resolved={} skipped={} admitted={} rejected={} commits={} removals={}",
        m.resolved_volumes, m.skipped_volumes, m.admitted, m.rejected, m.commits, m.removals
    );
}
