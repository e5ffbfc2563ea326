//! Scheduling Module
//!
//! Volume discovery, driver resolution and per-node volume limit admission
//! for scheduling simulation.

pub mod discovery;
pub mod metrics;
pub mod registry;
pub mod resolver;
pub mod usage;
pub mod volumes;

pub use discovery::*;
pub use metrics::*;
pub use registry::*;
pub use resolver::*;
pub use usage::*;
pub use volumes::*;
