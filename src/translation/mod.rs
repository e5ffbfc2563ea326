//! Driver Name Translation
//!
//! In-tree volume plugins predate CSI. Volume limits are reported per CSI
//! driver, so storage classes and persistent volumes that still name an
//! in-tree plugin have to be mapped onto the CSI driver that took it over.

pub mod in_tree;

pub use in_tree::*;
