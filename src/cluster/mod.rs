//! Cluster Lookup Adapters
//!
//! Implementations of [`ClusterLookup`](crate::domain::ClusterLookup):
//! a live API server client and an in-memory snapshot for offline runs.

pub mod live;
pub mod snapshot;

pub use live::*;
pub use snapshot::*;

use k8s_openapi::api::storage::v1::StorageClass;

/// Annotation marking the cluster default storage class
pub const IS_DEFAULT_STORAGE_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

/// Pre-GA spelling of the default class annotation, still honored by the API server
pub const BETA_IS_DEFAULT_STORAGE_CLASS_ANNOTATION: &str =
    "storageclass.beta.kubernetes.io/is-default-class";

/// Whether a storage class is annotated as the cluster default
pub fn is_default_storage_class(class: &StorageClass) -> bool {
    class.metadata.annotations.as_ref().is_some_and(|annotations| {
        [IS_DEFAULT_STORAGE_CLASS_ANNOTATION, BETA_IS_DEFAULT_STORAGE_CLASS_ANNOTATION]
            .iter()
            .any(|key| annotations.get(*key).map(String::as_str) == Some("true"))
    })
}

/// Pick the default storage class
///
/// With several defaults the most recently created one wins, matching the
/// API server's admission behavior.
pub fn select_default_storage_class(classes: &[StorageClass]) -> Option<String> {
    classes
        .iter()
        .filter(|class| is_default_storage_class(class))
        .max_by(|a, b| {
            let created = |c: &StorageClass| c.metadata.creation_timestamp.as_ref().map(|t| t.0);
            created(a)
                .cmp(&created(b))
                .then_with(|| b.metadata.name.cmp(&a.metadata.name))
        })
        .and_then(|class| class.metadata.name.clone())
}
