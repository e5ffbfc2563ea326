//! Live Cluster Lookup
//!
//! Reads claims, volumes and storage classes straight from the API server.

use super::select_default_storage_class;
use crate::domain::ports::ClusterLookup;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::debug;

/// [`ClusterLookup`] backed by a Kubernetes client
#[derive(Clone)]
pub struct KubeClusterLookup {
    client: Client,
}

impl KubeClusterLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ClusterLookup for KubeClusterLookup {
    async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("PersistentVolumeClaim", format!("{}/{}", namespace, name)))
    }

    async fn get_persistent_volume(&self, name: &str) -> Result<PersistentVolume> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("PersistentVolume", name))
    }

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("StorageClass", name))
    }

    async fn default_storage_class_name(&self) -> Result<Option<String>> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        let classes = api.list(&ListParams::default()).await?;
        let default = select_default_storage_class(&classes.items);
        debug!(default = ?default, classes = classes.items.len(), "Discovered default storage class");
        Ok(default)
    }
}
