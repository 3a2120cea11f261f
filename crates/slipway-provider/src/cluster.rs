use crate::client::{ObjectKind, PlatformClient, PlatformObject};
use crate::provider::{converge, teardown, Provider};
use crate::ProviderError;
use slipway_schema::{Address, Cluster, ResourceKind};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider for clusters. Owns the cluster's kubeconfig directory.
pub struct ClusterProvider {
    address: Address,
    cluster: Cluster,
    network: Option<String>,
    wan: Option<String>,
    kubeconfig: PathBuf,
    client: Arc<dyn PlatformClient>,
}

impl ClusterProvider {
    pub fn new(
        cluster: Cluster,
        network: Option<String>,
        wan: Option<String>,
        kubeconfig: PathBuf,
        client: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            address: Address::new(ResourceKind::Cluster, cluster.name.clone()),
            cluster,
            network,
            wan,
            kubeconfig,
            client,
        }
    }

    fn setup(&self) -> Result<PlatformObject, ProviderError> {
        let invalid = |reason: &str| ProviderError::InvalidSetup {
            address: self.address.to_string(),
            reason: reason.to_owned(),
        };
        if self.cluster.version.trim().is_empty() {
            return Err(invalid("version must not be empty"));
        }
        if self.cluster.nodes == 0 {
            return Err(invalid("a cluster needs at least one node"));
        }
        if let Some(dir) = self.kubeconfig.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut object = PlatformObject::new(ObjectKind::Cluster, &self.cluster.name)
            .with("version", &self.cluster.version)
            .with("nodes", self.cluster.nodes.to_string())
            .with("kubeconfig", self.kubeconfig.to_string_lossy());
        if let Some(network) = &self.network {
            object = object
                .with("network", network)
                .depends_on(ObjectKind::Network, network);
        }
        if let Some(wan) = &self.wan {
            object = object
                .with("wan", wan)
                .depends_on(ObjectKind::Network, wan);
        }
        Ok(object)
    }
}

impl Provider for ClusterProvider {
    fn address(&self) -> &Address {
        &self.address
    }

    fn create(&self) -> Result<(), ProviderError> {
        let object = self.setup()?;
        converge(self.client.as_ref(), &object)
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        teardown(self.client.as_ref(), ObjectKind::Cluster, &self.cluster.name)?;
        if let Some(dir) = self.kubeconfig.parent() {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    fn lookup(&self) -> Result<Option<String>, ProviderError> {
        self.client.find(ObjectKind::Cluster, &self.cluster.name)
    }
}
