use crate::client::{ObjectKind, PlatformClient, PlatformObject};
use crate::container::absolute;
use crate::provider::{converge, teardown, Provider};
use crate::ProviderError;
use slipway_schema::{Address, ClusterConfig, ResourceKind};
use std::path::PathBuf;
use std::sync::Arc;

/// Provider applying a bundle of manifests to the cluster it is linked to.
///
/// Lookup always reports nothing: applied manifests have no single identifier.
pub struct ClusterConfigProvider {
    address: Address,
    bundle: ClusterConfig,
    cluster: String,
    kubeconfig: PathBuf,
    work_dir: PathBuf,
    client: Arc<dyn PlatformClient>,
}

impl ClusterConfigProvider {
    pub fn new(
        bundle: ClusterConfig,
        cluster: String,
        kubeconfig: PathBuf,
        work_dir: PathBuf,
        client: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            address: Address::new(ResourceKind::ClusterConfig, bundle.name.clone()),
            bundle,
            cluster,
            kubeconfig,
            work_dir,
            client,
        }
    }

    fn setup(&self) -> Result<PlatformObject, ProviderError> {
        let paths: Vec<String> = self
            .bundle
            .paths
            .iter()
            .map(|p| absolute(&self.work_dir, p).to_string_lossy().into_owned())
            .collect();
        Ok(PlatformObject::new(ObjectKind::Manifests, &self.bundle.name)
            .with("cluster", &self.cluster)
            .with("kubeconfig", self.kubeconfig.to_string_lossy())
            .with("paths", serde_json::to_string(&paths)?)
            .with("wait_until_ready", self.bundle.wait_until_ready.to_string())
            .depends_on(ObjectKind::Cluster, &self.cluster))
    }
}

impl Provider for ClusterConfigProvider {
    fn address(&self) -> &Address {
        &self.address
    }

    fn create(&self) -> Result<(), ProviderError> {
        let object = self.setup()?;
        converge(self.client.as_ref(), &object)
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        teardown(self.client.as_ref(), ObjectKind::Manifests, &self.bundle.name)
    }

    fn lookup(&self) -> Result<Option<String>, ProviderError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PlatformClient;
    use crate::mock::MockPlatform;

    #[test]
    fn applies_after_cluster_with_absolute_paths() {
        let mock = Arc::new(MockPlatform::new());
        mock.ensure(&PlatformObject::new(ObjectKind::Cluster, "dev"))
            .unwrap();
        let provider = ClusterConfigProvider::new(
            ClusterConfig::new("dashboard", "cluster.dev", &["./k8s", "/abs/crd.yaml"])
                .with_wait_until_ready(true),
            "dev".to_owned(),
            PathBuf::from("/home/config/dev/kubeconfig.yaml"),
            PathBuf::from("/work"),
            mock.clone(),
        );

        provider.create().unwrap();
        let object = mock.get(ObjectKind::Manifests, "dashboard").unwrap();
        assert_eq!(object.settings["paths"], r#"["/work/./k8s","/abs/crd.yaml"]"#);
        assert_eq!(object.settings["wait_until_ready"], "true");
        assert_eq!(provider.lookup().unwrap(), None);

        provider.destroy().unwrap();
        assert!(!mock.contains(ObjectKind::Manifests, "dashboard"));
    }
}
