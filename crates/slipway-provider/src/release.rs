use crate::client::{ObjectKind, PlatformClient, PlatformObject};
use crate::container::absolute;
use crate::provider::{converge, teardown, Provider};
use crate::ProviderError;
use slipway_schema::{Address, Release, ResourceKind};
use std::path::PathBuf;
use std::sync::Arc;

/// Provider for chart releases installed into a cluster.
pub struct ReleaseProvider {
    address: Address,
    release: Release,
    cluster: String,
    kubeconfig: PathBuf,
    work_dir: PathBuf,
    client: Arc<dyn PlatformClient>,
}

impl ReleaseProvider {
    pub fn new(
        release: Release,
        cluster: String,
        kubeconfig: PathBuf,
        work_dir: PathBuf,
        client: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            address: Address::new(ResourceKind::Release, release.name.clone()),
            release,
            cluster,
            kubeconfig,
            work_dir,
            client,
        }
    }

    fn setup(&self) -> Result<PlatformObject, ProviderError> {
        if self.release.chart.trim().is_empty() {
            return Err(ProviderError::InvalidSetup {
                address: self.address.to_string(),
                reason: "chart must not be empty".to_owned(),
            });
        }

        let mut object = PlatformObject::new(ObjectKind::Release, &self.release.name)
            .with("cluster", &self.cluster)
            .with("kubeconfig", self.kubeconfig.to_string_lossy())
            .with("chart", &self.release.chart)
            .depends_on(ObjectKind::Cluster, &self.cluster);
        if let Some(values) = &self.release.values {
            object = object.with(
                "values",
                absolute(&self.work_dir, values).to_string_lossy(),
            );
        }
        if !self.release.health_check.pods.is_empty() {
            object = object.with("health_check.pods", self.release.health_check.pods.join(","));
        }
        Ok(object)
    }
}

impl Provider for ReleaseProvider {
    fn address(&self) -> &Address {
        &self.address
    }

    fn create(&self) -> Result<(), ProviderError> {
        let object = self.setup()?;
        converge(self.client.as_ref(), &object)
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        teardown(self.client.as_ref(), ObjectKind::Release, &self.release.name)
    }

    fn lookup(&self) -> Result<Option<String>, ProviderError> {
        self.client.find(ObjectKind::Release, &self.release.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPlatform;

    fn provider(release: Release) -> ReleaseProvider {
        ReleaseProvider::new(
            release,
            "dev".to_owned(),
            PathBuf::from("/home/.slipway/config/dev/kubeconfig.yaml"),
            PathBuf::from("/work"),
            Arc::new(MockPlatform::new()),
        )
    }

    #[test]
    fn setup_targets_cluster_kubeconfig() {
        let p = provider(
            Release::new("vault", "cluster.dev", "hashicorp/vault")
                .with_values("values.yaml")
                .with_health_check(&["app=vault", "app=injector"]),
        );
        let object = p.setup().unwrap();
        assert_eq!(
            object.settings["kubeconfig"],
            "/home/.slipway/config/dev/kubeconfig.yaml"
        );
        assert_eq!(object.settings["values"], "/work/values.yaml");
        assert_eq!(object.settings["health_check.pods"], "app=vault,app=injector");
        assert_eq!(object.depends_on[0].to_string(), "cluster/dev");
    }

    #[test]
    fn release_needs_its_cluster() {
        let p = provider(Release::new("vault", "cluster.dev", "hashicorp/vault"));
        assert!(matches!(p.create(), Err(ProviderError::Platform(_))));
    }
}
