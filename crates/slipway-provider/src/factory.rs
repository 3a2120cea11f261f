use crate::client::{ObjectKind, ObjectRef, PlatformClient};
use crate::cluster::ClusterProvider;
use crate::container::ContainerProvider;
use crate::ingress::IngressProvider;
use crate::k8s_config::ClusterConfigProvider;
use crate::mock::MockPlatform;
use crate::network::NetworkProvider;
use crate::provider::{linked_name, optional_linked_name, Provider, ProviderFactory};
use crate::release::ReleaseProvider;
use crate::ProviderError;
use slipway_schema::{wan_id, Address, Configuration, ResourceId, ResourceKind, ResourceRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem locations providers resolve paths against.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Slipway home; cluster credentials live below it.
    pub home: PathBuf,
    /// Base for relative paths in the configuration.
    pub work_dir: PathBuf,
}

impl ProviderSettings {
    pub fn new(home: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn kubeconfig_path(&self, cluster: &str) -> PathBuf {
        self.home
            .join("config")
            .join(cluster)
            .join("kubeconfig.yaml")
    }
}

/// The standard factory: one concrete provider per resource kind, all
/// sharing a single platform client.
pub struct PlatformFactory {
    client: Arc<dyn PlatformClient>,
    settings: ProviderSettings,
}

impl PlatformFactory {
    pub fn new(client: Arc<dyn PlatformClient>, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

impl ProviderFactory for PlatformFactory {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn provider(
        &self,
        config: &Configuration,
        id: ResourceId,
    ) -> Result<Box<dyn Provider>, ProviderError> {
        let resource = config
            .get(id)
            .ok_or_else(|| ProviderError::UnknownResource(format!("{:?}#{}", id.kind, id.index)))?;
        let address = resource.address();
        let client = Arc::clone(&self.client);
        let work_dir = self.settings.work_dir.clone();

        let provider: Box<dyn Provider> = match resource {
            ResourceRef::Wan(n) => Box::new(NetworkProvider::new(
                n.clone(),
                ResourceKind::Wan,
                true,
                client,
            )),
            ResourceRef::Network(n) => Box::new(NetworkProvider::new(
                n.clone(),
                ResourceKind::Network,
                wan_id(config) == Some(id),
                client,
            )),
            ResourceRef::Container(c) => Box::new(ContainerProvider::new(
                c.clone(),
                optional_linked_name(config, &address, c.network_ref(), "network")?,
                work_dir,
                client,
            )),
            ResourceRef::Cluster(c) => Box::new(ClusterProvider::new(
                c.clone(),
                optional_linked_name(config, &address, c.network_ref(), "network")?,
                optional_linked_name(config, &address, c.wan_ref(), "wan")?,
                self.settings.kubeconfig_path(&c.name),
                client,
            )),
            ResourceRef::Release(r) => {
                let cluster = linked_name(config, &address, r.cluster_ref(), "cluster")?;
                Box::new(ReleaseProvider::new(
                    r.clone(),
                    cluster.clone(),
                    self.settings.kubeconfig_path(&cluster),
                    work_dir,
                    client,
                ))
            }
            ResourceRef::Ingress(i) => Box::new(IngressProvider::new(
                i.clone(),
                target_object(config, &address, i.target_ref())?,
                optional_linked_name(config, &address, i.network_ref(), "network")?,
                optional_linked_name(config, &address, i.wan_ref(), "wan")?,
                client,
            )),
            ResourceRef::ClusterConfig(b) => {
                let cluster = linked_name(config, &address, b.cluster_ref(), "cluster")?;
                Box::new(ClusterConfigProvider::new(
                    b.clone(),
                    cluster.clone(),
                    self.settings.kubeconfig_path(&cluster),
                    work_dir,
                    client,
                ))
            }
        };
        Ok(provider)
    }
}

fn target_object(
    config: &Configuration,
    address: &Address,
    link: Option<ResourceId>,
) -> Result<ObjectRef, ProviderError> {
    let name = linked_name(config, address, link, "target")?;
    let kind = match link.map(|id| id.kind) {
        Some(ResourceKind::Cluster) => ObjectKind::Cluster,
        _ => ObjectKind::Container,
    };
    Ok(ObjectRef::new(kind, name))
}

/// Pick a platform client by backend name.
///
/// The `mock` backend keeps its objects in `<state_root>/mock-platform.json`
/// so consecutive invocations see the same platform.
pub fn select_platform(
    name: &str,
    state_root: &Path,
) -> Result<Arc<dyn PlatformClient>, ProviderError> {
    match name {
        "mock" => Ok(Arc::new(MockPlatform::persistent(
            state_root.join("mock-platform.json"),
        )?)),
        other => Err(ProviderError::BackendUnavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_schema::{resolve, Cluster, ClusterConfig, Container, Ingress, Network, Release};

    fn resolved() -> Configuration {
        let mut config = Configuration::with_default_wan();
        config.networks.push(Network::new("k8s", "10.5.0.0/16"));
        config
            .containers
            .push(Container::new("consul", "consul:1.6.1").with_network("network.k8s"));
        config
            .clusters
            .push(Cluster::new("dev", "v1.0.0", "network.k8s"));
        config
            .releases
            .push(Release::new("vault", "cluster.dev", "hashicorp/vault"));
        config
            .ingresses
            .push(Ingress::new("ui", "cluster.dev").with_port(8500, 8500, 18500));
        config
            .cluster_configs
            .push(ClusterConfig::new("dash", "cluster.dev", &["./k8s"]));
        resolve(&mut config).unwrap();
        config
    }

    fn factory(home: &Path) -> (Arc<MockPlatform>, PlatformFactory) {
        let mock = Arc::new(MockPlatform::new());
        let factory = PlatformFactory::new(mock.clone(), ProviderSettings::new(home, "/work"));
        (mock, factory)
    }

    #[test]
    fn kubeconfig_location() {
        let settings = ProviderSettings::new("/home/u/.slipway", "/work");
        assert_eq!(
            settings.kubeconfig_path("dev"),
            PathBuf::from("/home/u/.slipway/config/dev/kubeconfig.yaml")
        );
    }

    #[test]
    fn every_resource_gets_a_provider_with_its_address() {
        let home = tempfile::tempdir().unwrap();
        let (_mock, factory) = factory(home.path());
        let config = resolved();
        for id in config.ids() {
            let provider = factory.provider(&config, id).unwrap();
            assert_eq!(*provider.address(), config.address_of(id).unwrap());
        }
    }

    #[test]
    fn providers_create_in_declared_dependency_order() {
        let home = tempfile::tempdir().unwrap();
        let (mock, factory) = factory(home.path());
        let config = resolved();
        let order = [
            ResourceId::wan(),
            ResourceId::new(ResourceKind::Network, 0),
            ResourceId::new(ResourceKind::Container, 0),
            ResourceId::new(ResourceKind::Cluster, 0),
            ResourceId::new(ResourceKind::ClusterConfig, 0),
            ResourceId::new(ResourceKind::Release, 0),
            ResourceId::new(ResourceKind::Ingress, 0),
        ];
        for id in order {
            factory.provider(&config, id).unwrap().create().unwrap();
        }
        assert_eq!(mock.objects().len(), 7);
        let proxy = mock.get(ObjectKind::Proxy, "ui").unwrap();
        assert_eq!(proxy.settings["network"], "k8s");
        assert_eq!(proxy.settings["wan"], "wan");
    }

    #[test]
    fn unresolved_configuration_reports_missing_link() {
        let home = tempfile::tempdir().unwrap();
        let (_mock, factory) = factory(home.path());
        let mut config = Configuration::default();
        config
            .releases
            .push(Release::new("vault", "cluster.dev", "hashicorp/vault"));
        let err = factory
            .provider(&config, ResourceId::new(ResourceKind::Release, 0))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::MissingLink { link: "cluster", .. }));
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let (_mock, factory) = factory(home.path());
        let config = Configuration::default();
        assert!(factory.provider(&config, ResourceId::wan()).is_err());
    }

    #[test]
    fn select_platform_by_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(select_platform("mock", dir.path()).unwrap().name(), "mock");
        assert!(matches!(
            select_platform("docker", dir.path()),
            Err(ProviderError::BackendUnavailable(_))
        ));
    }
}
