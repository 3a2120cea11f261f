//! Declared resources and the `Configuration` aggregate that owns them.
//!
//! Reference fields are plain strings (`"network.k8s"`) and remain the source
//! of truth. The `*_ref` link fields are filled in by [`resolve`](crate::resolve)
//! and are never serialized.

use crate::resolve::ResolveError;
use crate::types::{Address, ResourceId, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the implicit wide-area network.
pub const WAN_NAME: &str = "wan";
/// Subnet given to the implicit wide-area network.
pub const WAN_SUBNET: &str = "192.168.200.0/24";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Network {
    pub name: String,
    pub subnet: String,
}

impl Network {
    pub fn new(name: impl Into<String>, subnet: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subnet: subnet.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Volume {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(skip)]
    pub(crate) network_ref: Option<ResourceId>,
}

impl Container {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            command: Vec::new(),
            volumes: Vec::new(),
            network: String::new(),
            ip_address: None,
            environment: BTreeMap::new(),
            network_ref: None,
        }
    }

    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: &[&str]) -> Self {
        self.command = command.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_volume(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.volumes.push(Volume {
            source: source.into(),
            destination: destination.into(),
        });
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn network_ref(&self) -> Option<ResourceId> {
        self.network_ref
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Cluster {
    pub name: String,
    pub version: String,
    #[serde(default = "default_nodes")]
    pub nodes: u32,
    #[serde(default)]
    pub network: String,
    #[serde(skip)]
    pub(crate) network_ref: Option<ResourceId>,
    #[serde(skip)]
    pub(crate) wan_ref: Option<ResourceId>,
}

fn default_nodes() -> u32 {
    1
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            nodes: default_nodes(),
            network: network.into(),
            network_ref: None,
            wan_ref: None,
        }
    }

    #[must_use]
    pub fn with_nodes(mut self, nodes: u32) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn network_ref(&self) -> Option<ResourceId> {
        self.network_ref
    }

    pub fn wan_ref(&self) -> Option<ResourceId> {
        self.wan_ref
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HealthCheck {
    #[serde(default)]
    pub pods: Vec<String>,
}

/// A chart installed into a cluster through the release manager.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Release {
    pub name: String,
    pub cluster: String,
    pub chart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    #[serde(default)]
    pub health_check: HealthCheck,
    #[serde(skip)]
    pub(crate) cluster_ref: Option<ResourceId>,
}

impl Release {
    pub fn new(
        name: impl Into<String>,
        cluster: impl Into<String>,
        chart: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            chart: chart.into(),
            values: None,
            health_check: HealthCheck::default(),
            cluster_ref: None,
        }
    }

    #[must_use]
    pub fn with_values(mut self, values: impl Into<String>) -> Self {
        self.values = Some(values.into());
        self
    }

    #[must_use]
    pub fn with_health_check(mut self, pods: &[&str]) -> Self {
        self.health_check.pods = pods.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    pub fn cluster_ref(&self) -> Option<ResourceId> {
        self.cluster_ref
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PortMapping {
    pub local: u16,
    pub remote: u16,
    pub host: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Ingress {
    pub name: String,
    pub target: String,
    /// Explicit network; when empty the target's network is used.
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(skip)]
    pub(crate) target_ref: Option<ResourceId>,
    #[serde(skip)]
    pub(crate) network_ref: Option<ResourceId>,
    #[serde(skip)]
    pub(crate) wan_ref: Option<ResourceId>,
}

impl Ingress {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            network: String::new(),
            ports: Vec::new(),
            target_ref: None,
            network_ref: None,
            wan_ref: None,
        }
    }

    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, local: u16, remote: u16, host: u16) -> Self {
        self.ports.push(PortMapping {
            local,
            remote,
            host,
        });
        self
    }

    pub fn target_ref(&self) -> Option<ResourceId> {
        self.target_ref
    }

    pub fn network_ref(&self) -> Option<ResourceId> {
        self.network_ref
    }

    pub fn wan_ref(&self) -> Option<ResourceId> {
        self.wan_ref
    }
}

/// A bundle of manifests applied to a cluster.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub name: String,
    pub cluster: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub wait_until_ready: bool,
    #[serde(skip)]
    pub(crate) cluster_ref: Option<ResourceId>,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>, cluster: impl Into<String>, paths: &[&str]) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            paths: paths.iter().map(|s| (*s).to_owned()).collect(),
            wait_until_ready: false,
            cluster_ref: None,
        }
    }

    #[must_use]
    pub fn with_wait_until_ready(mut self, wait: bool) -> Self {
        self.wait_until_ready = wait;
        self
    }

    pub fn cluster_ref(&self) -> Option<ResourceId> {
        self.cluster_ref
    }
}

/// Owned snapshot of any declared resource.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum Resource {
    Wan(Network),
    Network(Network),
    Container(Container),
    #[serde(rename = "k8s_config")]
    ClusterConfig(ClusterConfig),
    Cluster(Cluster),
    #[serde(rename = "helm")]
    Release(Release),
    Ingress(Ingress),
}

impl Resource {
    pub fn as_ref(&self) -> ResourceRef<'_> {
        match self {
            Resource::Wan(n) => ResourceRef::Wan(n),
            Resource::Network(n) => ResourceRef::Network(n),
            Resource::Container(c) => ResourceRef::Container(c),
            Resource::ClusterConfig(c) => ResourceRef::ClusterConfig(c),
            Resource::Cluster(c) => ResourceRef::Cluster(c),
            Resource::Release(r) => ResourceRef::Release(r),
            Resource::Ingress(i) => ResourceRef::Ingress(i),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.as_ref().kind()
    }

    pub fn name(&self) -> &str {
        self.as_ref().name()
    }

    pub fn address(&self) -> Address {
        self.as_ref().address()
    }
}

/// Borrowed view of a resource inside a [`Configuration`].
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    Wan(&'a Network),
    Network(&'a Network),
    Container(&'a Container),
    ClusterConfig(&'a ClusterConfig),
    Cluster(&'a Cluster),
    Release(&'a Release),
    Ingress(&'a Ingress),
}

impl<'a> ResourceRef<'a> {
    pub fn kind(self) -> ResourceKind {
        match self {
            ResourceRef::Wan(_) => ResourceKind::Wan,
            ResourceRef::Network(_) => ResourceKind::Network,
            ResourceRef::Container(_) => ResourceKind::Container,
            ResourceRef::ClusterConfig(_) => ResourceKind::ClusterConfig,
            ResourceRef::Cluster(_) => ResourceKind::Cluster,
            ResourceRef::Release(_) => ResourceKind::Release,
            ResourceRef::Ingress(_) => ResourceKind::Ingress,
        }
    }

    pub fn name(self) -> &'a str {
        match self {
            ResourceRef::Wan(n) | ResourceRef::Network(n) => &n.name,
            ResourceRef::Container(c) => &c.name,
            ResourceRef::ClusterConfig(c) => &c.name,
            ResourceRef::Cluster(c) => &c.name,
            ResourceRef::Release(r) => &r.name,
            ResourceRef::Ingress(i) => &i.name,
        }
    }

    pub fn address(self) -> Address {
        Address::new(self.kind(), self.name())
    }

    /// Every resolved link of this resource, implicit ones included.
    ///
    /// Empty until the owning configuration has been resolved.
    pub fn links(self) -> Vec<ResourceId> {
        let links = match self {
            ResourceRef::Wan(_) | ResourceRef::Network(_) => vec![],
            ResourceRef::Container(c) => vec![c.network_ref],
            ResourceRef::ClusterConfig(c) => vec![c.cluster_ref],
            ResourceRef::Cluster(c) => vec![c.network_ref, c.wan_ref],
            ResourceRef::Release(r) => vec![r.cluster_ref],
            ResourceRef::Ingress(i) => vec![i.target_ref, i.network_ref, i.wan_ref],
        };
        let mut out: Vec<ResourceId> = Vec::with_capacity(links.len());
        for id in links.into_iter().flatten() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    pub fn to_resource(self) -> Resource {
        match self {
            ResourceRef::Wan(n) => Resource::Wan(n.clone()),
            ResourceRef::Network(n) => Resource::Network(n.clone()),
            ResourceRef::Container(c) => Resource::Container(c.clone()),
            ResourceRef::ClusterConfig(c) => Resource::ClusterConfig(c.clone()),
            ResourceRef::Cluster(c) => Resource::Cluster(c.clone()),
            ResourceRef::Release(r) => Resource::Release(r.clone()),
            ResourceRef::Ingress(i) => Resource::Ingress(i.clone()),
        }
    }
}

/// Root aggregate of every resource declared for one environment.
///
/// Collections keep insertion order, which is the declaration order used
/// to keep the apply order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub wan: Option<Network>,
    pub networks: Vec<Network>,
    pub containers: Vec<Container>,
    pub cluster_configs: Vec<ClusterConfig>,
    pub clusters: Vec<Cluster>,
    pub releases: Vec<Release>,
    pub ingresses: Vec<Ingress>,
}

impl Configuration {
    /// A configuration that already carries the implicit WAN singleton.
    pub fn with_default_wan() -> Self {
        Self {
            wan: Some(Network::new(WAN_NAME, WAN_SUBNET)),
            ..Self::default()
        }
    }

    /// Rebuild a configuration from owned resources, e.g. recorded snapshots.
    pub fn from_resources(
        resources: impl IntoIterator<Item = Resource>,
    ) -> Result<Self, ResolveError> {
        let mut config = Self::default();
        for resource in resources {
            config.insert(resource)?;
        }
        Ok(config)
    }

    /// Append a resource to the collection for its kind.
    ///
    /// A second WAN is rejected rather than replacing the first one.
    pub fn insert(&mut self, resource: Resource) -> Result<ResourceId, ResolveError> {
        fn push<T>(list: &mut Vec<T>, kind: ResourceKind, item: T) -> ResourceId {
            list.push(item);
            ResourceId::new(kind, list.len() - 1)
        }

        let id = match resource {
            Resource::Wan(n) => {
                if self.wan.is_some() {
                    return Err(ResolveError::WanExists);
                }
                self.wan = Some(n);
                ResourceId::wan()
            }
            Resource::Network(n) => push(&mut self.networks, ResourceKind::Network, n),
            Resource::Container(c) => push(&mut self.containers, ResourceKind::Container, c),
            Resource::ClusterConfig(c) => {
                push(&mut self.cluster_configs, ResourceKind::ClusterConfig, c)
            }
            Resource::Cluster(c) => push(&mut self.clusters, ResourceKind::Cluster, c),
            Resource::Release(r) => push(&mut self.releases, ResourceKind::Release, r),
            Resource::Ingress(i) => push(&mut self.ingresses, ResourceKind::Ingress, i),
        };
        Ok(id)
    }

    fn count(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Wan => usize::from(self.wan.is_some()),
            ResourceKind::Network => self.networks.len(),
            ResourceKind::Container => self.containers.len(),
            ResourceKind::ClusterConfig => self.cluster_configs.len(),
            ResourceKind::Cluster => self.clusters.len(),
            ResourceKind::Release => self.releases.len(),
            ResourceKind::Ingress => self.ingresses.len(),
        }
    }

    pub fn len(&self) -> usize {
        ResourceKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of every resource, in declaration order.
    pub fn ids(&self) -> Vec<ResourceId> {
        ResourceKind::ALL
            .iter()
            .flat_map(|kind| (0..self.count(*kind)).map(|i| ResourceId::new(*kind, i)))
            .collect()
    }

    pub fn get(&self, id: ResourceId) -> Option<ResourceRef<'_>> {
        match id.kind {
            ResourceKind::Wan if id.index == 0 => self.wan.as_ref().map(ResourceRef::Wan),
            ResourceKind::Wan => None,
            ResourceKind::Network => self.networks.get(id.index).map(ResourceRef::Network),
            ResourceKind::Container => self.containers.get(id.index).map(ResourceRef::Container),
            ResourceKind::ClusterConfig => self
                .cluster_configs
                .get(id.index)
                .map(ResourceRef::ClusterConfig),
            ResourceKind::Cluster => self.clusters.get(id.index).map(ResourceRef::Cluster),
            ResourceKind::Release => self.releases.get(id.index).map(ResourceRef::Release),
            ResourceKind::Ingress => self.ingresses.get(id.index).map(ResourceRef::Ingress),
        }
    }

    /// Exact-match lookup of a kind-qualified name.
    pub fn find(&self, address: &Address) -> Option<ResourceId> {
        let name = address.name.as_str();
        let index = match address.kind {
            ResourceKind::Wan => self
                .wan
                .as_ref()
                .filter(|w| w.name == name)
                .map(|_| 0),
            ResourceKind::Network => self.networks.iter().position(|n| n.name == name),
            ResourceKind::Container => self.containers.iter().position(|c| c.name == name),
            ResourceKind::ClusterConfig => {
                self.cluster_configs.iter().position(|c| c.name == name)
            }
            ResourceKind::Cluster => self.clusters.iter().position(|c| c.name == name),
            ResourceKind::Release => self.releases.iter().position(|r| r.name == name),
            ResourceKind::Ingress => self.ingresses.iter().position(|i| i.name == name),
        };
        index.map(|i| ResourceId::new(address.kind, i))
    }

    pub fn address_of(&self, id: ResourceId) -> Option<Address> {
        self.get(id).map(ResourceRef::address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Configuration {
        let mut config = Configuration::with_default_wan();
        config.networks.push(Network::new("net", "10.0.0.0/16"));
        config
            .containers
            .push(Container::new("app", "nginx").with_network("network.net"));
        config.ingresses.push(Ingress::new("web", "container.app"));
        config
    }

    #[test]
    fn ids_follow_declaration_order() {
        let config = sample();
        let addrs: Vec<String> = config
            .ids()
            .into_iter()
            .map(|id| config.address_of(id).unwrap().to_string())
            .collect();
        assert_eq!(
            addrs,
            vec!["wan.wan", "network.net", "container.app", "ingress.web"]
        );
        assert_eq!(config.len(), 4);
    }

    #[test]
    fn find_is_kind_qualified() {
        let mut config = sample();
        config.containers.push(Container::new("net", "busybox"));
        let net = config
            .find(&Address::new(ResourceKind::Network, "net"))
            .unwrap();
        let container = config
            .find(&Address::new(ResourceKind::Container, "net"))
            .unwrap();
        assert_eq!(net, ResourceId::new(ResourceKind::Network, 0));
        assert_eq!(container, ResourceId::new(ResourceKind::Container, 1));
        assert!(config
            .find(&Address::new(ResourceKind::Cluster, "net"))
            .is_none());
    }

    #[test]
    fn insert_rejects_second_wan() {
        let mut config = Configuration::with_default_wan();
        let err = config
            .insert(Resource::Wan(Network::new("other", "10.9.0.0/16")))
            .unwrap_err();
        assert_eq!(err, ResolveError::WanExists);
        assert_eq!(config.wan.as_ref().unwrap().name, WAN_NAME);
    }

    #[test]
    fn from_resources_places_each_kind() {
        let config = Configuration::from_resources(vec![
            Resource::Network(Network::new("net", "10.0.0.0/16")),
            Resource::Wan(Network::new(WAN_NAME, WAN_SUBNET)),
            Resource::Cluster(Cluster::new("k3s", "1.16.0", "network.net")),
        ])
        .unwrap();
        assert!(config.wan.is_some());
        assert_eq!(config.networks.len(), 1);
        assert_eq!(config.clusters.len(), 1);
    }

    #[test]
    fn resource_snapshot_roundtrip_drops_links() {
        let mut container = Container::new("app", "nginx").with_network("network.net");
        container.network_ref = Some(ResourceId::new(ResourceKind::Network, 0));
        let json = serde_json::to_string(&Resource::Container(container)).unwrap();
        assert!(json.contains("\"kind\":\"container\""));
        let back: Resource = serde_json::from_str(&json).unwrap();
        let Resource::Container(back) = back else {
            panic!("expected container");
        };
        assert_eq!(back.network, "network.net");
        assert_eq!(back.network_ref(), None);
    }

    #[test]
    fn links_are_deduplicated() {
        let mut ingress = Ingress::new("web", "container.app");
        let net = ResourceId::new(ResourceKind::Network, 0);
        ingress.target_ref = Some(net);
        ingress.network_ref = Some(net);
        assert_eq!(ResourceRef::Ingress(&ingress).links(), vec![net]);
    }

    #[test]
    fn get_out_of_range_is_none() {
        let config = sample();
        assert!(config
            .get(ResourceId::new(ResourceKind::Cluster, 0))
            .is_none());
        assert!(config.get(ResourceId::new(ResourceKind::Wan, 1)).is_none());
    }
}
