//! Reference resolution: turns declared reference strings into typed links.

use crate::model::{Configuration, ResourceRef, WAN_NAME};
use crate::types::{Address, AddressParseError, ResourceId, ResourceKind};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("a wide-area network is already defined; only one may exist")]
    WanExists,
    #[error("duplicate resource '{address}'")]
    DuplicateName { address: Address },
    #[error("'{resource}' has an invalid {field} reference '{reference}': {reason}")]
    InvalidReference {
        resource: Address,
        field: &'static str,
        reference: String,
        reason: AddressParseError,
    },
    #[error("'{resource}' {field} must reference a {expected}, got '{target}'")]
    UnexpectedKind {
        resource: Address,
        field: &'static str,
        target: Address,
        expected: &'static str,
    },
    #[error("'{resource}' {field} reference must not be empty")]
    MissingReference {
        resource: Address,
        field: &'static str,
    },
    #[error("'{resource}' references '{target}', which is not declared")]
    DanglingReference { resource: Address, target: Address },
}

/// Resolve every reference in `config`, populating its link fields.
///
/// Links from a previous call are discarded first, so resolving twice is
/// equivalent to resolving once. On error the links are left cleared.
pub fn resolve(config: &mut Configuration) -> Result<(), ResolveError> {
    clear_links(config);
    check_wan(config)?;
    check_unique(config)?;

    let links = compute_links(config)?;
    let count = links.count();
    links.apply(config);
    tracing::debug!("resolved {count} links across {} resources", config.len());
    Ok(())
}

/// Handle of the WAN-designated network, if one exists.
///
/// The singleton takes precedence; otherwise a regular network named `wan`
/// acts as the WAN.
pub fn wan_id(config: &Configuration) -> Option<ResourceId> {
    if config.wan.is_some() {
        return Some(ResourceId::wan());
    }
    config
        .networks
        .iter()
        .position(|n| n.name == WAN_NAME)
        .map(|i| ResourceId::new(ResourceKind::Network, i))
}

fn clear_links(config: &mut Configuration) {
    for c in &mut config.containers {
        c.network_ref = None;
    }
    for c in &mut config.clusters {
        c.network_ref = None;
        c.wan_ref = None;
    }
    for r in &mut config.releases {
        r.cluster_ref = None;
    }
    for i in &mut config.ingresses {
        i.target_ref = None;
        i.network_ref = None;
        i.wan_ref = None;
    }
    for b in &mut config.cluster_configs {
        b.cluster_ref = None;
    }
}

fn check_wan(config: &Configuration) -> Result<(), ResolveError> {
    let singleton_name = config.wan.as_ref().map(|w| w.name.as_str());
    let designated = config
        .networks
        .iter()
        .filter(|n| n.name == WAN_NAME || Some(n.name.as_str()) == singleton_name)
        .count()
        + usize::from(config.wan.is_some());
    if designated > 1 {
        return Err(ResolveError::WanExists);
    }
    Ok(())
}

fn check_unique(config: &Configuration) -> Result<(), ResolveError> {
    let mut seen: HashSet<Address> = HashSet::with_capacity(config.len());
    for id in config.ids() {
        if let Some(address) = config.address_of(id) {
            if !seen.insert(address.clone()) {
                return Err(ResolveError::DuplicateName { address });
            }
        }
    }
    Ok(())
}

/// Look up a parsed address. `network.<name>` also matches the WAN by name.
fn lookup(config: &Configuration, target: &Address) -> Option<ResourceId> {
    if let Some(id) = config.find(target) {
        return Some(id);
    }
    if target.kind == ResourceKind::Network {
        let wan = config.wan.as_ref()?;
        if wan.name == target.name {
            return Some(ResourceId::wan());
        }
    }
    None
}

struct Referrer<'c> {
    config: &'c Configuration,
    resource: Address,
}

impl Referrer<'_> {
    fn optional(
        &self,
        field: &'static str,
        value: &str,
        accepted: &[ResourceKind],
        expected: &'static str,
    ) -> Result<Option<ResourceId>, ResolveError> {
        if value.is_empty() {
            return Ok(None);
        }
        let target: Address = value
            .parse()
            .map_err(|reason| ResolveError::InvalidReference {
                resource: self.resource.clone(),
                field,
                reference: value.to_owned(),
                reason,
            })?;
        if !accepted.contains(&target.kind) {
            return Err(ResolveError::UnexpectedKind {
                resource: self.resource.clone(),
                field,
                target,
                expected,
            });
        }
        lookup(self.config, &target)
            .map(Some)
            .ok_or_else(|| ResolveError::DanglingReference {
                resource: self.resource.clone(),
                target,
            })
    }

    fn required(
        &self,
        field: &'static str,
        value: &str,
        accepted: &[ResourceKind],
        expected: &'static str,
    ) -> Result<ResourceId, ResolveError> {
        self.optional(field, value, accepted, expected)?
            .ok_or_else(|| ResolveError::MissingReference {
                resource: self.resource.clone(),
                field,
            })
    }

    fn network(&self, field: &'static str, value: &str) -> Result<Option<ResourceId>, ResolveError> {
        self.optional(field, value, &NETWORK_KINDS, "network")
    }
}

const NETWORK_KINDS: [ResourceKind; 2] = [ResourceKind::Network, ResourceKind::Wan];

#[derive(Default)]
struct Links {
    containers: Vec<Option<ResourceId>>,
    clusters: Vec<(Option<ResourceId>, Option<ResourceId>)>,
    releases: Vec<ResourceId>,
    ingresses: Vec<(ResourceId, Option<ResourceId>, Option<ResourceId>)>,
    cluster_configs: Vec<ResourceId>,
}

impl Links {
    fn count(&self) -> usize {
        let containers = self.containers.iter().flatten().count();
        let clusters: usize = self
            .clusters
            .iter()
            .map(|(n, w)| usize::from(n.is_some()) + usize::from(w.is_some()))
            .sum();
        let ingresses: usize = self
            .ingresses
            .iter()
            .map(|(_, n, w)| 1 + usize::from(n.is_some()) + usize::from(w.is_some()))
            .sum();
        containers + clusters + ingresses + self.releases.len() + self.cluster_configs.len()
    }

    fn apply(self, config: &mut Configuration) {
        for (c, link) in config.containers.iter_mut().zip(self.containers) {
            c.network_ref = link;
        }
        for (c, (network, wan)) in config.clusters.iter_mut().zip(self.clusters) {
            c.network_ref = network;
            c.wan_ref = wan;
        }
        for (r, cluster) in config.releases.iter_mut().zip(self.releases) {
            r.cluster_ref = Some(cluster);
        }
        for (i, (target, network, wan)) in config.ingresses.iter_mut().zip(self.ingresses) {
            i.target_ref = Some(target);
            i.network_ref = network;
            i.wan_ref = wan;
        }
        for (b, cluster) in config.cluster_configs.iter_mut().zip(self.cluster_configs) {
            b.cluster_ref = Some(cluster);
        }
    }
}

fn compute_links(config: &Configuration) -> Result<Links, ResolveError> {
    let wan = wan_id(config);
    let mut links = Links::default();

    for c in &config.containers {
        let r = Referrer {
            config,
            resource: ResourceRef::Container(c).address(),
        };
        links.containers.push(r.network("network", &c.network)?);
    }

    for c in &config.clusters {
        let r = Referrer {
            config,
            resource: ResourceRef::Cluster(c).address(),
        };
        links.clusters.push((r.network("network", &c.network)?, wan));
    }

    for rel in &config.releases {
        let r = Referrer {
            config,
            resource: ResourceRef::Release(rel).address(),
        };
        links
            .releases
            .push(r.required("cluster", &rel.cluster, &[ResourceKind::Cluster], "cluster")?);
    }

    for i in &config.ingresses {
        let r = Referrer {
            config,
            resource: ResourceRef::Ingress(i).address(),
        };
        let target = r.required(
            "target",
            &i.target,
            &[ResourceKind::Cluster, ResourceKind::Container],
            "cluster or container",
        )?;
        let network = if i.network.is_empty() {
            let inherited = match config.get(target) {
                Some(ResourceRef::Cluster(c)) => c.network.as_str(),
                Some(ResourceRef::Container(c)) => c.network.as_str(),
                _ => "",
            };
            r.network("network", inherited)?
        } else {
            r.network("network", &i.network)?
        };
        links.ingresses.push((target, network, wan));
    }

    for b in &config.cluster_configs {
        let r = Referrer {
            config,
            resource: ResourceRef::ClusterConfig(b).address(),
        };
        links
            .cluster_configs
            .push(r.required("cluster", &b.cluster, &[ResourceKind::Cluster], "cluster")?);
    }

    Ok(links)
}
