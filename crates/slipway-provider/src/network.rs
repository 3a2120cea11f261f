use crate::client::{ObjectKind, PlatformClient, PlatformObject};
use crate::provider::{converge, teardown, Provider};
use crate::ProviderError;
use slipway_schema::{Address, Network, ResourceKind};
use std::net::IpAddr;
use std::sync::Arc;

/// Provider for networks, including the wide-area network.
pub struct NetworkProvider {
    address: Address,
    network: Network,
    wan: bool,
    client: Arc<dyn PlatformClient>,
}

impl NetworkProvider {
    pub fn new(network: Network, kind: ResourceKind, wan: bool, client: Arc<dyn PlatformClient>) -> Self {
        Self {
            address: Address::new(kind, network.name.clone()),
            network,
            wan,
            client,
        }
    }

    fn setup(&self) -> Result<PlatformObject, ProviderError> {
        validate_subnet(&self.network.subnet).map_err(|reason| ProviderError::InvalidSetup {
            address: self.address.to_string(),
            reason,
        })?;
        Ok(PlatformObject::new(ObjectKind::Network, &self.network.name)
            .with("subnet", &self.network.subnet)
            .with("wan", self.wan.to_string()))
    }
}

fn validate_subnet(subnet: &str) -> Result<(), String> {
    let (ip, prefix) = subnet
        .split_once('/')
        .ok_or_else(|| format!("subnet '{subnet}' is not in CIDR notation"))?;
    let ip: IpAddr = ip
        .parse()
        .map_err(|_| format!("subnet '{subnet}' has an invalid address"))?;
    let max = if ip.is_ipv4() { 32 } else { 128 };
    match prefix.parse::<u8>() {
        Ok(p) if p <= max => Ok(()),
        _ => Err(format!("subnet '{subnet}' has an invalid prefix length")),
    }
}

impl Provider for NetworkProvider {
    fn address(&self) -> &Address {
        &self.address
    }

    fn create(&self) -> Result<(), ProviderError> {
        let object = self.setup()?;
        converge(self.client.as_ref(), &object)
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        teardown(self.client.as_ref(), ObjectKind::Network, &self.network.name)
    }

    fn lookup(&self) -> Result<Option<String>, ProviderError> {
        self.client.find(ObjectKind::Network, &self.network.name)
    }
}
