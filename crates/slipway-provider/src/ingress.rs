use crate::client::{ObjectKind, ObjectRef, PlatformClient, PlatformObject};
use crate::provider::{converge, teardown, Provider};
use crate::ProviderError;
use slipway_schema::{Address, Ingress, ResourceKind};
use std::sync::Arc;

/// Provider for ingress proxies exposing a cluster or container on the host.
pub struct IngressProvider {
    address: Address,
    ingress: Ingress,
    target: ObjectRef,
    network: Option<String>,
    wan: Option<String>,
    client: Arc<dyn PlatformClient>,
}

impl IngressProvider {
    pub fn new(
        ingress: Ingress,
        target: ObjectRef,
        network: Option<String>,
        wan: Option<String>,
        client: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            address: Address::new(ResourceKind::Ingress, ingress.name.clone()),
            ingress,
            target,
            network,
            wan,
            client,
        }
    }

    fn setup(&self) -> Result<PlatformObject, ProviderError> {
        if let Some(port) = self
            .ingress
            .ports
            .iter()
            .find(|p| p.local == 0 || p.remote == 0 || p.host == 0)
        {
            return Err(ProviderError::InvalidSetup {
                address: self.address.to_string(),
                reason: format!(
                    "port mapping {}:{}:{} contains port 0",
                    port.local, port.remote, port.host
                ),
            });
        }

        let mut object = PlatformObject::new(ObjectKind::Proxy, &self.ingress.name)
            .with("target", self.target.to_string())
            .depends_on(self.target.kind, &self.target.name);
        for (i, port) in self.ingress.ports.iter().enumerate() {
            object = object.with(
                &format!("port.{i}"),
                format!("{}:{}:{}", port.local, port.remote, port.host),
            );
        }
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

impl Provider for IngressProvider {
    fn address(&self) -> &Address {
        &self.address
    }

    fn create(&self) -> Result<(), ProviderError> {
        let object = self.setup()?;
        converge(self.client.as_ref(), &object)
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        teardown(self.client.as_ref(), ObjectKind::Proxy, &self.ingress.name)
    }

    fn lookup(&self) -> Result<Option<String>, ProviderError> {
        self.client.find(ObjectKind::Proxy, &self.ingress.name)
    }
}
