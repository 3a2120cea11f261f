use crate::client::{ObjectKind, PlatformClient, PlatformObject};
use crate::provider::{converge, teardown, Provider};
use crate::ProviderError;
use slipway_schema::{Address, Container, ResourceKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ContainerProvider {
    address: Address,
    container: Container,
    network: Option<String>,
    work_dir: PathBuf,
    client: Arc<dyn PlatformClient>,
}

impl ContainerProvider {
    pub fn new(
        container: Container,
        network: Option<String>,
        work_dir: PathBuf,
        client: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            address: Address::new(ResourceKind::Container, container.name.clone()),
            container,
            network,
            work_dir,
            client,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ProviderError {
        ProviderError::InvalidSetup {
            address: self.address.to_string(),
            reason: reason.into(),
        }
    }

    fn setup(&self) -> Result<PlatformObject, ProviderError> {
        if self.container.image.trim().is_empty() {
            return Err(self.invalid("image must not be empty"));
        }
        if self.container.ip_address.is_some() && self.network.is_none() {
            return Err(self.invalid("a static ip_address requires a network"));
        }

        let mut object = PlatformObject::new(ObjectKind::Container, &self.container.name)
            .with("image", &self.container.image)
            .with("command", serde_json::to_string(&self.container.command)?);
        for (i, volume) in self.container.volumes.iter().enumerate() {
            let source = absolute(&self.work_dir, &volume.source);
            object = object.with(
                &format!("volume.{i}"),
                format!("{}:{}", source.display(), volume.destination),
            );
        }
        for (key, value) in &self.container.environment {
            object = object.with(&format!("env.{key}"), value);
        }
        if let Some(ip) = &self.container.ip_address {
            object = object.with("ip_address", ip);
        }
        if let Some(network) = &self.network {
            object = object
                .with("network", network)
                .depends_on(ObjectKind::Network, network);
        }
        Ok(object)
    }
}

/// `path` made absolute against `base` when relative.
pub(crate) fn absolute(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

impl Provider for ContainerProvider {
    fn address(&self) -> &Address {
        &self.address
    }

    fn create(&self) -> Result<(), ProviderError> {
        let object = self.setup()?;
        converge(self.client.as_ref(), &object)
    }

    fn destroy(&self) -> Result<(), ProviderError> {
        teardown(self.client.as_ref(), ObjectKind::Container, &self.container.name)
    }

    fn lookup(&self) -> Result<Option<String>, ProviderError> {
        self.client.find(ObjectKind::Container, &self.container.name)
    }
}
