use crate::client::{ObjectKind, PlatformClient, PlatformObject};
use crate::ProviderError;
use slipway_schema::{Address, Configuration, ResourceId};
use tracing::{debug, info};

/// Lifecycle capability every resource kind is driven through.
pub trait Provider: Send + Sync {
    /// Kind-qualified address of the resource this provider manages.
    fn address(&self) -> &Address;

    /// Bring the resource into existence or converge it to its declaration.
    fn create(&self) -> Result<(), ProviderError>;

    /// Remove the resource. An already absent resource is a success.
    fn destroy(&self) -> Result<(), ProviderError>;

    /// Platform identifier of the resource, `None` if it does not exist.
    fn lookup(&self) -> Result<Option<String>, ProviderError>;
}

/// Maps a resolved resource to the provider responsible for it.
pub trait ProviderFactory: Send + Sync {
    fn name(&self) -> &str;

    fn provider(
        &self,
        config: &Configuration,
        id: ResourceId,
    ) -> Result<Box<dyn Provider>, ProviderError>;
}

pub(crate) fn converge(
    client: &dyn PlatformClient,
    object: &PlatformObject,
) -> Result<(), ProviderError> {
    let outcome = client.ensure(object)?;
    info!("{} {}: {outcome}", object.kind, object.name);
    Ok(())
}

pub(crate) fn teardown(
    client: &dyn PlatformClient,
    kind: ObjectKind,
    name: &str,
) -> Result<(), ProviderError> {
    if client.remove(kind, name)? {
        info!("{kind} {name}: removed");
    } else {
        debug!("{kind} {name}: already absent");
    }
    Ok(())
}

/// Name of the resource behind a resolved link.
pub(crate) fn linked_name(
    config: &Configuration,
    address: &Address,
    link: Option<ResourceId>,
    field: &'static str,
) -> Result<String, ProviderError> {
    let id = link.ok_or_else(|| ProviderError::MissingLink {
        address: address.to_string(),
        link: field,
    })?;
    config
        .get(id)
        .map(|r| r.name().to_owned())
        .ok_or_else(|| ProviderError::UnknownResource(format!("{:?}#{}", id.kind, id.index)))
}

/// Like [`linked_name`] for links that may legitimately be absent.
pub(crate) fn optional_linked_name(
    config: &Configuration,
    address: &Address,
    link: Option<ResourceId>,
    field: &'static str,
) -> Result<Option<String>, ProviderError> {
    link.map(|id| linked_name(config, address, Some(id), field))
        .transpose()
}
