//! Resource kinds, kind-qualified addresses, and resolved handles.
//!
//! Addresses serialize as plain `"<kind>.<name>"` strings so they stay readable
//! in configuration files and in the persisted state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every kind of resource a configuration can declare.
///
/// The variant order is the declaration order used to break ties when two
/// resources are ready to be applied at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Wan,
    Network,
    Container,
    #[serde(rename = "k8s_config")]
    ClusterConfig,
    Cluster,
    #[serde(rename = "helm")]
    Release,
    Ingress,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Wan,
        ResourceKind::Network,
        ResourceKind::Container,
        ResourceKind::ClusterConfig,
        ResourceKind::Cluster,
        ResourceKind::Release,
        ResourceKind::Ingress,
    ];

    /// The prefix used in kind-qualified references.
    pub fn prefix(self) -> &'static str {
        match self {
            ResourceKind::Wan => "wan",
            ResourceKind::Network => "network",
            ResourceKind::Container => "container",
            ResourceKind::ClusterConfig => "k8s_config",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Release => "helm",
            ResourceKind::Ingress => "ingress",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A kind-qualified resource name such as `network.k8s`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    pub kind: ResourceKind,
    pub name: String,
}

impl Address {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Why a string could not be read as an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    MissingSeparator,
    UnknownKind(String),
    EmptyName,
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressParseError::MissingSeparator => {
                f.write_str("expected '<kind>.<name>'")
            }
            AddressParseError::UnknownKind(kind) => write!(f, "unknown resource kind '{kind}'"),
            AddressParseError::EmptyName => f.write_str("resource name must not be empty"),
        }
    }
}

impl std::error::Error for AddressParseError {}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, name) = s
            .split_once('.')
            .ok_or(AddressParseError::MissingSeparator)?;
        let kind = ResourceKind::from_prefix(prefix)
            .ok_or_else(|| AddressParseError::UnknownKind(prefix.to_owned()))?;
        if name.is_empty() {
            return Err(AddressParseError::EmptyName);
        }
        Ok(Self::new(kind, name))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

/// Typed handle to a resource inside a [`Configuration`](crate::Configuration).
///
/// `index` points into the collection for `kind`; the WAN singleton always
/// uses index 0. Handles are only meaningful for the configuration that
/// produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub index: usize,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, index: usize) -> Self {
        Self { kind, index }
    }

    pub fn wan() -> Self {
        Self::new(ResourceKind::Wan, 0)
    }
}
