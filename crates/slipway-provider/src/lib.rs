//! Provider capability contract and platform clients for Slipway.
//!
//! This crate implements the lifecycle layer: the `Provider` trait every
//! resource kind is driven through (`create`, `destroy`, `lookup`), the
//! `ProviderFactory` that maps a resolved resource to its provider, the
//! `PlatformClient` handle shared by all providers, one concrete provider per
//! resource kind, and the in-memory `MockPlatform`.

pub mod client;
pub mod cluster;
pub mod container;
pub mod factory;
pub mod ingress;
pub mod k8s_config;
pub mod mock;
pub mod network;
pub mod provider;
pub mod release;

pub use client::{Convergence, ObjectKind, ObjectRef, PlatformClient, PlatformObject};
pub use factory::{select_platform, PlatformFactory, ProviderSettings};
pub use mock::{MockOp, MockPlatform, SideEffect};
pub use provider::{Provider, ProviderFactory};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available")]
    BackendUnavailable(String),
    #[error("'{address}' has no resolved {link} link; resolve the configuration first")]
    MissingLink { address: String, link: &'static str },
    #[error("no resource for handle {0}")]
    UnknownResource(String),
    #[error("invalid setup for '{address}': {reason}")]
    InvalidSetup { address: String, reason: String },
    #[error("platform operation failed: {0}")]
    Platform(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_link_names_resource() {
        let e = ProviderError::MissingLink {
            address: "helm.vault".to_owned(),
            link: "cluster",
        };
        let msg = e.to_string();
        assert!(msg.contains("helm.vault"));
        assert!(msg.contains("cluster"));
    }

    #[test]
    fn backend_unavailable_names_backend() {
        let e = ProviderError::BackendUnavailable("docker".to_owned());
        assert!(e.to_string().contains("docker"));
    }
}
