//! Resource model, reference resolution, and configuration parsing for Slipway.
//!
//! This crate defines the schema layer: the typed resources of an environment
//! (`Configuration`), kind-qualified addresses (`Address`) and resolved handles
//! (`ResourceId`), the reference resolver (`resolve`), the TOML configuration
//! parser, and blueprint URI helpers.

pub mod blueprint;
pub mod model;
pub mod parse;
pub mod resolve;
pub mod types;

pub use blueprint::{blueprint_folder, is_local_folder};
pub use model::{
    Cluster, ClusterConfig, Configuration, Container, HealthCheck, Ingress, Network, PortMapping,
    Release, Resource, ResourceRef, Volume, WAN_NAME, WAN_SUBNET,
};
pub use parse::{
    parse_config_file, parse_config_str, parse_folder, parse_path, ConfigError, ConfigFile,
};
pub use resolve::{resolve, wan_id, ResolveError};
pub use types::{Address, AddressParseError, ResourceId, ResourceKind};
