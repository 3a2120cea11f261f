//! Core orchestration engine for Slipway.
//!
//! This crate ties together configuration resolution, dependency ordering,
//! persisted state, and providers into the `Engine`, the central API for
//! planning, applying, and destroying a set of declared resources. It also
//! provides the state-root lock and lifecycle transition validation.

pub mod concurrency;
pub mod engine;
pub mod graph;
pub mod lifecycle;

pub use concurrency::StateLock;
pub use engine::{ApplyOptions, ApplyReport, DestroyReport, Engine, Plan, PlanStep};
pub use graph::{order, DependencyGraph};
pub use lifecycle::validate_transition;

use slipway_schema::Address;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] slipway_schema::ConfigError),
    #[error("reference error: {0}")]
    Resolve(#[from] slipway_schema::ResolveError),
    #[error("dependency cycle involving '{address}'")]
    Cycle { address: Address },
    #[error("state error: {0}")]
    Store(#[from] slipway_store::StoreError),
    #[error("provider error on '{address}': {source}")]
    Provider {
        address: Address,
        #[source]
        source: slipway_provider::ProviderError,
    },
    #[error("destroy incomplete: {}", describe_failures(.failures, .skipped))]
    DestroyIncomplete {
        failures: Vec<(Address, String)>,
        skipped: Vec<Address>,
    },
    #[error("invalid state transition for '{address}': {from} -> {to}")]
    InvalidTransition {
        address: String,
        from: String,
        to: String,
    },
    #[error("no record for '{0}'")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker pool error: {0}")]
    ThreadPool(String),
}

impl CoreError {
    pub(crate) fn provider(address: &Address, source: slipway_provider::ProviderError) -> Self {
        CoreError::Provider {
            address: address.clone(),
            source,
        }
    }
}

fn describe_failures(failures: &[(Address, String)], skipped: &[Address]) -> String {
    let mut parts: Vec<String> = failures
        .iter()
        .map(|(address, error)| format!("{address}: {error}"))
        .collect();
    if !skipped.is_empty() {
        let names: Vec<String> = skipped.iter().map(ToString::to_string).collect();
        parts.push(format!("skipped {}", names.join(", ")));
    }
    parts.join("; ")
}
