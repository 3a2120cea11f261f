use crate::concurrency::StateLock;
use crate::graph::DependencyGraph;
use crate::lifecycle::{observed_state, validate_transition};
use crate::CoreError;
use rayon::prelude::*;
use serde::Serialize;
use slipway_provider::ProviderFactory;
use slipway_schema::{resolve, Address, Configuration, ResourceId};
use slipway_store::{
    Journal, JournalOp, ResourceRecord, ResourceState, StateLayout, StateStore,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Central execution engine for Slipway.
///
/// Resolves a configuration, orders it, and drives every resource through its
/// provider while keeping the persisted state in step with the platform.
pub struct Engine {
    layout: StateLayout,
    store: StateStore,
    journal: Journal,
    factory: Box<dyn ProviderFactory>,
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Worker threads; 1 walks the apply order sequentially.
    pub jobs: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// One resource in a [`Plan`], in apply order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanStep {
    pub address: Address,
    pub sequence: usize,
    pub level: usize,
    pub dependencies: Vec<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded: Option<ResourceState>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply_order(&self) -> Vec<Address> {
        self.steps.iter().map(|s| s.address.clone()).collect()
    }

    pub fn destroy_order(&self) -> Vec<Address> {
        self.steps.iter().rev().map(|s| s.address.clone()).collect()
    }

    /// Steps with no record yet.
    pub fn pending(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.recorded.is_none())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Every resource created or converged, in apply order.
    pub applied: Vec<Address>,
    /// The subset of `applied` that already had a record before this run.
    pub previously_recorded: Vec<Address>,
}

impl ApplyReport {
    fn push(&mut self, address: Address, was_recorded: bool) {
        if was_recorded {
            self.previously_recorded.push(address.clone());
        }
        self.applied.push(address);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DestroyReport {
    /// Destroyed resources, in destroy order.
    pub destroyed: Vec<Address>,
    pub failed: Vec<(Address, String)>,
    /// Resources left in place because something depending on them failed
    /// or is still recorded without being declared.
    pub skipped: Vec<Address>,
}

impl DestroyReport {
    fn finish(self) -> Result<Self, CoreError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(CoreError::DestroyIncomplete {
                failures: self.failed,
                skipped: self.skipped,
            })
        }
    }
}

impl Engine {
    /// Create an engine keeping its state below `state_root`.
    ///
    /// Journal entries left behind by an interrupted run are turned into
    /// records first, unless another process holds the state lock.
    pub fn new(state_root: impl Into<PathBuf>, factory: Box<dyn ProviderFactory>) -> Self {
        let layout = StateLayout::new(state_root);
        let store = StateStore::new(layout.clone());
        let journal = Journal::new(&layout);

        if layout.is_initialized() {
            match StateLock::try_acquire(&layout) {
                Ok(Some(_lock)) => {
                    if let Err(e) = journal.recover(&store) {
                        warn!("journal recovery failed: {e}");
                    }
                }
                Ok(None) => {
                    debug!("state lock held; skipping journal recovery");
                }
                Err(e) => {
                    warn!("state lock check failed; skipping journal recovery: {e}");
                }
            }
        }

        Self {
            layout,
            store,
            journal,
            factory,
        }
    }

    pub fn state_layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn backend(&self) -> &str {
        self.factory.name()
    }

    fn initialize(&self) -> Result<(), CoreError> {
        if self.layout.is_initialized() {
            self.layout.verify_version()?;
        } else {
            self.layout.initialize()?;
        }
        self.journal.initialize()?;
        Ok(())
    }

    /// Resolve and order `config` without touching the platform.
    pub fn plan(&self, config: &mut Configuration) -> Result<Plan, CoreError> {
        resolve(config)?;
        let graph = DependencyGraph::build(config)?;

        let mut steps = Vec::with_capacity(graph.len());
        for (sequence, id) in graph.apply_order().into_iter().enumerate() {
            let Some(address) = graph.address(id).cloned() else {
                continue;
            };
            let dependencies = graph
                .dependencies(id)
                .into_iter()
                .filter_map(|d| graph.address(d).cloned())
                .collect();
            let recorded = self.read_prior(&address).map(|r| r.state);
            steps.push(PlanStep {
                level: graph.level(id).unwrap_or(0),
                address,
                sequence,
                dependencies,
                recorded,
            });
        }
        Ok(Plan { steps })
    }

    pub fn apply(&self, config: &mut Configuration) -> Result<ApplyReport, CoreError> {
        self.apply_with_options(config, ApplyOptions::default())
    }

    /// Create or converge every resource of `config` in dependency order.
    ///
    /// Stops at the first failing resource. Everything applied before it stays
    /// recorded; the failing resource is recorded as `create_failed`.
    pub fn apply_with_options(
        &self,
        config: &mut Configuration,
        options: ApplyOptions,
    ) -> Result<ApplyReport, CoreError> {
        resolve(config)?;
        let graph = DependencyGraph::build(config)?;
        self.initialize()?;
        info!(
            "applying {} resources with the {} backend",
            graph.len(),
            self.factory.name()
        );

        let config: &Configuration = config;
        let mut report = ApplyReport::default();
        if options.jobs <= 1 {
            for (sequence, id) in graph.apply_order().into_iter().enumerate() {
                let (address, was_recorded) = self.apply_one(config, id, sequence)?;
                report.push(address, was_recorded);
            }
        } else {
            self.apply_levels(config, &graph, options.jobs, &mut report)?;
        }

        info!("applied {} resources", report.applied.len());
        Ok(report)
    }

    /// Level-by-level apply on a worker pool. A level runs to completion even
    /// if one of its resources fails; the next level never starts.
    fn apply_levels(
        &self,
        config: &Configuration,
        graph: &DependencyGraph,
        jobs: usize,
        report: &mut ApplyReport,
    ) -> Result<(), CoreError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| CoreError::ThreadPool(e.to_string()))?;

        // Levels finish out of declaration order; the report is sorted by
        // apply sequence once every level has run.
        let mut finished: Vec<(usize, Address, bool)> = Vec::new();
        for (depth, level) in graph.levels().into_iter().enumerate() {
            let mut batch: Vec<(ResourceId, usize)> = level
                .into_iter()
                .filter_map(|id| graph.position(id).map(|p| (id, p)))
                .collect();
            batch.sort_by_key(|&(_, sequence)| sequence);
            debug!("level {depth}: {} resources", batch.len());

            let results: Vec<(usize, Result<(Address, bool), CoreError>)> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|&(id, sequence)| (sequence, self.apply_one(config, id, sequence)))
                    .collect()
            });

            let mut first_error = None;
            for (sequence, result) in results {
                match result {
                    Ok((address, was_recorded)) => finished.push((sequence, address, was_recorded)),
                    Err(e) => {
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        finished.sort_by_key(|(sequence, _, _)| *sequence);
        for (_, address, was_recorded) in finished {
            report.push(address, was_recorded);
        }
        Ok(())
    }

    /// Create one resource and record the outcome. Returns its address and
    /// whether it had a record before.
    fn apply_one(
        &self,
        config: &Configuration,
        id: ResourceId,
        sequence: usize,
    ) -> Result<(Address, bool), CoreError> {
        let resource = config
            .get(id)
            .ok_or_else(|| CoreError::NotFound(format!("{}#{}", id.kind, id.index)))?;
        let address = resource.address();
        let prior = self.read_prior(&address);
        let from = observed_state(prior.as_ref());
        validate_transition(&address, from, ResourceState::Created)?;

        // A provider that cannot be built fails like its create would, but
        // before anything reached the platform.
        let provider = self
            .factory
            .provider(config, id)
            .map_err(|e| CoreError::provider(&address, e))?;

        let snapshot = resource.to_resource();
        let op_id = self.journal.begin(JournalOp::Create, &snapshot, sequence)?;
        let was_recorded = prior.is_some();
        let mut record = match prior {
            Some(mut record) => {
                record.resource = snapshot;
                record.sequence = sequence;
                record
            }
            None => ResourceRecord::new(snapshot, ResourceState::Created, sequence),
        };

        match provider.create() {
            Ok(()) => {
                record.state = ResourceState::Created;
                record.last_error = None;
                match provider.lookup() {
                    Ok(provider_id) => record.provider_id = provider_id,
                    Err(e) => warn!("{address}: lookup after create failed: {e}"),
                }
                record.touch();
                self.store.put(&record)?;
                self.journal.commit(&op_id)?;
                info!("{address}: created");
                Ok((address, was_recorded))
            }
            Err(e) => {
                validate_transition(&address, from, ResourceState::CreateFailed)?;
                record.state = ResourceState::CreateFailed;
                record.last_error = Some(e.to_string());
                record.touch();
                // The journal entry stays when the record cannot be written,
                // so recovery still marks the resource as failed.
                match self.store.put(&record) {
                    Ok(()) => self.journal.commit(&op_id)?,
                    Err(store_err) => warn!("{address}: failed to record create failure: {store_err}"),
                }
                warn!("{address}: create failed: {e}");
                Err(CoreError::provider(&address, e))
            }
        }
    }

    /// Prior record for `address`; unreadable state counts as no record.
    fn read_prior(&self, address: &Address) -> Option<ResourceRecord> {
        match self.store.find(&address.to_string()) {
            Ok(record) => record,
            Err(e) => {
                warn!("{address}: cannot read recorded state, treating as new: {e}");
                None
            }
        }
    }

    /// Every record, failing on the first unreadable one.
    fn read_records(&self) -> Result<Vec<ResourceRecord>, CoreError> {
        let mut records = Vec::new();
        for entry in self.store.list_with_errors()? {
            match entry {
                Ok(record) => records.push(record),
                Err((_, e)) => return Err(e.into()),
            }
        }
        Ok(records)
    }

    /// Destroy every recorded resource of `config` in reverse dependency
    /// order.
    ///
    /// A failure does not stop independent resources, but everything the
    /// failed resource depends on is skipped. Any failure makes the call
    /// return [`CoreError::DestroyIncomplete`].
    ///
    /// Records that `config` does not declare stay, and so does everything
    /// declared that they depend on.
    pub fn destroy(&self, config: &mut Configuration) -> Result<DestroyReport, CoreError> {
        resolve(config)?;
        let graph = DependencyGraph::build(config)?;
        let mut recorded: HashMap<String, ResourceRecord> = self
            .read_records()?
            .into_iter()
            .map(|r| (r.address.to_string(), r))
            .collect();

        let mut undeclared: Vec<&ResourceRecord> = recorded
            .values()
            .filter(|r| config.find(&r.address).is_none())
            .collect();
        undeclared.sort_by_key(|r| r.sequence);
        for record in &undeclared {
            warn!("{} is recorded but not declared; it is left in place", record.address);
        }
        let retained = retained_by_undeclared(config, &undeclared);

        info!("destroying {} recorded resources", recorded.len() - undeclared.len());
        self.destroy_graph(config, &graph, &mut recorded, &retained)?
            .finish()
    }

    /// Destroy everything recorded, using the recorded snapshots as the
    /// configuration.
    pub fn destroy_recorded(&self) -> Result<DestroyReport, CoreError> {
        let records = self.read_records()?;
        if records.is_empty() {
            info!("nothing recorded; nothing to destroy");
            return Ok(DestroyReport::default());
        }

        let mut config = Configuration::from_resources(records.iter().map(|r| r.resource.clone()))?;
        resolve(&mut config)?;
        let graph = DependencyGraph::build(&config)?;
        let mut recorded: HashMap<String, ResourceRecord> = records
            .into_iter()
            .map(|r| (r.address.to_string(), r))
            .collect();

        info!("destroying {} recorded resources", recorded.len());
        self.destroy_graph(&config, &graph, &mut recorded, &HashSet::new())?
            .finish()
    }

    /// Walks the destroy order, consuming the records it visits. Resources in
    /// `retained` are reported as skipped without reaching their provider.
    fn destroy_graph(
        &self,
        config: &Configuration,
        graph: &DependencyGraph,
        recorded: &mut HashMap<String, ResourceRecord>,
        retained: &HashSet<ResourceId>,
    ) -> Result<DestroyReport, CoreError> {
        let mut report = DestroyReport::default();
        let mut blocked: HashSet<ResourceId> = HashSet::new();

        for id in graph.destroy_order() {
            let Some(address) = graph.address(id).cloned() else {
                continue;
            };
            let Some(record) = recorded.remove(&address.to_string()) else {
                debug!("{address}: no record, nothing to destroy");
                continue;
            };
            if retained.contains(&id) {
                warn!("{address}: skipped, an undeclared recorded resource still uses it");
                report.skipped.push(address);
                continue;
            }
            if blocked.contains(&id) {
                warn!("{address}: skipped, a resource using it failed to destroy");
                report.skipped.push(address);
                continue;
            }

            match self.destroy_one(config, id, &record) {
                Ok(()) => report.destroyed.push(address),
                Err(CoreError::Provider { source, .. }) => {
                    blocked.extend(graph.transitive_dependencies(id));
                    report.failed.push((address, source.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    fn destroy_one(
        &self,
        config: &Configuration,
        id: ResourceId,
        record: &ResourceRecord,
    ) -> Result<(), CoreError> {
        let address = &record.address;
        validate_transition(address, record.state, ResourceState::Destroyed)?;
        let provider = self
            .factory
            .provider(config, id)
            .map_err(|e| CoreError::provider(address, e))?;

        self.journal.initialize()?;
        let op_id = self
            .journal
            .begin(JournalOp::Destroy, &record.resource, record.sequence)?;

        match provider.destroy() {
            Ok(()) => {
                self.store.remove(&address.to_string())?;
                self.journal.commit(&op_id)?;
                info!("{address}: destroyed");
                Ok(())
            }
            Err(e) => {
                validate_transition(address, record.state, ResourceState::DestroyFailed)?;
                let mut failed = record.clone();
                failed.last_error = Some(e.to_string());
                failed.touch();
                match self.store.put(&failed) {
                    Ok(()) => self.journal.commit(&op_id)?,
                    Err(store_err) => warn!("{address}: failed to record destroy failure: {store_err}"),
                }
                warn!("{address}: destroy failed: {e}");
                Err(CoreError::provider(address, e))
            }
        }
    }

    /// Every readable record, in apply sequence.
    pub fn list(&self) -> Result<Vec<ResourceRecord>, CoreError> {
        Ok(self.store.list()?)
    }

    pub fn inspect(&self, address: &str) -> Result<ResourceRecord, CoreError> {
        self.store
            .find(address)?
            .ok_or_else(|| CoreError::NotFound(address.to_owned()))
    }
}

/// Declared resources that a recorded but undeclared resource depends on.
///
/// The undeclared snapshots are resolved against the declared configuration
/// so their links, including inherited ones, point at declared resources.
fn retained_by_undeclared(
    config: &Configuration,
    undeclared: &[&ResourceRecord],
) -> HashSet<ResourceId> {
    let mut retained = HashSet::new();
    if undeclared.is_empty() {
        return retained;
    }

    let mut combined = config.clone();
    let mut extra = Vec::new();
    for record in undeclared {
        match combined.insert(record.resource.clone()) {
            Ok(id) => extra.push(id),
            Err(e) => warn!("{}: cannot place recorded snapshot: {e}", record.address),
        }
    }
    if let Err(e) = resolve(&mut combined) {
        warn!("undeclared records do not resolve against the configuration: {e}");
        return retained;
    }
    let graph = match DependencyGraph::build(&combined) {
        Ok(graph) => graph,
        Err(e) => {
            warn!("undeclared records cannot be ordered with the configuration: {e}");
            return retained;
        }
    };

    for id in extra {
        for dependency in graph.transitive_dependencies(id) {
            if let Some(declared) = graph.address(dependency).and_then(|a| config.find(a)) {
                retained.insert(declared);
            }
        }
    }
    retained
}
