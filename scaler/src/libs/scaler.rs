//! Scales in every cluster in a fleet once per invocation

use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{Level, Span, event, instrument};

use super::backends::{self, Backends, Dispatcher};
use super::models::{
    Action, ActionOutcome, ActionResult, ClusterReport, ClusterSnapshot, CycleReport, Decision,
    HostState, MetricWindow,
};
use super::policy::ScalePolicy;
use crate::Error;
use crate::args::Args;
use crate::conf::Conf;

/// Whether a cycle should act on the fleet or only log what it would do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Drain and terminate hosts
    Normal,
    /// Only log the drains and terminations we would perform
    Dry,
}

impl Mode {
    /// Get the mode for a dry run flag
    ///
    /// # Arguments
    ///
    /// * `dry_run` - Whether this is a dry run
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Mode::Dry } else { Mode::Normal }
    }
}

/// Scales in the clusters in a fleet
pub struct Scaler {
    /// The ecscale config
    pub conf: Conf,
    /// The mode to run cycles in
    pub mode: Mode,
    /// The backends to read from and act on
    backends: Backends,
}

impl Scaler {
    /// Creates a new Scaler
    ///
    /// # Arguments
    ///
    /// * `args` - The command line args passed to the scaler
    /// * `conf` - The config to use
    pub async fn new(args: &Args, conf: Conf) -> Result<Self, Error> {
        // build the backends for our fleet
        let backends = backends::new(&conf).await?;
        Ok(Self::build(conf, Mode::from_dry_run(args.dry_run), backends))
    }

    /// Creates a new Scaler from existing backends
    ///
    /// # Arguments
    ///
    /// * `conf` - The config to use
    /// * `mode` - The mode to run cycles in
    /// * `backends` - The backends to read from and act on
    pub fn build(conf: Conf, mode: Mode, backends: Backends) -> Self {
        Scaler {
            conf,
            mode,
            backends,
        }
    }

    /// Make sure every explicitly mapped capacity group exists
    ///
    /// Returns the clusters whose mapped group could not be found.
    #[instrument(name = "Scaler::validate_groups", skip_all)]
    pub async fn validate_groups(&self) -> Vec<String> {
        let mut unresolved = Vec::default();
        for (cluster, group) in &self.conf.scaler.groups {
            match self.backends.inventory.capacity_group(group).await {
                Ok(Some(_)) => (),
                Ok(None) => {
                    event!(Level::WARN, cluster, group, "Mapped capacity group does not exist");
                    unresolved.push(cluster.clone());
                }
                Err(error) => {
                    event!(
                        Level::WARN,
                        cluster,
                        group,
                        error = error.to_string(),
                        "Failed to resolve mapped capacity group"
                    );
                    unresolved.push(cluster.clone());
                }
            }
        }
        unresolved
    }

    /// Run a single pass over every cluster in the fleet with our configured mode
    pub async fn start(&self) -> CycleReport {
        self.run_cycle(self.mode).await
    }

    /// Run a single pass over every cluster in the fleet
    ///
    /// No error stops the pass. Every failure is logged and recorded in the report.
    ///
    /// # Arguments
    ///
    /// * `mode` - Whether to act on the fleet or only log
    #[instrument(name = "Scaler::run_cycle", skip(self), fields(cycle))]
    pub async fn run_cycle(&self, mode: Mode) -> CycleReport {
        let mut report = CycleReport::new(mode == Mode::Dry);
        Span::current().record("cycle", report.id.to_string());
        // get the dispatcher to use for this cycle
        let dispatcher = self.backends.dispatcher(report.dry_run);
        // get the clusters in our fleet
        let clusters = match self.backends.inventory.list_clusters().await {
            Ok(clusters) => clusters,
            Err(error) => {
                event!(Level::ERROR, error = error.to_string(), "Failed to list clusters");
                report.error = Some(error.to_string());
                return report;
            }
        };
        // crawl over our clusters one at a time
        for cluster in clusters {
            // skip any clusters we were told to ignore
            if self.conf.scaler.is_excluded(&cluster) {
                event!(Level::INFO, cluster, "Cluster is excluded");
                report.excluded.push(cluster);
                continue;
            }
            let cluster_report = self.process_cluster(&cluster, &dispatcher).await;
            report.clusters.push(cluster_report);
        }
        // log our summary
        match serde_json::to_string(&report) {
            Ok(summary) => event!(Level::INFO, summary, "Cycle complete"),
            Err(error) => event!(Level::WARN, error = error.to_string(), "Failed to serialize cycle report"),
        }
        report
    }

    /// Gather everything we need to know about a cluster
    ///
    /// Returns `None` if this cluster has no active hosts.
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to snapshot
    #[instrument(name = "Scaler::snapshot", skip(self), err(Debug))]
    async fn snapshot(&self, cluster: &str) -> Result<Option<ClusterSnapshot>, Error> {
        let inventory = &self.backends.inventory;
        // get our active hosts
        let active = inventory.hosts(cluster, HostState::Active).await?;
        if active.is_empty() {
            return Ok(None);
        }
        // get our draining hosts
        let draining = inventory.hosts(cluster, HostState::Draining).await?;
        // get our memory reservation which may be missing
        let window = MetricWindow::from(&self.conf.scaler);
        let memory_reservation = match self
            .backends
            .metrics
            .cluster_memory_reservation(cluster, window)
            .await
        {
            Ok(reservation) => reservation,
            Err(error) => {
                event!(
                    Level::WARN,
                    cluster,
                    error = error.to_string(),
                    "Failed to get memory reservation"
                );
                None
            }
        };
        // find our capacity group which may also be missing
        let name = self.conf.scaler.group_name(cluster);
        let group = match inventory.capacity_group(&name).await {
            Ok(group) => group,
            Err(error) => {
                event!(
                    Level::WARN,
                    cluster,
                    group = name,
                    error = error.to_string(),
                    "Failed to get capacity group"
                );
                None
            }
        };
        Ok(Some(ClusterSnapshot {
            cluster: cluster.to_owned(),
            active,
            draining,
            memory_reservation,
            group,
        }))
    }

    /// Get a capacity groups cpu utilization treating errors as missing samples
    ///
    /// # Arguments
    ///
    /// * `group` - The group to get cpu utilization for
    async fn group_cpu(&self, group: &str) -> Option<f64> {
        let window = MetricWindow::from(&self.conf.scaler);
        match self.backends.metrics.group_cpu_utilization(group, window).await {
            Ok(cpu) => cpu,
            Err(error) => {
                event!(
                    Level::WARN,
                    group,
                    error = error.to_string(),
                    "Failed to get cpu utilization"
                );
                None
            }
        }
    }

    /// Decide on and dispatch the actions for a single cluster
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to scale in
    /// * `dispatcher` - The dispatcher to send actions to
    #[instrument(name = "Scaler::process_cluster", skip(self, dispatcher))]
    async fn process_cluster(&self, cluster: &str, dispatcher: &Arc<dyn Dispatcher>) -> ClusterReport {
        let mut report = ClusterReport::new(cluster);
        // get a snapshot of this cluster
        let snapshot = match self.snapshot(cluster).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                event!(Level::INFO, cluster, "No active hosts, skipping cluster");
                return report.skip("no active hosts");
            }
            Err(error) => return report.skip(format!("inventory unavailable: {error}")),
        };
        // decide what to do with this cluster
        let policy = ScalePolicy::new(&self.conf.scaler);
        let group = snapshot.group.as_ref().map(|group| group.name.as_str());
        let decisions = policy
            .plan(&snapshot, || async move {
                match group {
                    Some(group) => self.group_cpu(group).await,
                    None => None,
                }
            })
            .await;
        // act on our decisions
        report.actions = self.dispatch(cluster, &decisions, dispatcher).await;
        report.decisions = decisions;
        report
    }

    /// Dispatch the actions for a clusters decisions in order
    ///
    /// A host is never drained twice in the same cycle.
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster these decisions are for
    /// * `decisions` - The decisions to act on
    /// * `dispatcher` - The dispatcher to send actions to
    async fn dispatch(
        &self,
        cluster: &str,
        decisions: &[Decision],
        dispatcher: &Arc<dyn Dispatcher>,
    ) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::default();
        let mut drained = HashSet::new();
        for decision in decisions {
            match decision {
                Decision::TerminateDrained(hosts) => {
                    event!(Level::INFO, cluster, hosts = hosts.iter().join(","), "Terminating drained hosts");
                    for host in hosts {
                        let action = Action::Terminate { host: host.clone() };
                        let result = dispatcher.terminate_and_decrement(host).await;
                        outcomes.push(Self::outcome(cluster, action, result, dispatcher.dry_run()));
                    }
                }
                Decision::DrainEmpty(hosts) => {
                    event!(Level::INFO, cluster, hosts = hosts.keys().join(","), "Draining empty hosts");
                    for (host, agent) in hosts {
                        drained.insert(host.clone());
                        let action = Action::Drain {
                            host: host.clone(),
                            agent: agent.clone(),
                        };
                        let result = dispatcher.drain(cluster, agent).await;
                        outcomes.push(Self::outcome(cluster, action, result, dispatcher.dry_run()));
                    }
                }
                Decision::ScaleIn(candidate) => {
                    event!(
                        Level::INFO,
                        cluster,
                        host = &candidate.host_id,
                        running = candidate.running,
                        remaining_memory = candidate.remaining_memory,
                        "Scaling in least utilized host"
                    );
                    // this host may already be draining as an empty host
                    if !drained.insert(candidate.host_id.clone()) {
                        event!(Level::DEBUG, cluster, host = &candidate.host_id, "Host is already draining");
                        continue;
                    }
                    let action = Action::Drain {
                        host: candidate.host_id.clone(),
                        agent: candidate.agent.clone(),
                    };
                    let result = dispatcher.drain(cluster, &candidate.agent).await;
                    outcomes.push(Self::outcome(cluster, action, result, dispatcher.dry_run()));
                }
                Decision::SkipMinState { active, min_size } => {
                    event!(Level::INFO, cluster, active, min_size, "Skipping cluster at minimum size");
                }
                Decision::NoOp(reason) => {
                    event!(Level::INFO, cluster, reason = reason.to_string(), "Not scaling in");
                }
            }
        }
        outcomes
    }

    /// Record and log the result of a dispatched action
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster this action was for
    /// * `action` - The action that was dispatched
    /// * `result` - The result from our dispatcher
    /// * `dry_run` - Whether this action was only logged
    fn outcome(
        cluster: &str,
        action: Action,
        result: Result<(), Error>,
        dry_run: bool,
    ) -> ActionOutcome {
        let result = match result {
            Ok(()) if dry_run => ActionResult::DryRun,
            Ok(()) => ActionResult::Done,
            Err(error) => {
                event!(
                    Level::ERROR,
                    cluster,
                    action = ?action,
                    error = error.to_string(),
                    "Action failed"
                );
                ActionResult::Failed(error.to_string())
            }
        };
        ActionOutcome { action, result }
    }
}
