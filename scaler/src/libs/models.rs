//! The snapshots, decisions, and reports the scaler passes around
//!
//! Everything here is rebuilt from fresh data each cycle and dropped at the end
//! of it. Nothing is carried across clusters or cycles.

use chrono::prelude::*;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::conf::ScalerSettings;

/// The lifecycle states a host can be listed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostState {
    /// This host is accepting new work
    Active,
    /// This host is finishing its existing work before removal
    Draining,
}

impl HostState {
    /// Get our state as a str
    pub fn as_str(&self) -> &'static str {
        match self {
            HostState::Active => "ACTIVE",
            HostState::Draining => "DRAINING",
        }
    }
}

/// A single host in a cluster as it looked when we listed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// The id of the underlying instance
    pub host_id: String,
    /// The id of the container agent running on this host
    pub agent: String,
    /// The number of running tasks on this host
    pub running: u32,
    /// The number of pending tasks on this host
    pub pending: u32,
    /// The memory units this host still has free
    pub remaining_memory: i64,
}

impl HostSnapshot {
    /// Create a new host snapshot
    ///
    /// # Arguments
    ///
    /// * `host_id` - The id of the underlying instance
    /// * `agent` - The id of the container agent on this host
    /// * `running` - The number of running tasks
    /// * `pending` - The number of pending tasks
    /// * `remaining_memory` - The memory units this host still has free
    pub fn new<H: Into<String>, A: Into<String>>(
        host_id: H,
        agent: A,
        running: u32,
        pending: u32,
        remaining_memory: i64,
    ) -> Self {
        HostSnapshot {
            host_id: host_id.into(),
            agent: agent.into(),
            running,
            pending,
            remaining_memory,
        }
    }

    /// Whether this host has no running or pending tasks
    pub fn is_empty(&self) -> bool {
        self.running == 0 && self.pending == 0
    }

    /// The total number of tasks on this host
    pub fn tasks(&self) -> u32 {
        self.running.saturating_add(self.pending)
    }
}

/// The autoscaling boundary that backs a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityGroup {
    /// The name of this group
    pub name: String,
    /// The fewest hosts this group may have
    pub min_size: u32,
    /// The number of hosts this group wants
    pub desired_size: u32,
}

/// The lookback window and granularity to fetch metrics with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricWindow {
    /// How far back to look in seconds
    pub lookback: u64,
    /// The granularity of each sample in seconds
    pub period: u64,
}

impl From<&ScalerSettings> for MetricWindow {
    fn from(settings: &ScalerSettings) -> Self {
        MetricWindow {
            lookback: settings.metric_window,
            period: settings.metric_period,
        }
    }
}

/// Everything we know about a cluster at the start of its cycle
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    /// The name of this cluster
    pub cluster: String,
    /// The hosts accepting work in this cluster
    pub active: Vec<HostSnapshot>,
    /// The hosts draining in this cluster
    pub draining: Vec<HostSnapshot>,
    /// The average memory reservation of this cluster if a sample exists
    pub memory_reservation: Option<f64>,
    /// The capacity group backing this cluster if we could find it
    pub group: Option<CapacityGroup>,
}

/// The host picked to be scaled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// The id of the underlying instance
    pub host_id: String,
    /// The number of running tasks on this host
    pub running: u32,
    /// The memory units this host still has free
    pub remaining_memory: i64,
    /// The id of the container agent on this host
    pub agent: String,
}

impl From<&HostSnapshot> for Candidate {
    fn from(host: &HostSnapshot) -> Self {
        Candidate {
            host_id: host.host_id.clone(),
            running: host.running,
            remaining_memory: host.remaining_memory,
            agent: host.agent.clone(),
        }
    }
}

/// Why nothing (more) was done for a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NoOpReason {
    /// No capacity group could be found for this cluster
    NoCapacityGroup { group: String },
    /// No memory reservation sample was returned
    MissingMemoryReservation,
    /// Current or projected memory reservation is too high to drain anything
    ReservationTooHigh { current: f64, projected: f64 },
    /// Memory reservation is low enough to drain empty hosts but not to scale in
    MemoryAboveScaleIn { current: f64 },
    /// No cpu utilization sample was returned for the capacity group
    MissingCpu,
    /// The capacity group is too busy to scale in
    CpuTooHigh { cpu: f64 },
    /// Draining the candidate would take the cluster below its minimum size
    FloorReached { min_size: u32 },
    /// There were no active hosts to pick a candidate from
    NoActiveHosts,
}

impl std::fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoOpReason::NoCapacityGroup { group } => {
                write!(f, "capacity group {group} not found, cannot scale")
            }
            NoOpReason::MissingMemoryReservation => {
                write!(f, "no memory reservation sample, cannot scale")
            }
            NoOpReason::ReservationTooHigh { current, projected } => write!(
                f,
                "memory reservation {current:.2} (projected {projected:.2}) too high, cannot scale"
            ),
            NoOpReason::MemoryAboveScaleIn { current } => {
                write!(f, "memory reservation {current:.2} higher than threshold, cannot scale")
            }
            NoOpReason::MissingCpu => write!(f, "no cpu utilization sample, cannot scale"),
            NoOpReason::CpuTooHigh { cpu } => {
                write!(f, "CPU {cpu:.2} higher than threshold, cannot scale")
            }
            NoOpReason::FloorReached { min_size } => {
                write!(f, "draining another host would drop below minimum size {min_size}")
            }
            NoOpReason::NoActiveHosts => write!(f, "no active hosts"),
        }
    }
}

/// A single decision made for a cluster this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    /// The cluster is already at its capacity groups minimum size
    SkipMinState { active: usize, min_size: u32 },
    /// Drain these empty hosts (host id -> agent id)
    DrainEmpty(BTreeMap<String, String>),
    /// Drain this single least utilized host
    ScaleIn(Candidate),
    /// Terminate these drained hosts and shrink their capacity group
    TerminateDrained(Vec<String>),
    /// Nothing (more) to do
    NoOp(NoOpReason),
}

/// A command sent to (or withheld from) the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Put a host into the draining state
    Drain { host: String, agent: String },
    /// Terminate a host and decrement its capacity group
    Terminate { host: String },
}

/// What happened when an action was dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResult {
    /// The dispatcher accepted this action
    Done,
    /// This action was only logged
    DryRun,
    /// The dispatcher rejected this action
    Failed(String),
}

/// An action and its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// The action we dispatched
    pub action: Action,
    /// What came of it
    pub result: ActionResult,
}

/// What happened to a single cluster in a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    /// The name of this cluster
    pub cluster: String,
    /// Why this cluster was skipped entirely if it was
    pub skipped: Option<String>,
    /// The decisions made for this cluster in the order they were made
    pub decisions: Vec<Decision>,
    /// The actions dispatched for this cluster
    pub actions: Vec<ActionOutcome>,
}

impl ClusterReport {
    /// Create an empty report for a cluster
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster this report is for
    pub fn new<T: Into<String>>(cluster: T) -> Self {
        ClusterReport {
            cluster: cluster.into(),
            skipped: None,
            decisions: Vec::default(),
            actions: Vec::default(),
        }
    }

    /// Mark this cluster as skipped
    ///
    /// # Arguments
    ///
    /// * `reason` - Why this cluster was skipped
    #[must_use]
    pub fn skip<T: Into<String>>(mut self, reason: T) -> Self {
        self.skipped = Some(reason.into());
        self
    }

    /// Get the number of actions that failed
    pub fn failures(&self) -> usize {
        self.actions
            .iter()
            .filter(|outcome| matches!(outcome.result, ActionResult::Failed(_)))
            .count()
    }
}

/// The structured record of a single pass over the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// The id of this cycle
    pub id: Uuid,
    /// When this cycle started
    pub started: DateTime<Utc>,
    /// Whether actions were only logged
    pub dry_run: bool,
    /// The clusters that were excluded by name
    pub excluded: Vec<String>,
    /// The reports for each cluster we looked at
    pub clusters: Vec<ClusterReport>,
    /// The error that kept us from listing clusters if one occured
    pub error: Option<String>,
}

impl CycleReport {
    /// Start a new cycle report
    ///
    /// # Arguments
    ///
    /// * `dry_run` - Whether actions are only being logged
    pub fn new(dry_run: bool) -> Self {
        CycleReport {
            id: Uuid::new_v4(),
            started: Utc::now(),
            dry_run,
            excluded: Vec::default(),
            clusters: Vec::default(),
            error: None,
        }
    }

    /// Get the decisions made for each cluster
    pub fn decisions(&self) -> BTreeMap<&str, &[Decision]> {
        self.clusters
            .iter()
            .map(|report| (report.cluster.as_str(), report.decisions.as_slice()))
            .collect()
    }

    /// Get a report for a specific cluster
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to get a report for
    pub fn cluster(&self, cluster: &str) -> Option<&ClusterReport> {
        self.clusters.iter().find(|report| report.cluster == cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_requires_no_running_and_no_pending() {
        // crawl every combination of zero and non-zero task counts
        for (running, pending, empty) in [(0, 0, true), (0, 3, false), (2, 0, false), (1, 1, false)]
        {
            let host = HostSnapshot::new("i-1", "arn:agent/1", running, pending, 512);
            assert_eq!(host.is_empty(), empty, "running={running} pending={pending}");
        }
    }

    #[test]
    fn failures_counts_only_failed_actions() {
        let mut report = ClusterReport::new("prod");
        report.actions.push(ActionOutcome {
            action: Action::Terminate { host: "i-1".into() },
            result: ActionResult::Done,
        });
        report.actions.push(ActionOutcome {
            action: Action::Drain {
                host: "i-2".into(),
                agent: "arn:agent/2".into(),
            },
            result: ActionResult::Failed("throttled".into()),
        });
        assert_eq!(report.failures(), 1);
    }
}
