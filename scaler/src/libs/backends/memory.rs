//! An in memory fleet for testing the scaler

use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;

use super::{Dispatcher, Inventory, Metrics};
use crate::Error;
use crate::libs::models::{Action, CapacityGroup, HostSnapshot, HostState, MetricWindow};

/// A pretend cluster in an in memory fleet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryCluster {
    /// The hosts accepting work
    pub active: Vec<HostSnapshot>,
    /// The hosts that are draining
    pub draining: Vec<HostSnapshot>,
    /// The memory reservation sample to report if any
    pub memory_reservation: Option<f64>,
    /// The capacity group terminated hosts are removed from
    pub group: Option<String>,
}

impl MemoryCluster {
    /// Create an empty pretend cluster
    pub fn new() -> Self {
        MemoryCluster::default()
    }

    /// Add an active host
    ///
    /// # Arguments
    ///
    /// * `host` - The host to add
    #[must_use]
    pub fn active(mut self, host: HostSnapshot) -> Self {
        self.active.push(host);
        self
    }

    /// Add a draining host
    ///
    /// # Arguments
    ///
    /// * `host` - The host to add
    #[must_use]
    pub fn draining(mut self, host: HostSnapshot) -> Self {
        self.draining.push(host);
        self
    }

    /// Set the memory reservation to report
    ///
    /// # Arguments
    ///
    /// * `reservation` - The reservation to report
    #[must_use]
    pub fn reservation(mut self, reservation: f64) -> Self {
        self.memory_reservation = Some(reservation);
        self
    }

    /// Set the capacity group this clusters hosts belong to
    ///
    /// # Arguments
    ///
    /// * `group` - The name of the capacity group
    #[must_use]
    pub fn group<T: Into<String>>(mut self, group: T) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// The mutable state of an in memory fleet
#[derive(Debug, Default)]
struct FleetState {
    /// The clusters in this fleet
    clusters: BTreeMap<String, MemoryCluster>,
    /// The capacity groups in this fleet
    groups: BTreeMap<String, CapacityGroup>,
    /// The cpu utilization of each group
    cpu: BTreeMap<String, f64>,
    /// The actions that were dispatched to this fleet
    dispatched: Vec<Action>,
    /// The hosts whose actions should fail
    failing: HashSet<String>,
    /// The clusters whose inventory calls should fail
    broken: HashSet<String>,
    /// Whether listing clusters should fail
    unlistable: bool,
    /// The number of cpu samples that were requested
    cpu_fetches: usize,
}

/// An in memory fleet that implements every backend
#[derive(Debug, Default)]
pub struct MemoryFleet {
    /// The state of this fleet
    state: Mutex<FleetState>,
}

impl MemoryFleet {
    /// Create an empty in memory fleet
    pub fn new() -> Self {
        MemoryFleet::default()
    }

    /// Add a cluster to this fleet
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the cluster
    /// * `cluster` - The cluster to add
    pub async fn cluster<T: Into<String>>(&self, name: T, cluster: MemoryCluster) {
        self.state.lock().await.clusters.insert(name.into(), cluster);
    }

    /// Add a capacity group to this fleet
    ///
    /// # Arguments
    ///
    /// * `group` - The group to add
    /// * `cpu` - The cpu utilization sample to report for this group if any
    pub async fn group(&self, group: CapacityGroup, cpu: Option<f64>) {
        let mut state = self.state.lock().await;
        if let Some(cpu) = cpu {
            state.cpu.insert(group.name.clone(), cpu);
        }
        state.groups.insert(group.name.clone(), group);
    }

    /// Make every action for a host fail
    ///
    /// # Arguments
    ///
    /// * `host` - The host id or agent whose actions should fail
    pub async fn fail_actions<T: Into<String>>(&self, host: T) {
        self.state.lock().await.failing.insert(host.into());
    }

    /// Make every inventory call for a cluster fail
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster whose calls should fail
    pub async fn break_cluster<T: Into<String>>(&self, cluster: T) {
        self.state.lock().await.broken.insert(cluster.into());
    }

    /// Make listing clusters fail
    pub async fn break_listing(&self) {
        self.state.lock().await.unlistable = true;
    }

    /// Get the actions that were dispatched to this fleet
    pub async fn dispatched(&self) -> Vec<Action> {
        self.state.lock().await.dispatched.clone()
    }

    /// Get the number of cpu samples that were requested
    pub async fn cpu_fetches(&self) -> usize {
        self.state.lock().await.cpu_fetches
    }

    /// Get a snapshot of a cluster as it currently is
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the cluster to get
    pub async fn get_cluster(&self, name: &str) -> Option<MemoryCluster> {
        self.state.lock().await.clusters.get(name).cloned()
    }

    /// Get a capacity group as it currently is
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the group to get
    pub async fn get_group(&self, name: &str) -> Option<CapacityGroup> {
        self.state.lock().await.groups.get(name).cloned()
    }
}

#[async_trait::async_trait]
impl Inventory for MemoryFleet {
    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        let state = self.state.lock().await;
        if state.unlistable {
            return Err(Error::new("Failed to list clusters"));
        }
        Ok(state.clusters.keys().cloned().collect())
    }

    async fn hosts(&self, cluster: &str, host_state: HostState) -> Result<Vec<HostSnapshot>, Error> {
        let state = self.state.lock().await;
        if state.broken.contains(cluster) {
            return Err(Error::new(format!("Failed to list hosts in {cluster}")));
        }
        let cluster = state
            .clusters
            .get(cluster)
            .ok_or_else(|| Error::new(format!("Unknown cluster {cluster}")))?;
        match host_state {
            HostState::Active => Ok(cluster.active.clone()),
            HostState::Draining => Ok(cluster.draining.clone()),
        }
    }

    async fn capacity_group(&self, name: &str) -> Result<Option<CapacityGroup>, Error> {
        Ok(self.state.lock().await.groups.get(name).cloned())
    }
}

#[async_trait::async_trait]
impl Metrics for MemoryFleet {
    async fn cluster_memory_reservation(
        &self,
        cluster: &str,
        _window: MetricWindow,
    ) -> Result<Option<f64>, Error> {
        let state = self.state.lock().await;
        Ok(state
            .clusters
            .get(cluster)
            .and_then(|cluster| cluster.memory_reservation))
    }

    async fn group_cpu_utilization(
        &self,
        group: &str,
        _window: MetricWindow,
    ) -> Result<Option<f64>, Error> {
        let mut state = self.state.lock().await;
        state.cpu_fetches += 1;
        Ok(state.cpu.get(group).copied())
    }
}

#[async_trait::async_trait]
impl Dispatcher for MemoryFleet {
    /// Move a host from its clusters active list to its draining list
    async fn drain(&self, cluster: &str, agent: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.failing.contains(agent) {
            return Err(Error::new(format!("Failed to drain {agent}")));
        }
        let pretend = state
            .clusters
            .get_mut(cluster)
            .ok_or_else(|| Error::new(format!("Unknown cluster {cluster}")))?;
        // find the host running this agent
        let position = pretend
            .active
            .iter()
            .position(|host| host.agent == agent)
            .ok_or_else(|| Error::new(format!("Agent {agent} is not active in {cluster}")))?;
        let host = pretend.active.remove(position);
        let action = Action::Drain {
            host: host.host_id.clone(),
            agent: host.agent.clone(),
        };
        pretend.draining.push(host);
        state.dispatched.push(action);
        Ok(())
    }

    /// Remove a host from its cluster and shrink its capacity group by one
    async fn terminate_and_decrement(&self, host: &str) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.failing.contains(host) {
            return Err(Error::new(format!("Failed to terminate {host}")));
        }
        // remove this host from whatever cluster it is in
        let mut owner = None;
        for cluster in state.clusters.values_mut() {
            let before = cluster.draining.len() + cluster.active.len();
            cluster.draining.retain(|snapshot| snapshot.host_id != host);
            cluster.active.retain(|snapshot| snapshot.host_id != host);
            if before != cluster.draining.len() + cluster.active.len() {
                owner = Some(cluster.group.clone());
            }
        }
        let owner = owner.ok_or_else(|| Error::new(format!("Unknown host {host}")))?;
        // shrink the group this host belonged to
        if let Some(group) = owner.and_then(|name| state.groups.get_mut(&name)) {
            group.desired_size = group.desired_size.saturating_sub(1);
        }
        state.dispatched.push(Action::Terminate {
            host: host.to_owned(),
        });
        Ok(())
    }
}
