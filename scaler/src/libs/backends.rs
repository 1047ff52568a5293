//! Abstracts the services the scaler reads from and acts on
//!
//! Currently we only support ECS backed by Auto Scaling groups and CloudWatch.
use std::sync::Arc;

use crate::Error;
use crate::conf::Conf;
use crate::libs::models::{CapacityGroup, HostSnapshot, HostState, MetricWindow};

pub mod aws;
pub mod dry_run;
#[cfg(feature = "test-utilities")]
pub mod memory;

pub use aws::Aws;
pub use dry_run::DryRun;

/// The methods required to read a fleets clusters and hosts
#[async_trait::async_trait]
pub trait Inventory: Send + Sync {
    /// List the names of all clusters in the fleet
    async fn list_clusters(&self) -> Result<Vec<String>, Error>;

    /// List and describe the hosts in a cluster in a specific state
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to list hosts from
    /// * `state` - The state of the hosts to list
    async fn hosts(&self, cluster: &str, state: HostState) -> Result<Vec<HostSnapshot>, Error>;

    /// Get a capacity group by name
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the capacity group to get
    async fn capacity_group(&self, name: &str) -> Result<Option<CapacityGroup>, Error>;
}

/// The methods required to read average metrics over a recent window
///
/// A missing sample is `Ok(None)` and is never the same as a zero.
#[async_trait::async_trait]
pub trait Metrics: Send + Sync {
    /// Get the average memory reservation of a cluster
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to get memory reservation for
    /// * `window` - The window to average over
    async fn cluster_memory_reservation(
        &self,
        cluster: &str,
        window: MetricWindow,
    ) -> Result<Option<f64>, Error>;

    /// Get the average cpu utilization of a capacity group
    ///
    /// # Arguments
    ///
    /// * `group` - The capacity group to get cpu utilization for
    /// * `window` - The window to average over
    async fn group_cpu_utilization(
        &self,
        group: &str,
        window: MetricWindow,
    ) -> Result<Option<f64>, Error>;
}

/// The methods required to drain and terminate hosts
#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync {
    /// Whether this dispatcher only logs what it would do
    fn dry_run(&self) -> bool {
        false
    }

    /// Put a host into the draining state
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster this host is in
    /// * `agent` - The container agent on the host to drain
    async fn drain(&self, cluster: &str, agent: &str) -> Result<(), Error>;

    /// Terminate a host and decrement its capacity groups desired size
    ///
    /// # Arguments
    ///
    /// * `host` - The id of the host to terminate
    async fn terminate_and_decrement(&self, host: &str) -> Result<(), Error>;
}

/// The backends a scaler talks to
#[derive(Clone)]
pub struct Backends {
    /// Lists clusters, hosts, and capacity groups
    pub inventory: Arc<dyn Inventory>,
    /// Gets recent metrics
    pub metrics: Arc<dyn Metrics>,
    /// Drains and terminates hosts
    pub dispatcher: Arc<dyn Dispatcher>,
}

impl Backends {
    /// Get the dispatcher to use for a cycle
    ///
    /// # Arguments
    ///
    /// * `dry_run` - Whether actions should only be logged
    pub fn dispatcher(&self, dry_run: bool) -> Arc<dyn Dispatcher> {
        if dry_run {
            Arc::new(DryRun)
        } else {
            self.dispatcher.clone()
        }
    }

    /// Build backends that all share one implementation
    ///
    /// # Arguments
    ///
    /// * `backend` - The backend to read from and act on
    pub fn shared<B: Inventory + Metrics + Dispatcher + 'static>(backend: Arc<B>) -> Self {
        Backends {
            inventory: backend.clone(),
            metrics: backend.clone(),
            dispatcher: backend,
        }
    }
}

/// Creates the backends for the configured fleet
///
/// Dry runs still read from the real fleet so that they make the same decisions.
///
/// # Arguments
///
/// * `conf` - The ecscale config
pub async fn new(conf: &Conf) -> Result<Backends, Error> {
    // build our AWS clients
    let aws = Aws::new(&conf.aws).await?;
    Ok(Backends::shared(Arc::new(aws)))
}
