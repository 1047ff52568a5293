//! Scales in ECS clusters backed by Auto Scaling groups
//!
//! Hosts are ECS container instances and their capacity groups are Auto Scaling
//! groups. Memory reservation comes from the `AWS/ECS` namespace and group cpu
//! utilization from the `AWS/EC2` namespace in CloudWatch.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use tracing::{Level, event, instrument};

pub mod autoscaling;
pub mod cloudwatch;
pub mod ecs;

use autoscaling::AutoScaling;
use cloudwatch::CloudWatch;
use ecs::Ecs;

use super::{Dispatcher, Inventory, Metrics};
use crate::Error;
use crate::conf;
use crate::libs::models::{CapacityGroup, HostSnapshot, HostState, MetricWindow};

/// Build the shared AWS config for all of our clients
///
/// # Arguments
///
/// * `conf` - The AWS settings to use
async fn load_config(conf: &conf::Aws) -> Result<aws_types::SdkConfig, Error> {
    // start from the default credential chain in our region
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(conf.region.clone()));
    // use a custom endpoint if one was set
    if let Some(endpoint) = &conf.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    // use static credentials if they were both set
    match (&conf.access_key, &conf.secret_token) {
        (Some(access_key), Some(secret_token)) => {
            let creds = Credentials::new(access_key, secret_token, None, None, "ecscale");
            loader = loader.credentials_provider(creds);
        }
        (None, None) => (),
        _ => {
            return Err(Error::new(
                "aws.access_key and aws.secret_token must be set together",
            ));
        }
    }
    Ok(loader.load().await)
}

/// The AWS backend
pub struct Aws {
    /// Wrapper for ECS cluster and container instance commands
    pub ecs: Ecs,
    /// Wrapper for Auto Scaling group commands
    pub autoscaling: AutoScaling,
    /// Wrapper for CloudWatch metric commands
    pub cloudwatch: CloudWatch,
}

impl Aws {
    /// Builds a new AWS backend
    ///
    /// # Arguments
    ///
    /// * `conf` - The AWS settings to use
    #[instrument(name = "Aws::new", skip_all, fields(region = &conf.region), err(Debug))]
    pub async fn new(conf: &conf::Aws) -> Result<Self, Error> {
        // load our shared config
        let shared = load_config(conf).await?;
        // setup our service wrappers
        let aws = Aws {
            ecs: Ecs::new(&shared),
            autoscaling: AutoScaling::new(&shared),
            cloudwatch: CloudWatch::new(&shared),
        };
        event!(Level::INFO, region = &conf.region, "Built AWS clients");
        Ok(aws)
    }
}

#[async_trait::async_trait]
impl Inventory for Aws {
    /// List the names of all ECS clusters
    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        self.ecs.list_clusters().await
    }

    /// List and describe the container instances in a cluster
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to list container instances from
    /// * `state` - The state of the container instances to list
    async fn hosts(&self, cluster: &str, state: HostState) -> Result<Vec<HostSnapshot>, Error> {
        // list the container instances in this state
        let arns = self.ecs.list_instances(cluster, state).await?;
        // describe them to get their task counts and resources
        self.ecs.describe_instances(cluster, arns).await
    }

    /// Get an Auto Scaling group by name
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the Auto Scaling group
    async fn capacity_group(&self, name: &str) -> Result<Option<CapacityGroup>, Error> {
        self.autoscaling.describe(name).await
    }
}

#[async_trait::async_trait]
impl Metrics for Aws {
    /// Get the average `MemoryReservation` of an ECS cluster
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to get memory reservation for
    /// * `window` - The window to average over
    async fn cluster_memory_reservation(
        &self,
        cluster: &str,
        window: MetricWindow,
    ) -> Result<Option<f64>, Error> {
        self.cloudwatch
            .average(
                "AWS/ECS",
                "MemoryReservation",
                ("ClusterName", cluster),
                window,
            )
            .await
    }

    /// Get the average `CPUUtilization` of an Auto Scaling group
    ///
    /// # Arguments
    ///
    /// * `group` - The Auto Scaling group to get cpu utilization for
    /// * `window` - The window to average over
    async fn group_cpu_utilization(
        &self,
        group: &str,
        window: MetricWindow,
    ) -> Result<Option<f64>, Error> {
        self.cloudwatch
            .average(
                "AWS/EC2",
                "CPUUtilization",
                ("AutoScalingGroupName", group),
                window,
            )
            .await
    }
}

#[async_trait::async_trait]
impl Dispatcher for Aws {
    /// Set a container instance to draining
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster this container instance is in
    /// * `agent` - The container instance arn to drain
    async fn drain(&self, cluster: &str, agent: &str) -> Result<(), Error> {
        self.ecs.drain(cluster, agent).await
    }

    /// Terminate an instance and decrement its Auto Scaling groups desired capacity
    ///
    /// # Arguments
    ///
    /// * `host` - The EC2 instance id to terminate
    async fn terminate_and_decrement(&self, host: &str) -> Result<(), Error> {
        self.autoscaling.terminate_and_decrement(host).await
    }
}
