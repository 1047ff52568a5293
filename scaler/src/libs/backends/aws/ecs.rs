use aws_sdk_ecs::Client;
use aws_sdk_ecs::types::{ContainerInstance, ContainerInstanceStatus};
use tracing::{Level, event, instrument};

use crate::Error;
use crate::libs::helpers;
use crate::libs::models::{HostSnapshot, HostState};

/// The most container instances ECS will describe in one request
const DESCRIBE_LIMIT: usize = 100;

/// Convert a host state to an ECS container instance status
fn status(state: HostState) -> ContainerInstanceStatus {
    match state {
        HostState::Active => ContainerInstanceStatus::Active,
        HostState::Draining => ContainerInstanceStatus::Draining,
    }
}

/// Build a host snapshot from a described container instance
///
/// # Arguments
///
/// * `instance` - The container instance to convert
fn snapshot(instance: &ContainerInstance) -> Result<HostSnapshot, Error> {
    // get the ids for this host
    let host_id = instance
        .ec2_instance_id()
        .ok_or(Error::MissingField("ec2InstanceId"))?;
    let agent = instance
        .container_instance_arn()
        .ok_or(Error::MissingField("containerInstanceArn"))?;
    // find how much memory this host has left
    let remaining_memory = instance
        .remaining_resources()
        .iter()
        .find(|resource| resource.name() == Some("MEMORY"))
        .map(|resource| i64::from(helpers::count(resource.integer_value())))
        .unwrap_or_default();
    Ok(HostSnapshot::new(
        host_id,
        agent,
        helpers::count(instance.running_tasks_count()),
        helpers::count(instance.pending_tasks_count()),
        remaining_memory,
    ))
}

/// Wrapper for ECS commands
pub struct Ecs {
    /// API client for ECS
    client: Client,
}

impl Ecs {
    /// Build a new wrapper for ECS commands
    ///
    /// # Arguments
    ///
    /// * `shared` - The shared AWS config
    pub fn new(shared: &aws_types::SdkConfig) -> Self {
        Ecs {
            client: Client::new(shared),
        }
    }

    /// List the names of all clusters
    #[instrument(name = "Ecs::list_clusters", skip_all, err(Debug))]
    pub async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::default();
        let mut token = None;
        // page through all of our clusters
        loop {
            let resp = self
                .client
                .list_clusters()
                .set_next_token(token)
                .send()
                .await?;
            // get the cluster names from their arns
            names.extend(resp.cluster_arns().iter().map(|arn| helpers::cluster_name(arn)));
            // get the next page if there is one
            match resp.next_token() {
                Some(next) => token = Some(next.to_owned()),
                None => break,
            }
        }
        Ok(names)
    }

    /// List the container instance arns in a cluster with a specific status
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster to list container instances in
    /// * `state` - The state of the container instances to list
    #[instrument(name = "Ecs::list_instances", skip(self), err(Debug))]
    pub async fn list_instances(
        &self,
        cluster: &str,
        state: HostState,
    ) -> Result<Vec<String>, Error> {
        let mut arns = Vec::default();
        let mut token = None;
        // page through all of the container instances in this state
        loop {
            let resp = self
                .client
                .list_container_instances()
                .cluster(cluster)
                .status(status(state))
                .set_next_token(token)
                .send()
                .await?;
            arns.extend(resp.container_instance_arns().iter().cloned());
            // get the next page if there is one
            match resp.next_token() {
                Some(next) => token = Some(next.to_owned()),
                None => break,
            }
        }
        Ok(arns)
    }

    /// Describe container instances and snapshot their tasks and resources
    ///
    /// Instances that cannot be described or are missing ids are logged and left out.
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster these container instances are in
    /// * `arns` - The arns of the container instances to describe
    #[instrument(name = "Ecs::describe_instances", skip(self, arns), fields(count = arns.len()), err(Debug))]
    pub async fn describe_instances(
        &self,
        cluster: &str,
        arns: Vec<String>,
    ) -> Result<Vec<HostSnapshot>, Error> {
        let mut hosts = Vec::with_capacity(arns.len());
        // ECS limits how many instances we can describe at once
        for chunk in arns.chunks(DESCRIBE_LIMIT) {
            let resp = self
                .client
                .describe_container_instances()
                .cluster(cluster)
                .set_container_instances(Some(chunk.to_vec()))
                .send()
                .await?;
            // log any instances that could not be described
            for failure in resp.failures() {
                event!(
                    Level::WARN,
                    cluster,
                    arn = failure.arn(),
                    reason = failure.reason(),
                    "Failed to describe container instance"
                );
            }
            // snapshot the instances we could describe
            for instance in resp.container_instances() {
                match snapshot(instance) {
                    Ok(host) => hosts.push(host),
                    Err(error) => event!(
                        Level::WARN,
                        cluster,
                        arn = instance.container_instance_arn(),
                        error = error.to_string(),
                        "Skipping container instance"
                    ),
                }
            }
        }
        Ok(hosts)
    }

    /// Set a container instance to draining
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster this container instance is in
    /// * `agent` - The arn of the container instance to drain
    #[instrument(name = "Ecs::drain", skip(self), err(Debug))]
    pub async fn drain(&self, cluster: &str, agent: &str) -> Result<(), Error> {
        let resp = self
            .client
            .update_container_instances_state()
            .cluster(cluster)
            .container_instances(agent)
            .status(ContainerInstanceStatus::Draining)
            .send()
            .await?;
        // ECS reports per instance failures in the response body
        if let Some(failure) = resp.failures().first() {
            return Err(Error::Aws {
                service: "ECS",
                code: failure.reason().map(ToOwned::to_owned),
                message: failure.detail().map(ToOwned::to_owned),
            });
        }
        Ok(())
    }
}
