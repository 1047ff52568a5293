use aws_sdk_autoscaling::Client;
use tracing::{Level, event, instrument};

use crate::Error;
use crate::libs::helpers;
use crate::libs::models::CapacityGroup;

/// Wrapper for Auto Scaling commands
pub struct AutoScaling {
    /// API client for Auto Scaling
    client: Client,
}

impl AutoScaling {
    /// Build a new wrapper for Auto Scaling commands
    ///
    /// # Arguments
    ///
    /// * `shared` - The shared AWS config
    pub fn new(shared: &aws_types::SdkConfig) -> Self {
        AutoScaling {
            client: Client::new(shared),
        }
    }

    /// Get the size bounds of an Auto Scaling group
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the group to describe
    #[instrument(name = "AutoScaling::describe", skip(self), err(Debug))]
    pub async fn describe(&self, name: &str) -> Result<Option<CapacityGroup>, Error> {
        let resp = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await?;
        // only an exact name match counts
        let group = resp
            .auto_scaling_groups()
            .iter()
            .find(|group| Option::<&str>::from(group.auto_scaling_group_name()) == Some(name));
        match group {
            Some(group) => Ok(Some(CapacityGroup {
                name: name.to_owned(),
                min_size: helpers::count(group.min_size()),
                desired_size: helpers::count(group.desired_capacity()),
            })),
            None => {
                event!(Level::WARN, group = name, "Auto Scaling group not found");
                Ok(None)
            }
        }
    }

    /// Terminate an instance and decrement its groups desired capacity
    ///
    /// # Arguments
    ///
    /// * `host` - The EC2 instance id to terminate
    #[instrument(name = "AutoScaling::terminate_and_decrement", skip(self), err(Debug))]
    pub async fn terminate_and_decrement(&self, host: &str) -> Result<(), Error> {
        let resp = self
            .client
            .terminate_instance_in_auto_scaling_group()
            .instance_id(host)
            .should_decrement_desired_capacity(true)
            .send()
            .await?;
        // log the scaling activity this kicked off
        if let Some(activity) = resp.activity() {
            event!(
                Level::INFO,
                host,
                activity = ?activity.activity_id(),
                status = ?activity.status_code(),
                "Started termination"
            );
        }
        Ok(())
    }
}
