//! The dry run dispatcher for ecscale

use tracing::{Level, event, instrument};

use super::Dispatcher;
use crate::Error;

/// A dispatcher that only logs the actions it is given
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

#[async_trait::async_trait]
impl Dispatcher for DryRun {
    /// Dry runs never touch the fleet
    fn dry_run(&self) -> bool {
        true
    }

    /// Log that we would have drained a host
    ///
    /// # Arguments
    ///
    /// * `cluster` - The cluster this host is in
    /// * `agent` - The container agent on the host to drain
    #[instrument(name = "Dispatcher<DryRun>::drain", skip(self))]
    async fn drain(&self, cluster: &str, agent: &str) -> Result<(), Error> {
        event!(Level::INFO, cluster, agent, "Would drain host");
        Ok(())
    }

    /// Log that we would have terminated a host
    ///
    /// # Arguments
    ///
    /// * `host` - The id of the host to terminate
    #[instrument(name = "Dispatcher<DryRun>::terminate_and_decrement", skip(self))]
    async fn terminate_and_decrement(&self, host: &str) -> Result<(), Error> {
        event!(Level::INFO, host, "Would terminate host and decrement its group");
        Ok(())
    }
}
