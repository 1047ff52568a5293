//! Sets up tracing for ecscale to stdout

use tracing::{Level, event};
use tracing_subscriber::prelude::*;

use crate::conf::{LogFormat, Tracing};

/// Setup our local tracer
///
/// Setting up tracing twice in the same process is ignored so tests can call
/// this freely.
///
/// # Arguments
///
/// * `name` - The name of the service to trace
/// * `conf` - The tracing settings to use
pub fn setup(name: &str, conf: &Tracing) {
    // build the filter for our configured level
    let filter = conf.level.to_filter();
    // build our registry with a layer in the right format
    let installed = match conf.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_filter(filter),
            )
            .try_init(),
    };
    // log where our traces are going
    if installed.is_ok() {
        event!(
            Level::INFO,
            service = name,
            level = conf.level.to_string(),
            "Sending traces to stdout"
        );
    }
}
