use clap::Parser;
use ecscale::conf::ConfSource;
use ecscale::{Args, Conf, Scaler, trace};
use tracing::{Level, event};

/// The ECS scale in controller
#[tokio::main]
async fn main() {
    // get command line args
    let args = Args::parse();
    // try to load a config file and apply our overrides
    let (conf, source) = Conf::load(&args.config).expect("Failed to load config");
    let conf = args.overlay(conf);
    conf.scaler.validate().expect("Invalid scaler settings");
    // setup our tracer
    trace::setup("ecscale", &conf.tracing);
    // now that we can log tell the user if we are running on defaults
    if source == ConfSource::Defaults {
        event!(
            Level::WARN,
            path = &args.config,
            "Config file not found, using defaults"
        );
    }
    // setup scaler
    let scaler = Scaler::new(&args, conf)
        .await
        .expect("Scaler failed to initalize");
    // warn about any mapped groups that do not exist
    scaler.validate_groups().await;
    // scale in our fleet once
    scaler.start().await;
}
