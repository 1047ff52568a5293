//! Tests loading the ecscale config

use std::io::Write;

use ecscale::conf::{ConfSource, LogFormat};
use ecscale::{Conf, Error, is};

#[test]
fn missing_files_use_defaults() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let (conf, source) = Conf::load(dir.path().join("missing.yml"))?;
    is!(source, ConfSource::Defaults);
    is!(conf.scaler.scale_in_cpu_threshold, 30.0);
    is!(conf.scaler.future_mem_threshold, 70.0);
    is!(conf.aws.region, "us-east-1");
    Ok(())
}

#[test]
fn files_and_env_overlay_defaults() -> Result<(), Error> {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile()?;
    writeln!(
        file,
        "scaler:\n  scale_in_mem_threshold: 50\n  groups:\n    web: web-fleet\naws:\n  region: us-west-2\ntracing:\n  format: Json"
    )?;
    let (conf, source) = Conf::load(file.path())?;
    is!(source, ConfSource::File);
    is!(conf.scaler.scale_in_mem_threshold, 50.0);
    is!(conf.scaler.group_name("web"), "web-fleet");
    is!(conf.scaler.group_name("api"), "api");
    is!(conf.aws.region, "us-west-2");
    is!(conf.tracing.format, LogFormat::Json);
    // untouched values keep their defaults
    is!(conf.scaler.future_mem_threshold, 70.0);
    // environment variables win over the file
    // this is the only test in this binary that touches the environment
    unsafe { std::env::set_var("ECSCALE__SCALER__GROUP_SUFFIX", "-asg") };
    let conf = Conf::new(file.path());
    unsafe { std::env::remove_var("ECSCALE__SCALER__GROUP_SUFFIX") };
    let conf = conf?;
    is!(conf.scaler.group_name("api"), "api-asg");
    Ok(())
}

#[test]
fn invalid_thresholds_are_rejected() -> Result<(), Error> {
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile()?;
    writeln!(
        file,
        "scaler:\n  scale_in_mem_threshold: 90\n  future_mem_threshold: 70"
    )?;
    is!(Conf::new(file.path()).is_err(), true);
    Ok(())
}
