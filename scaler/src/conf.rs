//! The config for the ecscale scaler
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::Error;

/// The longest metric window in seconds we will ask CloudWatch for
pub const MAX_METRIC_WINDOW: u64 = 86_400;

/// Helps serde default a value to true
fn default_true() -> bool {
    true
}

/// Helps serde default the scale in cpu threshold to 30%
fn default_scale_in_cpu_threshold() -> f64 {
    30.0
}

/// Helps serde default the scale in memory threshold to 60%
fn default_scale_in_mem_threshold() -> f64 {
    60.0
}

/// Helps serde default the future memory threshold to 70%
fn default_future_mem_threshold() -> f64 {
    70.0
}

/// Helps serde default the cluster exclusion substring
fn default_cluster_exclusion_substring() -> String {
    "awseb".to_owned()
}

/// Helps serde default the metric lookback window to 2 minutes
fn default_metric_window() -> u64 {
    120
}

/// Helps serde default the metric granularity to 1 minute
fn default_metric_period() -> u64 {
    60
}

/// The settings that drive scale in decisions
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScalerSettings {
    /// Scale in is only allowed when a groups average cpu is below this percent
    #[serde(default = "default_scale_in_cpu_threshold")]
    pub scale_in_cpu_threshold: f64,
    /// Scale in is only allowed when cluster memory reservation is below this percent
    #[serde(default = "default_scale_in_mem_threshold")]
    pub scale_in_mem_threshold: f64,
    /// Current and projected memory reservation must both be below this percent
    /// before any host is drained
    #[serde(default = "default_future_mem_threshold")]
    pub future_mem_threshold: f64,
    /// Whether hosts with no running or pending tasks should be drained
    #[serde(default = "default_true")]
    pub drain_all_empty_instances: bool,
    /// Clusters whose name contains this substring are never touched
    #[serde(default = "default_cluster_exclusion_substring")]
    pub cluster_exclusion_substring: String,
    /// The prefix to add to a cluster name to get its capacity group name
    #[serde(default)]
    pub group_prefix: String,
    /// The suffix to add to a cluster name to get its capacity group name
    #[serde(default)]
    pub group_suffix: String,
    /// Explicit cluster name to capacity group name mappings
    #[serde(default)]
    pub groups: BTreeMap<String, String>,
    /// How far back to look when fetching metrics in seconds
    #[serde(default = "default_metric_window")]
    pub metric_window: u64,
    /// The granularity of fetched metrics in seconds
    #[serde(default = "default_metric_period")]
    pub metric_period: u64,
}

impl Default for ScalerSettings {
    fn default() -> Self {
        ScalerSettings {
            scale_in_cpu_threshold: default_scale_in_cpu_threshold(),
            scale_in_mem_threshold: default_scale_in_mem_threshold(),
            future_mem_threshold: default_future_mem_threshold(),
            drain_all_empty_instances: true,
            cluster_exclusion_substring: default_cluster_exclusion_substring(),
            group_prefix: String::default(),
            group_suffix: String::default(),
            groups: BTreeMap::default(),
            metric_window: default_metric_window(),
            metric_period: default_metric_period(),
        }
    }
}

impl ScalerSettings {
    /// Get the name of the capacity group for a cluster
    ///
    /// Explicit mappings win over the prefix/suffix convention.
    ///
    /// # Arguments
    ///
    /// * `cluster` - The name of the cluster to get a group name for
    pub fn group_name(&self, cluster: &str) -> String {
        match self.groups.get(cluster) {
            Some(group) => group.clone(),
            None => format!("{}{}{}", self.group_prefix, cluster, self.group_suffix),
        }
    }

    /// Check if a cluster should be skipped entirely
    ///
    /// # Arguments
    ///
    /// * `cluster` - The name of the cluster to check
    pub fn is_excluded(&self, cluster: &str) -> bool {
        // an empty substring would exclude everything so treat it as disabled
        !self.cluster_exclusion_substring.is_empty()
            && cluster.contains(&self.cluster_exclusion_substring)
    }

    /// Make sure these settings are sane
    pub fn validate(&self) -> Result<(), Error> {
        // make sure all of our thresholds are percentages
        let thresholds = [
            ("scale_in_cpu_threshold", self.scale_in_cpu_threshold),
            ("scale_in_mem_threshold", self.scale_in_mem_threshold),
            ("future_mem_threshold", self.future_mem_threshold),
        ];
        for (name, value) in thresholds {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::new(format!(
                    "{name} must be between 0 and 100 but is {value}"
                )));
            }
        }
        // the scale in threshold is the lower of our two memory thresholds
        if self.scale_in_mem_threshold > self.future_mem_threshold {
            return Err(Error::new(format!(
                "scale_in_mem_threshold ({}) cannot exceed future_mem_threshold ({})",
                self.scale_in_mem_threshold, self.future_mem_threshold
            )));
        }
        // CloudWatch only keeps short period samples for so long
        if self.metric_window > MAX_METRIC_WINDOW {
            return Err(Error::new(format!(
                "metric_window ({}) cannot exceed {MAX_METRIC_WINDOW} seconds",
                self.metric_window
            )));
        }
        // make sure we can actually get a sample from our window
        if self.metric_period == 0 || self.metric_period > self.metric_window {
            return Err(Error::new(format!(
                "metric_period ({}) must be non-zero and no larger than metric_window ({})",
                self.metric_period, self.metric_window
            )));
        }
        Ok(())
    }
}

/// Helps serde default the AWS region
fn default_region() -> String {
    "us-east-1".to_owned()
}

/// The settings for talking to AWS
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Aws {
    /// The region our clusters live in
    #[serde(default = "default_region")]
    pub region: String,
    /// An endpoint override to use instead of the public AWS endpoints
    #[serde(default)]
    pub endpoint: Option<String>,
    /// A static access key to use instead of the environment
    #[serde(default)]
    pub access_key: Option<String>,
    /// A static secret token to use instead of the environment
    #[serde(default)]
    pub secret_token: Option<String>,
}

impl Default for Aws {
    fn default() -> Self {
        Aws {
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_token: None,
        }
    }
}

/// The log level to set
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy, Default)]
pub enum LogLevel {
    /// Do not log any info
    Off,
    /// Log at the error level
    Error,
    /// Log at the warning level
    Warn,
    /// Log at the info level
    #[default]
    Info,
    /// Log at the debug level
    Debug,
    /// Log at the tracing level
    Trace,
}

impl LogLevel {
    /// Cast this log level to a tracing filter
    #[must_use]
    pub fn to_filter(&self) -> tracing_subscriber::filter::LevelFilter {
        match self {
            LogLevel::Off => tracing_subscriber::filter::LevelFilter::OFF,
            LogLevel::Error => tracing_subscriber::filter::LevelFilter::ERROR,
            LogLevel::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            LogLevel::Info => tracing_subscriber::filter::LevelFilter::INFO,
            LogLevel::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            LogLevel::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
        }
    }
}

impl std::fmt::Display for LogLevel {
    /// Allow the log level to be displayed
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LogLevel::Off => write!(f, "Off"),
            LogLevel::Error => write!(f, "Error"),
            LogLevel::Warn => write!(f, "Warn"),
            LogLevel::Info => write!(f, "Info"),
            LogLevel::Debug => write!(f, "Debug"),
            LogLevel::Trace => write!(f, "Trace"),
        }
    }
}

/// How log lines should be formatted
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Copy, Default)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// The tracing settings to use
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Tracing {
    /// The log level to use for stdout
    #[serde(default)]
    pub level: LogLevel,
    /// The format to write log lines in
    #[serde(default)]
    pub format: LogFormat,
}

/// configs for ecscale
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Conf {
    /// The scale in settings
    #[serde(default)]
    pub scaler: ScalerSettings,
    /// The AWS settings
    #[serde(default)]
    pub aws: Aws,
    /// The tracing settings
    #[serde(default)]
    pub tracing: Tracing,
}

/// Where a loaded config came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfSource {
    /// The config file and the environment
    File,
    /// Our defaults and the environment since no config file exists
    Defaults,
}

impl Conf {
    /// Creates a new [Conf] object
    ///
    /// # Arguments
    ///
    /// * `path` - The path to use when reading the config file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::load(path).map(|(conf, _)| conf)
    }

    /// Loads a [Conf] and reports whether the config file existed
    ///
    /// A missing config file falls back to our defaults.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to use when reading the config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, ConfSource), Error> {
        let path = path.as_ref();
        let source = if path.exists() {
            ConfSource::File
        } else {
            ConfSource::Defaults
        };
        let conf: Conf = config::Config::builder()
            // load from a file first
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            // then overlay any environment args ontop
            .add_source(
                config::Environment::with_prefix("ecscale")
                    .try_parsing(true)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        // make sure our scaler settings are sane
        conf.scaler.validate()?;
        Ok((conf, source))
    }
}
