use clap::Parser;

use crate::conf::Conf;

/// The Command line args to pass to the scaler
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, author)]
pub struct Args {
    /// The path to load the config file from
    #[clap(short, long, default_value = "ecscale.yml")]
    pub config: String,
    /// Only log the drains and terminations we would perform
    #[clap(long, default_value_t)]
    pub dry_run: bool,
    /// Scale in only when the capacity groups average cpu is below this percent
    #[clap(long)]
    pub scale_in_cpu_threshold: Option<f64>,
    /// Scale in only when cluster memory reservation is below this percent
    #[clap(long)]
    pub scale_in_mem_threshold: Option<f64>,
    /// Current and projected memory reservation must be below this percent to drain
    #[clap(long)]
    pub future_mem_threshold: Option<f64>,
    /// Whether to drain hosts with no running or pending tasks
    #[clap(long)]
    pub drain_all_empty_instances: Option<bool>,
    /// Skip clusters whose name contains this substring
    #[clap(long)]
    pub cluster_exclusion_substring: Option<String>,
    /// The prefix to add to cluster names to find their capacity group
    #[clap(long)]
    pub group_prefix: Option<String>,
    /// The suffix to add to cluster names to find their capacity group
    #[clap(long)]
    pub group_suffix: Option<String>,
}

impl Args {
    /// Overlay any command line overrides onto a loaded config
    ///
    /// # Arguments
    ///
    /// * `conf` - The config to overlay our overrides onto
    pub fn overlay(&self, mut conf: Conf) -> Conf {
        // get our scaler settings
        let settings = &mut conf.scaler;
        if let Some(threshold) = self.scale_in_cpu_threshold {
            settings.scale_in_cpu_threshold = threshold;
        }
        if let Some(threshold) = self.scale_in_mem_threshold {
            settings.scale_in_mem_threshold = threshold;
        }
        if let Some(threshold) = self.future_mem_threshold {
            settings.future_mem_threshold = threshold;
        }
        if let Some(drain) = self.drain_all_empty_instances {
            settings.drain_all_empty_instances = drain;
        }
        if let Some(substring) = &self.cluster_exclusion_substring {
            settings.cluster_exclusion_substring.clone_from(substring);
        }
        if let Some(prefix) = &self.group_prefix {
            settings.group_prefix.clone_from(prefix);
        }
        if let Some(suffix) = &self.group_suffix {
            settings.group_suffix.clone_from(suffix);
        }
        conf
    }
}
