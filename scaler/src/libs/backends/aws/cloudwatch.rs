use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, Statistic};
use chrono::prelude::*;
use tracing::{Level, event, instrument};

use crate::Error;
use crate::libs::models::MetricWindow;

/// Get the average from the newest datapoint that has one
///
/// # Arguments
///
/// * `datapoints` - The datapoints CloudWatch returned
fn newest_average(datapoints: &[Datapoint]) -> Option<f64> {
    datapoints
        .iter()
        .filter(|point| point.average().is_some())
        .max_by_key(|point| point.timestamp().map(DateTime::secs))
        .and_then(|point| point.average())
}

/// Wrapper for CloudWatch commands
pub struct CloudWatch {
    /// API client for CloudWatch
    client: Client,
}

impl CloudWatch {
    /// Build a new wrapper for CloudWatch commands
    ///
    /// # Arguments
    ///
    /// * `shared` - The shared AWS config
    pub fn new(shared: &aws_types::SdkConfig) -> Self {
        CloudWatch {
            client: Client::new(shared),
        }
    }

    /// Get the most recent average of a metric within a window
    ///
    /// Returns `None` if CloudWatch has no datapoints for this window.
    ///
    /// # Arguments
    ///
    /// * `namespace` - The namespace this metric is in
    /// * `metric` - The name of the metric
    /// * `dimension` - The dimension name and value to filter on
    /// * `window` - The window to average over
    #[instrument(name = "CloudWatch::average", skip(self), err(Debug))]
    pub async fn average(
        &self,
        namespace: &str,
        metric: &str,
        dimension: (&str, &str),
        window: MetricWindow,
    ) -> Result<Option<f64>, Error> {
        // get the bounds of our window
        let lookback = i64::try_from(window.lookback)
            .map_err(|_| Error::new(format!("Metric window {} is too large", window.lookback)))?;
        let period = i32::try_from(window.period)
            .map_err(|_| Error::new(format!("Metric period {} is too large", window.period)))?;
        let end = Utc::now();
        let start = end - chrono::Duration::seconds(lookback);
        // build the dimension to filter on
        let dimension = Dimension::builder()
            .name(dimension.0)
            .value(dimension.1)
            .build();
        let resp = self
            .client
            .get_metric_statistics()
            .namespace(namespace)
            .metric_name(metric)
            .dimensions(dimension)
            .start_time(DateTime::from_secs(start.timestamp()))
            .end_time(DateTime::from_secs(end.timestamp()))
            .period(period)
            .statistics(Statistic::Average)
            .send()
            .await?;
        let average = newest_average(resp.datapoints());
        if average.is_none() {
            event!(Level::WARN, namespace, metric, "No datapoints returned");
        }
        Ok(average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(secs: i64, average: Option<f64>) -> Datapoint {
        Datapoint::builder()
            .timestamp(DateTime::from_secs(secs))
            .set_average(average)
            .build()
    }

    #[test]
    fn newest_datapoint_wins() {
        let points = [point(60, Some(40.0)), point(180, Some(12.5)), point(120, Some(90.0))];
        assert_eq!(newest_average(&points), Some(12.5));
    }

    #[test]
    fn no_datapoints_is_absent() {
        assert_eq!(newest_average(&[]), None);
    }

    #[test]
    fn datapoints_without_an_average_are_skipped() {
        let points = [point(60, Some(33.0)), point(120, None)];
        assert_eq!(newest_average(&points), Some(33.0));
        assert_eq!(newest_average(&[point(120, None)]), None);
    }
}
