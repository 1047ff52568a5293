//! The errors that may occur while scaling in a fleet

/// Implement `From` for an AWS SDK operation error by keeping only its metadata
macro_rules! aws_error {
    ($service:expr, $error:ty) => {
        impl From<$error> for Error {
            fn from(error: $error) -> Self {
                // cast this error into a service error
                let service_error = error.into_service_error();
                // get this errors metadata
                let meta = service_error.meta();
                Error::Aws {
                    service: $service,
                    code: meta.code().map(ToOwned::to_owned),
                    message: meta.message().map(ToOwned::to_owned),
                }
            }
        }
    };
}

/// An error from the ecscale scaler
#[derive(Debug)]
pub enum Error {
    /// A generic scaler error
    Generic(String),
    /// A config error
    Config(config::ConfigError),
    /// An IO Error
    IO(std::io::Error),
    /// An error from converting a value with `serde_json`
    SerdeJson(serde_json::Error),
    /// An error returned by an AWS service
    Aws {
        service: &'static str,
        code: Option<String>,
        message: Option<String>,
    },
    /// A field we rely on was missing from a collaborator's response
    MissingField(&'static str),
}

impl Error {
    /// Create a new generic error
    ///
    /// # Arguments
    ///
    /// * `msg` - The error message to use
    pub fn new<T: Into<String>>(msg: T) -> Self {
        Error::Generic(msg.into())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Generic(err) => write!(f, "{err}"),
            Error::Config(err) => write!(f, "Config Error: {err}"),
            Error::IO(err) => write!(f, "IO Error: {err}"),
            Error::SerdeJson(err) => write!(f, "SerdeJson Error: {err}"),
            Error::Aws {
                service,
                code,
                message,
            } => {
                write!(
                    f,
                    "{service} Error {}: {}",
                    code.clone().unwrap_or_default(),
                    message.clone().unwrap_or_default()
                )
            }
            Error::MissingField(field) => write!(f, "Missing field in response: {field}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerdeJson(error)
    }
}

aws_error!(
    "ECS",
    aws_sdk_ecs::error::SdkError<aws_sdk_ecs::operation::list_clusters::ListClustersError>
);
aws_error!(
    "ECS",
    aws_sdk_ecs::error::SdkError<
        aws_sdk_ecs::operation::list_container_instances::ListContainerInstancesError,
    >
);
aws_error!(
    "ECS",
    aws_sdk_ecs::error::SdkError<
        aws_sdk_ecs::operation::describe_container_instances::DescribeContainerInstancesError,
    >
);
aws_error!(
    "ECS",
    aws_sdk_ecs::error::SdkError<
        aws_sdk_ecs::operation::update_container_instances_state::UpdateContainerInstancesStateError,
    >
);
aws_error!(
    "AutoScaling",
    aws_sdk_autoscaling::error::SdkError<
        aws_sdk_autoscaling::operation::describe_auto_scaling_groups::DescribeAutoScalingGroupsError,
    >
);
aws_error!(
    "AutoScaling",
    aws_sdk_autoscaling::error::SdkError<
        aws_sdk_autoscaling::operation::terminate_instance_in_auto_scaling_group::TerminateInstanceInAutoScalingGroupError,
    >
);
aws_error!(
    "CloudWatch",
    aws_sdk_cloudwatch::error::SdkError<
        aws_sdk_cloudwatch::operation::get_metric_statistics::GetMetricStatisticsError,
    >
);
