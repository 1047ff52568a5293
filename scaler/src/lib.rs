//! The scaler responsible for scaling in ECS clusters

pub mod args;
pub mod conf;
mod error;
mod libs;
pub mod trace;

pub use args::Args;
pub use conf::Conf;
pub use error::Error;
pub use libs::backends::{self, Backends, Dispatcher, DryRun, Inventory, Metrics};
pub use libs::models;
pub use libs::policy;
pub use libs::{Mode, Scaler};

// these are only for tests
#[cfg(feature = "test-utilities")]
pub use libs::backends::memory::{MemoryCluster, MemoryFleet};

// expose test utilities if that feature is enabled
#[cfg(feature = "test-utilities")]
pub mod test_utilities;
