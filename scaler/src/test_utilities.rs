//! The utilties for tests involving the scaler

use std::sync::Arc;

use crate::libs::backends::memory::MemoryFleet;
use crate::libs::models::{CapacityGroup, HostSnapshot};
use crate::{Backends, Conf, Mode, Scaler};

#[macro_export]
macro_rules! is {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err($crate::Error::new(format!(
                "Failed == check because the value {:#?} != {:#?}",
                $left, $right
            )));
        }
    };
    ($left:expr, $right:expr, $msg:expr) => {
        if $left != $right {
            return Err($crate::Error::new(format!(
                "Failed == check because {:#?} != {:#?}: Check '{}'",
                $left, $right, $msg
            )));
        }
    };
}

#[macro_export]
macro_rules! is_in {
    ($list:expr, $item:expr) => {
        if !$list.iter().any(|x| *x == $item) {
            return Err($crate::Error::new(format!(
                "Failed is_in check because {:#?} is not in {:#?}",
                $item, $list
            )));
        }
    };
}

#[macro_export]
macro_rules! is_not_in {
    ($list:expr, $item:expr) => {
        if $list.iter().any(|x| *x == $item) {
            return Err($crate::Error::new(format!(
                "Failed \"does not contain\" check because {:#?} is in {:#?}",
                $item, $list
            )));
        }
    };
}

#[macro_export]
macro_rules! is_empty {
    ($val:expr) => {
        if !$val.is_empty() {
            return Err($crate::Error::new(format!(
                "Failed is_empty check because it contains: {:#?}",
                $val
            )));
        }
    };
}

/// Build a host that lives in a test fleet
///
/// The agent for a host is always `agent-<host>`.
///
/// # Arguments
///
/// * `host` - The id of this host
/// * `running` - The number of running tasks
/// * `pending` - The number of pending tasks
/// * `remaining_memory` - The memory units this host still has free
pub fn host(host: &str, running: u32, pending: u32, remaining_memory: i64) -> HostSnapshot {
    HostSnapshot::new(host, format!("agent-{host}"), running, pending, remaining_memory)
}

/// Build a capacity group for a test fleet
///
/// # Arguments
///
/// * `name` - The name of this group
/// * `min_size` - The fewest hosts this group may have
/// * `desired_size` - The number of hosts this group wants
pub fn group(name: &str, min_size: u32, desired_size: u32) -> CapacityGroup {
    CapacityGroup {
        name: name.to_owned(),
        min_size,
        desired_size,
    }
}

/// Build a scaler for a test fleet
///
/// Capacity groups are named after the cluster they back.
///
/// # Arguments
///
/// * `fleet` - The in memory fleet to scale in
pub fn scaler(fleet: &Arc<MemoryFleet>) -> Scaler {
    scaler_with(fleet, Conf::default())
}

/// Build a scaler for a test fleet with a custom config
///
/// # Arguments
///
/// * `fleet` - The in memory fleet to scale in
/// * `conf` - The config to use
pub fn scaler_with(fleet: &Arc<MemoryFleet>, conf: Conf) -> Scaler {
    Scaler::build(conf, Mode::Normal, Backends::shared(fleet.clone()))
}
