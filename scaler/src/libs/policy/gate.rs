//! The threshold checks that gate scale in for a cluster

use crate::conf::ScalerSettings;
use crate::libs::models::{CapacityGroup, Decision, NoOpReason};

/// The reservation we project when a cluster cannot lose a host
const SATURATED: f64 = 100.0;

/// Project what a clusters reservation would be with one fewer active host
///
/// A cluster with one host or less cannot be projected and is treated as saturated.
///
/// # Arguments
///
/// * `current` - The current reservation
/// * `active` - The number of active hosts
pub fn projected_reservation(current: f64, active: usize) -> f64 {
    if active > 1 {
        current * active as f64 / (active - 1) as f64
    } else {
        SATURATED
    }
}

/// Check if a cluster is already at its groups minimum size
///
/// # Arguments
///
/// * `active` - The number of active hosts
/// * `group` - The capacity group backing this cluster
pub fn min_floor(active: usize, group: &CapacityGroup) -> Option<Decision> {
    // widen so huge groups compare correctly on any platform
    if active as u64 <= u64::from(group.min_size) {
        Some(Decision::SkipMinState {
            active,
            min_size: group.min_size,
        })
    } else {
        None
    }
}

/// Get how many hosts a cluster can lose before reaching its groups minimum size
///
/// # Arguments
///
/// * `active` - The number of active hosts
/// * `group` - The capacity group backing this cluster
pub fn headroom(active: usize, group: &CapacityGroup) -> usize {
    let min_size = usize::try_from(group.min_size).unwrap_or(usize::MAX);
    active.saturating_sub(min_size)
}

/// The outcome of the memory reservation gate
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// Draining is allowed and this is the current reservation
    Open(f64),
    /// Draining is not allowed
    Closed(NoOpReason),
}

/// Check that current and projected memory reservation leave room to drain
///
/// A missing sample closes the gate.
///
/// # Arguments
///
/// * `settings` - The scaler settings to check against
/// * `current` - The current memory reservation sample
/// * `active` - The number of active hosts
pub fn reservation(settings: &ScalerSettings, current: Option<f64>, active: usize) -> Reservation {
    let current = match current {
        Some(current) => current,
        None => return Reservation::Closed(NoOpReason::MissingMemoryReservation),
    };
    let projected = projected_reservation(current, active);
    if current < settings.future_mem_threshold && projected < settings.future_mem_threshold {
        Reservation::Open(current)
    } else {
        Reservation::Closed(NoOpReason::ReservationTooHigh { current, projected })
    }
}

/// Check if a cluster is idle enough to scale in a busy host
///
/// # Arguments
///
/// * `settings` - The scaler settings to check against
/// * `current` - The current memory reservation
pub fn memory_allows_scale_in(settings: &ScalerSettings, current: f64) -> bool {
    current < settings.scale_in_mem_threshold
}

/// Check a capacity groups cpu utilization against our threshold
///
/// A missing sample is disqualifying.
///
/// # Arguments
///
/// * `settings` - The scaler settings to check against
/// * `cpu` - The cpu utilization sample
pub fn cpu(settings: &ScalerSettings, cpu: Option<f64>) -> Result<f64, NoOpReason> {
    match cpu {
        Some(cpu) if cpu < settings.scale_in_cpu_threshold => Ok(cpu),
        Some(cpu) => Err(NoOpReason::CpuTooHigh { cpu }),
        None => Err(NoOpReason::MissingCpu),
    }
}
