//! Decides how a single cluster should be scaled in
//!
//! The checks for a cluster always run in the same order:
//!
//! 1. Is the cluster already at its capacity groups minimum size?
//! 2. Which draining hosts have finished and can be terminated?
//! 3. Do current and projected memory reservation leave room to drain?
//! 4. Which empty hosts should be drained?
//! 5. Is the cluster idle enough to drain its least utilized host?
//!
//! Empty drains and the scale in candidate together never take a cluster below
//! its capacity groups minimum size.
//!
//! The draining sweep runs even when the minimum size check fires since
//! terminating hosts that are already draining does not remove active capacity.
//! Everything after the sweep is skipped in that case.

use std::collections::BTreeMap;
use std::future::Future;
use tracing::{Level, event};

use crate::conf::ScalerSettings;
use crate::libs::models::{ClusterSnapshot, Decision, NoOpReason};

pub mod candidate;
pub mod classifier;
pub mod gate;

use gate::Reservation;

/// Makes scale in decisions for clusters
pub struct ScalePolicy<'a> {
    /// The settings to make decisions with
    settings: &'a ScalerSettings,
}

impl<'a> ScalePolicy<'a> {
    /// Create a new scale policy
    ///
    /// # Arguments
    ///
    /// * `settings` - The settings to make decisions with
    pub fn new(settings: &'a ScalerSettings) -> Self {
        ScalePolicy { settings }
    }

    /// Decide what to do with a single cluster
    ///
    /// The capacity groups cpu is only fetched if every other scale in check passes.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Everything we know about this cluster
    /// * `cpu` - Fetches the capacity groups average cpu utilization
    pub async fn plan<F, Fut>(&self, snapshot: &ClusterSnapshot, cpu: F) -> Vec<Decision>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<f64>>,
    {
        // track the decisions we make in order
        let mut decisions = Vec::with_capacity(3);
        let active = snapshot.active.len();
        // check our minimum size before anything else
        let floor = snapshot
            .group
            .as_ref()
            .and_then(|group| gate::min_floor(active, group));
        let at_floor = floor.is_some();
        if let Some(floor) = floor {
            event!(
                Level::INFO,
                cluster = &snapshot.cluster,
                active,
                "Cluster is at its minimum size, skipping scale in"
            );
            decisions.push(floor);
        }
        // terminate any hosts that have finished draining
        let draining = classifier::draining(&snapshot.draining);
        let drained = classifier::drained(&draining, &snapshot.draining);
        if !drained.is_empty() {
            decisions.push(Decision::TerminateDrained(drained));
        }
        // nothing else is allowed if we are at our floor
        if at_floor {
            return decisions;
        }
        // we cannot scale in without knowing our capacity group
        let Some(group) = snapshot.group.as_ref() else {
            let group = self.settings.group_name(&snapshot.cluster);
            decisions.push(Decision::NoOp(NoOpReason::NoCapacityGroup { group }));
            return decisions;
        };
        // make sure there is room in the cluster to drain hosts
        let current = match gate::reservation(self.settings, snapshot.memory_reservation, active)
        {
            Reservation::Open(current) => current,
            Reservation::Closed(reason) => {
                decisions.push(Decision::NoOp(reason));
                return decisions;
            }
        };
        // the number of hosts we can drain without dropping below our minimum size
        let mut headroom = gate::headroom(active, group);
        // drain any empty hosts
        let mut empty = if self.settings.drain_all_empty_instances {
            classifier::empty(&snapshot.active)
        } else {
            BTreeMap::default()
        };
        if !empty.is_empty() {
            if empty.len() > headroom {
                event!(
                    Level::INFO,
                    cluster = &snapshot.cluster,
                    empty = empty.len(),
                    headroom,
                    "Only draining empty hosts down to the minimum size"
                );
                empty = empty.into_iter().take(headroom).collect();
            }
            headroom -= empty.len();
            if !empty.is_empty() {
                decisions.push(Decision::DrainEmpty(empty.clone()));
            }
        }
        // only scale in busy hosts if memory reservation is low enough
        if !gate::memory_allows_scale_in(self.settings, current) {
            decisions.push(Decision::NoOp(NoOpReason::MemoryAboveScaleIn { current }));
            return decisions;
        }
        // make sure our capacity group is idle enough
        if let Err(reason) = gate::cpu(self.settings, cpu().await) {
            decisions.push(Decision::NoOp(reason));
            return decisions;
        }
        // pick the host to scale in
        match candidate::select(&snapshot.active) {
            // a candidate that is already being drained as empty costs no headroom
            Some(candidate) if headroom > 0 || empty.contains_key(&candidate.host_id) => {
                decisions.push(Decision::ScaleIn(candidate));
            }
            Some(_) => decisions.push(Decision::NoOp(NoOpReason::FloorReached {
                min_size: group.min_size,
            })),
            None => decisions.push(Decision::NoOp(NoOpReason::NoActiveHosts)),
        }
        decisions
    }
}
