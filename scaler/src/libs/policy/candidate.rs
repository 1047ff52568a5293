//! Picks the single host that is cheapest to scale in

use std::cmp::Ordering;

use crate::libs::models::{Candidate, HostSnapshot};

/// Order two hosts by how good of a scale in candidate they are
///
/// More free memory wins, then fewer running tasks, then the lower host id so
/// the result never depends on the order hosts were listed in.
fn better(left: &HostSnapshot, right: &HostSnapshot) -> Ordering {
    left.remaining_memory
        .cmp(&right.remaining_memory)
        .then_with(|| right.running.cmp(&left.running))
        .then_with(|| right.host_id.cmp(&left.host_id))
}

/// Pick the host with the most free memory and the fewest running tasks
///
/// Returns `None` if there are no hosts to pick from.
///
/// # Arguments
///
/// * `active` - The active hosts to pick from
pub fn select(active: &[HostSnapshot]) -> Option<Candidate> {
    active
        .iter()
        .max_by(|left, right| better(left, right))
        .map(Candidate::from)
}
