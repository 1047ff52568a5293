//! Splits a clusters hosts into the groups the scaler acts on

use std::collections::BTreeMap;

use crate::libs::models::HostSnapshot;

/// Get the hosts with no running or pending tasks
///
/// # Arguments
///
/// * `active` - The active hosts in a cluster
pub fn empty(active: &[HostSnapshot]) -> BTreeMap<String, String> {
    active
        .iter()
        .filter(|host| host.is_empty())
        .map(|host| (host.host_id.clone(), host.agent.clone()))
        .collect()
}

/// Get every listed draining host
///
/// Being listed as draining is all it takes to be classified as draining.
///
/// # Arguments
///
/// * `draining` - The draining hosts in a cluster
pub fn draining(draining: &[HostSnapshot]) -> BTreeMap<String, String> {
    draining
        .iter()
        .map(|host| (host.host_id.clone(), host.agent.clone()))
        .collect()
}

/// Get the draining hosts that have finished all of their work
///
/// A host missing from the snapshot is not drained yet.
///
/// # Arguments
///
/// * `draining` - The draining hosts (host id -> agent id)
/// * `snapshot` - The draining host snapshot to look task counts up in
pub fn drained(draining: &BTreeMap<String, String>, snapshot: &[HostSnapshot]) -> Vec<String> {
    draining
        .keys()
        .filter(|host_id| {
            snapshot
                .iter()
                .find(|host| &host.host_id == *host_id)
                .is_some_and(|host| host.tasks() == 0)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(id: &str, running: u32, pending: u32) -> HostSnapshot {
        HostSnapshot::new(id, format!("arn:agent/{id}"), running, pending, 1024)
    }

    #[test]
    fn empty_only_keeps_idle_hosts() {
        let hosts = vec![
            host("i-idle", 0, 0),
            host("i-pending", 0, 2),
            host("i-running", 4, 0),
            host("i-busy", 1, 1),
        ];
        let empty = empty(&hosts);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty.get("i-idle").map(String::as_str), Some("arn:agent/i-idle"));
    }

    #[test]
    fn empty_inputs_yield_empty_mappings() {
        assert!(empty(&[]).is_empty());
        assert!(draining(&[]).is_empty());
        assert!(drained(&BTreeMap::default(), &[]).is_empty());
    }

    #[test]
    fn draining_keeps_every_listed_host() {
        let hosts = vec![host("i-1", 3, 0), host("i-2", 0, 0)];
        let draining = draining(&hosts);
        assert_eq!(draining.len(), 2);
        assert!(draining.contains_key("i-1"));
        assert!(draining.contains_key("i-2"));
    }

    #[test]
    fn drained_skips_busy_and_unknown_hosts() {
        let snapshot = vec![host("i-done", 0, 0), host("i-pending", 0, 2)];
        let mut listed = draining(&snapshot);
        // a host we were told about but that is missing from the snapshot
        listed.insert("i-ghost".to_owned(), "arn:agent/i-ghost".to_owned());
        assert_eq!(drained(&listed, &snapshot), vec!["i-done".to_owned()]);
    }
}
