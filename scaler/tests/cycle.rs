//! Tests full scale in cycles against an in memory fleet

use std::collections::BTreeMap;
use std::sync::Arc;

use ecscale::models::{Action, ActionResult, Candidate, Decision, NoOpReason};
use ecscale::test_utilities::{self, group, host};
use ecscale::{Conf, Error, MemoryCluster, MemoryFleet, Mode, is, is_empty, is_in, is_not_in};

/// Build a fleet with a single cluster backed by a group of the same name
async fn single(name: &str, cluster: MemoryCluster, min_size: u32, cpu: Option<f64>) -> Arc<MemoryFleet> {
    let fleet = Arc::new(MemoryFleet::new());
    let desired = u32::try_from(cluster.active.len()).unwrap_or_default();
    fleet.cluster(name, cluster.group(name)).await;
    fleet.group(group(name, min_size, desired), cpu).await;
    fleet
}

/// Build a cluster of busy hosts that is ready to be scaled in
fn idle_cluster(prefix: &str) -> MemoryCluster {
    MemoryCluster::new()
        .active(host(&format!("{prefix}-1"), 3, 0, 512))
        .active(host(&format!("{prefix}-2"), 2, 0, 2048))
        .active(host(&format!("{prefix}-3"), 4, 1, 1024))
        .active(host(&format!("{prefix}-4"), 1, 0, 256))
        .active(host(&format!("{prefix}-5"), 5, 0, 128))
        .reservation(50.0)
}

#[tokio::test]
async fn floor_skips_scale_in_but_still_sweeps() -> Result<(), Error> {
    let cluster = MemoryCluster::new()
        .active(host("i-1", 0, 0, 4096))
        .active(host("i-2", 1, 0, 1024))
        .active(host("i-3", 1, 0, 1024))
        .active(host("i-4", 1, 0, 1024))
        .draining(host("i-5", 0, 0, 4096))
        .reservation(10.0);
    let fleet = single("floor", cluster, 4, Some(5.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let decisions = report.decisions();
    is!(
        decisions["floor"],
        [
            Decision::SkipMinState {
                active: 4,
                min_size: 4
            },
            Decision::TerminateDrained(vec!["i-5".to_owned()]),
        ]
        .as_slice()
    );
    // only the drained host was touched
    is!(
        fleet.dispatched().await,
        vec![Action::Terminate {
            host: "i-5".to_owned()
        }]
    );
    is!(fleet.cpu_fetches().await, 0);
    Ok(())
}

#[tokio::test]
async fn projected_reservation_blocks_empty_drains() -> Result<(), Error> {
    let cluster = MemoryCluster::new()
        .active(host("i-1", 0, 0, 4096))
        .active(host("i-2", 2, 0, 1024))
        .active(host("i-3", 3, 0, 512))
        .reservation(50.0);
    let fleet = single("tight", cluster, 1, Some(5.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let reason = NoOpReason::ReservationTooHigh {
        current: 50.0,
        projected: 75.0,
    };
    is!(report.decisions()["tight"], [Decision::NoOp(reason.clone())].as_slice());
    is_empty!(fleet.dispatched().await);
    // cpu is never fetched once memory blocks us
    is!(fleet.cpu_fetches().await, 0);
    Ok(())
}

#[tokio::test]
async fn idle_cluster_drains_its_least_utilized_host() -> Result<(), Error> {
    let fleet = single("idle", idle_cluster("i"), 1, Some(25.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let expected = Candidate::from(&host("i-2", 2, 0, 2048));
    is!(
        report.decisions()["idle"],
        [Decision::ScaleIn(expected.clone())].as_slice()
    );
    is!(
        fleet.dispatched().await,
        vec![Action::Drain {
            host: "i-2".to_owned(),
            agent: "agent-i-2".to_owned()
        }]
    );
    is!(fleet.cpu_fetches().await, 1);
    // the candidate is now draining
    let cluster = fleet.get_cluster("idle").await.ok_or(Error::new("missing cluster"))?;
    is!(cluster.active.len(), 4);
    is!(cluster.draining, vec![host("i-2", 2, 0, 2048)]);
    let outcome = &report.cluster("idle").ok_or(Error::new("missing report"))?.actions;
    is!(outcome.len(), 1);
    is!(outcome[0].result, ActionResult::Done);
    Ok(())
}

#[tokio::test]
async fn busy_cpu_blocks_scale_in() -> Result<(), Error> {
    let fleet = single("hot", idle_cluster("i"), 1, Some(45.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    is!(
        report.decisions()["hot"],
        [Decision::NoOp(NoOpReason::CpuTooHigh { cpu: 45.0 })].as_slice()
    );
    is_empty!(fleet.dispatched().await);
    Ok(())
}

#[tokio::test]
async fn missing_cpu_fails_closed() -> Result<(), Error> {
    let fleet = single("quiet", idle_cluster("i"), 1, None).await;
    let report = test_utilities::scaler(&fleet).start().await;
    is!(
        report.decisions()["quiet"],
        [Decision::NoOp(NoOpReason::MissingCpu)].as_slice()
    );
    is_empty!(fleet.dispatched().await);
    Ok(())
}

#[tokio::test]
async fn draining_hosts_with_tasks_are_kept() -> Result<(), Error> {
    let cluster = MemoryCluster::new()
        .active(host("i-1", 2, 0, 1024))
        .active(host("i-2", 2, 0, 1024))
        .draining(host("i-3", 0, 2, 1024))
        .draining(host("i-4", 1, 0, 1024))
        .reservation(80.0);
    let fleet = single("busy", cluster, 1, Some(5.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let decisions = report.decisions()["busy"];
    is!(decisions.len(), 1);
    is!(
        matches!(decisions[0], Decision::NoOp(NoOpReason::ReservationTooHigh { .. })),
        true
    );
    is_empty!(fleet.dispatched().await);
    let cluster = fleet.get_cluster("busy").await.ok_or(Error::new("missing cluster"))?;
    is!(cluster.draining.len(), 2);
    Ok(())
}

#[tokio::test]
async fn drained_hosts_are_terminated_and_decremented() -> Result<(), Error> {
    let cluster = idle_cluster("i")
        .draining(host("i-6", 0, 0, 4096))
        .draining(host("i-7", 0, 1, 4096));
    let fleet = single("sweep", cluster, 1, Some(50.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    is_in!(
        report.decisions()["sweep"],
        Decision::TerminateDrained(vec!["i-6".to_owned()])
    );
    is_in!(
        fleet.dispatched().await,
        Action::Terminate {
            host: "i-6".to_owned()
        }
    );
    let group = fleet.get_group("sweep").await.ok_or(Error::new("missing group"))?;
    is!(group.desired_size, 4);
    Ok(())
}

#[tokio::test]
async fn empty_candidates_are_only_drained_once() -> Result<(), Error> {
    let cluster = idle_cluster("i").active(host("i-6", 0, 0, 8192));
    let fleet = single("empty", cluster, 1, Some(10.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let mut empty = BTreeMap::default();
    empty.insert("i-6".to_owned(), "agent-i-6".to_owned());
    let expected = Candidate::from(&host("i-6", 0, 0, 8192));
    // reservation 50 over 6 hosts projects to 60 which passes
    is!(
        report.decisions()["empty"],
        [
            Decision::DrainEmpty(empty.clone()),
            Decision::ScaleIn(expected.clone())
        ]
        .as_slice()
    );
    is!(
        fleet.dispatched().await,
        vec![Action::Drain {
            host: "i-6".to_owned(),
            agent: "agent-i-6".to_owned()
        }]
    );
    Ok(())
}

#[tokio::test]
async fn empty_drains_never_pass_the_minimum_size() -> Result<(), Error> {
    let cluster = MemoryCluster::new()
        .active(host("i-1", 0, 0, 4096))
        .active(host("i-2", 0, 0, 4096))
        .active(host("i-3", 0, 0, 4096))
        .active(host("i-4", 2, 0, 1024))
        .active(host("i-5", 3, 0, 1024))
        .reservation(10.0);
    let fleet = single("floored", cluster, 4, Some(5.0)).await;
    test_utilities::scaler(&fleet).start().await;
    // only one host could be spared
    is!(
        fleet.dispatched().await,
        vec![Action::Drain {
            host: "i-1".to_owned(),
            agent: "agent-i-1".to_owned()
        }]
    );
    let cluster = fleet.get_cluster("floored").await.ok_or(Error::new("missing cluster"))?;
    is!(cluster.active.len(), 4);
    Ok(())
}

#[tokio::test]
async fn dry_runs_decide_the_same_without_acting() -> Result<(), Error> {
    let cluster = idle_cluster("i")
        .active(host("i-6", 0, 0, 8192))
        .draining(host("i-7", 0, 0, 4096));
    let fleet = single("dry", cluster, 1, Some(10.0)).await;
    let before = fleet.get_cluster("dry").await;
    let scaler = test_utilities::scaler(&fleet);
    let dry = scaler.run_cycle(Mode::Dry).await;
    is!(dry.dry_run, true);
    // nothing in the fleet changed
    is_empty!(fleet.dispatched().await);
    is!(fleet.get_cluster("dry").await, before);
    let actions = &dry.cluster("dry").ok_or(Error::new("missing report"))?.actions;
    is!(actions.len(), 2);
    for outcome in actions {
        is!(outcome.result, ActionResult::DryRun);
    }
    // a normal cycle over the same fleet makes the same decisions
    let normal = scaler.run_cycle(Mode::Normal).await;
    is!(dry.decisions(), normal.decisions());
    is!(fleet.dispatched().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_actions_do_not_stop_the_cycle() -> Result<(), Error> {
    let fleet = Arc::new(MemoryFleet::new());
    for name in ["alpha", "beta"] {
        fleet.cluster(name, idle_cluster(name).group(name)).await;
        fleet.group(group(name, 1, 5), Some(10.0)).await;
    }
    fleet.fail_actions("agent-alpha-2").await;
    let report = test_utilities::scaler(&fleet).start().await;
    let alpha = report.cluster("alpha").ok_or(Error::new("missing alpha"))?;
    is!(alpha.failures(), 1);
    let beta = report.cluster("beta").ok_or(Error::new("missing beta"))?;
    is!(beta.failures(), 0);
    // the failed drain left alpha untouched
    is_not_in!(
        fleet.dispatched().await,
        Action::Drain {
            host: "alpha-2".to_owned(),
            agent: "agent-alpha-2".to_owned()
        }
    );
    is!(
        fleet.dispatched().await,
        vec![Action::Drain {
            host: "beta-2".to_owned(),
            agent: "agent-beta-2".to_owned()
        }]
    );
    Ok(())
}

#[tokio::test]
async fn broken_clusters_are_skipped() -> Result<(), Error> {
    let fleet = Arc::new(MemoryFleet::new());
    for name in ["alpha", "beta"] {
        fleet.cluster(name, idle_cluster(name).group(name)).await;
        fleet.group(group(name, 1, 5), Some(10.0)).await;
    }
    fleet.break_cluster("alpha").await;
    let report = test_utilities::scaler(&fleet).start().await;
    let alpha = report.cluster("alpha").ok_or(Error::new("missing alpha"))?;
    is!(alpha.skipped.is_some(), true);
    is_empty!(alpha.decisions);
    is!(report.decisions()["beta"].len(), 1);
    is!(fleet.dispatched().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn clusters_without_active_hosts_are_skipped() -> Result<(), Error> {
    let cluster = MemoryCluster::new().draining(host("i-1", 0, 0, 1024));
    let fleet = single("gone", cluster, 0, Some(10.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let gone = report.cluster("gone").ok_or(Error::new("missing report"))?;
    is!(gone.skipped.as_deref(), Some("no active hosts"));
    is_empty!(fleet.dispatched().await);
    Ok(())
}

#[tokio::test]
async fn unlistable_fleets_report_an_error() -> Result<(), Error> {
    let fleet = single("idle", idle_cluster("i"), 1, Some(10.0)).await;
    fleet.break_listing().await;
    let report = test_utilities::scaler(&fleet).start().await;
    is!(report.error.is_some(), true);
    is_empty!(report.clusters);
    is_empty!(fleet.dispatched().await);
    Ok(())
}

#[tokio::test]
async fn excluded_clusters_are_never_touched() -> Result<(), Error> {
    let fleet = single("awseb-env-1", idle_cluster("i"), 1, Some(10.0)).await;
    let report = test_utilities::scaler(&fleet).start().await;
    is_in!(report.excluded, "awseb-env-1".to_owned());
    is_empty!(report.clusters);
    is_empty!(fleet.dispatched().await);
    Ok(())
}

#[tokio::test]
async fn missing_groups_only_sweep() -> Result<(), Error> {
    let fleet = Arc::new(MemoryFleet::new());
    let cluster = idle_cluster("i").draining(host("i-6", 0, 0, 1024));
    fleet.cluster("orphan", cluster).await;
    let report = test_utilities::scaler(&fleet).start().await;
    let reason = NoOpReason::NoCapacityGroup {
        group: "orphan".to_owned(),
    };
    is!(
        report.decisions()["orphan"],
        [
            Decision::TerminateDrained(vec!["i-6".to_owned()]),
            Decision::NoOp(reason.clone())
        ]
        .as_slice()
    );
    is!(fleet.cpu_fetches().await, 0);
    Ok(())
}

#[tokio::test]
async fn explicit_group_mappings_are_used() -> Result<(), Error> {
    let fleet = Arc::new(MemoryFleet::new());
    fleet.cluster("web", idle_cluster("web").group("web-fleet")).await;
    fleet.group(group("web-fleet", 1, 5), Some(10.0)).await;
    let mut conf = Conf::default();
    conf.scaler
        .groups
        .insert("web".to_owned(), "web-fleet".to_owned());
    conf.scaler
        .groups
        .insert("api".to_owned(), "api-fleet".to_owned());
    let scaler = test_utilities::scaler_with(&fleet, conf);
    // only the api mapping points at a missing group
    let unresolved = scaler.validate_groups().await;
    is!(unresolved, vec!["api".to_owned()]);
    let report = scaler.start().await;
    is!(
        report.decisions()["web"],
        [Decision::ScaleIn(Candidate::from(&host("web-2", 2, 0, 2048)))].as_slice()
    );
    is_in!(
        fleet.dispatched().await,
        Action::Drain {
            host: "web-2".to_owned(),
            agent: "agent-web-2".to_owned()
        }
    );
    Ok(())
}

#[tokio::test]
async fn disabled_empty_drains_still_scale_in() -> Result<(), Error> {
    let cluster = idle_cluster("i").active(host("i-6", 0, 0, 64));
    let fleet = single("nodrain", cluster, 1, Some(10.0)).await;
    let mut conf = Conf::default();
    conf.scaler.drain_all_empty_instances = false;
    let report = test_utilities::scaler_with(&fleet, conf).start().await;
    is!(
        report.decisions()["nodrain"],
        [Decision::ScaleIn(Candidate::from(&host("i-2", 2, 0, 2048)))].as_slice()
    );
    is!(fleet.dispatched().await.len(), 1);
    Ok(())
}
