//! End-to-end replication scenarios
//!
//! Each scenario builds a cluster, drives it to quiescence and reports what it
//! observed. The `#[test]`s below assert on the reports; the functions are
//! public so soak runs can call them with other seeds and link conditions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tagsync_core::{EntityId, MutationOutcome, MutationRequest, NodeId, Tag, TagSet};
use tagsync_state::DenyList;

use crate::network::LinkConditions;
use crate::simulator::Cluster;

const MAX_STEPS: usize = 500;

/// Outcome of one scenario run
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub converged: bool,
    pub steps: Option<usize>,
    pub failures: Vec<String>,
}

impl ScenarioReport {
    fn new(name: &'static str) -> Self {
        ScenarioReport {
            name,
            converged: false,
            steps: None,
            failures: Vec::new(),
        }
    }

    fn check(&mut self, ok: bool, what: impl Into<String>) {
        if !ok {
            self.failures.push(what.into());
        }
    }

    fn settle(&mut self, cluster: &mut Cluster, entity: EntityId) {
        self.steps = cluster.run_until_quiet(MAX_STEPS);
        self.converged = cluster.converged(entity);
        self.check(self.steps.is_some(), "cluster never went quiet");
        self.check(self.converged, "replicas disagree with the owner");
    }

    pub fn passed(&self) -> bool {
        self.converged && self.failures.is_empty()
    }
}

fn tag(name: &str) -> Tag {
    match Tag::new(name) {
        Ok(tag) => tag,
        Err(e) => panic!("scenario tag {:?} is malformed: {}", name, e),
    }
}

fn tags(names: &[&str]) -> TagSet {
    names.iter().map(|n| tag(n)).collect()
}

const AUTHORITY: NodeId = NodeId(1);
const OBSERVER: NodeId = NodeId(2);
const ENTITY: EntityId = EntityId(100);

/// Duplicate add on the authority changes nothing the second time
pub fn scenario_duplicate_add(conditions: LinkConditions, seed: u64) -> ScenarioReport {
    let mut report = ScenarioReport::new("duplicate_add");
    let mut cluster = Cluster::new(3, conditions, seed);
    cluster.spawn_entity(ENTITY, AUTHORITY);

    let authority = cluster.component(AUTHORITY, ENTITY);
    let stunned = tag("Status.Stunned");
    if let Some(authority) = authority {
        report.check(
            authority.request_add(stunned.clone()) == MutationOutcome::Changed,
            "first add should change",
        );
        report.check(
            authority.request_add(stunned.clone()) == MutationOutcome::Unchanged,
            "second add should not change",
        );
    }

    report.settle(&mut cluster, ENTITY);
    report.check(
        cluster.authoritative(ENTITY) == Some(tags(&["Status.Stunned"])),
        "authority should hold exactly one tag",
    );
    report
}

/// Batch removal with one absent tag removes what is present
pub fn scenario_partial_remove_batch(conditions: LinkConditions, seed: u64) -> ScenarioReport {
    let mut report = ScenarioReport::new("partial_remove_batch");
    let mut cluster = Cluster::new(3, conditions, seed);
    cluster.spawn_entity(ENTITY, AUTHORITY);

    if let Some(observer) = cluster.component(OBSERVER, ENTITY) {
        observer.request_add_batch(tags(&["A", "B"]));
        report.settle(&mut cluster, ENTITY);

        report.check(
            observer.request_remove_batch(tags(&["B", "C"])) == MutationOutcome::Forwarded,
            "observer should forward",
        );
    }

    report.settle(&mut cluster, ENTITY);
    report.check(
        cluster.authoritative(ENTITY) == Some(tags(&["A"])),
        "only A should remain",
    );
    report
}

/// Every changing snapshot notifies observers exactly once
pub fn scenario_snapshot_notifications(conditions: LinkConditions, seed: u64) -> ScenarioReport {
    let mut report = ScenarioReport::new("snapshot_notifications");
    let mut cluster = Cluster::new(2, conditions, seed);
    cluster.spawn_entity(ENTITY, AUTHORITY);

    let fired = Arc::new(AtomicUsize::new(0));
    if let Some(observer) = cluster.component(OBSERVER, ENTITY) {
        let counter = Arc::clone(&fired);
        observer.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    if let Some(authority) = cluster.component(AUTHORITY, ENTITY) {
        authority.request_add(tag("X"));
        report.settle(&mut cluster, ENTITY);
        authority.request_add_batch(tags(&["X", "Y"]));
        report.settle(&mut cluster, ENTITY);
        // Forced resend of an unchanged set must stay silent
        if let Some(replica) = cluster.replica_mut(AUTHORITY) {
            replica.resync(ENTITY);
        }
        report.settle(&mut cluster, ENTITY);
    }

    report.check(
        fired.load(Ordering::SeqCst) == 2,
        format!("expected 2 notifications, got {}", fired.load(Ordering::SeqCst)),
    );
    report.check(
        cluster
            .component(OBSERVER, ENTITY)
            .map_or(false, |c| c.contains_all(&tags(&["X", "Y"]))),
        "observer should hold X and Y",
    );
    report
}

/// A batch with one denied tag is refused whole
pub fn scenario_denied_batch(conditions: LinkConditions, seed: u64) -> ScenarioReport {
    let mut report = ScenarioReport::new("denied_batch");
    let validator = Arc::new(DenyList::new([tag("Forbidden")]));
    let mut cluster = Cluster::with_validator(3, conditions, seed, validator);
    cluster.spawn_entity(ENTITY, AUTHORITY);

    if let Some(authority) = cluster.component(AUTHORITY, ENTITY) {
        report.check(
            !authority.request_add_batch(tags(&["A", "Forbidden"])).changed(),
            "authority batch should be rejected",
        );
    }
    if let Some(observer) = cluster.component(OBSERVER, ENTITY) {
        observer.request_add_batch(tags(&["B", "Forbidden"]));
    }

    report.settle(&mut cluster, ENTITY);
    report.check(
        cluster.authoritative(ENTITY) == Some(TagSet::new()),
        "set should stay empty",
    );
    report.check(
        cluster
            .replica(AUTHORITY)
            .map_or(false, |r| r.stats().mutations_rejected == 1),
        "the forwarded batch should be rejected once",
    );
    report
}

/// Ownership moves mid-stream; everyone follows the new owner
pub fn scenario_ownership_migration(conditions: LinkConditions, seed: u64) -> ScenarioReport {
    let mut report = ScenarioReport::new("ownership_migration");
    let mut cluster = Cluster::new(3, conditions, seed);
    cluster.spawn_entity(ENTITY, AUTHORITY);

    if let Some(authority) = cluster.component(AUTHORITY, ENTITY) {
        authority.request_add(tag("Team.Red"));
    }
    report.settle(&mut cluster, ENTITY);

    cluster.set_owner(ENTITY, OBSERVER);
    if let Some(new_owner) = cluster.component(OBSERVER, ENTITY) {
        report.check(
            new_owner.request_add(tag("Team.Blue")).changed(),
            "new owner should apply locally",
        );
    }
    if let Some(old_owner) = cluster.component(AUTHORITY, ENTITY) {
        report.check(
            old_owner.request_remove(tag("Team.Red")) == MutationOutcome::Forwarded,
            "old owner should now forward",
        );
    }

    report.settle(&mut cluster, ENTITY);
    report.check(
        cluster.authoritative(ENTITY) == Some(tags(&["Team.Blue"])),
        "new owner should hold Team.Blue only",
    );
    report
}

/// Random requests from random replicas. Whatever order the owner applies
/// them in, every replica ends up with the owner's set.
pub fn scenario_random_workload(
    conditions: LinkConditions,
    seed: u64,
    requests: usize,
) -> ScenarioReport {
    let mut report = ScenarioReport::new("random_workload");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cluster = Cluster::new(4, conditions, seed);
    cluster.spawn_entity(ENTITY, AUTHORITY);

    let pool = tags(&["A", "B", "C", "Status.Stunned", "Status.Rooted", "Team.Red"]);
    let pool: Vec<Tag> = pool.into_iter().collect();
    let nodes = cluster.nodes();

    for _ in 0..requests {
        let node = nodes[rng.gen_range(0..nodes.len())];
        let request = random_request(&mut rng, &pool);
        if let Some(component) = cluster.component(node, ENTITY) {
            component.request(request);
        }
        if rng.gen_bool(0.5) {
            cluster.step();
        }
    }

    report.settle(&mut cluster, ENTITY);
    report.check(
        cluster
            .authoritative(ENTITY)
            .map_or(false, |set| set.iter().all(|t| pool.contains(t))),
        "owner holds a tag nobody requested",
    );
    report
}

fn random_request(rng: &mut StdRng, pool: &[Tag]) -> MutationRequest {
    let pick = |rng: &mut StdRng| pool[rng.gen_range(0..pool.len())].clone();
    match rng.gen_range(0..4) {
        0 => MutationRequest::Add(pick(rng)),
        1 => MutationRequest::Remove(pick(rng)),
        2 => MutationRequest::AddBatch((0..rng.gen_range(0..3)).map(|_| pick(rng)).collect()),
        _ => MutationRequest::RemoveBatch((0..rng.gen_range(0..3)).map(|_| pick(rng)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_passed(report: ScenarioReport) {
        assert!(report.passed(), "{}: {:?}", report.name, report.failures);
    }

    #[test]
    fn test_duplicate_add() {
        assert_passed(scenario_duplicate_add(LinkConditions::perfect(), 1));
    }

    #[test]
    fn test_partial_remove_batch() {
        assert_passed(scenario_partial_remove_batch(LinkConditions::perfect(), 1));
    }

    #[test]
    fn test_snapshot_notifications() {
        assert_passed(scenario_snapshot_notifications(LinkConditions::perfect(), 1));
    }

    #[test]
    fn test_denied_batch() {
        assert_passed(scenario_denied_batch(LinkConditions::perfect(), 1));
    }

    #[test]
    fn test_ownership_migration() {
        assert_passed(scenario_ownership_migration(LinkConditions::perfect(), 1));
    }

    #[test]
    fn test_scenarios_survive_duplication() {
        for seed in 0..5 {
            assert_passed(scenario_duplicate_add(LinkConditions::duplicating(), seed));
            assert_passed(scenario_partial_remove_batch(LinkConditions::duplicating(), seed));
            assert_passed(scenario_snapshot_notifications(LinkConditions::duplicating(), seed));
            assert_passed(scenario_denied_batch(LinkConditions::perfect(), seed));
        }
    }

    #[test]
    fn test_scenarios_survive_lag() {
        for seed in 0..5 {
            assert_passed(scenario_partial_remove_batch(LinkConditions::laggy(), seed));
            assert_passed(scenario_ownership_migration(LinkConditions::laggy(), seed));
        }
    }

    #[test]
    fn test_random_workload() {
        assert_passed(scenario_random_workload(LinkConditions::perfect(), 42, 200));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_random_workload_converges(seed in any::<u64>(), requests in 1usize..100) {
            let report = scenario_random_workload(LinkConditions::laggy(), seed, requests);
            prop_assert!(report.passed(), "{:?}", report.failures);
        }
    }
}
