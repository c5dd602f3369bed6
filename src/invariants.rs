use std::collections::{HashMap, HashSet};

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{EmployeeId, HierarchyViolation, OrgId};

/// One employee's position in the manager graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmployeeLink {
    pub org_id: OrgId,
    pub manager_id: Option<EmployeeId>,
}

/// In-memory view of manager links, loaded inside the enclosing storage
/// transaction so that validation and write observe the same state.
///
/// A snapshot normally covers one organization's employees plus, when a
/// candidate manager comes from elsewhere, that manager's own link so the
/// validator can see its organization.
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
    employees: HashMap<EmployeeId, EmployeeLink>,
}

impl HierarchySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_links(links: impl IntoIterator<Item = (EmployeeId, EmployeeLink)>) -> Self {
        Self {
            employees: links.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, employee_id: EmployeeId, link: EmployeeLink) {
        self.employees.insert(employee_id, link);
    }

    pub fn remove(&mut self, employee_id: EmployeeId) -> Option<EmployeeLink> {
        self.employees.remove(&employee_id)
    }

    pub fn set_manager(&mut self, employee_id: EmployeeId, manager_id: Option<EmployeeId>) {
        if let Some(link) = self.employees.get_mut(&employee_id) {
            link.manager_id = manager_id;
        }
    }

    pub fn contains(&self, employee_id: EmployeeId) -> bool {
        self.employees.contains_key(&employee_id)
    }

    pub fn org_of(&self, employee_id: EmployeeId) -> Option<OrgId> {
        self.employees.get(&employee_id).map(|link| link.org_id)
    }

    pub fn manager_of(&self, employee_id: EmployeeId) -> Option<EmployeeId> {
        self.employees
            .get(&employee_id)
            .and_then(|link| link.manager_id)
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    /// Direct reports of `manager_id`, in stable id order.
    pub fn direct_reports_of(&self, manager_id: EmployeeId) -> Vec<EmployeeId> {
        let mut reports: Vec<EmployeeId> = self
            .employees
            .iter()
            .filter(|(_, link)| link.manager_id == Some(manager_id))
            .map(|(id, _)| *id)
            .collect();
        reports.sort_by_key(|id| id.0);
        reports
    }

    /// Whether setting `proposed_manager_id` as `employee_id`'s manager would
    /// close a cycle in the manager graph.
    ///
    /// Walks the manager chain upward from the candidate with a visited set
    /// seeded with the employee itself, so both "chain reaches the employee"
    /// and "chain loops among the ancestors" are caught. A manager reference
    /// to an id missing from the snapshot terminates the walk: the detector
    /// prevents future cycles, it does not audit pre-existing corruption.
    pub fn would_create_cycle(
        &self,
        employee_id: EmployeeId,
        proposed_manager_id: EmployeeId,
    ) -> bool {
        let mut visited = HashSet::new();
        visited.insert(employee_id);

        let mut current = Some(proposed_manager_id);
        while let Some(id) = current {
            if !visited.insert(id) {
                return true;
            }
            current = match self.employees.get(&id) {
                Some(link) => link.manager_id,
                None => None,
            };
        }

        false
    }
}

/// Admission check for a manager assignment. Success has no side effect; it
/// licenses the caller to apply the write within the same transaction the
/// snapshot was read in.
///
/// `employee_id` is `None` on the creation path: a freshly generated id
/// cannot already appear in any manager chain, so only manager existence and
/// organization membership can be violated and the cycle check is skipped on
/// purpose.
pub fn validate_manager_assignment(
    snapshot: &HierarchySnapshot,
    org_id: OrgId,
    employee_id: Option<EmployeeId>,
    manager_id: Option<EmployeeId>,
) -> Result<()> {
    let Some(manager_id) = manager_id else {
        // Removing a manager can never create a cycle.
        return Ok(());
    };

    if employee_id == Some(manager_id) {
        return Err(violation_error(HierarchyViolation::SelfManagement {
            employee_id: manager_id,
        }));
    }

    let Some(manager_org_id) = snapshot.org_of(manager_id) else {
        return Err(violation_error(HierarchyViolation::ManagerNotFound {
            manager_id,
        }));
    };

    if manager_org_id != org_id {
        return Err(violation_error(
            HierarchyViolation::CrossOrganizationManager {
                manager_id,
                manager_org_id,
                expected_org_id: org_id,
            },
        ));
    }

    if let Some(employee_id) = employee_id {
        if snapshot.would_create_cycle(employee_id, manager_id) {
            return Err(violation_error(HierarchyViolation::CycleDetected {
                employee_id,
                manager_id,
            }));
        }
    }

    Ok(())
}

/// A single manager rewrite produced by reparent planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparentWrite {
    pub employee_id: EmployeeId,
    pub new_manager_id: Option<EmployeeId>,
}

/// Plan the manager rewrites needed before deleting `deleted_id`: every
/// direct report moves to the deleted employee's own manager.
///
/// Planning is all-or-nothing. Any rejected report aborts the whole deletion;
/// the caller applies either the full plan and the row removal in one
/// transaction, or nothing.
pub fn plan_reparenting(
    snapshot: &HierarchySnapshot,
    deleted_id: EmployeeId,
) -> Result<Vec<ReparentWrite>> {
    let new_manager_id = snapshot.manager_of(deleted_id);
    let reports = snapshot.direct_reports_of(deleted_id);

    let mut writes = Vec::with_capacity(reports.len());
    for report_id in reports {
        if let Some(new_manager_id) = new_manager_id {
            // Short-circuit of the general walk below: the report being the
            // new manager is the first step of the chain.
            if report_id == new_manager_id
                || snapshot.would_create_cycle(report_id, new_manager_id)
            {
                return Err(violation_error(HierarchyViolation::ReparentingCycle {
                    report_id,
                    new_manager_id,
                }));
            }
        }
        writes.push(ReparentWrite {
            employee_id: report_id,
            new_manager_id,
        });
    }

    Ok(writes)
}

fn violation_error(violation: HierarchyViolation) -> LibError {
    LibError::invalid_with_code(
        violation.error_code(),
        violation.public_message(),
        anyhow!("hierarchy invariant violation: {:?}", violation),
    )
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn employee_id() -> EmployeeId {
        EmployeeId(Uuid::new_v4())
    }

    fn link(org_id: OrgId, manager_id: Option<EmployeeId>) -> EmployeeLink {
        EmployeeLink { org_id, manager_id }
    }

    /// A→B→C chain: A reports to B, B reports to C, C is the root.
    fn chain_snapshot() -> (HierarchySnapshot, OrgId, EmployeeId, EmployeeId, EmployeeId) {
        let org = OrgId(Uuid::new_v4());
        let a = employee_id();
        let b = employee_id();
        let c = employee_id();
        let snapshot = HierarchySnapshot::from_links([
            (a, link(org, Some(b))),
            (b, link(org, Some(c))),
            (c, link(org, None)),
        ]);
        (snapshot, org, a, b, c)
    }

    #[test]
    fn cycle_detected_when_chain_reaches_employee() {
        let (snapshot, _, a, _, c) = chain_snapshot();
        assert!(snapshot.would_create_cycle(c, a));
    }

    #[test]
    fn no_cycle_for_unrelated_manager() {
        let (mut snapshot, org, _, _, c) = chain_snapshot();
        let d = employee_id();
        snapshot.insert(d, link(org, None));
        assert!(!snapshot.would_create_cycle(c, d));
    }

    #[test]
    fn no_cycle_when_chain_reaches_root() {
        let (snapshot, _, a, b, _) = chain_snapshot();
        // A under B is the existing edge; re-validating it is not a cycle.
        assert!(!snapshot.would_create_cycle(a, b));
    }

    #[test]
    fn dangling_manager_reference_terminates_walk() {
        let org = OrgId(Uuid::new_v4());
        let a = employee_id();
        let b = employee_id();
        let missing = employee_id();
        let snapshot = HierarchySnapshot::from_links([
            (a, link(org, None)),
            (b, link(org, Some(missing))),
        ]);
        assert!(!snapshot.would_create_cycle(a, b));
    }

    #[test]
    fn looping_ancestor_chain_is_reported_as_cycle() {
        // Pre-corrupted data: B and C manage each other. The walk must still
        // terminate, and report a cycle rather than spin.
        let org = OrgId(Uuid::new_v4());
        let a = employee_id();
        let b = employee_id();
        let c = employee_id();
        let snapshot = HierarchySnapshot::from_links([
            (a, link(org, None)),
            (b, link(org, Some(c))),
            (c, link(org, Some(b))),
        ]);
        assert!(snapshot.would_create_cycle(a, b));
    }

    #[test]
    fn absent_manager_is_always_valid() {
        let (snapshot, org, a, _, _) = chain_snapshot();
        validate_manager_assignment(&snapshot, org, Some(a), None)
            .expect("clearing a manager should always be valid");
    }

    #[test]
    fn self_management_is_rejected() {
        let (snapshot, org, a, _, _) = chain_snapshot();
        let err = validate_manager_assignment(&snapshot, org, Some(a), Some(a))
            .expect_err("self management should fail");
        assert_eq!(err.code, "self_management");
    }

    #[test]
    fn unknown_manager_is_rejected() {
        let (snapshot, org, a, _, _) = chain_snapshot();
        let err = validate_manager_assignment(&snapshot, org, Some(a), Some(employee_id()))
            .expect_err("unknown manager should fail");
        assert_eq!(err.code, "manager_not_found");
    }

    #[test]
    fn cross_organization_manager_is_rejected() {
        let (mut snapshot, org, a, _, _) = chain_snapshot();
        let other_org = OrgId(Uuid::new_v4());
        let outsider = employee_id();
        snapshot.insert(outsider, link(other_org, None));

        let err = validate_manager_assignment(&snapshot, org, Some(a), Some(outsider))
            .expect_err("cross-org manager should fail");
        assert_eq!(err.code, "cross_organization_manager");
    }

    #[test]
    fn cyclic_assignment_is_rejected_on_update() {
        let (snapshot, org, a, _, c) = chain_snapshot();
        let err = validate_manager_assignment(&snapshot, org, Some(c), Some(a))
            .expect_err("cyclic assignment should fail");
        assert_eq!(err.code, "cycle_detected");
    }

    #[test]
    fn creation_path_skips_cycle_check() {
        let (snapshot, org, a, _, _) = chain_snapshot();
        // A new employee reporting to A is fine even though A sits at the
        // bottom of the chain; a fresh id cannot be anyone's ancestor.
        validate_manager_assignment(&snapshot, org, None, Some(a))
            .expect("creation under an existing employee should be valid");
    }

    #[test]
    fn reparenting_moves_reports_to_grandparent() {
        // A (root) → B → {C, D}; deleting B moves C and D under A.
        let org = OrgId(Uuid::new_v4());
        let a = employee_id();
        let b = employee_id();
        let c = employee_id();
        let d = employee_id();
        let snapshot = HierarchySnapshot::from_links([
            (a, link(org, None)),
            (b, link(org, Some(a))),
            (c, link(org, Some(b))),
            (d, link(org, Some(b))),
        ]);

        let writes = plan_reparenting(&snapshot, b).expect("plan should succeed");
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|write| write.new_manager_id == Some(a)));
        let mut planned: Vec<EmployeeId> = writes.iter().map(|write| write.employee_id).collect();
        planned.sort_by_key(|id| id.0);
        let mut expected = vec![c, d];
        expected.sort_by_key(|id| id.0);
        assert_eq!(planned, expected);
    }

    #[test]
    fn reparenting_root_clears_manager_of_reports() {
        let org = OrgId(Uuid::new_v4());
        let root = employee_id();
        let report = employee_id();
        let snapshot = HierarchySnapshot::from_links([
            (root, link(org, None)),
            (report, link(org, Some(root))),
        ]);

        let writes = plan_reparenting(&snapshot, root).expect("plan should succeed");
        assert_eq!(
            writes,
            vec![ReparentWrite {
                employee_id: report,
                new_manager_id: None,
            }]
        );
    }

    #[test]
    fn reparenting_rejects_report_becoming_own_manager() {
        // Pre-corrupted state not reachable through the engine: A manages B
        // while reporting to B. Deleting B must reject rather than set
        // A.manager = A.
        let org = OrgId(Uuid::new_v4());
        let a = employee_id();
        let b = employee_id();
        let snapshot = HierarchySnapshot::from_links([
            (a, link(org, Some(b))),
            (b, link(org, Some(a))),
        ]);

        let err = plan_reparenting(&snapshot, b).expect_err("reparenting should fail");
        assert_eq!(err.code, "reparenting_cycle");
    }

    #[test]
    fn reparenting_with_no_reports_is_empty() {
        let (snapshot, _, a, _, _) = chain_snapshot();
        let writes = plan_reparenting(&snapshot, a).expect("plan should succeed");
        assert!(writes.is_empty());
    }

    /// Full lifecycle against the pure engine: chains stay acyclic through
    /// create, reassign-attempt, and delete-with-reparent.
    #[test]
    fn acme_lifecycle_scenario() {
        let org = OrgId(Uuid::new_v4());
        let mut snapshot = HierarchySnapshot::new();

        // Alice, CEO, no manager.
        let alice = employee_id();
        validate_manager_assignment(&snapshot, org, None, None)
            .expect("creating a root employee should be valid");
        snapshot.insert(alice, link(org, None));

        // Bob under Alice.
        let bob = employee_id();
        validate_manager_assignment(&snapshot, org, None, Some(alice))
            .expect("creating Bob under Alice should be valid");
        snapshot.insert(bob, link(org, Some(alice)));

        // Carol under Bob.
        let carol = employee_id();
        validate_manager_assignment(&snapshot, org, None, Some(bob))
            .expect("creating Carol under Bob should be valid");
        snapshot.insert(carol, link(org, Some(bob)));

        // Alice under Carol would close the loop.
        let err = validate_manager_assignment(&snapshot, org, Some(alice), Some(carol))
            .expect_err("Alice under Carol should fail");
        assert_eq!(err.code, "cycle_detected");

        // Delete Bob: Carol moves under Alice.
        let writes = plan_reparenting(&snapshot, bob).expect("deleting Bob should succeed");
        assert_eq!(
            writes,
            vec![ReparentWrite {
                employee_id: carol,
                new_manager_id: Some(alice),
            }]
        );
        for write in writes {
            snapshot.set_manager(write.employee_id, write.new_manager_id);
        }
        snapshot.remove(bob);

        assert_eq!(snapshot.manager_of(carol), Some(alice));
        assert_eq!(snapshot.direct_reports_of(alice), vec![carol]);

        // Every chain still terminates within the organization's size.
        for id in [alice, carol] {
            let mut steps = 0usize;
            let mut current = Some(id);
            while let Some(next) = current {
                current = snapshot.manager_of(next);
                steps += 1;
                assert!(steps <= snapshot.len(), "manager chain should terminate");
            }
        }
    }
}
