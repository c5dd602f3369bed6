use std::collections::{HashMap, HashSet};

use crate::models::{Employee, EmployeeId};

/// Direct reports of `manager_id` within `employees`, in stable id order.
pub fn direct_reports(employees: &[Employee], manager_id: EmployeeId) -> Vec<&Employee> {
    let mut reports: Vec<&Employee> = employees
        .iter()
        .filter(|employee| employee.manager_id == Some(manager_id))
        .collect();
    reports.sort_by_key(|employee| employee.id.0);
    reports
}

/// Ancestor chain of `employee_id`: its manager, that manager's manager, and
/// so on up to a root. A dangling or revisited manager reference ends the
/// walk early instead of failing; the chain is bounded by the slice length
/// for data the engine has validated.
pub fn manager_chain(employees: &[Employee], employee_id: EmployeeId) -> Vec<&Employee> {
    let lookup: HashMap<EmployeeId, &Employee> = employees
        .iter()
        .map(|employee| (employee.id, employee))
        .collect();

    let mut visited = HashSet::new();
    visited.insert(employee_id);

    let mut chain = Vec::new();
    let mut current = lookup
        .get(&employee_id)
        .and_then(|employee| employee.manager_id);
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Some(manager) = lookup.get(&id) else {
            break;
        };
        chain.push(*manager);
        current = manager.manager_id;
    }

    chain
}

/// Employees with no manager, in stable id order. One per tree in the
/// organization's forest.
pub fn roots(employees: &[Employee]) -> Vec<&Employee> {
    let mut roots: Vec<&Employee> = employees
        .iter()
        .filter(|employee| employee.manager_id.is_none())
        .collect();
    roots.sort_by_key(|employee| employee.id.0);
    roots
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{Employee, EmployeeId, OrgId};

    fn employee(org_id: OrgId, name: &str, manager_id: Option<EmployeeId>) -> Employee {
        let now = Utc::now().naive_utc();
        Employee {
            id: EmployeeId(Uuid::new_v4()),
            org_id,
            name: name.to_string(),
            title: "Engineer".to_string(),
            manager_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_org() -> (Vec<Employee>, EmployeeId, EmployeeId, EmployeeId, EmployeeId) {
        let org = OrgId(Uuid::new_v4());
        let ceo = employee(org, "CEO", None);
        let manager = employee(org, "Manager", Some(ceo.id));
        let report_a = employee(org, "Report A", Some(manager.id));
        let report_b = employee(org, "Report B", Some(manager.id));
        let ids = (ceo.id, manager.id, report_a.id, report_b.id);
        (
            vec![ceo, manager, report_a, report_b],
            ids.0,
            ids.1,
            ids.2,
            ids.3,
        )
    }

    #[test]
    fn direct_reports_are_sorted_by_id() {
        let (employees, _, manager, report_a, report_b) = sample_org();
        let reports = super::direct_reports(&employees, manager);
        let mut expected = vec![report_a, report_b];
        expected.sort_by_key(|id| id.0);
        assert_eq!(
            reports.iter().map(|e| e.id).collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn manager_chain_walks_to_root() {
        let (employees, ceo, manager, report_a, _) = sample_org();
        let chain = super::manager_chain(&employees, report_a);
        assert_eq!(
            chain.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![manager, ceo]
        );
    }

    #[test]
    fn manager_chain_of_root_is_empty() {
        let (employees, ceo, _, _, _) = sample_org();
        assert!(super::manager_chain(&employees, ceo).is_empty());
    }

    #[test]
    fn manager_chain_stops_on_dangling_reference() {
        let org = OrgId(Uuid::new_v4());
        let ghost = EmployeeId(Uuid::new_v4());
        let orphan = employee(org, "Orphan", Some(ghost));
        let employees = [orphan.clone()];
        let chain = super::manager_chain(&employees, orphan.id);
        assert!(chain.is_empty());
    }

    #[test]
    fn roots_returns_manager_less_employees() {
        let (employees, ceo, _, _, _) = sample_org();
        let roots = super::roots(&employees);
        assert_eq!(roots.iter().map(|e| e.id).collect::<Vec<_>>(), vec![ceo]);
    }
}
