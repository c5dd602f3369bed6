use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db;
use crate::error::Result;
use crate::models::{
    CreateEmployeePayload, CreateOrganizationPayload, Employee, EmployeeId, Organization,
    OrganizationSummary, OrgId, PageQuery, UpdateEmployeePayload,
};

/// High-level org-chart actions for embedding hosts that dispatch serialized
/// operations (tool runners, job queues) instead of mounting the HTTP router.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum HierarchyOperation {
    CreateOrganization {
        payload: CreateOrganizationPayload,
    },
    GetOrganization {
        org_id: OrgId,
    },
    ListOrganizations {
        query: PageQuery,
    },
    DeleteOrganization {
        org_id: OrgId,
    },
    CreateEmployee {
        org_id: OrgId,
        payload: CreateEmployeePayload,
    },
    GetEmployee {
        org_id: OrgId,
        employee_id: EmployeeId,
    },
    ListEmployees {
        org_id: OrgId,
        query: PageQuery,
    },
    UpdateEmployee {
        org_id: OrgId,
        employee_id: EmployeeId,
        payload: UpdateEmployeePayload,
    },
    DeleteEmployee {
        org_id: OrgId,
        employee_id: EmployeeId,
    },
    PromoteToCeo {
        org_id: OrgId,
        employee_id: EmployeeId,
    },
    DirectReports {
        org_id: OrgId,
        employee_id: EmployeeId,
    },
    ManagerChain {
        org_id: OrgId,
        employee_id: EmployeeId,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum HierarchyOperationResult {
    Organization {
        organization: Organization,
    },
    OrganizationsPage {
        page: u32,
        limit: u32,
        items: Vec<OrganizationSummary>,
    },
    Employee {
        employee: Employee,
    },
    EmployeesPage {
        page: u32,
        limit: u32,
        items: Vec<Employee>,
    },
    Employees {
        employees: Vec<Employee>,
    },
    Deleted,
}

#[derive(Clone)]
pub struct HierarchyOperations {
    pool: Arc<PgPool>,
}

impl HierarchyOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn from_pool(pool: &PgPool) -> Self {
        Self {
            pool: Arc::new(pool.clone()),
        }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    pub async fn execute(&self, operation: HierarchyOperation) -> Result<HierarchyOperationResult> {
        match operation {
            HierarchyOperation::CreateOrganization { payload } => {
                let organization = db::create_organization(&self.pool, payload).await?;
                Ok(HierarchyOperationResult::Organization { organization })
            }
            HierarchyOperation::GetOrganization { org_id } => {
                let organization = db::get_organization(&self.pool, org_id).await?;
                Ok(HierarchyOperationResult::Organization { organization })
            }
            HierarchyOperation::ListOrganizations { query } => {
                let (page, limit) = query.pagination();
                let items = db::list_organizations(&self.pool, page, limit).await?;
                Ok(HierarchyOperationResult::OrganizationsPage { page, limit, items })
            }
            HierarchyOperation::DeleteOrganization { org_id } => {
                db::delete_organization(&self.pool, org_id).await?;
                Ok(HierarchyOperationResult::Deleted)
            }
            HierarchyOperation::CreateEmployee { org_id, payload } => {
                let employee = db::create_employee(&self.pool, org_id, payload).await?;
                Ok(HierarchyOperationResult::Employee { employee })
            }
            HierarchyOperation::GetEmployee {
                org_id,
                employee_id,
            } => {
                let employee = db::get_employee(&self.pool, org_id, employee_id).await?;
                Ok(HierarchyOperationResult::Employee { employee })
            }
            HierarchyOperation::ListEmployees { org_id, query } => {
                let (page, limit) = query.pagination();
                let items = db::list_employees(&self.pool, org_id, page, limit).await?;
                Ok(HierarchyOperationResult::EmployeesPage { page, limit, items })
            }
            HierarchyOperation::UpdateEmployee {
                org_id,
                employee_id,
                payload,
            } => {
                let employee = db::update_employee(&self.pool, org_id, employee_id, payload).await?;
                Ok(HierarchyOperationResult::Employee { employee })
            }
            HierarchyOperation::DeleteEmployee {
                org_id,
                employee_id,
            } => {
                db::delete_employee(&self.pool, org_id, employee_id).await?;
                Ok(HierarchyOperationResult::Deleted)
            }
            HierarchyOperation::PromoteToCeo {
                org_id,
                employee_id,
            } => {
                let employee = db::promote_to_ceo(&self.pool, org_id, employee_id).await?;
                Ok(HierarchyOperationResult::Employee { employee })
            }
            HierarchyOperation::DirectReports {
                org_id,
                employee_id,
            } => {
                let employees = db::direct_reports(&self.pool, org_id, employee_id).await?;
                Ok(HierarchyOperationResult::Employees { employees })
            }
            HierarchyOperation::ManagerChain {
                org_id,
                employee_id,
            } => {
                let employees = db::manager_chain(&self.pool, org_id, employee_id).await?;
                Ok(HierarchyOperationResult::Employees { employees })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::HierarchyOperation;

    #[test]
    fn operations_deserialize_from_tagged_json() {
        let op: HierarchyOperation = serde_json::from_str(
            r#"{"operation": "create_organization", "payload": {"name": "Acme"}}"#,
        )
        .expect("operation should parse");
        assert!(matches!(
            op,
            HierarchyOperation::CreateOrganization { payload } if payload.name == "Acme"
        ));

        let org_id = Uuid::new_v4();
        let employee_id = Uuid::new_v4();
        let op: HierarchyOperation = serde_json::from_str(&format!(
            r#"{{
                "operation": "update_employee",
                "org_id": "{org_id}",
                "employee_id": "{employee_id}",
                "payload": {{"managerId": null}}
            }}"#
        ))
        .expect("operation should parse");
        let HierarchyOperation::UpdateEmployee { payload, .. } = op else {
            panic!("expected update_employee operation");
        };
        assert_eq!(payload.manager_id, Some(None));
    }

    #[test]
    fn delete_operation_parses_ids() {
        let org_id = Uuid::new_v4();
        let employee_id = Uuid::new_v4();
        let op: HierarchyOperation = serde_json::from_str(&format!(
            r#"{{
                "operation": "delete_employee",
                "org_id": "{org_id}",
                "employee_id": "{employee_id}"
            }}"#
        ))
        .expect("operation should parse");
        let HierarchyOperation::DeleteEmployee {
            org_id: parsed_org,
            employee_id: parsed_employee,
        } = op
        else {
            panic!("expected delete_employee operation");
        };
        assert_eq!(parsed_org.0, org_id);
        assert_eq!(parsed_employee.0, employee_id);
    }
}
