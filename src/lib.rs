pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod invariants;
pub mod models;
#[cfg(feature = "sqlx")]
pub mod operations;

pub mod prelude {
    pub use crate::algorithms::{direct_reports, manager_chain, roots};
    #[cfg(feature = "api")]
    pub use crate::api::HasPool;
    #[cfg(feature = "sqlx")]
    pub use crate::db::{
        create_employee, create_organization, create_orgchart_tables, delete_employee,
        delete_organization, get_employee, get_organization, list_employees, list_organizations,
        promote_to_ceo, update_employee,
    };
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::invariants::{
        EmployeeLink, HierarchySnapshot, ReparentWrite, plan_reparenting,
        validate_manager_assignment,
    };
    pub use crate::models::{
        CreateEmployeePayload, CreateOrganizationPayload, DirectReports, Employee, EmployeeId,
        HierarchyViolation, Organization, OrganizationSummary, OrgId, Paged, PageQuery,
        UpdateEmployeePayload,
    };
    #[cfg(feature = "sqlx")]
    pub use crate::operations::{
        HierarchyOperation, HierarchyOperationResult, HierarchyOperations,
    };
}
