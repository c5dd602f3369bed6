use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LibError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct OrgId(pub Uuid);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrgId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for OrgId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EmployeeId(pub Uuid);

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EmployeeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for EmployeeId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: EmployeeId,
    pub org_id: OrgId,
    pub name: String,
    /// Free text; informally doubles as the hierarchy level ("CEO", ...).
    pub title: String,
    /// Absent means the employee is a root of its organization's forest.
    pub manager_id: Option<EmployeeId>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub employees: Vec<Employee>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: OrgId,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub employee_count: i64,
}

/// A manager assignment the hierarchy engine refuses to apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HierarchyViolation {
    SelfManagement {
        employee_id: EmployeeId,
    },
    ManagerNotFound {
        manager_id: EmployeeId,
    },
    CrossOrganizationManager {
        manager_id: EmployeeId,
        manager_org_id: OrgId,
        expected_org_id: OrgId,
    },
    CycleDetected {
        employee_id: EmployeeId,
        manager_id: EmployeeId,
    },
    ReparentingCycle {
        report_id: EmployeeId,
        new_manager_id: EmployeeId,
    },
}

impl HierarchyViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            HierarchyViolation::SelfManagement { .. } => "self_management",
            HierarchyViolation::ManagerNotFound { .. } => "manager_not_found",
            HierarchyViolation::CrossOrganizationManager { .. } => "cross_organization_manager",
            HierarchyViolation::CycleDetected { .. } => "cycle_detected",
            HierarchyViolation::ReparentingCycle { .. } => "reparenting_cycle",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            HierarchyViolation::SelfManagement { .. } => {
                "An employee cannot be their own manager"
            }
            HierarchyViolation::ManagerNotFound { .. } => "Manager not found",
            HierarchyViolation::CrossOrganizationManager { .. } => {
                "Manager belongs to a different organization"
            }
            HierarchyViolation::CycleDetected { .. } => {
                "Assigning this manager would create a reporting cycle"
            }
            HierarchyViolation::ReparentingCycle { .. } => {
                "Deleting this employee would create a reporting cycle among their reports"
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationPayload {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
}

impl CreateOrganizationPayload {
    pub fn normalize(self) -> Result<NewOrganization> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LibError::invalid(
                "Organization name is required",
                anyhow!("empty organization name"),
            ));
        }
        Ok(NewOrganization { name })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeePayload {
    pub name: String,
    pub title: String,
    pub manager_id: Option<EmployeeId>,
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub name: String,
    pub title: String,
    pub manager_id: Option<EmployeeId>,
}

impl CreateEmployeePayload {
    pub fn normalize(self) -> Result<NewEmployee> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LibError::invalid(
                "Employee name is required",
                anyhow!("empty employee name"),
            ));
        }
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(LibError::invalid(
                "Employee title is required",
                anyhow!("empty employee title"),
            ));
        }
        Ok(NewEmployee {
            name,
            title,
            manager_id: self.manager_id,
        })
    }
}

/// Partial employee update. `manager_id` is tri-state: absent leaves the
/// manager untouched, `null` clears it, a value reassigns it.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeePayload {
    pub name: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub manager_id: Option<Option<EmployeeId>>,
}

#[derive(Debug, Clone)]
pub struct EmployeePatch {
    pub name: Option<String>,
    pub title: Option<String>,
    pub manager_id: Option<Option<EmployeeId>>,
}

impl UpdateEmployeePayload {
    pub fn normalize(self) -> Result<EmployeePatch> {
        let name = match self.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(LibError::invalid(
                        "Employee name is required",
                        anyhow!("empty employee name in update"),
                    ));
                }
                Some(name)
            }
            None => None,
        };
        let title = match self.title {
            Some(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(LibError::invalid(
                        "Employee title is required",
                        anyhow!("empty employee title in update"),
                    ));
                }
                Some(title)
            }
            None => None,
        };
        Ok(EmployeePatch {
            name,
            title,
            manager_id: self.manager_id,
        })
    }
}

fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectReports {
    pub direct_reports: Vec<Employee>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub page: u32,
    pub limit: u32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(100).clamp(1, 1000);
        (page, limit)
    }
}
