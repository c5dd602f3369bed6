use anyhow::anyhow;
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::invariants::{self, EmployeeLink, HierarchySnapshot};
use crate::models::{
    CreateEmployeePayload, CreateOrganizationPayload, Employee, EmployeeId, Organization,
    OrganizationSummary, OrgId, UpdateEmployeePayload,
};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_orgchart_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Debug, Clone, FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct OrganizationSummaryRow {
    id: Uuid,
    name: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
    employee_count: i64,
}

#[derive(Debug, Clone, FromRow)]
struct EmployeeRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    title: String,
    manager_id: Option<Uuid>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct EmployeeLinkRow {
    id: Uuid,
    org_id: Uuid,
    manager_id: Option<Uuid>,
}

impl From<EmployeeRow> for Employee {
    fn from(value: EmployeeRow) -> Self {
        Self {
            id: EmployeeId(value.id),
            org_id: OrgId(value.org_id),
            name: value.name,
            title: value.title,
            manager_id: value.manager_id.map(EmployeeId),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<OrganizationSummaryRow> for OrganizationSummary {
    fn from(value: OrganizationSummaryRow) -> Self {
        Self {
            id: OrgId(value.id),
            name: value.name,
            created_at: value.created_at,
            updated_at: value.updated_at,
            employee_count: value.employee_count,
        }
    }
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

/// Start the one transaction every mutation runs inside. Serializable
/// isolation keeps the manager-chain reads and the subsequent write from
/// interleaving with a concurrent mutation into a cycle.
async fn begin_serializable(pool: &PgPool) -> Result<sqlx::Transaction<'_, sqlx::Postgres>> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| db_err("Failed to start transaction", err))?;

    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to set transaction isolation", err))?;

    Ok(tx)
}

async fn ensure_organization(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    org_id: OrgId,
) -> Result<()> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM orgchart.organizations
            WHERE id = $1
        )
        "#,
    )
    .bind(org_id.0)
    .fetch_one(&mut **tx)
    .await
    .map_err(|err| db_err("Failed to query organization", err))?;

    if exists.0 {
        Ok(())
    } else {
        Err(LibError::not_found(
            "Organization not found",
            anyhow!("organization {} not found", org_id),
        ))
    }
}

async fn load_employee_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    org_id: OrgId,
    employee_id: EmployeeId,
) -> Result<EmployeeRow> {
    let row = sqlx::query_as::<_, EmployeeRow>(
        r#"
        SELECT id, org_id, name, title, manager_id, created_at, updated_at
        FROM orgchart.employees
        WHERE id = $1
          AND org_id = $2
        "#,
    )
    .bind(employee_id.0)
    .bind(org_id.0)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|err| db_err("Failed to query employee", err))?;

    row.ok_or_else(|| {
        LibError::not_found(
            "Employee not found",
            anyhow!("employee {} not found in organization {}", employee_id, org_id),
        )
    })
}

/// Load the organization's manager links for validation. When a candidate
/// manager may live outside the organization, its own link is loaded too so
/// the validator can distinguish "missing" from "wrong organization".
async fn load_snapshot(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    org_id: OrgId,
    candidate_manager: Option<EmployeeId>,
) -> Result<HierarchySnapshot> {
    let links = sqlx::query_as::<_, EmployeeLinkRow>(
        r#"
        SELECT id, org_id, manager_id
        FROM orgchart.employees
        WHERE org_id = $1
        "#,
    )
    .bind(org_id.0)
    .fetch_all(&mut **tx)
    .await
    .map_err(|err| db_err("Failed to query manager links", err))?;

    let mut snapshot = HierarchySnapshot::from_links(links.into_iter().map(|row| {
        (
            EmployeeId(row.id),
            EmployeeLink {
                org_id: OrgId(row.org_id),
                manager_id: row.manager_id.map(EmployeeId),
            },
        )
    }));

    if let Some(manager_id) = candidate_manager {
        if !snapshot.contains(manager_id) {
            let row = sqlx::query_as::<_, EmployeeLinkRow>(
                r#"
                SELECT id, org_id, manager_id
                FROM orgchart.employees
                WHERE id = $1
                "#,
            )
            .bind(manager_id.0)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|err| db_err("Failed to query manager link", err))?;

            if let Some(row) = row {
                snapshot.insert(
                    EmployeeId(row.id),
                    EmployeeLink {
                        org_id: OrgId(row.org_id),
                        manager_id: row.manager_id.map(EmployeeId),
                    },
                );
            }
        }
    }

    Ok(snapshot)
}

pub async fn create_organization(
    pool: &PgPool,
    payload: CreateOrganizationPayload,
) -> Result<Organization> {
    let new_organization = payload.normalize()?;
    let org_id = OrgId(Uuid::new_v4());

    sqlx::query(
        r#"
        INSERT INTO orgchart.organizations (id, name)
        VALUES ($1, $2)
        "#,
    )
    .bind(org_id.0)
    .bind(&new_organization.name)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to create organization", err))?;

    get_organization(pool, org_id).await
}

pub async fn get_organization(pool: &PgPool, org_id: OrgId) -> Result<Organization> {
    let row = sqlx::query_as::<_, OrganizationRow>(
        r#"
        SELECT id, name, created_at, updated_at
        FROM orgchart.organizations
        WHERE id = $1
        "#,
    )
    .bind(org_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query organization", err))?;

    let Some(row) = row else {
        return Err(LibError::not_found(
            "Organization not found",
            anyhow!("organization {} not found", org_id),
        ));
    };

    let employees = sqlx::query_as::<_, EmployeeRow>(
        r#"
        SELECT id, org_id, name, title, manager_id, created_at, updated_at
        FROM orgchart.employees
        WHERE org_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(org_id.0)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to query employees", err))?;

    Ok(Organization {
        id: OrgId(row.id),
        name: row.name,
        created_at: row.created_at,
        updated_at: row.updated_at,
        employees: employees.into_iter().map(Employee::from).collect(),
    })
}

pub async fn list_organizations(
    pool: &PgPool,
    page: u32,
    limit: u32,
) -> Result<Vec<OrganizationSummary>> {
    let offset = (page.saturating_sub(1) as i64).saturating_mul(limit as i64);

    let rows = sqlx::query_as::<_, OrganizationSummaryRow>(
        r#"
        SELECT
            o.id,
            o.name,
            o.created_at,
            o.updated_at,
            COALESCE(e.employee_count, 0) AS employee_count
        FROM orgchart.organizations o
        LEFT JOIN (
            SELECT org_id, COUNT(*)::bigint AS employee_count
            FROM orgchart.employees
            GROUP BY org_id
        ) e
        ON e.org_id = o.id
        ORDER BY o.id ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit as i64)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list organizations", err))?;

    Ok(rows.into_iter().map(OrganizationSummary::from).collect())
}

/// Delete an organization and, via the cascading foreign key, all of its
/// employees in one statement.
pub async fn delete_organization(pool: &PgPool, org_id: OrgId) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM orgchart.organizations
        WHERE id = $1
        "#,
    )
    .bind(org_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to delete organization", err))?;

    if result.rows_affected() == 0 {
        return Err(LibError::not_found(
            "Organization not found",
            anyhow!("organization {} not found", org_id),
        ));
    }

    Ok(())
}

pub async fn create_employee(
    pool: &PgPool,
    org_id: OrgId,
    payload: CreateEmployeePayload,
) -> Result<Employee> {
    let new_employee = payload.normalize()?;

    let mut tx = begin_serializable(pool).await?;
    ensure_organization(&mut tx, org_id).await?;

    let snapshot = load_snapshot(&mut tx, org_id, new_employee.manager_id).await?;
    invariants::validate_manager_assignment(&snapshot, org_id, None, new_employee.manager_id)?;

    let employee_id = EmployeeId(Uuid::new_v4());
    sqlx::query(
        r#"
        INSERT INTO orgchart.employees (id, org_id, name, title, manager_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(employee_id.0)
    .bind(org_id.0)
    .bind(&new_employee.name)
    .bind(&new_employee.title)
    .bind(new_employee.manager_id.map(|id| id.0))
    .execute(&mut *tx)
    .await
    .map_err(|err| db_err("Failed to create employee", err))?;

    tx.commit()
        .await
        .map_err(|err| db_err("Failed to commit transaction", err))?;

    get_employee(pool, org_id, employee_id).await
}

pub async fn get_employee(
    pool: &PgPool,
    org_id: OrgId,
    employee_id: EmployeeId,
) -> Result<Employee> {
    let row = sqlx::query_as::<_, EmployeeRow>(
        r#"
        SELECT id, org_id, name, title, manager_id, created_at, updated_at
        FROM orgchart.employees
        WHERE id = $1
          AND org_id = $2
        "#,
    )
    .bind(employee_id.0)
    .bind(org_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query employee", err))?;

    row.map(Employee::from).ok_or_else(|| {
        LibError::not_found(
            "Employee not found",
            anyhow!("employee {} not found in organization {}", employee_id, org_id),
        )
    })
}

pub async fn list_employees(
    pool: &PgPool,
    org_id: OrgId,
    page: u32,
    limit: u32,
) -> Result<Vec<Employee>> {
    if !organization_exists(pool, org_id).await? {
        return Err(LibError::not_found(
            "Organization not found",
            anyhow!("organization {} not found", org_id),
        ));
    }
    let offset = (page.saturating_sub(1) as i64).saturating_mul(limit as i64);

    let rows = sqlx::query_as::<_, EmployeeRow>(
        r#"
        SELECT id, org_id, name, title, manager_id, created_at, updated_at
        FROM orgchart.employees
        WHERE org_id = $1
        ORDER BY id ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(org_id.0)
    .bind(limit as i64)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list employees", err))?;

    Ok(rows.into_iter().map(Employee::from).collect())
}

pub async fn update_employee(
    pool: &PgPool,
    org_id: OrgId,
    employee_id: EmployeeId,
    payload: UpdateEmployeePayload,
) -> Result<Employee> {
    let patch = payload.normalize()?;

    let mut tx = begin_serializable(pool).await?;
    let existing = load_employee_in_tx(&mut tx, org_id, employee_id).await?;

    let manager_id = match patch.manager_id {
        Some(manager_id) => {
            let snapshot = load_snapshot(&mut tx, org_id, manager_id).await?;
            invariants::validate_manager_assignment(
                &snapshot,
                org_id,
                Some(employee_id),
                manager_id,
            )?;
            manager_id
        }
        None => existing.manager_id.map(EmployeeId),
    };

    let name = patch.name.unwrap_or(existing.name);
    let title = patch.title.unwrap_or(existing.title);

    sqlx::query(
        r#"
        UPDATE orgchart.employees
        SET name = $1,
            title = $2,
            manager_id = $3,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $4
        "#,
    )
    .bind(&name)
    .bind(&title)
    .bind(manager_id.map(|id| id.0))
    .bind(employee_id.0)
    .execute(&mut *tx)
    .await
    .map_err(|err| db_err("Failed to update employee", err))?;

    tx.commit()
        .await
        .map_err(|err| db_err("Failed to commit transaction", err))?;

    get_employee(pool, org_id, employee_id).await
}

/// Delete an employee, first rewiring its direct reports to its own manager.
/// The reparent plan and the row removal commit together or not at all.
pub async fn delete_employee(pool: &PgPool, org_id: OrgId, employee_id: EmployeeId) -> Result<()> {
    let mut tx = begin_serializable(pool).await?;
    let _existing = load_employee_in_tx(&mut tx, org_id, employee_id).await?;

    let snapshot = load_snapshot(&mut tx, org_id, None).await?;
    let writes = invariants::plan_reparenting(&snapshot, employee_id)?;

    for write in writes {
        sqlx::query(
            r#"
            UPDATE orgchart.employees
            SET manager_id = $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
            "#,
        )
        .bind(write.new_manager_id.map(|id| id.0))
        .bind(write.employee_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to reparent direct report", err))?;
    }

    sqlx::query(
        r#"
        DELETE FROM orgchart.employees
        WHERE id = $1
        "#,
    )
    .bind(employee_id.0)
    .execute(&mut *tx)
    .await
    .map_err(|err| db_err("Failed to delete employee", err))?;

    tx.commit()
        .await
        .map_err(|err| db_err("Failed to commit transaction", err))?;

    Ok(())
}

/// Clear the employee's manager and retitle them "CEO". Already-rooted
/// employees are returned unchanged.
pub async fn promote_to_ceo(
    pool: &PgPool,
    org_id: OrgId,
    employee_id: EmployeeId,
) -> Result<Employee> {
    let mut tx = begin_serializable(pool).await?;
    let existing = load_employee_in_tx(&mut tx, org_id, employee_id).await?;

    if existing.manager_id.is_none() {
        return Ok(existing.into());
    }

    sqlx::query(
        r#"
        UPDATE orgchart.employees
        SET manager_id = NULL,
            title = 'CEO',
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        "#,
    )
    .bind(employee_id.0)
    .execute(&mut *tx)
    .await
    .map_err(|err| db_err("Failed to promote employee", err))?;

    tx.commit()
        .await
        .map_err(|err| db_err("Failed to commit transaction", err))?;

    get_employee(pool, org_id, employee_id).await
}

pub async fn direct_reports(
    pool: &PgPool,
    org_id: OrgId,
    employee_id: EmployeeId,
) -> Result<Vec<Employee>> {
    let _employee = get_employee(pool, org_id, employee_id).await?;

    let rows = sqlx::query_as::<_, EmployeeRow>(
        r#"
        SELECT id, org_id, name, title, manager_id, created_at, updated_at
        FROM orgchart.employees
        WHERE manager_id = $1
          AND org_id = $2
        ORDER BY id ASC
        "#,
    )
    .bind(employee_id.0)
    .bind(org_id.0)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to query direct reports", err))?;

    Ok(rows.into_iter().map(Employee::from).collect())
}

pub async fn manager_chain(
    pool: &PgPool,
    org_id: OrgId,
    employee_id: EmployeeId,
) -> Result<Vec<Employee>> {
    let _employee = get_employee(pool, org_id, employee_id).await?;

    let rows = sqlx::query_as::<_, EmployeeRow>(
        r#"
        SELECT id, org_id, name, title, manager_id, created_at, updated_at
        FROM orgchart.employees
        WHERE org_id = $1
        "#,
    )
    .bind(org_id.0)
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to query employees", err))?;

    let employees: Vec<Employee> = rows.into_iter().map(Employee::from).collect();
    Ok(crate::algorithms::manager_chain(&employees, employee_id)
        .into_iter()
        .cloned()
        .collect())
}

async fn organization_exists(pool: &PgPool, org_id: OrgId) -> Result<bool> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM orgchart.organizations
            WHERE id = $1
        )
        "#,
    )
    .bind(org_id.0)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to query organization", err))?;

    Ok(exists.0)
}
