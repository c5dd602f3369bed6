use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::db;
use crate::error::{ErrorKind, LibError};
use crate::models::{
    CreateEmployeePayload, CreateOrganizationPayload, DirectReports, EmployeeId, OrgId, Paged,
    PageQuery, UpdateEmployeePayload,
};

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(kind = ?self.0.kind, code = self.0.code, error = %self.0.source, "orgchart api request failed");
        (status, self.0.public).into_response()
    }
}

pub trait HasPool {
    fn pool(&self) -> Arc<sqlx::PgPool>;
}

async fn create_organization_handler<S>(
    State(app): State<S>,
    Json(payload): Json<CreateOrganizationPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let organization = db::create_organization(&app.pool(), payload).await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

async fn list_organizations_handler<S>(
    State(app): State<S>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let (page, limit) = query.pagination();
    let items = db::list_organizations(&app.pool(), page, limit).await?;
    Ok(Json(Paged { page, limit, items }))
}

async fn get_organization_handler<S>(
    State(app): State<S>,
    Path(org_id): Path<OrgId>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let organization = db::get_organization(&app.pool(), org_id).await?;
    Ok(Json(organization))
}

async fn delete_organization_handler<S>(
    State(app): State<S>,
    Path(org_id): Path<OrgId>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    db::delete_organization(&app.pool(), org_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_employee_handler<S>(
    State(app): State<S>,
    Path(org_id): Path<OrgId>,
    Json(payload): Json<CreateEmployeePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let employee = db::create_employee(&app.pool(), org_id, payload).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn list_employees_handler<S>(
    State(app): State<S>,
    Path(org_id): Path<OrgId>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let (page, limit) = query.pagination();
    let items = db::list_employees(&app.pool(), org_id, page, limit).await?;
    Ok(Json(Paged { page, limit, items }))
}

async fn get_employee_handler<S>(
    State(app): State<S>,
    Path((org_id, employee_id)): Path<(OrgId, EmployeeId)>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let employee = db::get_employee(&app.pool(), org_id, employee_id).await?;
    Ok(Json(employee))
}

async fn update_employee_handler<S>(
    State(app): State<S>,
    Path((org_id, employee_id)): Path<(OrgId, EmployeeId)>,
    Json(payload): Json<UpdateEmployeePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let employee = db::update_employee(&app.pool(), org_id, employee_id, payload).await?;
    Ok(Json(employee))
}

async fn delete_employee_handler<S>(
    State(app): State<S>,
    Path((org_id, employee_id)): Path<(OrgId, EmployeeId)>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    db::delete_employee(&app.pool(), org_id, employee_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn promote_to_ceo_handler<S>(
    State(app): State<S>,
    Path((org_id, employee_id)): Path<(OrgId, EmployeeId)>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let employee = db::promote_to_ceo(&app.pool(), org_id, employee_id).await?;
    Ok(Json(employee))
}

async fn direct_reports_handler<S>(
    State(app): State<S>,
    Path((org_id, employee_id)): Path<(OrgId, EmployeeId)>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let direct_reports = db::direct_reports(&app.pool(), org_id, employee_id).await?;
    Ok(Json(DirectReports { direct_reports }))
}

async fn manager_chain_handler<S>(
    State(app): State<S>,
    Path((org_id, employee_id)): Path<(OrgId, EmployeeId)>,
) -> Result<impl IntoResponse, AppError>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    let chain = db::manager_chain(&app.pool(), org_id, employee_id).await?;
    Ok(Json(chain))
}

pub fn routes<S>() -> Router<S>
where
    S: HasPool + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /orgcharts [GET,POST]");
    tracing::info!("Registering route /orgcharts/{{org_id}} [GET,DELETE]");
    tracing::info!("Registering route /orgcharts/{{org_id}}/employees [GET,POST]");
    tracing::info!("Registering route /orgcharts/{{org_id}}/employees/{{employee_id}} [GET,PUT,DELETE]");

    Router::new()
        .route(
            "/orgcharts",
            get(list_organizations_handler::<S>).post(create_organization_handler::<S>),
        )
        .route(
            "/orgcharts/{org_id}",
            get(get_organization_handler::<S>).delete(delete_organization_handler::<S>),
        )
        .route(
            "/orgcharts/{org_id}/employees",
            get(list_employees_handler::<S>).post(create_employee_handler::<S>),
        )
        .route(
            "/orgcharts/{org_id}/employees/{employee_id}",
            get(get_employee_handler::<S>)
                .put(update_employee_handler::<S>)
                .delete(delete_employee_handler::<S>),
        )
        .route(
            "/orgcharts/{org_id}/employees/{employee_id}/promote_ceo",
            post(promote_to_ceo_handler::<S>),
        )
        .route(
            "/orgcharts/{org_id}/employees/{employee_id}/direct_reports",
            get(direct_reports_handler::<S>),
        )
        .route(
            "/orgcharts/{org_id}/employees/{employee_id}/manager_chain",
            get(manager_chain_handler::<S>),
        )
}
