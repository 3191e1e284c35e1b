//! Visible slices of the organization tree.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::scope::company_visible;
use crate::authz::{visible_companies, visible_departments, visible_projects, Resolution};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::org::{Company, Department, Project};

use super::resolve_caller;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/companies", get(list_companies))
        .route("/companies/:id/departments", get(list_departments))
        .route("/companies/:id/projects", get(list_projects))
}

fn ensure_company_visible(resolution: &Resolution, company_id: Uuid) -> AppResult<()> {
    if company_visible(&resolution.record, &resolution.org, company_id) {
        Ok(())
    } else {
        tracing::debug!(user_id = %resolution.record.user_id, company_id = %company_id, "company not visible");
        Err(AppError::forbidden())
    }
}

/// Companies visible to the caller
#[utoipa::path(
    get,
    path = "/companies",
    tag = "Organization",
    responses((status = 200, description = "Visible companies, sorted by name", body = Vec<Company>)),
    security(("bearerAuth" = []))
)]
pub async fn list_companies(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Company>>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let companies = visible_companies(&resolution.record, &resolution.org);
    Ok(Json(companies.into_iter().cloned().collect()))
}

/// Departments of a visible company
#[utoipa::path(
    get,
    path = "/companies/{id}/departments",
    tag = "Organization",
    params(("id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Departments of the company", body = Vec<Department>),
        (status = 403, description = "Company not visible"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_departments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<Department>>> {
    let resolution = resolve_caller(&state, &auth).await?;
    ensure_company_visible(&resolution, company_id)?;

    let departments = visible_departments(&resolution.record, &resolution.org, Some(company_id));
    Ok(Json(departments.into_iter().cloned().collect()))
}

/// Projects of a visible company the caller may see
#[utoipa::path(
    get,
    path = "/companies/{id}/projects",
    tag = "Organization",
    params(("id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Visible projects of the company", body = Vec<Project>),
        (status = 403, description = "Company not visible"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<Project>>> {
    let resolution = resolve_caller(&state, &auth).await?;
    ensure_company_visible(&resolution, company_id)?;

    let projects = visible_projects(&resolution.record, &resolution.org, Some(company_id));
    Ok(Json(projects.into_iter().cloned().collect()))
}
