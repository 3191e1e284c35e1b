//! The caller's own permissions and active context.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    switch_active_company, visible_companies, visible_departments, visible_projects, ActiveContext, ContextSelector,
    PermissionRecord, Resolution,
};
use crate::errors::AppResult;
use crate::events::{log_activity_with_context, Loggable, RequestContext, Severity};
use crate::jwt::AuthUser;
use crate::models::org::{Company, Department, Project};
use crate::models::role::HierarchyRole;

use super::resolve_caller;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me/permissions", get(my_permissions))
        .route("/me/context", get(my_context))
        .route("/me/context/company", put(switch_company))
        .route("/me/context/department", put(switch_department))
        .route("/me/context/project", put(switch_project))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionsResponse {
    #[serde(flatten)]
    pub record: PermissionRecord,
    pub effective_role: HierarchyRole,
    pub held_roles: Vec<HierarchyRole>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContextResponse {
    pub active: ActiveContext,
    pub companies: Vec<Company>,
    /// Departments of the active company
    pub departments: Vec<Department>,
    /// Projects of the active company the caller may see
    pub projects: Vec<Project>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchCompanyRequest {
    pub company_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchDepartmentRequest {
    /// `null` clears the selection
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchProjectRequest {
    /// `null` clears the selection
    pub project_id: Option<Uuid>,
}

/// Audit record of a context switch.
#[derive(Debug, Serialize)]
struct ContextSwitch {
    user_id: Uuid,
    #[serde(flatten)]
    context: ActiveContext,
}

impl Loggable for ContextSwitch {
    fn entity_type() -> &'static str { "active_context" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Noise }
}

fn context_response(resolution: &Resolution, active: ActiveContext) -> ContextResponse {
    let record = &resolution.record;
    let org = &resolution.org;
    ContextResponse {
        active,
        companies: visible_companies(record, org).into_iter().cloned().collect(),
        departments: visible_departments(record, org, active.company_id).into_iter().cloned().collect(),
        projects: visible_projects(record, org, active.company_id).into_iter().cloned().collect(),
    }
}

async fn stored_context(state: &AppState, user_id: Uuid) -> AppResult<ActiveContext> {
    Ok(state
        .store
        .profile(user_id)
        .await?
        .map(|profile| ActiveContext::from(&profile))
        .unwrap_or_default())
}

fn publish_switch(state: &AppState, headers: &HeaderMap, user_id: Uuid, context: ActiveContext) {
    log_activity_with_context(
        &state.event_bus,
        "switched",
        Some(user_id),
        &ContextSwitch { user_id, context },
        None,
        Some(RequestContext::from_headers(headers)),
    );
}

/// Effective permissions of the caller
#[utoipa::path(
    get,
    path = "/me/permissions",
    tag = "Me",
    responses(
        (status = 200, description = "Resolved permission record", body = PermissionsResponse),
        (status = 401, description = "No valid identity"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn my_permissions(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<PermissionsResponse>> {
    let record = resolve_caller(&state, &auth).await?.record;
    Ok(Json(PermissionsResponse {
        effective_role: record.effective_role(),
        held_roles: record.held_roles(),
        record,
    }))
}

/// Active context plus what is visible inside it
#[utoipa::path(
    get,
    path = "/me/context",
    tag = "Me",
    responses((status = 200, description = "Resolved active context", body = ContextResponse)),
    security(("bearerAuth" = []))
)]
pub async fn my_context(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ContextResponse>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let stored = stored_context(&state, auth.user_id).await?;

    let active = ContextSelector::new(&resolution.record, &resolution.org).resolve(stored, auth.company_hint);
    Ok(Json(context_response(&resolution, active)))
}

/// Switch the active company
#[utoipa::path(
    put,
    path = "/me/context/company",
    tag = "Me",
    request_body = SwitchCompanyRequest,
    responses(
        (status = 200, description = "Context switched", body = ContextResponse),
        (status = 403, description = "Company not visible to the caller"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn switch_company(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<SwitchCompanyRequest>,
) -> AppResult<Json<ContextResponse>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let active = switch_active_company(state.store.as_ref(), &resolution, req.company_id).await?;
    publish_switch(&state, &headers, auth.user_id, active);
    Ok(Json(context_response(&resolution, active)))
}

/// Switch the active department within the active company
#[utoipa::path(
    put,
    path = "/me/context/department",
    tag = "Me",
    request_body = SwitchDepartmentRequest,
    responses(
        (status = 200, description = "Context switched", body = ContextResponse),
        (status = 400, description = "No active company"),
        (status = 403, description = "Department not visible to the caller"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn switch_department(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<SwitchDepartmentRequest>,
) -> AppResult<Json<ContextResponse>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let selector = ContextSelector::new(&resolution.record, &resolution.org);
    let current = selector.resolve(stored_context(&state, auth.user_id).await?, auth.company_hint);

    let active = selector.switch_department(current, req.department_id)?;
    state.store.save_active_context(auth.user_id, &active).await?;
    publish_switch(&state, &headers, auth.user_id, active);
    Ok(Json(context_response(&resolution, active)))
}

/// Switch the active project within the active company
#[utoipa::path(
    put,
    path = "/me/context/project",
    tag = "Me",
    request_body = SwitchProjectRequest,
    responses(
        (status = 200, description = "Context switched", body = ContextResponse),
        (status = 400, description = "No active company"),
        (status = 403, description = "Project not visible to the caller"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn switch_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<SwitchProjectRequest>,
) -> AppResult<Json<ContextResponse>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let selector = ContextSelector::new(&resolution.record, &resolution.org);
    let current = selector.resolve(stored_context(&state, auth.user_id).await?, auth.company_hint);

    let active = selector.switch_project(current, req.project_id)?;
    state.store.save_active_context(auth.user_id, &active).await?;
    publish_switch(&state, &headers, auth.user_id, active);
    Ok(Json(context_response(&resolution, active)))
}
