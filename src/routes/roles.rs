//! Role administration
//!
//! Role assignments and project memberships. Every change is published with
//! Critical severity.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::admin::{can_view_roles, ensure_can_grant, ensure_can_manage_membership};
use crate::authz::Resolution;
use crate::db::row_parsers::{membership_from_row, role_assignment_from_row};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::org::ProjectScope;
use crate::models::role::*;
use crate::utils::utc_now;

use super::resolve_caller;

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/roles", get(get_user_roles).post(assign_role))
        .route("/users/:user_id/roles/:assignment_id", delete(revoke_role))
        .route("/projects/:project_id/members", get(list_members).post(add_member))
        .route("/projects/:project_id/members/:user_id", delete(remove_member))
}

/// The target user must belong to the caller's tenant.
async fn ensure_same_tenant(state: &AppState, tenant_id: Uuid, user_id: Uuid) -> AppResult<()> {
    match state.store.tenant_for_user(user_id).await? {
        Some(tenant) if tenant.id == tenant_id => Ok(()),
        _ => Err(AppError::invalid_reference("user does not belong to this tenant")),
    }
}

fn project_scope(resolution: &Resolution, project_id: Uuid) -> AppResult<ProjectScope> {
    resolution
        .org
        .project_scope(project_id)
        .ok_or_else(|| AppError::not_found("project not found"))
}

// =============================================================================
// ROLE ASSIGNMENTS
// =============================================================================

/// Role assignments and memberships of a user
#[utoipa::path(
    get,
    path = "/users/{user_id}/roles",
    tag = "Roles",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Role rows of the user", body = UserRoles),
        (status = 403, description = "Not permitted"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserRoles>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;
    if !can_view_roles(&resolution.record, user_id) {
        return Err(AppError::forbidden());
    }

    let assignments = state.store.role_assignments(tenant_id, user_id).await?;
    let memberships = state
        .store
        .project_memberships(user_id)
        .await?
        .into_iter()
        .filter(|m| resolution.org.project(m.project_id).is_some())
        .collect();

    Ok(Json(UserRoles {
        user_id,
        assignments,
        memberships,
    }))
}

/// Assign a role (upsert on user, role and scope)
#[utoipa::path(
    post,
    path = "/users/{user_id}/roles",
    tag = "Roles",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 201, description = "Role assigned", body = RoleAssignment),
        (status = 400, description = "Role cannot be assigned at that scope"),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "Scope or user outside the tenant"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<(StatusCode, Json<RoleAssignment>)> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;
    ensure_can_grant(&resolution.record, &resolution.org, req.role, req.scope_type, req.scope_id)?;
    ensure_same_tenant(&state, tenant_id, user_id).await?;

    let now = utc_now();
    sqlx::query(
        "INSERT INTO role_assignments (id, tenant_id, user_id, role, scope_type, scope_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, role, scope_type, scope_id) DO UPDATE SET updated_at = excluded.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_id.to_string())
    .bind(user_id.to_string())
    .bind(req.role.as_str())
    .bind(req.scope_type.as_str())
    .bind(req.scope_id.to_string())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let row = sqlx::query(
        "SELECT id, tenant_id, user_id, role, scope_type, scope_id, created_at, updated_at FROM role_assignments \
         WHERE user_id = ? AND role = ? AND scope_type = ? AND scope_id = ?",
    )
    .bind(user_id.to_string())
    .bind(req.role.as_str())
    .bind(req.scope_type.as_str())
    .bind(req.scope_id.to_string())
    .fetch_one(&state.pool)
    .await?;
    let assignment = role_assignment_from_row(&row)?;

    tracing::info!(
        actor_id = %auth.user_id,
        user_id = %user_id,
        role = %assignment.role,
        scope_id = %assignment.scope_id,
        "role assigned"
    );
    log_activity_with_context(
        &state.event_bus,
        "assigned",
        Some(auth.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Revoke a role assignment
#[utoipa::path(
    delete,
    path = "/users/{user_id}/roles/{assignment_id}",
    tag = "Roles",
    params(
        ("user_id" = Uuid, Path, description = "User ID"),
        ("assignment_id" = Uuid, Path, description = "Role assignment ID"),
    ),
    responses(
        (status = 204, description = "Role revoked"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Assignment not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((user_id, assignment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;

    let row = sqlx::query(
        "SELECT id, tenant_id, user_id, role, scope_type, scope_id, created_at, updated_at FROM role_assignments \
         WHERE id = ? AND user_id = ? AND tenant_id = ?",
    )
    .bind(assignment_id.to_string())
    .bind(user_id.to_string())
    .bind(tenant_id.to_string())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::not_found("role assignment not found"))?;
    let assignment = role_assignment_from_row(&row)?;

    // the owner can also clean up grants whose scope no longer exists
    if !resolution.record.is_owner {
        ensure_can_grant(
            &resolution.record,
            &resolution.org,
            assignment.role,
            assignment.scope_type,
            assignment.scope_id,
        )?;
    }

    sqlx::query("DELETE FROM role_assignments WHERE id = ?")
        .bind(assignment_id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, role = %assignment.role, "role revoked");
    log_activity_with_context(
        &state.event_bus,
        "revoked",
        Some(auth.user_id),
        &assignment,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// PROJECT MEMBERSHIPS
// =============================================================================

async fn find_membership(state: &AppState, project_id: Uuid, user_id: Uuid) -> AppResult<Option<ProjectMembership>> {
    let row = sqlx::query(
        "SELECT id, project_id, user_id, role, created_at, updated_at FROM project_members \
         WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(&state.pool)
    .await?;

    row.as_ref().map(membership_from_row).transpose()
}

/// Members of a project
#[utoipa::path(
    get,
    path = "/projects/{project_id}/members",
    tag = "Roles",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project members", body = Vec<ProjectMembership>),
        (status = 403, description = "Not permitted"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectMembership>>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let scope = project_scope(&resolution, project_id)?;
    if !resolution.record.can_book_on(&scope) {
        return Err(AppError::forbidden());
    }

    let members = sqlx::query(
        "SELECT id, project_id, user_id, role, created_at, updated_at FROM project_members \
         WHERE project_id = ? ORDER BY created_at",
    )
    .bind(project_id.to_string())
    .fetch_all(&state.pool)
    .await?
    .iter()
    .map(membership_from_row)
    .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(members))
}

/// Add a member to a project, or change their project role
#[utoipa::path(
    post,
    path = "/projects/{project_id}/members",
    tag = "Roles",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = ProjectMembership),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "User outside the tenant"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<ProjectMembership>)> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;
    let scope = project_scope(&resolution, project_id)?;
    let role = req.role.unwrap_or(MemberRole::User);

    ensure_can_manage_membership(&resolution.record, &scope, role)?;
    // demoting an existing leader needs leader-level authority too
    let previous = find_membership(&state, project_id, req.user_id).await?;
    if let Some(existing) = &previous {
        ensure_can_manage_membership(&resolution.record, &scope, existing.role)?;
    }
    ensure_same_tenant(&state, tenant_id, req.user_id).await?;

    let now = utc_now();
    sqlx::query(
        "INSERT INTO project_members (id, project_id, user_id, role, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(project_id, user_id) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(project_id.to_string())
    .bind(req.user_id.to_string())
    .bind(role.as_str())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let membership = find_membership(&state, project_id, req.user_id)
        .await?
        .ok_or_else(|| AppError::internal("membership missing after upsert"))?;

    tracing::info!(
        actor_id = %auth.user_id,
        user_id = %req.user_id,
        project_id = %project_id,
        role = role.as_str(),
        "project member added"
    );
    log_activity_with_context(
        &state.event_bus,
        "added",
        Some(auth.user_id),
        &membership,
        previous.as_ref(),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(membership)))
}

/// Remove a member from a project
#[utoipa::path(
    delete,
    path = "/projects/{project_id}/members/{user_id}",
    tag = "Roles",
    params(
        ("project_id" = Uuid, Path, description = "Project ID"),
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Membership not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let resolution = resolve_caller(&state, &auth).await?;
    let scope = project_scope(&resolution, project_id)?;
    let membership = find_membership(&state, project_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("membership not found"))?;

    ensure_can_manage_membership(&resolution.record, &scope, membership.role)?;

    sqlx::query("DELETE FROM project_members WHERE id = ?")
        .bind(membership.id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, project_id = %project_id, "project member removed");
    log_activity_with_context(
        &state.event_bus,
        "removed",
        Some(auth.user_id),
        &membership,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}
