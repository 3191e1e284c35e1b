//! Time entries
//!
//! Handlers load the entry, run it through [`crate::workflow`] and persist
//! the result with an update conditioned on the version the transition
//! started from. Losing that race to a status change reports the guard of
//! the expected status; losing it to a field edit is a conflict.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{resolve, Resolution};
use crate::db::row_parsers::time_entry_from_row;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::org::ProjectScope;
use crate::models::role::HierarchyRole;
use crate::models::time_entry::*;
use crate::utils::utc_now;
use crate::workflow::{new_entry, transition, EntryAction, GuardViolation, Transition, TransitionContext, TransitionError};

use super::resolve_caller;

const ENTRY_COLUMNS: &str = "id, tenant_id, user_id, project_id, entry_date, hours, minutes, description, \
     is_additional_work, additional_work_reason, status, created_by, created_at, updated_by, updated_at, \
     submitted_by, submitted_at, approved_by, approved_at, rejected_by, rejected_at, rejection_reason";

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/pending", get(pending_approvals))
        .route("/:id", get(get_entry).put(update_entry).delete(delete_entry))
        .route("/:id/submit", post(submit_entry))
        .route("/:id/approve", post(approve_entry))
        .route("/:id/reject", post(reject_entry))
}

// =============================================================================
// PERSISTENCE
// =============================================================================

async fn load_entry(state: &AppState, tenant_id: Uuid, id: Uuid) -> AppResult<TimeEntry> {
    let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = ? AND tenant_id = ?"))
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("time entry not found"))?;

    time_entry_from_row(&row)
}

fn opt_id(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

async fn insert_entry(state: &AppState, entry: &TimeEntry) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO time_entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(entry.id.to_string())
    .bind(entry.tenant_id.to_string())
    .bind(entry.user_id.to_string())
    .bind(entry.project_id.to_string())
    .bind(entry.entry_date.format("%Y-%m-%d").to_string())
    .bind(entry.hours)
    .bind(entry.minutes)
    .bind(&entry.description)
    .bind(entry.is_additional_work as i64)
    .bind(&entry.additional_work_reason)
    .bind(entry.status.as_str())
    .bind(entry.created_by.to_string())
    .bind(entry.created_at)
    .bind(opt_id(entry.updated_by))
    .bind(entry.updated_at)
    .bind(opt_id(entry.submitted_by))
    .bind(entry.submitted_at)
    .bind(opt_id(entry.approved_by))
    .bind(entry.approved_at)
    .bind(opt_id(entry.rejected_by))
    .bind(entry.rejected_at)
    .bind(&entry.rejection_reason)
    .execute(&state.pool)
    .await?;
    Ok(())
}

/// Writes `next` only if the stored row is still the `loaded` version.
async fn update_entry_if(state: &AppState, next: &TimeEntry, loaded: &TimeEntry) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE time_entries SET project_id = ?, entry_date = ?, hours = ?, minutes = ?, description = ?, \
         is_additional_work = ?, additional_work_reason = ?, status = ?, updated_by = ?, updated_at = ?, \
         submitted_by = ?, submitted_at = ?, approved_by = ?, approved_at = ?, rejected_by = ?, rejected_at = ?, \
         rejection_reason = ? WHERE id = ? AND status = ? AND updated_at IS ?",
    )
    .bind(next.project_id.to_string())
    .bind(next.entry_date.format("%Y-%m-%d").to_string())
    .bind(next.hours)
    .bind(next.minutes)
    .bind(&next.description)
    .bind(next.is_additional_work as i64)
    .bind(&next.additional_work_reason)
    .bind(next.status.as_str())
    .bind(opt_id(next.updated_by))
    .bind(next.updated_at)
    .bind(opt_id(next.submitted_by))
    .bind(next.submitted_at)
    .bind(opt_id(next.approved_by))
    .bind(next.approved_at)
    .bind(opt_id(next.rejected_by))
    .bind(next.rejected_at)
    .bind(&next.rejection_reason)
    .bind(next.id.to_string())
    .bind(loaded.status.as_str())
    .bind(loaded.updated_at)
    .execute(&state.pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn delete_draft(state: &AppState, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM time_entries WHERE id = ? AND status = 'draft'")
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

// =============================================================================
// AUTHORIZATION HELPERS
// =============================================================================

fn entry_scope(resolution: &Resolution, project_id: Uuid) -> AppResult<ProjectScope> {
    resolution
        .org
        .project_scope(project_id)
        .ok_or_else(|| AppError::invalid_reference("project does not exist in this tenant"))
}

/// Effective role of the entry owner, for the approval matrix lookup.
async fn submitter_role(state: &AppState, caller: &Resolution, owner_id: Uuid) -> AppResult<HierarchyRole> {
    if owner_id == caller.record.user_id {
        return Ok(caller.record.effective_role());
    }
    Ok(resolve(state.store.as_ref(), owner_id).await?.record.effective_role())
}

/// The caller's resolution and the entry they address, loaded once per
/// request.
async fn load_for(state: &AppState, auth: &AuthUser, id: Uuid) -> AppResult<(Resolution, TimeEntry)> {
    let resolution = resolve_caller(state, auth).await?;
    let entry = load_entry(state, resolution.tenant_id()?, id).await?;
    Ok((resolution, entry))
}

/// Transitions and persists an already loaded entry.
async fn apply(
    state: &AppState,
    auth: &AuthUser,
    headers: &HeaderMap,
    resolution: &Resolution,
    entry: TimeEntry,
    action: EntryAction,
) -> AppResult<Transition> {
    let name = action.name();
    if action.owner_only() && entry.user_id != resolution.record.user_id {
        tracing::warn!(user_id = %auth.user_id, entry_id = %entry.id, action = name, "time entry transition denied");
        return Err(AppError::forbidden());
    }

    let tenant_id = resolution.tenant_id()?;
    let target_project = match &action {
        EntryAction::Edit(draft) => draft.project_id,
        _ => entry.project_id,
    };
    let target = entry_scope(resolution, target_project)?;
    let policy = state.store.approval_policy(tenant_id).await?;
    let submitter_role = match action {
        EntryAction::Approve | EntryAction::Reject { .. } => submitter_role(state, resolution, entry.user_id).await?,
        _ => HierarchyRole::User,
    };

    let ctx = TransitionContext {
        actor: &resolution.record,
        policy: &policy,
        evaluator: state.evaluator.as_ref(),
        submitter_role,
        target,
        now: utc_now(),
    };

    let expected = action.required_status();
    let violation = action.status_violation();

    let outcome = transition(&entry, action, &ctx).map_err(|err| {
        if err == TransitionError::Denied {
            tracing::warn!(
                user_id = %auth.user_id,
                entry_id = %entry.id,
                action = name,
                submitter_role = %submitter_role,
                project_id = %target.project_id,
                "time entry transition denied"
            );
        }
        AppError::from(err)
    })?;

    let persisted = match &outcome {
        Transition::Updated(next) => update_entry_if(state, next, &entry).await?,
        Transition::Deleted(id) => delete_draft(state, *id).await?,
    };
    if !persisted {
        return Err(lost_race(state, tenant_id, &entry, expected, violation).await?);
    }

    let current = match &outcome {
        Transition::Updated(next) => next,
        Transition::Deleted(_) => &entry,
    };
    tracing::info!(entry_id = %entry.id, action = name, status = current.status.as_str(), "time entry transitioned");
    log_activity_with_context(
        &state.event_bus,
        name,
        Some(auth.user_id),
        current,
        Some(&entry),
        Some(RequestContext::from_headers(headers)),
    );

    Ok(outcome)
}

/// Error for a write that matched no row: the guard of the status the
/// entry has moved out of, or a conflict when only its fields changed.
async fn lost_race(
    state: &AppState,
    tenant_id: Uuid,
    entry: &TimeEntry,
    expected: EntryStatus,
    violation: GuardViolation,
) -> AppResult<AppError> {
    let still_expected = match load_entry(state, tenant_id, entry.id).await {
        Ok(current) => current.status == expected,
        Err(AppError::NotFound(_)) => false,
        Err(err) => return Err(err),
    };
    if still_expected {
        tracing::info!(entry_id = %entry.id, "time entry modified concurrently");
        return Ok(AppError::conflict("time entry was modified concurrently"));
    }
    Ok(AppError::InvalidTransition(violation))
}

fn updated(outcome: Transition) -> AppResult<Json<TimeEntry>> {
    match outcome {
        Transition::Updated(entry) => Ok(Json(entry)),
        Transition::Deleted(_) => Err(AppError::internal("entry was deleted")),
    }
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// The caller's own entries
#[utoipa::path(
    get,
    path = "/time-entries",
    tag = "Time entries",
    params(TimeEntryListQuery),
    responses((status = 200, description = "Own entries, newest first", body = Vec<TimeEntry>)),
    security(("bearerAuth" = []))
)]
pub async fn list_entries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TimeEntryListQuery>,
) -> AppResult<Json<Vec<TimeEntry>>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;

    let rows = match query.status {
        Some(status) => {
            sqlx::query(&format!(
                "SELECT {ENTRY_COLUMNS} FROM time_entries WHERE tenant_id = ? AND user_id = ? AND status = ? \
                 ORDER BY entry_date DESC, created_at DESC"
            ))
            .bind(tenant_id.to_string())
            .bind(auth.user_id.to_string())
            .bind(status.as_str())
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {ENTRY_COLUMNS} FROM time_entries WHERE tenant_id = ? AND user_id = ? \
                 ORDER BY entry_date DESC, created_at DESC"
            ))
            .bind(tenant_id.to_string())
            .bind(auth.user_id.to_string())
            .fetch_all(&state.pool)
            .await?
        }
    };

    let entries = rows.iter().map(time_entry_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(entries))
}

/// Create a draft entry
#[utoipa::path(
    post,
    path = "/time-entries",
    tag = "Time entries",
    request_body = EntryDraft,
    responses(
        (status = 201, description = "Draft created", body = TimeEntry),
        (status = 403, description = "Not permitted to book on the project"),
        (status = 422, description = "Invalid duration, missing justification or unknown project"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(draft): Json<EntryDraft>,
) -> AppResult<(StatusCode, Json<TimeEntry>)> {
    let resolution = resolve_caller(&state, &auth).await?;
    let target = entry_scope(&resolution, draft.project_id)?;

    let entry = new_entry(&resolution.record, draft, &target, utc_now())?;
    insert_entry(&state, &entry).await?;

    tracing::info!(entry_id = %entry.id, project_id = %entry.project_id, "time entry created");
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &entry,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Submitted entries the caller may decide on
#[utoipa::path(
    get,
    path = "/time-entries/pending",
    tag = "Time entries",
    responses((status = 200, description = "Entries awaiting the caller's decision", body = Vec<TimeEntry>)),
    security(("bearerAuth" = []))
)]
pub async fn pending_approvals(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<TimeEntry>>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;
    let policy = state.store.approval_policy(tenant_id).await?;

    let submitted = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM time_entries WHERE tenant_id = ? AND status = 'submitted' \
         ORDER BY submitted_at, created_at"
    ))
    .bind(tenant_id.to_string())
    .fetch_all(&state.pool)
    .await?
    .iter()
    .map(time_entry_from_row)
    .collect::<AppResult<Vec<_>>>()?;

    let mut roles: HashMap<Uuid, HierarchyRole> = HashMap::new();
    let mut pending = Vec::new();
    for entry in submitted {
        let Some(target) = resolution.org.project_scope(entry.project_id) else {
            continue;
        };
        let role = match roles.get(&entry.user_id) {
            Some(role) => *role,
            None => {
                let role = submitter_role(&state, &resolution, entry.user_id).await?;
                roles.insert(entry.user_id, role);
                role
            }
        };
        if state.evaluator.can_approve(&policy, &resolution.record, role, &target) {
            pending.push(entry);
        }
    }

    Ok(Json(pending))
}

/// One entry, visible to its owner and to whoever may decide on it
#[utoipa::path(
    get,
    path = "/time-entries/{id}",
    tag = "Time entries",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    responses(
        (status = 200, description = "The entry", body = TimeEntry),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "Entry not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TimeEntry>> {
    let (resolution, entry) = load_for(&state, &auth, id).await?;
    let tenant_id = resolution.tenant_id()?;

    if entry.user_id == auth.user_id {
        return Ok(Json(entry));
    }

    let target = entry_scope(&resolution, entry.project_id)?;
    let policy = state.store.approval_policy(tenant_id).await?;
    let role = submitter_role(&state, &resolution, entry.user_id).await?;
    if state.evaluator.can_approve(&policy, &resolution.record, role, &target) || resolution.record.manages_project(&target) {
        return Ok(Json(entry));
    }

    Err(AppError::forbidden())
}

/// Edit a draft entry (owner only)
#[utoipa::path(
    put,
    path = "/time-entries/{id}",
    tag = "Time entries",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    request_body = TimeEntryUpdateRequest,
    responses(
        (status = 200, description = "Entry updated", body = TimeEntry),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "Entry is not a draft, or the new values are invalid"),
        (status = 409, description = "Entry was modified concurrently"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<TimeEntryUpdateRequest>,
) -> AppResult<Json<TimeEntry>> {
    let (resolution, entry) = load_for(&state, &auth, id).await?;
    let draft = EntryDraft::from_entry(&entry).merged(patch);

    updated(apply(&state, &auth, &headers, &resolution, entry, EntryAction::Edit(draft)).await?)
}

/// Delete a draft entry (owner only)
#[utoipa::path(
    delete,
    path = "/time-entries/{id}",
    tag = "Time entries",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "Entry is not a draft"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (resolution, entry) = load_for(&state, &auth, id).await?;
    apply(&state, &auth, &headers, &resolution, entry, EntryAction::Delete).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Submit a draft; approved immediately when the tenant policy is disabled
#[utoipa::path(
    post,
    path = "/time-entries/{id}/submit",
    tag = "Time entries",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    responses(
        (status = 200, description = "Entry submitted (or auto-approved)", body = TimeEntry),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "Entry is not a draft"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn submit_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TimeEntry>> {
    let (resolution, entry) = load_for(&state, &auth, id).await?;
    updated(apply(&state, &auth, &headers, &resolution, entry, EntryAction::Submit).await?)
}

/// Approve a submitted entry
#[utoipa::path(
    post,
    path = "/time-entries/{id}/approve",
    tag = "Time entries",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    responses(
        (status = 200, description = "Entry approved", body = TimeEntry),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "Entry is not submitted"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn approve_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TimeEntry>> {
    let (resolution, entry) = load_for(&state, &auth, id).await?;
    updated(apply(&state, &auth, &headers, &resolution, entry, EntryAction::Approve).await?)
}

/// Reject a submitted entry with a reason
#[utoipa::path(
    post,
    path = "/time-entries/{id}/reject",
    tag = "Time entries",
    params(("id" = Uuid, Path, description = "Time entry ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Entry rejected", body = TimeEntry),
        (status = 403, description = "Not permitted"),
        (status = 422, description = "Entry is not submitted, or the reason is missing"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn reject_entry(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> AppResult<Json<TimeEntry>> {
    let (resolution, entry) = load_for(&state, &auth, id).await?;
    updated(apply(&state, &auth, &headers, &resolution, entry, EntryAction::Reject { reason: req.reason }).await?)
}
