use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::policy::{normalize_matrix, ApprovalPolicy, PolicyUpdateRequest};
use crate::utils::utc_now;

use super::resolve_caller;

pub fn routes() -> Router<AppState> {
    Router::new().route("/approval-policy", get(get_policy).put(update_policy))
}

/// The tenant's approval policy (created disabled on first read)
#[utoipa::path(
    get,
    path = "/approval-policy",
    tag = "Approval policy",
    responses((status = 200, description = "Current policy", body = ApprovalPolicy)),
    security(("bearerAuth" = []))
)]
pub async fn get_policy(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<ApprovalPolicy>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let policy = state.store.approval_policy(resolution.tenant_id()?).await?;
    Ok(Json(policy))
}

/// Replace the approval matrix and enabled flag (tenant owner only)
#[utoipa::path(
    put,
    path = "/approval-policy",
    tag = "Approval policy",
    request_body = PolicyUpdateRequest,
    responses(
        (status = 200, description = "Updated policy", body = ApprovalPolicy),
        (status = 403, description = "Not permitted"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_policy(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<PolicyUpdateRequest>,
) -> AppResult<Json<ApprovalPolicy>> {
    let resolution = resolve_caller(&state, &auth).await?;
    let tenant_id = resolution.tenant_id()?;
    if !resolution.record.is_owner {
        tracing::warn!(user_id = %auth.user_id, "approval policy update denied");
        return Err(AppError::forbidden());
    }

    let previous = state.store.approval_policy(tenant_id).await?;
    let next = ApprovalPolicy {
        rules: normalize_matrix(req.rules),
        enabled: req.enabled,
        updated_by: Some(auth.user_id),
        updated_at: utc_now(),
        ..previous.clone()
    };
    let saved = state.store.save_approval_policy(&next).await?;

    tracing::info!(tenant_id = %tenant_id, enabled = saved.enabled, "approval policy updated");
    log_activity_with_context(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &saved,
        Some(&previous),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(saved))
}
