pub mod context;
pub mod health;
pub mod org;
pub mod policy;
pub mod roles;
pub mod time_entries;

use crate::app::AppState;
use crate::authz::{resolve, Resolution};
use crate::errors::AppResult;
use crate::jwt::AuthUser;

/// Resolves the caller once per request; handlers pass the result down.
pub(crate) async fn resolve_caller(state: &AppState, auth: &AuthUser) -> AppResult<Resolution> {
    resolve(state.store.as_ref(), auth.user_id).await
}
