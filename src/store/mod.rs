//! Read access to the role store, the org tree and the policy store.
//!
//! The authorization kernel only talks to [`OrgStore`], so it can run
//! against SQLite in the service and against an in-memory store in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::ActiveContext;
use crate::errors::AppResult;
use crate::models::org::{OrgTree, Profile, Tenant};
use crate::models::policy::ApprovalPolicy;
use crate::models::role::{ProjectMembership, RoleAssignment};

#[cfg(test)]
pub mod memory;
pub mod sqlite;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait OrgStore: Send + Sync {
    /// Tenant the user belongs to (or owns).
    async fn tenant_for_user(&self, user_id: Uuid) -> AppResult<Option<Tenant>>;

    /// Every company, department and project of the tenant.
    async fn org_tree(&self, tenant_id: Uuid) -> AppResult<OrgTree>;

    async fn role_assignments(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<Vec<RoleAssignment>>;

    async fn project_memberships(&self, user_id: Uuid) -> AppResult<Vec<ProjectMembership>>;

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;

    async fn save_active_context(&self, user_id: Uuid, context: &ActiveContext) -> AppResult<()>;

    /// The tenant's policy, created with defaults on first read.
    async fn approval_policy(&self, tenant_id: Uuid) -> AppResult<ApprovalPolicy>;

    async fn save_approval_policy(&self, policy: &ApprovalPolicy) -> AppResult<ApprovalPolicy>;
}
