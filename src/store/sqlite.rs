use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::ActiveContext;
use crate::db::row_parsers::{
    company_from_row, department_from_row, membership_from_row, policy_from_row, profile_from_row,
    project_from_row, role_assignment_from_row, tenant_from_row,
};
use crate::errors::{AppError, AppResult};
use crate::models::org::{OrgTree, Profile, Tenant};
use crate::models::policy::ApprovalPolicy;
use crate::models::role::{ProjectMembership, RoleAssignment};
use crate::utils::utc_now;

use super::OrgStore;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrgStore for SqliteStore {
    async fn tenant_for_user(&self, user_id: Uuid) -> AppResult<Option<Tenant>> {
        let user = user_id.to_string();
        let row = sqlx::query(
            "SELECT id, name, owner_user_id, created_at FROM tenants \
             WHERE owner_user_id = ? OR id = (SELECT tenant_id FROM profiles WHERE id = ?) \
             ORDER BY CASE WHEN owner_user_id = ? THEN 0 ELSE 1 END LIMIT 1",
        )
        .bind(&user)
        .bind(&user)
        .bind(&user)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn org_tree(&self, tenant_id: Uuid) -> AppResult<OrgTree> {
        let tenant = tenant_id.to_string();

        let companies = sqlx::query(
            "SELECT id, tenant_id, name, status, created_at FROM companies WHERE tenant_id = ?",
        )
        .bind(&tenant)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(company_from_row)
        .collect::<AppResult<Vec<_>>>()?;

        let departments = sqlx::query(
            "SELECT id, tenant_id, company_id, parent_id, name, created_at FROM departments WHERE tenant_id = ?",
        )
        .bind(&tenant)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(department_from_row)
        .collect::<AppResult<Vec<_>>>()?;

        let projects = sqlx::query(
            "SELECT id, tenant_id, company_id, department_id, name, created_at FROM projects WHERE tenant_id = ?",
        )
        .bind(&tenant)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(project_from_row)
        .collect::<AppResult<Vec<_>>>()?;

        Ok(OrgTree {
            companies,
            departments,
            projects,
        })
    }

    async fn role_assignments(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<Vec<RoleAssignment>> {
        sqlx::query(
            "SELECT id, tenant_id, user_id, role, scope_type, scope_id, created_at, updated_at \
             FROM role_assignments WHERE tenant_id = ? AND user_id = ? ORDER BY created_at",
        )
        .bind(tenant_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(role_assignment_from_row)
        .collect()
    }

    async fn project_memberships(&self, user_id: Uuid) -> AppResult<Vec<ProjectMembership>> {
        sqlx::query(
            "SELECT id, project_id, user_id, role, created_at, updated_at \
             FROM project_members WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(membership_from_row)
        .collect()
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, email, active_company_id, active_department_id, active_project_id, \
             created_at, updated_at FROM profiles WHERE id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn save_active_context(&self, user_id: Uuid, context: &ActiveContext) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE profiles SET active_company_id = ?, active_department_id = ?, active_project_id = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(context.company_id.map(|id| id.to_string()))
        .bind(context.department_id.map(|id| id.to_string()))
        .bind(context.project_id.map(|id| id.to_string()))
        .bind(utc_now())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("profile not found"));
        }
        Ok(())
    }

    async fn approval_policy(&self, tenant_id: Uuid) -> AppResult<ApprovalPolicy> {
        let defaults = ApprovalPolicy::default_for(tenant_id, utc_now());

        // lazily create; a concurrent first read simply loses the insert
        sqlx::query(
            "INSERT INTO approval_policies (tenant_id, rules, enabled, updated_by, created_at, updated_at) \
             VALUES (?, '{}', 0, NULL, ?, ?) ON CONFLICT(tenant_id) DO NOTHING",
        )
        .bind(tenant_id.to_string())
        .bind(defaults.created_at)
        .bind(defaults.updated_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT tenant_id, rules, enabled, updated_by, created_at, updated_at \
             FROM approval_policies WHERE tenant_id = ?",
        )
        .bind(tenant_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        policy_from_row(&row)
    }

    async fn save_approval_policy(&self, policy: &ApprovalPolicy) -> AppResult<ApprovalPolicy> {
        let rules = serde_json::to_string(&policy.rules)
            .map_err(|e| AppError::internal(format!("failed to encode approval rules: {}", e)))?;

        sqlx::query(
            "INSERT INTO approval_policies (tenant_id, rules, enabled, updated_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(tenant_id) DO UPDATE SET rules = excluded.rules, enabled = excluded.enabled, \
             updated_by = excluded.updated_by, updated_at = excluded.updated_at",
        )
        .bind(policy.tenant_id.to_string())
        .bind(&rules)
        .bind(policy.enabled as i64)
        .bind(policy.updated_by.map(|id| id.to_string()))
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .execute(&self.pool)
        .await?;

        self.approval_policy(policy.tenant_id).await
    }
}
