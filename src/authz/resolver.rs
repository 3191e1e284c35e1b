use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::org::{OrgTree, Tenant};
use crate::models::role::{HierarchyRole, MemberRole, ProjectMembership, RoleAssignment, ScopeType};
use crate::store::OrgStore;

use super::record::PermissionRecord;

/// Everything loaded while resolving a user, so callers can reuse the org
/// tree instead of reading it twice.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: PermissionRecord,
    pub tenant: Option<Tenant>,
    pub org: OrgTree,
}

impl Resolution {
    pub fn tenant_id(&self) -> AppResult<Uuid> {
        self.tenant.as_ref().map(|t| t.id).ok_or_else(AppError::forbidden)
    }
}

/// Builds the effective-capability record from raw rows.
///
/// Evaluation order:
/// 1. no tenant -> empty record
/// 2. tenant owner -> every entity of the tenant
/// 3. role assignments and project memberships, dropping rows that point
///    outside the tenant's org tree
pub fn build_record(
    user_id: Uuid,
    tenant: Option<&Tenant>,
    org: &OrgTree,
    assignments: &[RoleAssignment],
    memberships: &[ProjectMembership],
) -> PermissionRecord {
    let Some(tenant) = tenant else {
        return PermissionRecord::empty(user_id, None);
    };

    let mut record = PermissionRecord::empty(user_id, Some(tenant.id));

    if tenant.is_owned_by(user_id) {
        record.is_owner = true;
        record.is_ceo = true;
        record.is_department_head = true;
        record.is_project_leader = true;
        record.can_manage_any = true;
        record.managed_company_ids = org.companies.iter().map(|c| c.id).collect();
        record.accessible_company_ids = record.managed_company_ids.clone();
        record.managed_department_ids = org.departments.iter().map(|d| d.id).collect();
        record.managed_project_ids = org.projects.iter().map(|p| p.id).collect();
        record.all_member_project_ids = record.managed_project_ids.clone();
        return record;
    }

    for assignment in assignments {
        if assignment.tenant_id != tenant.id || assignment.user_id != user_id {
            continue;
        }

        match (assignment.role, assignment.scope_type) {
            (HierarchyRole::Ceo, ScopeType::Company) if org.company(assignment.scope_id).is_some() => {
                record.managed_company_ids.insert(assignment.scope_id);
                record.accessible_company_ids.insert(assignment.scope_id);
            }
            (HierarchyRole::DepartmentHead, ScopeType::Department) if org.department(assignment.scope_id).is_some() => {
                record.managed_department_ids.insert(assignment.scope_id);
            }
            (HierarchyRole::User, ScopeType::Company) if org.company(assignment.scope_id).is_some() => {
                record.accessible_company_ids.insert(assignment.scope_id);
            }
            (role, scope_type) => {
                tracing::warn!(
                    user_id = %user_id,
                    assignment_id = %assignment.id,
                    role = %role,
                    scope_type = scope_type.as_str(),
                    scope_id = %assignment.scope_id,
                    "ignoring role assignment that does not match the org tree"
                );
            }
        }
    }

    for membership in memberships {
        if membership.user_id != user_id {
            continue;
        }
        if org.project(membership.project_id).is_none() {
            tracing::warn!(
                user_id = %user_id,
                project_id = %membership.project_id,
                "ignoring membership of a project outside the tenant"
            );
            continue;
        }

        record.all_member_project_ids.insert(membership.project_id);
        if membership.role == MemberRole::ProjectLeader {
            record.managed_project_ids.insert(membership.project_id);
        }
    }

    record.is_ceo = !record.managed_company_ids.is_empty();
    record.is_department_head = !record.managed_department_ids.is_empty();
    record.is_project_leader = !record.managed_project_ids.is_empty();
    record.can_manage_any = record.is_ceo || record.is_department_head || record.is_project_leader;
    record
}

/// Loads the user's rows from the store and builds their record.
pub async fn resolve(store: &dyn OrgStore, user_id: Uuid) -> AppResult<Resolution> {
    let Some(tenant) = store.tenant_for_user(user_id).await? else {
        tracing::debug!(user_id = %user_id, "user has no tenant");
        return Ok(Resolution {
            record: PermissionRecord::empty(user_id, None),
            tenant: None,
            org: OrgTree::default(),
        });
    };

    let org = store.org_tree(tenant.id).await?;

    let (assignments, memberships) = if tenant.is_owned_by(user_id) {
        (Vec::new(), Vec::new())
    } else {
        (
            store.role_assignments(tenant.id, user_id).await?,
            store.project_memberships(user_id).await?,
        )
    };

    let record = build_record(user_id, Some(&tenant), &org, &assignments, &memberships);
    tracing::debug!(
        user_id = %user_id,
        tenant_id = %tenant.id,
        is_owner = record.is_owner,
        can_manage_any = record.can_manage_any,
        "permissions resolved"
    );

    Ok(Resolution {
        record,
        tenant: Some(tenant),
        org,
    })
}

/// Resolves the caller's record. A missing identity is the only failure.
pub async fn resolve_permissions(store: &dyn OrgStore, user_id: Option<Uuid>) -> AppResult<PermissionRecord> {
    let user_id = user_id.ok_or_else(|| AppError::unauthorized("no user identity"))?;
    Ok(resolve(store, user_id).await?.record)
}
