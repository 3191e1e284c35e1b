//! Who may change role assignments and project memberships.

use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::org::{OrgTree, ProjectScope};
use crate::models::role::{HierarchyRole, MemberRole, ScopeType};

use super::record::PermissionRecord;

/// Resolves the company a role grant lives in, rejecting role/scope
/// combinations the hierarchy does not know and scopes outside the tenant.
pub fn grant_company(org: &OrgTree, role: HierarchyRole, scope_type: ScopeType, scope_id: Uuid) -> AppResult<Uuid> {
    match (role, scope_type) {
        (HierarchyRole::Ceo | HierarchyRole::User, ScopeType::Company) => org
            .company(scope_id)
            .map(|c| c.id)
            .ok_or_else(|| AppError::invalid_reference("company does not exist in this tenant")),
        (HierarchyRole::DepartmentHead, ScopeType::Department) => org
            .department(scope_id)
            .map(|d| d.company_id)
            .ok_or_else(|| AppError::invalid_reference("department does not exist in this tenant")),
        (HierarchyRole::ProjectLeader, _) => Err(AppError::bad_request(
            "project leadership is granted through project membership",
        )),
        (HierarchyRole::TenantOwner, _) => Err(AppError::bad_request("tenant ownership cannot be assigned")),
        (role, scope_type) => Err(AppError::bad_request(format!(
            "{} cannot be assigned at {} scope",
            role,
            scope_type.as_str()
        ))),
    }
}

/// Owner, or CEO of the company the grant lives in.
pub fn ensure_can_grant(
    actor: &PermissionRecord,
    org: &OrgTree,
    role: HierarchyRole,
    scope_type: ScopeType,
    scope_id: Uuid,
) -> AppResult<()> {
    let company_id = grant_company(org, role, scope_type, scope_id)?;
    if actor.manages_company(company_id) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %actor.user_id,
        role = %role,
        scope_id = %scope_id,
        "role grant denied"
    );
    Err(AppError::forbidden())
}

/// Owner, CEO of the project's company, head of its department, or its
/// leader. Leaders only handle plain members.
pub fn can_manage_membership(actor: &PermissionRecord, target: &ProjectScope, role: MemberRole) -> bool {
    if actor.manages_company(target.company_id) {
        return true;
    }
    if target.department_id.is_some_and(|id| actor.manages_department(id)) {
        return true;
    }
    role == MemberRole::User && actor.leads_project(target.project_id)
}

pub fn ensure_can_manage_membership(actor: &PermissionRecord, target: &ProjectScope, role: MemberRole) -> AppResult<()> {
    if can_manage_membership(actor, target, role) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %actor.user_id,
        project_id = %target.project_id,
        role = role.as_str(),
        "membership change denied"
    );
    Err(AppError::forbidden())
}

/// A user's role rows are readable by the user and by the tenant owner.
pub fn can_view_roles(actor: &PermissionRecord, user_id: Uuid) -> bool {
    actor.user_id == user_id || actor.is_owner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn combinations_outside_the_hierarchy_are_rejected() {
        let (mut store, tenant_id) = MemoryStore::with_tenant(Uuid::new_v4());
        let company = store.add_company(tenant_id, "Alpha");
        let department = store.add_department(tenant_id, company, "Engineering");

        assert_eq!(
            grant_company(&store.org, HierarchyRole::DepartmentHead, ScopeType::Department, department).unwrap(),
            company
        );
        assert!(matches!(
            grant_company(&store.org, HierarchyRole::Ceo, ScopeType::Department, department),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            grant_company(&store.org, HierarchyRole::TenantOwner, ScopeType::Company, company),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            grant_company(&store.org, HierarchyRole::Ceo, ScopeType::Company, Uuid::new_v4()),
            Err(AppError::InvalidReference(_))
        ));
    }

    #[test]
    fn ceo_grants_only_inside_their_company() {
        let (mut store, tenant_id) = MemoryStore::with_tenant(Uuid::new_v4());
        let alpha = store.add_company(tenant_id, "Alpha");
        let beta = store.add_company(tenant_id, "Beta");
        let beta_sales = store.add_department(tenant_id, beta, "Sales");

        let mut ceo = PermissionRecord::empty(Uuid::new_v4(), Some(tenant_id));
        ceo.is_ceo = true;
        ceo.managed_company_ids.insert(alpha);

        assert!(ensure_can_grant(&ceo, &store.org, HierarchyRole::User, ScopeType::Company, alpha).is_ok());
        assert!(matches!(
            ensure_can_grant(&ceo, &store.org, HierarchyRole::DepartmentHead, ScopeType::Department, beta_sales),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn project_leader_adds_plain_members_only() {
        let target = ProjectScope {
            project_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            department_id: None,
        };
        let mut leader = PermissionRecord::empty(Uuid::new_v4(), Some(Uuid::new_v4()));
        leader.is_project_leader = true;
        leader.managed_project_ids.insert(target.project_id);

        assert!(can_manage_membership(&leader, &target, MemberRole::User));
        assert!(!can_manage_membership(&leader, &target, MemberRole::ProjectLeader));

        let mut head = PermissionRecord::empty(Uuid::new_v4(), Some(Uuid::new_v4()));
        head.managed_department_ids.insert(Uuid::new_v4());
        assert!(!can_manage_membership(&head, &target, MemberRole::User));
    }
}
