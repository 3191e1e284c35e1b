use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::org::ProjectScope;
use crate::models::role::HierarchyRole;

/// Effective capabilities of one user inside one tenant.
///
/// Built once per request by the resolver and passed down to every check, so
/// visibility and enforcement always read the same derived truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PermissionRecord {
    pub user_id: Uuid,
    /// `None` when the user belongs to no tenant; every set is then empty
    pub tenant_id: Option<Uuid>,
    pub is_owner: bool,
    pub is_ceo: bool,
    pub is_department_head: bool,
    pub is_project_leader: bool,
    pub can_manage_any: bool,
    #[schema(value_type = Vec<Uuid>)]
    pub managed_company_ids: BTreeSet<Uuid>,
    #[schema(value_type = Vec<Uuid>)]
    pub managed_department_ids: BTreeSet<Uuid>,
    #[schema(value_type = Vec<Uuid>)]
    pub managed_project_ids: BTreeSet<Uuid>,
    #[schema(value_type = Vec<Uuid>)]
    pub accessible_company_ids: BTreeSet<Uuid>,
    #[schema(value_type = Vec<Uuid>)]
    pub all_member_project_ids: BTreeSet<Uuid>,
}

impl PermissionRecord {
    /// The fail-closed record: no flags, no scopes.
    pub fn empty(user_id: Uuid, tenant_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            tenant_id,
            is_owner: false,
            is_ceo: false,
            is_department_head: false,
            is_project_leader: false,
            can_manage_any: false,
            managed_company_ids: BTreeSet::new(),
            managed_department_ids: BTreeSet::new(),
            managed_project_ids: BTreeSet::new(),
            accessible_company_ids: BTreeSet::new(),
            all_member_project_ids: BTreeSet::new(),
        }
    }

    pub fn manages_company(&self, company_id: Uuid) -> bool {
        self.is_owner || self.managed_company_ids.contains(&company_id)
    }

    pub fn manages_department(&self, department_id: Uuid) -> bool {
        self.is_owner || self.managed_department_ids.contains(&department_id)
    }

    pub fn leads_project(&self, project_id: Uuid) -> bool {
        self.is_owner || self.managed_project_ids.contains(&project_id)
    }

    pub fn is_member_of(&self, project_id: Uuid) -> bool {
        self.is_owner || self.all_member_project_ids.contains(&project_id)
    }

    /// Whether the user holds `role` somewhere in the tenant. Everyone holds
    /// `User`; the owner holds everything.
    pub fn holds(&self, role: HierarchyRole) -> bool {
        if self.is_owner {
            return true;
        }
        match role {
            HierarchyRole::TenantOwner => false,
            HierarchyRole::Ceo => self.is_ceo,
            HierarchyRole::DepartmentHead => self.is_department_head,
            HierarchyRole::ProjectLeader => self.is_project_leader,
            HierarchyRole::User => true,
        }
    }

    pub fn held_roles(&self) -> Vec<HierarchyRole> {
        HierarchyRole::ALL.into_iter().filter(|role| self.holds(*role)).collect()
    }

    /// Most senior role held; the approval matrix row is looked up by it.
    pub fn effective_role(&self) -> HierarchyRole {
        self.held_roles().into_iter().max().unwrap_or(HierarchyRole::User)
    }

    /// Whether `role`, as held by this user, reaches the given project.
    ///
    /// CEO authority is company-scoped, DepartmentHead authority is
    /// department-scoped, ProjectLeader and User authority follow project
    /// membership.
    pub fn role_reaches(&self, role: HierarchyRole, target: &ProjectScope) -> bool {
        if self.is_owner {
            return true;
        }
        match role {
            HierarchyRole::TenantOwner => false,
            HierarchyRole::Ceo => self.managed_company_ids.contains(&target.company_id),
            HierarchyRole::DepartmentHead => target
                .department_id
                .is_some_and(|id| self.managed_department_ids.contains(&id)),
            HierarchyRole::ProjectLeader => self.managed_project_ids.contains(&target.project_id),
            HierarchyRole::User => self.all_member_project_ids.contains(&target.project_id),
        }
    }

    /// Management authority over a project through any managerial role.
    pub fn manages_project(&self, target: &ProjectScope) -> bool {
        [HierarchyRole::Ceo, HierarchyRole::DepartmentHead, HierarchyRole::ProjectLeader]
            .into_iter()
            .any(|role| self.role_reaches(role, target))
    }

    /// Whether the user may book time on the project: a member of it, or a
    /// manager whose scope contains it.
    pub fn can_book_on(&self, target: &ProjectScope) -> bool {
        self.is_member_of(target.project_id) || self.manages_project(target)
    }
}
