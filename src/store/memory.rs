use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::authz::ActiveContext;
use crate::errors::{AppError, AppResult};
use crate::models::org::{Company, CompanyStatus, Department, OrgTree, Profile, Project, Tenant};
use crate::models::policy::ApprovalPolicy;
use crate::models::role::{HierarchyRole, MemberRole, ProjectMembership, RoleAssignment, ScopeType};

use super::OrgStore;

/// Test double holding one tenant's rows in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub tenants: Vec<Tenant>,
    pub org: OrgTree,
    pub assignments: Vec<RoleAssignment>,
    pub memberships: Vec<ProjectMembership>,
    pub profiles: Mutex<HashMap<Uuid, Profile>>,
    pub policies: Mutex<HashMap<Uuid, ApprovalPolicy>>,
}

impl MemoryStore {
    pub fn with_tenant(owner: Uuid) -> (Self, Uuid) {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Tenant".into(),
            owner_user_id: owner,
            created_at: Utc::now(),
        };
        let id = tenant.id;
        let store = Self {
            tenants: vec![tenant],
            ..Default::default()
        };
        store.add_profile(id, owner);
        (store, id)
    }

    pub fn add_profile(&self, tenant_id: Uuid, user_id: Uuid) {
        let now = Utc::now();
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(
                user_id,
                Profile {
                    id: user_id,
                    tenant_id: Some(tenant_id),
                    name: "Someone".into(),
                    email: format!("{user_id}@example.test"),
                    active_company_id: None,
                    active_department_id: None,
                    active_project_id: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
    }

    pub fn add_company(&mut self, tenant_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.org.companies.push(Company {
            id,
            tenant_id,
            name: name.into(),
            status: CompanyStatus::Active,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_department(&mut self, tenant_id: Uuid, company_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.org.departments.push(Department {
            id,
            tenant_id,
            company_id,
            parent_id: None,
            name: name.into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_project(&mut self, tenant_id: Uuid, company_id: Uuid, department_id: Option<Uuid>, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.org.projects.push(Project {
            id,
            tenant_id,
            company_id,
            department_id,
            name: name.into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn assign(&mut self, tenant_id: Uuid, user_id: Uuid, role: HierarchyRole, scope_type: ScopeType, scope_id: Uuid) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.assignments.push(RoleAssignment {
            id,
            tenant_id,
            user_id,
            role,
            scope_type,
            scope_id,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn add_member(&mut self, project_id: Uuid, user_id: Uuid, role: MemberRole) {
        let now = Utc::now();
        self.memberships.push(ProjectMembership {
            id: Uuid::new_v4(),
            project_id,
            user_id,
            role,
            created_at: now,
            updated_at: now,
        });
    }

    pub fn stored_profile(&self, user_id: Uuid) -> Option<Profile> {
        self.profiles.lock().ok()?.get(&user_id).cloned()
    }
}

fn poisoned() -> AppError {
    AppError::internal("memory store lock poisoned")
}

#[async_trait]
impl OrgStore for MemoryStore {
    async fn tenant_for_user(&self, user_id: Uuid) -> AppResult<Option<Tenant>> {
        let tenant_id = self
            .profiles
            .lock()
            .map_err(|_| poisoned())?
            .get(&user_id)
            .and_then(|p| p.tenant_id);
        Ok(self
            .tenants
            .iter()
            .find(|t| t.owner_user_id == user_id || Some(t.id) == tenant_id)
            .cloned())
    }

    async fn org_tree(&self, _tenant_id: Uuid) -> AppResult<OrgTree> {
        Ok(self.org.clone())
    }

    async fn role_assignments(&self, tenant_id: Uuid, user_id: Uuid) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.tenant_id == tenant_id && a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn project_memberships(&self, user_id: Uuid) -> AppResult<Vec<ProjectMembership>> {
        Ok(self.memberships.iter().filter(|m| m.user_id == user_id).cloned().collect())
    }

    async fn profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.profiles.lock().map_err(|_| poisoned())?.get(&user_id).cloned())
    }

    async fn save_active_context(&self, user_id: Uuid, context: &ActiveContext) -> AppResult<()> {
        let mut profiles = self.profiles.lock().map_err(|_| poisoned())?;
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| AppError::not_found("profile not found"))?;
        profile.active_company_id = context.company_id;
        profile.active_department_id = context.department_id;
        profile.active_project_id = context.project_id;
        Ok(())
    }

    async fn approval_policy(&self, tenant_id: Uuid) -> AppResult<ApprovalPolicy> {
        let mut policies = self.policies.lock().map_err(|_| poisoned())?;
        Ok(policies
            .entry(tenant_id)
            .or_insert_with(|| ApprovalPolicy::default_for(tenant_id, Utc::now()))
            .clone())
    }

    async fn save_approval_policy(&self, policy: &ApprovalPolicy) -> AppResult<ApprovalPolicy> {
        let mut policies = self.policies.lock().map_err(|_| poisoned())?;
        policies.insert(policy.tenant_id, policy.clone());
        Ok(policy.clone())
    }
}
