use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// TENANT
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub owner_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_user_id == user_id
    }
}

// =============================================================================
// COMPANY / DEPARTMENT / PROJECT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompanyStatus {
    Active,
    Inactive,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Active => "active",
            CompanyStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(CompanyStatus::Active),
            "inactive" => Some(CompanyStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Company {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(example = "Acme Consulting")]
    pub name: String,
    pub status: CompanyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Department {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub company_id: Uuid,
    pub parent_id: Option<Uuid>,
    #[schema(example = "Engineering")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub company_id: Uuid,
    /// `None` for company-global projects
    pub department_id: Option<Uuid>,
    #[schema(example = "Website relaunch")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The containment chain of a project, used as the target of scope checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectScope {
    pub project_id: Uuid,
    pub company_id: Uuid,
    pub department_id: Option<Uuid>,
}

impl From<&Project> for ProjectScope {
    fn from(project: &Project) -> Self {
        ProjectScope {
            project_id: project.id,
            company_id: project.company_id,
            department_id: project.department_id,
        }
    }
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub active_company_id: Option<Uuid>,
    pub active_department_id: Option<Uuid>,
    pub active_project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ORG TREE (tenant-wide entity lists)
// =============================================================================

/// Every company, department and project of one tenant.
#[derive(Debug, Clone, Default)]
pub struct OrgTree {
    pub companies: Vec<Company>,
    pub departments: Vec<Department>,
    pub projects: Vec<Project>,
}

impl OrgTree {
    pub fn company(&self, id: Uuid) -> Option<&Company> {
        self.companies.iter().find(|c| c.id == id)
    }

    pub fn department(&self, id: Uuid) -> Option<&Department> {
        self.departments.iter().find(|d| d.id == id)
    }

    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Containment chain of a project, if the project belongs to this tenant
    /// and its department (when set) belongs to the same company.
    pub fn project_scope(&self, project_id: Uuid) -> Option<ProjectScope> {
        let project = self.project(project_id)?;
        if let Some(department_id) = project.department_id {
            let department = self.department(department_id)?;
            if department.company_id != project.company_id {
                tracing::warn!(
                    project_id = %project.id,
                    department_id = %department_id,
                    "project department belongs to another company"
                );
                return None;
            }
        }
        Some(ProjectScope::from(project))
    }
}
