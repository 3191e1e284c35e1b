use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

// =============================================================================
// HIERARCHY ROLE
// =============================================================================

/// The fixed role hierarchy.
///
/// Declaration order is seniority order, lowest first, so `Ord` answers
/// "which role is more senior" and `max()` yields the effective role:
/// `TenantOwner > CEO > DepartmentHead > ProjectLeader > User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum HierarchyRole {
    User,
    ProjectLeader,
    DepartmentHead,
    #[serde(rename = "CEO")]
    Ceo,
    TenantOwner,
}

impl HierarchyRole {
    pub const ALL: [HierarchyRole; 5] = [
        HierarchyRole::User,
        HierarchyRole::ProjectLeader,
        HierarchyRole::DepartmentHead,
        HierarchyRole::Ceo,
        HierarchyRole::TenantOwner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyRole::User => "User",
            HierarchyRole::ProjectLeader => "ProjectLeader",
            HierarchyRole::DepartmentHead => "DepartmentHead",
            HierarchyRole::Ceo => "CEO",
            HierarchyRole::TenantOwner => "TenantOwner",
        }
    }
}

impl fmt::Display for HierarchyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HierarchyRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Company,
    Department,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Company => "company",
            ScopeType::Department => "department",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "company" => Some(ScopeType::Company),
            "department" => Some(ScopeType::Department),
            _ => None,
        }
    }
}

// =============================================================================
// ROLE ASSIGNMENT
// =============================================================================

/// A stored role grant. Unique per `(user_id, role, scope_type, scope_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: HierarchyRole,
    pub scope_type: ScopeType,
    pub scope_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for RoleAssignment {
    fn entity_type() -> &'static str { "role_assignment" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    #[schema(example = "DepartmentHead")]
    pub role: HierarchyRole,
    #[schema(example = "department")]
    pub scope_type: ScopeType,
    pub scope_id: Uuid,
}

// =============================================================================
// PROJECT MEMBERSHIP
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MemberRole {
    User,
    ProjectLeader,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::User => "User",
            MemberRole::ProjectLeader => "ProjectLeader",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "User" => Some(MemberRole::User),
            "ProjectLeader" => Some(MemberRole::ProjectLeader),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectMembership {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for ProjectMembership {
    fn entity_type() -> &'static str { "project_membership" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    /// Defaults to `User`
    #[schema(example = "ProjectLeader")]
    pub role: Option<MemberRole>,
}

/// Role rows of one user, as returned by the admin listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserRoles {
    pub user_id: Uuid,
    pub assignments: Vec<RoleAssignment>,
    pub memberships: Vec<ProjectMembership>,
}
