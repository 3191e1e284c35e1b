use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};
use crate::models::role::HierarchyRole;

/// Submitter role -> roles entitled to decide on that submitter's entries.
pub type ApprovalMatrix = BTreeMap<HierarchyRole, Vec<HierarchyRole>>;

/// Per-tenant approval configuration. When `enabled` is false every
/// submission is approved on submit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApprovalPolicy {
    pub tenant_id: Uuid,
    #[schema(value_type = Object, example = json!({"User": ["ProjectLeader", "DepartmentHead", "CEO", "TenantOwner"]}))]
    pub rules: ApprovalMatrix,
    pub enabled: bool,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalPolicy {
    /// The lazily-created default: disabled with an empty matrix.
    pub fn default_for(tenant_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            rules: ApprovalMatrix::new(),
            enabled: false,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn approvers_for(&self, submitter: HierarchyRole) -> &[HierarchyRole] {
        self.rules.get(&submitter).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Loggable for ApprovalPolicy {
    fn entity_type() -> &'static str { "approval_policy" }
    fn subject_id(&self) -> Uuid { self.tenant_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Drops duplicate approver roles, keeping first occurrence order, and
/// removes empty rows.
pub fn normalize_matrix(rules: ApprovalMatrix) -> ApprovalMatrix {
    rules
        .into_iter()
        .filter_map(|(submitter, approvers)| {
            let mut seen = Vec::with_capacity(approvers.len());
            for role in approvers {
                if !seen.contains(&role) {
                    seen.push(role);
                }
            }
            (!seen.is_empty()).then_some((submitter, seen))
        })
        .collect()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PolicyUpdateRequest {
    #[schema(value_type = Object, example = json!({"User": ["ProjectLeader", "CEO"], "ProjectLeader": ["DepartmentHead"]}))]
    pub rules: ApprovalMatrix,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_round_trips_through_json_with_role_names() {
        let raw = r#"{"User":["ProjectLeader","CEO"],"CEO":["TenantOwner"]}"#;
        let rules: ApprovalMatrix = serde_json::from_str(raw).unwrap();
        assert_eq!(
            rules.get(&HierarchyRole::User).unwrap(),
            &vec![HierarchyRole::ProjectLeader, HierarchyRole::Ceo]
        );
        assert_eq!(rules.get(&HierarchyRole::Ceo).unwrap(), &vec![HierarchyRole::TenantOwner]);
    }

    #[test]
    fn unknown_role_name_in_matrix_is_rejected() {
        let raw = r#"{"User":["Manager"]}"#;
        assert!(serde_json::from_str::<ApprovalMatrix>(raw).is_err());
    }

    #[test]
    fn normalize_dedupes_and_drops_empty_rows() {
        let mut rules = ApprovalMatrix::new();
        rules.insert(
            HierarchyRole::User,
            vec![HierarchyRole::Ceo, HierarchyRole::ProjectLeader, HierarchyRole::Ceo],
        );
        rules.insert(HierarchyRole::Ceo, vec![]);

        let normalized = normalize_matrix(rules);
        assert_eq!(
            normalized.get(&HierarchyRole::User).unwrap(),
            &vec![HierarchyRole::Ceo, HierarchyRole::ProjectLeader]
        );
        assert!(!normalized.contains_key(&HierarchyRole::Ceo));
    }

    #[test]
    fn missing_row_yields_no_approvers() {
        let policy = ApprovalPolicy::default_for(Uuid::new_v4(), Utc::now());
        assert!(policy.approvers_for(HierarchyRole::User).is_empty());
        assert!(!policy.enabled);
    }
}
