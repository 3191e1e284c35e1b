use crate::models::org::ProjectScope;
use crate::models::policy::ApprovalPolicy;
use crate::models::role::HierarchyRole;

use super::record::PermissionRecord;

/// Decides whether an approver may act on a submission.
pub trait ApprovalEvaluator: Send + Sync {
    fn can_approve(
        &self,
        policy: &ApprovalPolicy,
        approver: &PermissionRecord,
        submitter_role: HierarchyRole,
        target: &ProjectScope,
    ) -> bool;
}

/// Approval matrix evaluator.
///
/// Evaluation order:
/// 1. policy disabled -> any manager of the project (only reachable for
///    entries submitted before the policy was switched off)
/// 2. empty matrix row for the submitter's role -> deny, owner included
/// 3. tenant owner -> allow
/// 4. an allowed approver role the user holds whose scope contains the
///    project -> allow
/// 5. deny
#[derive(Debug, Clone, Default)]
pub struct MatrixEvaluator;

impl MatrixEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ApprovalEvaluator for MatrixEvaluator {
    fn can_approve(
        &self,
        policy: &ApprovalPolicy,
        approver: &PermissionRecord,
        submitter_role: HierarchyRole,
        target: &ProjectScope,
    ) -> bool {
        if approver.tenant_id != Some(policy.tenant_id) {
            tracing::debug!(user_id = %approver.user_id, "approver outside the policy tenant");
            return false;
        }

        if !policy.enabled {
            return approver.manages_project(target);
        }

        let allowed = policy.approvers_for(submitter_role);
        if allowed.is_empty() {
            tracing::debug!(
                user_id = %approver.user_id,
                submitter_role = %submitter_role,
                "approval matrix grants no approver"
            );
            return false;
        }

        if approver.is_owner {
            return true;
        }

        let granted = allowed
            .iter()
            .find(|role| approver.holds(**role) && approver.role_reaches(**role, target));

        match granted {
            Some(role) => {
                tracing::debug!(
                    user_id = %approver.user_id,
                    role = %role,
                    project_id = %target.project_id,
                    "approval granted"
                );
                true
            }
            None => {
                tracing::debug!(
                    user_id = %approver.user_id,
                    submitter_role = %submitter_role,
                    project_id = %target.project_id,
                    company_id = %target.company_id,
                    "approval denied: no allowed role reaches the project"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    struct Setup {
        policy: ApprovalPolicy,
        tenant_id: Uuid,
        target: ProjectScope,
    }

    fn setup(rows: &[(HierarchyRole, &[HierarchyRole])]) -> Setup {
        let tenant_id = Uuid::new_v4();
        let mut policy = ApprovalPolicy::default_for(tenant_id, Utc::now());
        policy.enabled = true;
        for (submitter, approvers) in rows {
            policy.rules.insert(*submitter, approvers.to_vec());
        }
        Setup {
            policy,
            tenant_id,
            target: ProjectScope {
                project_id: Uuid::new_v4(),
                company_id: Uuid::new_v4(),
                department_id: Some(Uuid::new_v4()),
            },
        }
    }

    fn record(tenant_id: Uuid) -> PermissionRecord {
        PermissionRecord::empty(Uuid::new_v4(), Some(tenant_id))
    }

    const DEFAULT_ROW: &[HierarchyRole] = &[
        HierarchyRole::ProjectLeader,
        HierarchyRole::DepartmentHead,
        HierarchyRole::Ceo,
        HierarchyRole::TenantOwner,
    ];

    #[test]
    fn project_leader_of_the_project_may_approve() {
        let s = setup(&[(HierarchyRole::User, DEFAULT_ROW)]);
        let mut leader = record(s.tenant_id);
        leader.is_project_leader = true;
        leader.managed_project_ids.insert(s.target.project_id);

        assert!(MatrixEvaluator::new().can_approve(&s.policy, &leader, HierarchyRole::User, &s.target));
    }

    #[test]
    fn ceo_of_another_company_may_not_approve() {
        let s = setup(&[(HierarchyRole::User, DEFAULT_ROW)]);
        let mut ceo = record(s.tenant_id);
        ceo.is_ceo = true;
        ceo.managed_company_ids.insert(Uuid::new_v4());

        assert!(!MatrixEvaluator::new().can_approve(&s.policy, &ceo, HierarchyRole::User, &s.target));

        ceo.managed_company_ids.insert(s.target.company_id);
        assert!(MatrixEvaluator::new().can_approve(&s.policy, &ceo, HierarchyRole::User, &s.target));
    }

    #[test]
    fn role_missing_from_the_row_is_not_enough() {
        let s = setup(&[(HierarchyRole::User, &[HierarchyRole::Ceo])]);
        let mut head = record(s.tenant_id);
        head.is_department_head = true;
        head.managed_department_ids.extend(s.target.department_id);

        assert!(!MatrixEvaluator::new().can_approve(&s.policy, &head, HierarchyRole::User, &s.target));
    }

    #[test]
    fn row_follows_submitter_role() {
        let s = setup(&[
            (HierarchyRole::User, DEFAULT_ROW),
            (HierarchyRole::ProjectLeader, &[HierarchyRole::DepartmentHead]),
        ]);
        let mut leader = record(s.tenant_id);
        leader.is_project_leader = true;
        leader.managed_project_ids.insert(s.target.project_id);

        let evaluator = MatrixEvaluator::new();
        assert!(evaluator.can_approve(&s.policy, &leader, HierarchyRole::User, &s.target));
        assert!(!evaluator.can_approve(&s.policy, &leader, HierarchyRole::ProjectLeader, &s.target));
    }

    #[test]
    fn empty_row_blocks_even_the_owner() {
        let s = setup(&[(HierarchyRole::Ceo, &[HierarchyRole::TenantOwner])]);
        let mut owner = record(s.tenant_id);
        owner.is_owner = true;

        let evaluator = MatrixEvaluator::new();
        assert!(!evaluator.can_approve(&s.policy, &owner, HierarchyRole::User, &s.target));
        assert!(evaluator.can_approve(&s.policy, &owner, HierarchyRole::Ceo, &s.target));
    }

    #[test]
    fn user_approver_entry_requires_project_membership() {
        let s = setup(&[(HierarchyRole::User, &[HierarchyRole::User])]);
        let mut peer = record(s.tenant_id);

        let evaluator = MatrixEvaluator::new();
        assert!(!evaluator.can_approve(&s.policy, &peer, HierarchyRole::User, &s.target));
        peer.all_member_project_ids.insert(s.target.project_id);
        assert!(evaluator.can_approve(&s.policy, &peer, HierarchyRole::User, &s.target));
    }

    #[test]
    fn approver_from_another_tenant_is_denied() {
        let s = setup(&[(HierarchyRole::User, DEFAULT_ROW)]);
        let mut foreign_owner = record(Uuid::new_v4());
        foreign_owner.is_owner = true;

        assert!(!MatrixEvaluator::new().can_approve(&s.policy, &foreign_owner, HierarchyRole::User, &s.target));
    }

    #[test]
    fn disabled_policy_falls_back_to_management_scope() {
        let mut s = setup(&[]);
        s.policy.enabled = false;
        let mut head = record(s.tenant_id);
        head.is_department_head = true;
        head.managed_department_ids.extend(s.target.department_id);

        let evaluator = MatrixEvaluator::new();
        assert!(evaluator.can_approve(&s.policy, &head, HierarchyRole::User, &s.target));
        assert!(!evaluator.can_approve(&s.policy, &record(s.tenant_id), HierarchyRole::User, &s.target));
    }
}
