//! Time-entry lifecycle: `draft -> submitted -> {approved, rejected}`.
//!
//! Transitions are pure: they take the current entry plus the caller's
//! resolved permissions and return the next entry. Persisting the result
//! with a conditional update is up to the caller.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::{ApprovalEvaluator, PermissionRecord};
use crate::models::org::ProjectScope;
use crate::models::policy::ApprovalPolicy;
use crate::models::role::HierarchyRole;
use crate::models::time_entry::{EntryDraft, EntryStatus, TimeEntry};

const MAX_MINUTES_PER_ENTRY: i32 = 24 * 60;

/// A failed structural precondition. The message is shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuardViolation {
    #[error("only draft entries can be edited")]
    EditNotDraft,
    #[error("only draft entries can be deleted")]
    DeleteNotDraft,
    #[error("only draft entries can be submitted")]
    SubmitNotDraft,
    #[error("only submitted entries can be approved")]
    ApproveNotSubmitted,
    #[error("only submitted entries can be rejected")]
    RejectNotSubmitted,
    #[error("rejection reason is required")]
    MissingRejectionReason,
    #[error("duration cannot be negative")]
    NegativeDuration,
    #[error("minutes must be below 60")]
    MinutesOutOfRange,
    #[error("duration must be greater than zero")]
    ZeroDuration,
    #[error("duration cannot exceed 24 hours")]
    DurationTooLong,
    #[error("additional work requires a justification")]
    MissingJustification,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Authorization failed; the reason is only logged.
    #[error("not permitted")]
    Denied,
    #[error(transparent)]
    Guard(#[from] GuardViolation),
}

#[derive(Debug, Clone)]
pub enum EntryAction {
    Edit(EntryDraft),
    Delete,
    Submit,
    Approve,
    Reject { reason: String },
}

impl EntryAction {
    pub fn name(&self) -> &'static str {
        match self {
            EntryAction::Edit(_) => "updated",
            EntryAction::Delete => "deleted",
            EntryAction::Submit => "submitted",
            EntryAction::Approve => "approved",
            EntryAction::Reject { .. } => "rejected",
        }
    }

    /// Status the entry must be in for the action to apply.
    pub fn required_status(&self) -> EntryStatus {
        match self {
            EntryAction::Edit(_) | EntryAction::Delete | EntryAction::Submit => EntryStatus::Draft,
            EntryAction::Approve | EntryAction::Reject { .. } => EntryStatus::Submitted,
        }
    }

    /// Actions only the entry owner may take.
    pub fn owner_only(&self) -> bool {
        matches!(self, EntryAction::Edit(_) | EntryAction::Delete | EntryAction::Submit)
    }

    /// The violation reported when the entry is not in the required status,
    /// including when a concurrent transition got there first.
    pub fn status_violation(&self) -> GuardViolation {
        match self {
            EntryAction::Edit(_) => GuardViolation::EditNotDraft,
            EntryAction::Delete => GuardViolation::DeleteNotDraft,
            EntryAction::Submit => GuardViolation::SubmitNotDraft,
            EntryAction::Approve => GuardViolation::ApproveNotSubmitted,
            EntryAction::Reject { .. } => GuardViolation::RejectNotSubmitted,
        }
    }
}

/// What a transition is evaluated against.
pub struct TransitionContext<'a> {
    pub actor: &'a PermissionRecord,
    pub policy: &'a ApprovalPolicy,
    pub evaluator: &'a dyn ApprovalEvaluator,
    /// Effective role of the entry owner
    pub submitter_role: HierarchyRole,
    /// Scope of the project the entry is booked on after the action; for an
    /// edit that moves the entry, the new project.
    pub target: ProjectScope,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Updated(TimeEntry),
    Deleted(Uuid),
}

pub fn validate_draft(draft: &EntryDraft) -> Result<(), GuardViolation> {
    if draft.hours < 0 || draft.minutes < 0 {
        return Err(GuardViolation::NegativeDuration);
    }
    if draft.minutes >= 60 {
        return Err(GuardViolation::MinutesOutOfRange);
    }

    let total = draft.hours.saturating_mul(60).saturating_add(draft.minutes);
    if total == 0 {
        return Err(GuardViolation::ZeroDuration);
    }
    if total > MAX_MINUTES_PER_ENTRY {
        return Err(GuardViolation::DurationTooLong);
    }

    let justified = draft
        .additional_work_reason
        .as_deref()
        .is_some_and(|reason| !reason.trim().is_empty());
    if draft.is_additional_work && !justified {
        return Err(GuardViolation::MissingJustification);
    }
    Ok(())
}

fn normalized(mut draft: EntryDraft) -> EntryDraft {
    draft.description = draft.description.trim().to_string();
    draft.additional_work_reason = if draft.is_additional_work {
        draft.additional_work_reason.map(|r| r.trim().to_string())
    } else {
        None
    };
    draft
}

/// Creates a draft owned by the actor on a project they may book on.
pub fn new_entry(
    actor: &PermissionRecord,
    draft: EntryDraft,
    target: &ProjectScope,
    now: DateTime<Utc>,
) -> Result<TimeEntry, TransitionError> {
    let Some(tenant_id) = actor.tenant_id else {
        return Err(TransitionError::Denied);
    };
    if draft.project_id != target.project_id || !actor.can_book_on(target) {
        tracing::debug!(user_id = %actor.user_id, project_id = %draft.project_id, "booking denied");
        return Err(TransitionError::Denied);
    }
    validate_draft(&draft)?;

    let draft = normalized(draft);
    Ok(TimeEntry {
        id: Uuid::new_v4(),
        tenant_id,
        user_id: actor.user_id,
        project_id: draft.project_id,
        entry_date: draft.entry_date,
        hours: draft.hours,
        minutes: draft.minutes,
        description: draft.description,
        is_additional_work: draft.is_additional_work,
        additional_work_reason: draft.additional_work_reason,
        status: EntryStatus::Draft,
        created_by: actor.user_id,
        created_at: now,
        updated_by: None,
        updated_at: None,
        submitted_by: None,
        submitted_at: None,
        approved_by: None,
        approved_at: None,
        rejected_by: None,
        rejected_at: None,
        rejection_reason: None,
    })
}

/// Applies `action` to `entry`.
///
/// Authorization is checked before the status guard, so a caller without
/// rights on the entry learns nothing about its state.
pub fn transition(entry: &TimeEntry, action: EntryAction, ctx: &TransitionContext<'_>) -> Result<Transition, TransitionError> {
    let actor = ctx.actor;
    if actor.tenant_id != Some(entry.tenant_id) {
        return Err(TransitionError::Denied);
    }

    match action {
        action if action.owner_only() && actor.user_id != entry.user_id => {
            tracing::debug!(user_id = %actor.user_id, entry_id = %entry.id, "owner-only action denied");
            Err(TransitionError::Denied)
        }
        EntryAction::Approve | EntryAction::Reject { .. }
            if !ctx.evaluator.can_approve(ctx.policy, actor, ctx.submitter_role, &ctx.target) =>
        {
            Err(TransitionError::Denied)
        }
        action if entry.status != action.required_status() => Err(action.status_violation().into()),
        EntryAction::Edit(draft) => {
            if draft.project_id != ctx.target.project_id || !actor.can_book_on(&ctx.target) {
                return Err(TransitionError::Denied);
            }
            validate_draft(&draft)?;

            let draft = normalized(draft);
            let mut next = entry.clone();
            next.project_id = draft.project_id;
            next.entry_date = draft.entry_date;
            next.hours = draft.hours;
            next.minutes = draft.minutes;
            next.description = draft.description;
            next.is_additional_work = draft.is_additional_work;
            next.additional_work_reason = draft.additional_work_reason;
            next.updated_by = Some(actor.user_id);
            next.updated_at = Some(ctx.now);
            Ok(Transition::Updated(next))
        }
        EntryAction::Delete => Ok(Transition::Deleted(entry.id)),
        EntryAction::Submit => {
            let mut next = entry.clone();
            next.submitted_by = Some(actor.user_id);
            next.submitted_at = Some(ctx.now);
            if ctx.policy.enabled {
                next.status = EntryStatus::Submitted;
            } else {
                // no approval workflow: approved on submit, no human approver
                next.status = EntryStatus::Approved;
                next.approved_at = Some(ctx.now);
            }
            Ok(Transition::Updated(next))
        }
        EntryAction::Approve => {
            let mut next = entry.clone();
            next.status = EntryStatus::Approved;
            next.approved_by = Some(actor.user_id);
            next.approved_at = Some(ctx.now);
            Ok(Transition::Updated(next))
        }
        EntryAction::Reject { reason } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(GuardViolation::MissingRejectionReason.into());
            }
            let mut next = entry.clone();
            next.status = EntryStatus::Rejected;
            next.rejected_by = Some(actor.user_id);
            next.rejected_at = Some(ctx.now);
            next.rejection_reason = Some(reason.to_string());
            Ok(Transition::Updated(next))
        }
    }
}
