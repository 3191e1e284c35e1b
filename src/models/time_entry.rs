use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Submitted => "submitted",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(EntryStatus::Draft),
            "submitted" => Some(EntryStatus::Submitted),
            "approved" => Some(EntryStatus::Approved),
            "rejected" => Some(EntryStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimeEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    #[schema(example = "2025-03-14")]
    pub entry_date: NaiveDate,
    pub hours: i32,
    pub minutes: i32,
    pub description: String,
    pub is_additional_work: bool,
    pub additional_work_reason: Option<String>,
    pub status: EntryStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<Uuid>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

impl TimeEntry {
    pub fn total_minutes(&self) -> i32 {
        self.hours * 60 + self.minutes
    }
}

impl Loggable for TimeEntry {
    fn entity_type() -> &'static str { "time_entry" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "approved" | "rejected" | "deleted" => Severity::Critical,
            "updated" => Severity::Noise,
            _ => Severity::Important,
        }
    }
}

/// The owner-editable fields of an entry, shared by create and edit.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EntryDraft {
    pub project_id: Uuid,
    #[schema(example = "2025-03-14")]
    pub entry_date: NaiveDate,
    #[schema(example = 7)]
    pub hours: i32,
    #[schema(example = 30)]
    pub minutes: i32,
    #[schema(example = "Sprint planning and backlog grooming")]
    pub description: String,
    #[serde(default)]
    pub is_additional_work: bool,
    pub additional_work_reason: Option<String>,
}

impl EntryDraft {
    pub fn from_entry(entry: &TimeEntry) -> Self {
        Self {
            project_id: entry.project_id,
            entry_date: entry.entry_date,
            hours: entry.hours,
            minutes: entry.minutes,
            description: entry.description.clone(),
            is_additional_work: entry.is_additional_work,
            additional_work_reason: entry.additional_work_reason.clone(),
        }
    }

    /// Applies a partial update on top of this draft.
    pub fn merged(mut self, patch: TimeEntryUpdateRequest) -> Self {
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(entry_date) = patch.entry_date {
            self.entry_date = entry_date;
        }
        if let Some(hours) = patch.hours {
            self.hours = hours;
        }
        if let Some(minutes) = patch.minutes {
            self.minutes = minutes;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(flag) = patch.is_additional_work {
            self.is_additional_work = flag;
            if !flag {
                self.additional_work_reason = None;
            }
        }
        if patch.additional_work_reason.is_some() {
            self.additional_work_reason = patch.additional_work_reason;
        }
        self
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TimeEntryUpdateRequest {
    pub project_id: Option<Uuid>,
    #[schema(example = "2025-03-15")]
    pub entry_date: Option<NaiveDate>,
    pub hours: Option<i32>,
    pub minutes: Option<i32>,
    pub description: Option<String>,
    pub is_additional_work: Option<bool>,
    pub additional_work_reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[schema(example = "Hours booked on the wrong project")]
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimeEntryListQuery {
    pub status: Option<EntryStatus>,
}
