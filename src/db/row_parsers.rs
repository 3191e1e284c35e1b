//! Explicit decoders for rows whose UUIDs and timestamps are stored as TEXT.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::org::{Company, CompanyStatus, Department, Profile, Project, Tenant};
use crate::models::policy::{ApprovalMatrix, ApprovalPolicy};
use crate::models::role::{MemberRole, ProjectMembership, RoleAssignment, ScopeType};
use crate::models::time_entry::{EntryStatus, TimeEntry};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339 (what chrono binds as)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP: "YYYY-MM-DD HH:MM:SS"
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn text(row: &SqliteRow, col: &str) -> Result<String, AppError> {
    row.try_get(col).map_err(|e| AppError::internal(format!("missing {}: {}", col, e)))
}

fn opt_text(row: &SqliteRow, col: &str) -> Result<Option<String>, AppError> {
    row.try_get(col).map_err(|e| AppError::internal(format!("missing {}: {}", col, e)))
}

fn uuid(row: &SqliteRow, col: &str) -> Result<Uuid, AppError> {
    let s = text(row, col)?;
    Uuid::parse_str(&s).map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", col, e)))
}

fn opt_uuid(row: &SqliteRow, col: &str) -> Result<Option<Uuid>, AppError> {
    match opt_text(row, col)? {
        Some(s) if !s.trim().is_empty() => Uuid::parse_str(&s)
            .map(Some)
            .map_err(|e| AppError::internal(format!("invalid uuid in {}: {}", col, e))),
        _ => Ok(None),
    }
}

fn datetime(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, AppError> {
    parse_datetime(&text(row, col)?)
}

fn opt_datetime(row: &SqliteRow, col: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    match opt_text(row, col)? {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn int(row: &SqliteRow, col: &str) -> Result<i64, AppError> {
    row.try_get(col).map_err(|e| AppError::internal(format!("missing {}: {}", col, e)))
}

fn int32(row: &SqliteRow, col: &str) -> Result<i32, AppError> {
    let value = int(row, col)?;
    i32::try_from(value).map_err(|e| AppError::internal(format!("invalid {}: {}: {}", col, value, e)))
}

pub fn tenant_from_row(row: &SqliteRow) -> Result<Tenant, AppError> {
    Ok(Tenant {
        id: uuid(row, "id")?,
        name: text(row, "name")?,
        owner_user_id: uuid(row, "owner_user_id")?,
        created_at: datetime(row, "created_at")?,
    })
}

pub fn company_from_row(row: &SqliteRow) -> Result<Company, AppError> {
    let status_s = text(row, "status")?;
    let status = CompanyStatus::parse(&status_s)
        .ok_or_else(|| AppError::internal(format!("invalid company status: {}", status_s)))?;

    Ok(Company {
        id: uuid(row, "id")?,
        tenant_id: uuid(row, "tenant_id")?,
        name: text(row, "name")?,
        status,
        created_at: datetime(row, "created_at")?,
    })
}

pub fn department_from_row(row: &SqliteRow) -> Result<Department, AppError> {
    Ok(Department {
        id: uuid(row, "id")?,
        tenant_id: uuid(row, "tenant_id")?,
        company_id: uuid(row, "company_id")?,
        parent_id: opt_uuid(row, "parent_id")?,
        name: text(row, "name")?,
        created_at: datetime(row, "created_at")?,
    })
}

pub fn project_from_row(row: &SqliteRow) -> Result<Project, AppError> {
    Ok(Project {
        id: uuid(row, "id")?,
        tenant_id: uuid(row, "tenant_id")?,
        company_id: uuid(row, "company_id")?,
        department_id: opt_uuid(row, "department_id")?,
        name: text(row, "name")?,
        created_at: datetime(row, "created_at")?,
    })
}

pub fn profile_from_row(row: &SqliteRow) -> Result<Profile, AppError> {
    Ok(Profile {
        id: uuid(row, "id")?,
        tenant_id: opt_uuid(row, "tenant_id")?,
        name: text(row, "name")?,
        email: text(row, "email")?,
        active_company_id: opt_uuid(row, "active_company_id")?,
        active_department_id: opt_uuid(row, "active_department_id")?,
        active_project_id: opt_uuid(row, "active_project_id")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn role_assignment_from_row(row: &SqliteRow) -> Result<RoleAssignment, AppError> {
    let role_s = text(row, "role")?;
    let scope_type_s = text(row, "scope_type")?;

    Ok(RoleAssignment {
        id: uuid(row, "id")?,
        tenant_id: uuid(row, "tenant_id")?,
        user_id: uuid(row, "user_id")?,
        role: role_s.parse().map_err(AppError::internal)?,
        scope_type: ScopeType::parse(&scope_type_s)
            .ok_or_else(|| AppError::internal(format!("invalid scope type: {}", scope_type_s)))?,
        scope_id: uuid(row, "scope_id")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn membership_from_row(row: &SqliteRow) -> Result<ProjectMembership, AppError> {
    let role_s = text(row, "role")?;

    Ok(ProjectMembership {
        id: uuid(row, "id")?,
        project_id: uuid(row, "project_id")?,
        user_id: uuid(row, "user_id")?,
        role: MemberRole::parse(&role_s)
            .ok_or_else(|| AppError::internal(format!("invalid member role: {}", role_s)))?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn policy_from_row(row: &SqliteRow) -> Result<ApprovalPolicy, AppError> {
    let rules_s = text(row, "rules")?;
    let rules: ApprovalMatrix = serde_json::from_str(&rules_s)
        .map_err(|e| AppError::internal(format!("invalid approval rules: {}", e)))?;

    Ok(ApprovalPolicy {
        tenant_id: uuid(row, "tenant_id")?,
        rules,
        enabled: int(row, "enabled")? != 0,
        updated_by: opt_uuid(row, "updated_by")?,
        created_at: datetime(row, "created_at")?,
        updated_at: datetime(row, "updated_at")?,
    })
}

pub fn time_entry_from_row(row: &SqliteRow) -> Result<TimeEntry, AppError> {
    let status_s = text(row, "status")?;
    let date_s = text(row, "entry_date")?;

    Ok(TimeEntry {
        id: uuid(row, "id")?,
        tenant_id: uuid(row, "tenant_id")?,
        user_id: uuid(row, "user_id")?,
        project_id: uuid(row, "project_id")?,
        entry_date: NaiveDate::parse_from_str(date_s.trim(), "%Y-%m-%d")
            .map_err(|e| AppError::internal(format!("invalid entry_date: {}", e)))?,
        hours: int32(row, "hours")?,
        minutes: int32(row, "minutes")?,
        description: text(row, "description")?,
        is_additional_work: int(row, "is_additional_work")? != 0,
        additional_work_reason: opt_text(row, "additional_work_reason")?,
        status: EntryStatus::parse(&status_s)
            .ok_or_else(|| AppError::internal(format!("invalid entry status: {}", status_s)))?,
        created_by: uuid(row, "created_by")?,
        created_at: datetime(row, "created_at")?,
        updated_by: opt_uuid(row, "updated_by")?,
        updated_at: opt_datetime(row, "updated_at")?,
        submitted_by: opt_uuid(row, "submitted_by")?,
        submitted_at: opt_datetime(row, "submitted_at")?,
        approved_by: opt_uuid(row, "approved_by")?,
        approved_at: opt_datetime(row, "approved_at")?,
        rejected_by: opt_uuid(row, "rejected_by")?,
        rejected_at: opt_datetime(row, "rejected_at")?,
        rejection_reason: opt_text(row, "rejection_reason")?,
    })
}
