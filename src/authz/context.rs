//! Active company/department/project selection.
//!
//! The active context only narrows what is displayed; it never grants
//! anything. Every pointer is re-validated against the user's visible sets
//! whenever it is read or changed, so a stale cross-company selection can
//! never survive.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::org::{OrgTree, Profile};
use crate::store::OrgStore;

use super::record::PermissionRecord;
use super::resolver::Resolution;
use super::scope::{company_visible, visible_companies, visible_departments, visible_projects};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActiveContext {
    pub company_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

/// Pure selection logic over one user's record and their tenant's org tree.
pub struct ContextSelector<'a> {
    record: &'a PermissionRecord,
    org: &'a OrgTree,
}

impl<'a> ContextSelector<'a> {
    pub fn new(record: &'a PermissionRecord, org: &'a OrgTree) -> Self {
        Self { record, org }
    }

    /// Resolves the effective context.
    ///
    /// Company: stored pointer, then the identity-provider hint, then the
    /// first visible company, then none. Department and project are kept
    /// only while visible inside the chosen company.
    pub fn resolve(&self, stored: ActiveContext, hint: Option<Uuid>) -> ActiveContext {
        let company_id = [stored.company_id, hint]
            .into_iter()
            .flatten()
            .find(|id| company_visible(self.record, self.org, *id))
            .or_else(|| visible_companies(self.record, self.org).first().map(|c| c.id));

        self.narrow(ActiveContext {
            company_id,
            department_id: stored.department_id,
            project_id: stored.project_id,
        })
    }

    pub fn switch_company(&self, current: ActiveContext, company_id: Uuid) -> AppResult<ActiveContext> {
        if !company_visible(self.record, self.org, company_id) {
            tracing::debug!(user_id = %self.record.user_id, company_id = %company_id, "company switch denied");
            return Err(AppError::forbidden());
        }

        Ok(self.narrow(ActiveContext {
            company_id: Some(company_id),
            ..current
        }))
    }

    /// Selects a department of the active company; a project from another
    /// department is dropped.
    pub fn switch_department(&self, current: ActiveContext, department_id: Option<Uuid>) -> AppResult<ActiveContext> {
        let current = self.narrow(current);
        let Some(department_id) = department_id else {
            return Ok(ActiveContext {
                department_id: None,
                ..current
            });
        };

        if current.company_id.is_none() {
            return Err(AppError::bad_request("no active company"));
        }
        let visible = visible_departments(self.record, self.org, current.company_id)
            .iter()
            .any(|d| d.id == department_id);
        if !visible {
            tracing::debug!(user_id = %self.record.user_id, department_id = %department_id, "department switch denied");
            return Err(AppError::forbidden());
        }

        let project_id = current.project_id.filter(|id| {
            self.org
                .project(*id)
                .is_some_and(|p| p.department_id.map_or(true, |d| d == department_id))
        });

        Ok(ActiveContext {
            company_id: current.company_id,
            department_id: Some(department_id),
            project_id,
        })
    }

    /// Selects a project of the active company and follows it into its
    /// department.
    pub fn switch_project(&self, current: ActiveContext, project_id: Option<Uuid>) -> AppResult<ActiveContext> {
        let current = self.narrow(current);
        let Some(project_id) = project_id else {
            return Ok(ActiveContext {
                project_id: None,
                ..current
            });
        };

        if current.company_id.is_none() {
            return Err(AppError::bad_request("no active company"));
        }
        let project = visible_projects(self.record, self.org, current.company_id)
            .into_iter()
            .find(|p| p.id == project_id);
        let Some(project) = project else {
            tracing::debug!(user_id = %self.record.user_id, project_id = %project_id, "project switch denied");
            return Err(AppError::forbidden());
        };

        Ok(ActiveContext {
            company_id: current.company_id,
            department_id: project.department_id.or(current.department_id),
            project_id: Some(project_id),
        })
    }

    /// Drops every pointer that is not visible inside the active company.
    fn narrow(&self, context: ActiveContext) -> ActiveContext {
        let company_id = context
            .company_id
            .filter(|id| company_visible(self.record, self.org, *id));

        let department_id = context.department_id.filter(|id| {
            visible_departments(self.record, self.org, company_id)
                .iter()
                .any(|d| d.id == *id)
        });
        let project_id = context.project_id.filter(|id| {
            visible_projects(self.record, self.org, company_id)
                .iter()
                .any(|p| p.id == *id)
        });

        ActiveContext {
            company_id,
            department_id,
            project_id,
        }
    }
}

impl From<&Profile> for ActiveContext {
    fn from(profile: &Profile) -> Self {
        ActiveContext {
            company_id: profile.active_company_id,
            department_id: profile.active_department_id,
            project_id: profile.active_project_id,
        }
    }
}

/// Switches the resolved user's active company and persists the re-derived
/// context.
pub async fn switch_active_company(
    store: &dyn OrgStore,
    resolution: &Resolution,
    company_id: Uuid,
) -> AppResult<ActiveContext> {
    let user_id = resolution.record.user_id;
    let profile = store
        .profile(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("profile not found"))?;

    let selector = ContextSelector::new(&resolution.record, &resolution.org);
    let next = selector.switch_company(ActiveContext::from(&profile), company_id)?;
    store.save_active_context(user_id, &next).await?;
    Ok(next)
}
