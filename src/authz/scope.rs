//! Turns a permission record into the concrete entities a user may see.
//!
//! All three filters are pure and sort their output by name, then id, so the
//! result never depends on the order of the input lists.

use uuid::Uuid;

use crate::models::org::{Company, Department, OrgTree, Project};

use super::record::PermissionRecord;

/// Companies the user can see: explicitly accessible ones, plus any company
/// hosting a department they head or a project they belong to.
pub fn visible_companies<'a>(record: &PermissionRecord, org: &'a OrgTree) -> Vec<&'a Company> {
    let mut companies: Vec<&Company> = org
        .companies
        .iter()
        .filter(|company| company_visible(record, org, company.id))
        .collect();
    companies.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    companies
}

pub fn company_visible(record: &PermissionRecord, org: &OrgTree, company_id: Uuid) -> bool {
    if org.company(company_id).is_none() {
        return false;
    }
    if record.is_owner || record.accessible_company_ids.contains(&company_id) {
        return true;
    }

    let heads_department = org
        .departments
        .iter()
        .any(|d| d.company_id == company_id && record.managed_department_ids.contains(&d.id));

    heads_department
        || org
            .projects
            .iter()
            .any(|p| p.company_id == company_id && record.all_member_project_ids.contains(&p.id))
}

/// Departments of the active company. Empty when no company is active or
/// the active company is not visible to the user.
pub fn visible_departments<'a>(
    record: &PermissionRecord,
    org: &'a OrgTree,
    active_company_id: Option<Uuid>,
) -> Vec<&'a Department> {
    let Some(company_id) = active_company_id.filter(|id| company_visible(record, org, *id)) else {
        return Vec::new();
    };

    let mut departments: Vec<&Department> =
        org.departments.iter().filter(|d| d.company_id == company_id).collect();
    departments.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    departments
}

/// Projects of the active company the user manages as CEO, heads through
/// the department, or is a member of.
pub fn visible_projects<'a>(
    record: &PermissionRecord,
    org: &'a OrgTree,
    active_company_id: Option<Uuid>,
) -> Vec<&'a Project> {
    let Some(company_id) = active_company_id.filter(|id| company_visible(record, org, *id)) else {
        return Vec::new();
    };

    let mut projects: Vec<&Project> = org
        .projects
        .iter()
        .filter(|p| p.company_id == company_id && project_visible(record, p))
        .collect();
    projects.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    projects
}

fn project_visible(record: &PermissionRecord, project: &Project) -> bool {
    record.manages_company(project.company_id)
        || project.department_id.is_some_and(|id| record.manages_department(id))
        || record.is_member_of(project.id)
}
