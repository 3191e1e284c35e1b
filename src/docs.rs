use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{ActiveContext, PermissionRecord};
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::context::my_permissions,
        routes::context::my_context,
        routes::context::switch_company,
        routes::context::switch_department,
        routes::context::switch_project,
        routes::org::list_companies,
        routes::org::list_departments,
        routes::org::list_projects,
        routes::roles::get_user_roles,
        routes::roles::assign_role,
        routes::roles::revoke_role,
        routes::roles::list_members,
        routes::roles::add_member,
        routes::roles::remove_member,
        routes::policy::get_policy,
        routes::policy::update_policy,
        routes::time_entries::list_entries,
        routes::time_entries::create_entry,
        routes::time_entries::pending_approvals,
        routes::time_entries::get_entry,
        routes::time_entries::update_entry,
        routes::time_entries::delete_entry,
        routes::time_entries::submit_entry,
        routes::time_entries::approve_entry,
        routes::time_entries::reject_entry,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::context::PermissionsResponse,
            routes::context::ContextResponse,
            routes::context::SwitchCompanyRequest,
            routes::context::SwitchDepartmentRequest,
            routes::context::SwitchProjectRequest,
            PermissionRecord,
            ActiveContext,
            models::org::Tenant,
            models::org::CompanyStatus,
            models::org::Company,
            models::org::Department,
            models::org::Project,
            models::org::Profile,
            models::role::HierarchyRole,
            models::role::ScopeType,
            models::role::RoleAssignment,
            models::role::AssignRoleRequest,
            models::role::MemberRole,
            models::role::ProjectMembership,
            models::role::AddMemberRequest,
            models::role::UserRoles,
            models::policy::ApprovalPolicy,
            models::policy::PolicyUpdateRequest,
            models::time_entry::EntryStatus,
            models::time_entry::TimeEntry,
            models::time_entry::EntryDraft,
            models::time_entry::TimeEntryUpdateRequest,
            models::time_entry::RejectRequest,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and database status"),
        (name = "Me", description = "The caller's permissions and active context"),
        (name = "Organization", description = "Companies, departments and projects visible to the caller"),
        (name = "Roles", description = "Hierarchy role grants and project membership"),
        (name = "Approval policy", description = "Per-tenant approval matrix"),
        (name = "Time entries", description = "Time entry lifecycle and approvals")
    )
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;

    ensure_security_components(&mut doc)?;
    ensure_global_security(&mut doc)?;
    ensure_servers(&mut doc, port);

    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc)?);

    let json_route = get(move || {
        let doc_json = Arc::clone(&doc_json);
        async move { Json((*doc_json).clone()) }
    });

    Ok(Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn root_object(doc: &mut Value) -> anyhow::Result<&mut Map<String, Value>> {
    doc.as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))
}

fn ensure_security_components(doc: &mut Value) -> anyhow::Result<()> {
    let components = root_object(doc)?
        .entry("components")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("components must be an object"))?;

    let schemes = components
        .entry("securitySchemes")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("securitySchemes must be an object"))?;

    schemes.insert(
        "bearerAuth".to_string(),
        json!({
            "type": "http",
            "scheme": "bearer",
            "bearerFormat": "JWT"
        }),
    );
    Ok(())
}

fn ensure_global_security(doc: &mut Value) -> anyhow::Result<()> {
    root_object(doc)?
        .entry("security")
        .or_insert_with(|| json!([{ "bearerAuth": [] }]));
    Ok(())
}

fn ensure_servers(doc: &mut Value, port: u16) {
    let server_url = format!("http://localhost:{port}");

    match doc.get_mut("servers") {
        Some(Value::Array(servers)) => {
            let has = servers
                .iter()
                .any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
            if !has {
                servers.push(json!({ "url": server_url }));
            }
        }
        _ => doc["servers"] = json!([{ "url": server_url }]),
    }
}
