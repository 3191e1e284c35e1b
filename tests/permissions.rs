mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{seed_company, seed_profile, seed_world, spawn_app};

fn ids(v: &Value, key: &str) -> Vec<String> {
    let mut ids: Vec<String> = v[key]
        .as_array()
        .map(|a| a.iter().filter_map(|id| id.as_str().map(String::from)).collect())
        .unwrap_or_default();
    ids.sort();
    ids
}

fn names(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|a| a.iter().filter_map(|c| c["name"].as_str().map(String::from)).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn owner_resolves_to_every_entity_without_role_rows() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    let (status, perms) = app.get("/me/permissions", w.owner).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(perms["is_owner"], true);
    assert_eq!(perms["can_manage_any"], true);
    assert_eq!(perms["effective_role"], "TenantOwner");

    let mut companies = vec![w.north.to_string(), w.south.to_string()];
    companies.sort();
    assert_eq!(ids(&perms, "managed_company_ids"), companies);
    assert_eq!(ids(&perms, "accessible_company_ids"), companies);

    let mut projects = vec![w.apollo.to_string(), w.gemini.to_string(), w.mercury.to_string()];
    projects.sort();
    assert_eq!(ids(&perms, "managed_project_ids"), projects);
    assert_eq!(ids(&perms, "all_member_project_ids"), projects);
    Ok(())
}

#[tokio::test]
async fn user_without_rows_gets_an_empty_record() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;
    let newcomer = seed_profile(&app.pool, w.tenant_id, "Nia Newcomer").await?;

    let (status, perms) = app.get("/me/permissions", newcomer).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(perms["is_owner"], false);
    assert_eq!(perms["can_manage_any"], false);
    assert_eq!(perms["effective_role"], "User");
    assert_eq!(perms["held_roles"], json!(["User"]));
    for key in [
        "managed_company_ids",
        "managed_department_ids",
        "managed_project_ids",
        "accessible_company_ids",
        "all_member_project_ids",
    ] {
        assert!(ids(&perms, key).is_empty(), "{key} should be empty");
    }

    let (_, companies) = app.get("/companies", newcomer).await?;
    assert!(names(&companies).is_empty());
    Ok(())
}

#[tokio::test]
async fn assign_then_revoke_restores_previous_record() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    let (_, before) = app.get("/me/permissions", w.worker).await?;

    let (status, assignment) = app
        .post(
            &format!("/users/{}/roles", w.worker),
            w.owner,
            json!({ "role": "CEO", "scope_type": "company", "scope_id": w.south }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "assign failed: {assignment}");

    let (_, during) = app.get("/me/permissions", w.worker).await?;
    assert_eq!(during["is_ceo"], true);
    assert_eq!(during["effective_role"], "CEO");
    assert_ne!(during, before);

    let assignment_id = assignment["id"].as_str().unwrap_or_default();
    let (status, _) = app
        .delete(&format!("/users/{}/roles/{}", w.worker, assignment_id), w.owner)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, after) = app.get("/me/permissions", w.worker).await?;
    assert_eq!(after, before);
    Ok(())
}

#[tokio::test]
async fn repeated_assignment_is_an_upsert() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;
    let body = json!({ "role": "User", "scope_type": "company", "scope_id": w.south });

    let (_, first) = app.post(&format!("/users/{}/roles", w.worker), w.owner, body.clone()).await?;
    let (status, second) = app.post(&format!("/users/{}/roles", w.worker), w.owner, body).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["id"], second["id"]);

    let (_, roles) = app.get(&format!("/users/{}/roles", w.worker), w.worker).await?;
    assert_eq!(roles["assignments"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn scope_listings_follow_roles() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    let (_, companies) = app.get("/companies", w.owner).await?;
    assert_eq!(names(&companies), vec!["North", "South"]);

    // heading a department makes its company visible
    let (_, companies) = app.get("/companies", w.dept_head).await?;
    assert_eq!(names(&companies), vec!["North"]);

    let (_, projects) = app.get(&format!("/companies/{}/projects", w.north), w.dept_head).await?;
    assert_eq!(names(&projects), vec!["Apollo"]);

    let (_, projects) = app.get(&format!("/companies/{}/projects", w.north), w.ceo).await?;
    assert_eq!(names(&projects), vec!["Apollo", "Gemini"]);

    let (_, departments) = app.get(&format!("/companies/{}/departments", w.north), w.worker).await?;
    assert_eq!(names(&departments), vec!["Engineering"]);

    let (status, body) = app.get(&format!("/companies/{}/projects", w.south), w.worker).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "not permitted");
    Ok(())
}

#[tokio::test]
async fn tenants_are_isolated() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;
    let (other_tenant, other_owner) = common::seed_tenant(&app.pool, "Globex").await?;
    let other_company = seed_company(&app.pool, other_tenant, "Globex Main").await?;

    let (_, companies) = app.get("/companies", other_owner).await?;
    assert_eq!(names(&companies), vec!["Globex Main"]);

    let (status, _) = app.get(&format!("/companies/{}/projects", other_company), w.owner).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // granting across tenants is a data error, not a guess
    let (status, body) = app
        .post(
            &format!("/users/{}/roles", w.worker),
            w.owner,
            json!({ "role": "CEO", "scope_type": "company", "scope_id": other_company }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_reference");
    Ok(())
}
