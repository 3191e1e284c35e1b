mod common;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use common::{seed_world, spawn_app};
use timekeeper::jwt::JwtConfig;

#[tokio::test]
async fn default_context_is_first_visible_company() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    let (status, ctx) = app.get("/me/context", w.owner).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx["active"]["company_id"], w.north.to_string());
    assert_eq!(ctx["companies"].as_array().map(Vec::len), Some(2));
    assert_eq!(ctx["projects"].as_array().map(Vec::len), Some(2));

    let (_, ctx) = app.get("/me/context", w.outsider).await?;
    assert_eq!(ctx["active"]["company_id"], w.south.to_string());
    Ok(())
}

#[tokio::test]
async fn switching_to_invisible_company_is_denied() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    let (status, body) = app.put("/me/context/company", w.worker, json!({ "company_id": w.south })).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "not permitted");

    let (_, ctx) = app.get("/me/context", w.worker).await?;
    assert_eq!(ctx["active"]["company_id"], w.north.to_string());
    Ok(())
}

#[tokio::test]
async fn switch_is_persisted_and_narrows_selection() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    let (status, ctx) = app.put("/me/context/project", w.owner, json!({ "project_id": w.apollo })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx["active"]["project_id"], w.apollo.to_string());
    // selecting a project follows its department
    assert_eq!(ctx["active"]["department_id"], w.engineering.to_string());

    let (status, ctx) = app.put("/me/context/company", w.owner, json!({ "company_id": w.south })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx["active"]["company_id"], w.south.to_string());
    assert!(ctx["active"]["department_id"].is_null());
    assert!(ctx["active"]["project_id"].is_null());

    let stored: Option<String> = sqlx::query_scalar("SELECT active_company_id FROM profiles WHERE id = ?")
        .bind(w.owner.to_string())
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(stored, Some(w.south.to_string()));

    let (_, ctx) = app.get("/me/context", w.owner).await?;
    assert_eq!(ctx["active"]["company_id"], w.south.to_string());
    Ok(())
}

#[tokio::test]
async fn department_switch_needs_an_active_company_member() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;

    // Engineering belongs to North, not to the outsider's South
    let (status, _) = app
        .put("/me/context/department", w.outsider, json!({ "department_id": w.engineering }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, ctx) = app
        .put("/me/context/department", w.outsider, json!({ "department_id": null }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(ctx["active"]["department_id"].is_null());
    Ok(())
}

#[tokio::test]
async fn token_hint_is_only_a_starting_point() -> Result<()> {
    let app = spawn_app().await?;
    let w = seed_world(&app.pool).await?;
    let jwt = JwtConfig::new("test-secret", 24);

    let fetch = |token: String| {
        let app = app.app.clone();
        async move {
            let req = Request::builder()
                .method("GET")
                .uri("/me/context")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())?;
            let resp = app.oneshot(req).await?;
            let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
            anyhow::Ok(serde_json::from_slice::<Value>(&bytes)?)
        }
    };

    let ctx = fetch(jwt.encode_with_hint(w.owner, Some(w.south))?).await?;
    assert_eq!(ctx["active"]["company_id"], w.south.to_string());

    // a hint naming an invisible company is ignored
    let ctx = fetch(jwt.encode_with_hint(w.worker, Some(w.south))?).await?;
    assert_eq!(ctx["active"]["company_id"], w.north.to_string());
    Ok(())
}
