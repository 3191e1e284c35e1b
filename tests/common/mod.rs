#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use timekeeper::app::create_app_with_notifier;
use timekeeper::events::{LogNotifier, Notifier};
use timekeeper::jwt::JwtConfig;

pub struct TestApp {
    // dropped last; keeps the database file alive
    _dir: TempDir,
    pub pool: SqlitePool,
    pub app: Router,
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with_notifier(Arc::new(LogNotifier)).await
}

pub async fn spawn_app_with_notifier(notifier: Arc<dyn Notifier>) -> Result<TestApp> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app_with_notifier(pool.clone(), notifier).await?;

    Ok(TestApp { _dir: dir, pool, app })
}

pub fn token(user_id: Uuid) -> Result<String> {
    Ok(JwtConfig::new("test-secret", 24).encode(user_id)?)
}

impl TestApp {
    /// Sends one request as `user` and returns status plus decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn call(&self, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req.header("authorization", format!("Bearer {}", token(user)?));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => req.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, user: Uuid) -> Result<(StatusCode, Value)> {
        self.call("GET", uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: Uuid, body: Value) -> Result<(StatusCode, Value)> {
        self.call("POST", uri, Some(user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: Uuid, body: Value) -> Result<(StatusCode, Value)> {
        self.call("PUT", uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: Uuid) -> Result<(StatusCode, Value)> {
        self.call("DELETE", uri, Some(user), None).await
    }

    /// Current status column of an entry, straight from storage.
    pub async fn entry_status(&self, id: &str) -> Result<String> {
        Ok(sqlx::query_scalar("SELECT status FROM time_entries WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }
}

// =============================================================================
// SEEDING
// =============================================================================

pub async fn seed_tenant(pool: &SqlitePool, name: &str) -> Result<(Uuid, Uuid)> {
    let tenant_id = Uuid::new_v4();
    let owner_id = Uuid::new_v4();
    sqlx::query("INSERT INTO tenants (id, name, owner_user_id) VALUES (?, ?, ?)")
        .bind(tenant_id.to_string())
        .bind(name)
        .bind(owner_id.to_string())
        .execute(pool)
        .await?;
    seed_profile_with_id(pool, tenant_id, owner_id, &format!("{name} owner")).await?;
    Ok((tenant_id, owner_id))
}

async fn seed_profile_with_id(pool: &SqlitePool, tenant_id: Uuid, id: Uuid, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO profiles (id, tenant_id, name, email) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(name)
        .bind(format!("{}@example.com", id.simple()))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn seed_profile(pool: &SqlitePool, tenant_id: Uuid, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    seed_profile_with_id(pool, tenant_id, id, name).await?;
    Ok(id)
}

pub async fn seed_company(pool: &SqlitePool, tenant_id: Uuid, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO companies (id, tenant_id, name) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_department(pool: &SqlitePool, tenant_id: Uuid, company_id: Uuid, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO departments (id, tenant_id, company_id, name) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(company_id.to_string())
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn seed_project(
    pool: &SqlitePool,
    tenant_id: Uuid,
    company_id: Uuid,
    department_id: Option<Uuid>,
    name: &str,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO projects (id, tenant_id, company_id, department_id, name) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(company_id.to_string())
        .bind(department_id.map(|d| d.to_string()))
        .bind(name)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn grant(pool: &SqlitePool, tenant_id: Uuid, user_id: Uuid, role: &str, scope_type: &str, scope_id: Uuid) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO role_assignments (id, tenant_id, user_id, role, scope_type, scope_id) VALUES (?, ?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(tenant_id.to_string())
        .bind(user_id.to_string())
        .bind(role)
        .bind(scope_type)
        .bind(scope_id.to_string())
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn add_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid, role: &str) -> Result<()> {
    sqlx::query("INSERT INTO project_members (id, project_id, user_id, role) VALUES (?, ?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(project_id.to_string())
        .bind(user_id.to_string())
        .bind(role)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_policy(pool: &SqlitePool, tenant_id: Uuid, rules: Value, enabled: bool) -> Result<()> {
    sqlx::query(
        "INSERT INTO approval_policies (tenant_id, rules, enabled) VALUES (?, ?, ?) \
         ON CONFLICT(tenant_id) DO UPDATE SET rules = excluded.rules, enabled = excluded.enabled",
    )
    .bind(tenant_id.to_string())
    .bind(rules.to_string())
    .bind(enabled as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// One tenant with two companies:
///
/// ```text
/// Acme (owner)
/// ├── North            ceo
/// │   ├── Engineering  dept_head
/// │   │   └── Apollo   leader (ProjectLeader), worker (User)
/// │   └── Gemini       (no department)
/// └── South
///     └── Mercury      outsider (User)
/// ```
pub struct World {
    pub tenant_id: Uuid,
    pub owner: Uuid,
    pub north: Uuid,
    pub south: Uuid,
    pub engineering: Uuid,
    pub apollo: Uuid,
    pub gemini: Uuid,
    pub mercury: Uuid,
    pub ceo: Uuid,
    pub dept_head: Uuid,
    pub leader: Uuid,
    pub worker: Uuid,
    pub outsider: Uuid,
}

pub async fn seed_world(pool: &SqlitePool) -> Result<World> {
    let (tenant_id, owner) = seed_tenant(pool, "Acme").await?;
    let north = seed_company(pool, tenant_id, "North").await?;
    let south = seed_company(pool, tenant_id, "South").await?;
    let engineering = seed_department(pool, tenant_id, north, "Engineering").await?;
    let apollo = seed_project(pool, tenant_id, north, Some(engineering), "Apollo").await?;
    let gemini = seed_project(pool, tenant_id, north, None, "Gemini").await?;
    let mercury = seed_project(pool, tenant_id, south, None, "Mercury").await?;

    let ceo = seed_profile(pool, tenant_id, "Cora CEO").await?;
    let dept_head = seed_profile(pool, tenant_id, "Dana Head").await?;
    let leader = seed_profile(pool, tenant_id, "Lee Leader").await?;
    let worker = seed_profile(pool, tenant_id, "Wren Worker").await?;
    let outsider = seed_profile(pool, tenant_id, "Otto Outsider").await?;

    grant(pool, tenant_id, ceo, "CEO", "company", north).await?;
    grant(pool, tenant_id, dept_head, "DepartmentHead", "department", engineering).await?;
    add_member(pool, apollo, leader, "ProjectLeader").await?;
    add_member(pool, apollo, worker, "User").await?;
    add_member(pool, mercury, outsider, "User").await?;

    Ok(World {
        tenant_id,
        owner,
        north,
        south,
        engineering,
        apollo,
        gemini,
        mercury,
        ceo,
        dept_head,
        leader,
        worker,
        outsider,
    })
}

/// Approval matrix used by most flow tests.
pub fn standard_matrix() -> Value {
    serde_json::json!({
        "User": ["ProjectLeader", "DepartmentHead", "CEO", "TenantOwner"],
        "ProjectLeader": ["DepartmentHead", "CEO", "TenantOwner"],
        "DepartmentHead": ["CEO", "TenantOwner"],
        "CEO": ["TenantOwner"]
    })
}

pub fn draft_body(project_id: Uuid) -> Value {
    serde_json::json!({
        "project_id": project_id,
        "entry_date": "2025-03-14",
        "hours": 7,
        "minutes": 30,
        "description": "Sprint planning"
    })
}
