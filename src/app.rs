use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{ApprovalEvaluator, MatrixEvaluator};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, start_notification_listener, EventBus, LogNotifier, Notifier};
use crate::jwt::JwtConfig;
use crate::routes::{context, health, org, policy, roles, time_entries};
use crate::store::{OrgStore, SqliteStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub store: Arc<dyn OrgStore>,
    pub evaluator: Arc<dyn ApprovalEvaluator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            store: Arc::new(SqliteStore::new(pool.clone())),
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            evaluator: Arc::new(MatrixEvaluator::new()),
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    create_app_with_notifier(pool, Arc::new(LogNotifier)).await
}

/// Builds the router and spawns the activity and notification listeners.
pub async fn create_app_with_notifier(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;

    let (event_bus, activity_rx) = init_event_bus();
    let notification_rx = event_bus.subscribe();
    tokio::spawn(start_activity_listener(activity_rx, pool.clone()));
    tokio::spawn(start_notification_listener(notification_rx, notifier));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/health", get(health::health))
        .merge(context::routes())
        .merge(org::routes())
        .merge(roles::routes())
        .merge(policy::routes())
        .nest("/time-entries", time_entries::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
