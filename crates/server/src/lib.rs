use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use deepsk_engine::{Engine, StoreError};
use deepsk_protocol::{
    messages, routes, CompleteInput, CompleteOutput, Coupon, CouponsQuery, ErrorBody, GeoBounds,
    LoginInput, LoginOutput, Task, TaskId, TaskSource,
};
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    /// Browser client assets, served at `/`.
    pub public_dir: Option<PathBuf>,
    /// JSON task list imported (upserted) at startup.
    pub tasks_file: Option<PathBuf>,
    /// Origins allowed in addition to localhost.
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route(routes::HEALTH, get(health))
        .route(routes::LOGIN, post(api_login))
        .route(routes::TASKS, get(api_tasks))
        .route(routes::TASK_COMPLETE, post(api_complete_task))
        .route(routes::COUPONS, get(api_coupons))
        .with_state(Arc::new(state));
    if let Some(dir) = &config.public_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }
    router.layer(game_cors(&config.allowed_origins))
}

async fn health() -> &'static str {
    "ok"
}

fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::MissingUsername | StoreError::AlreadyCompleted => StatusCode::BAD_REQUEST,
        StoreError::TaskNotFound => StatusCode::NOT_FOUND,
        StoreError::Sqlite(_) | StoreError::Other(_) => {
            tracing::error!(error = %e, "store failure");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("internal error")),
            );
        }
    };
    (status, Json(ErrorBody::new(e.to_string())))
}

/// A body that is absent or not JSON reads as an empty input, so the
/// handler answers with its own missing-field error.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(input)) => input,
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "unreadable request body");
            T::default()
        }
    }
}

async fn api_login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<LoginOutput> {
    let username = body_or_default(body).username.unwrap_or_default();
    let user = state.engine.login(&username).map_err(store_error)?;
    Ok(Json(LoginOutput { user }))
}

async fn api_tasks(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Task>> {
    let tasks = state.engine.list_tasks().map_err(store_error)?;
    Ok(Json(tasks))
}

async fn api_complete_task(
    State(state): State<Arc<AppState>>,
    task_id: Result<Path<TaskId>, PathRejection>,
    body: Result<Json<CompleteInput>, JsonRejection>,
) -> ApiResult<CompleteOutput> {
    // An id that is not a number names no task.
    let Ok(Path(task_id)) = task_id else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(messages::TASK_NOT_FOUND)),
        ));
    };
    let username = body_or_default(body).username.unwrap_or_default();
    match state.engine.complete_task(task_id, &username) {
        Ok(coupon) => Ok(Json(CompleteOutput {
            success: true,
            coupon,
        })),
        Err(e) => {
            if !matches!(e, StoreError::Sqlite(_) | StoreError::Other(_)) {
                tracing::warn!(
                    task_id,
                    username = %username.trim(),
                    reason = %e,
                    "completion rejected"
                );
            }
            Err(store_error(e))
        }
    }
}

async fn api_coupons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CouponsQuery>,
) -> ApiResult<Vec<Coupon>> {
    let username = query.username.unwrap_or_default();
    let coupons = state.engine.list_coupons(&username).map_err(store_error)?;
    Ok(Json(coupons))
}

/// Reads a task list in either coordinate schema and converts it to
/// percentage placement.
pub fn load_task_file(path: &FsPath, bounds: &GeoBounds) -> anyhow::Result<Vec<Task>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read tasks file: {}", path.display()))?;
    let sources: Vec<TaskSource> = serde_json::from_str(&raw)
        .with_context(|| format!("parse tasks file: {}", path.display()))?;
    sources
        .into_iter()
        .map(|s| s.resolve(bounds).map_err(anyhow::Error::from))
        .collect::<anyhow::Result<Vec<_>>>()
        .with_context(|| format!("tasks file: {}", path.display()))
}

/// Opens the store (failing fast when SQLite is unusable) and applies the
/// configured task import.
pub fn prepare_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let engine = Engine::new(config.db_path.clone());
    engine.open()?;
    if let Some(path) = &config.tasks_file {
        let tasks = load_task_file(path, &GeoBounds::SHENKENG)?;
        let n = engine.upsert_tasks(&tasks)?;
        tracing::info!(count = n, file = %path.display(), "tasks imported");
    }
    Ok(AppState { engine })
}

pub async fn serve(addr: SocketAddr, config: ServerConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    serve_listener(listener, config, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    config: ServerConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let state = prepare_state(&config)?;
    let app = build_router(state, &config);
    let addr = listener.local_addr()?;
    tracing::info!(%addr, db = %config.db_path.display(), "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(addr)
}

// Never `Access-Control-Allow-Origin: *`; the page is normally served by this
// process, so cross-origin access is limited to local dev servers and
// explicitly listed origins.
fn game_cors(extra: &[String]) -> CorsLayer {
    use axum::http::header;
    use axum::http::HeaderValue;
    use axum::http::Method;

    let extra: Vec<String> = extra.to_vec();
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _req| is_allowed_origin(origin, &extra),
        ))
}

fn is_allowed_origin(origin: &axum::http::HeaderValue, extra: &[String]) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    if extra.iter().any(|o| o == s) {
        return true;
    }
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}

#[cfg(test)]
mod tests;
