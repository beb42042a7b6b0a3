use super::*;
use axum::body::Body;
use axum::http::Request;
use tower::ServiceExt;

fn temp_path(tag: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "deepsk-server-{tag}-{}.{ext}",
        time::OffsetDateTime::now_utc().unix_timestamp_nanos()
    ))
}

fn temp_state() -> Arc<AppState> {
    let config = ServerConfig::new(temp_path("test", "db"));
    Arc::new(prepare_state(&config).expect("open db"))
}

fn login_input(name: &str) -> Result<Json<LoginInput>, JsonRejection> {
    Ok(Json(LoginInput {
        username: Some(name.to_string()),
    }))
}

fn complete_input(name: Option<&str>) -> Result<Json<CompleteInput>, JsonRejection> {
    Ok(Json(CompleteInput {
        username: name.map(str::to_string),
    }))
}

fn task_path(id: TaskId) -> Result<Path<TaskId>, PathRejection> {
    Ok(Path(id))
}

fn post_json(uri: impl AsRef<str>, body: serde_json::Value) -> Request<Body> {
    Request::post(uri.as_ref())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn test_app(tag: &str) -> Router {
    let config = ServerConfig::new(temp_path(tag, "db"));
    build_router(prepare_state(&config).unwrap(), &config)
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn login_creates_then_returns_same_user() {
    let state = temp_state();
    let first = api_login(State(state.clone()), login_input("alice"))
        .await
        .unwrap();
    let second = api_login(State(state), login_input("alice"))
        .await
        .unwrap();
    assert_eq!(first.0.user, second.0.user);
    assert_eq!(first.0.user.username, "alice");
}

#[tokio::test]
async fn login_without_name_is_400() {
    let state = temp_state();
    let err = api_login(State(state), Ok(Json(LoginInput::default())))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
    assert_eq!(err.1 .0.error, "Missing username");
}

#[tokio::test]
async fn completing_task_twice_is_400() {
    let state = temp_state();
    let login = api_login(State(state.clone()), login_input("alice"))
        .await
        .unwrap();
    assert_eq!(login.0.user.username, "alice");

    let ok = api_complete_task(State(state.clone()), task_path(3), complete_input(Some("alice")))
        .await
        .unwrap();
    assert!(ok.0.success);
    assert_eq!(ok.0.coupon.task_id, 3);

    let err = api_complete_task(State(state), task_path(3), complete_input(Some("alice")))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
    assert_eq!(err.1 .0, ErrorBody::new("Task already completed"));
}

#[tokio::test]
async fn completion_input_errors() {
    let state = temp_state();

    let missing = api_complete_task(State(state.clone()), task_path(1), complete_input(None))
        .await
        .unwrap_err();
    assert_eq!(missing.0, StatusCode::BAD_REQUEST);
    assert_eq!(missing.1 .0.error, "Missing username");

    let no_task = api_complete_task(
        State(state.clone()),
        task_path(42),
        complete_input(Some("alice")),
    )
    .await
    .unwrap_err();
    assert_eq!(no_task.0, StatusCode::NOT_FOUND);
    assert_eq!(no_task.1 .0.error, "Task not found");

    // A name never logged in is registered on the spot.
    let fresh = api_complete_task(
        State(state.clone()),
        task_path(1),
        complete_input(Some("nobody")),
    )
    .await
    .unwrap();
    assert_eq!(fresh.0.coupon.task_id, 1);
    assert!(state.engine.find_user("nobody").unwrap().is_some());
}

#[tokio::test]
async fn coupons_for_user_without_any_is_empty_list() {
    let state = temp_state();
    let out = api_coupons(
        State(state),
        Query(CouponsQuery {
            username: Some("bob".to_string()),
        }),
    )
    .await
    .unwrap();
    assert!(out.0.is_empty());
}

#[tokio::test]
async fn coupons_without_username_is_400() {
    let state = temp_state();
    let err = api_coupons(State(state), Query(CouponsQuery::default()))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn router_serves_task_list_and_coupon_flow() {
    let app = test_app("router");

    let resp = app
        .clone()
        .oneshot(Request::get("/api/tasks").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tasks = body_json(resp).await;
    assert_eq!(tasks.as_array().map(Vec::len), Some(5));
    assert_eq!(tasks[0]["x"], 12.0);
    assert!(tasks[0].get("lat").is_none());

    let resp = app
        .clone()
        .oneshot(post_json(
            routes::LOGIN.to_string(),
            serde_json::json!({"username": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(post_json(
            routes::task_complete(3),
            serde_json::json!({"username": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let done = body_json(resp).await;
    assert_eq!(done["success"], true);
    assert_eq!(done["coupon"]["taskId"], 3);

    let resp = app
        .clone()
        .oneshot(post_json(
            routes::task_complete(3),
            serde_json::json!({"username": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"error": "Task already completed"})
    );

    let resp = app
        .oneshot(
            Request::get("/api/coupons?username=alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let coupons = body_json(resp).await;
    assert_eq!(coupons.as_array().map(Vec::len), Some(1));
    assert_eq!(coupons[0]["taskName"], "阿婆豆腐店");
}

#[tokio::test]
async fn router_completes_without_prior_login() {
    let app = test_app("nologin");
    let body = serde_json::json!({"username": "alice"});

    let resp = app
        .clone()
        .oneshot(post_json(routes::task_complete(3), body.clone()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["coupon"]["taskId"], 3);

    let resp = app
        .oneshot(post_json(routes::task_complete(3), body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"error": "Task already completed"})
    );
}

#[tokio::test]
async fn non_numeric_task_id_is_not_found() {
    let app = test_app("badid");
    let resp = app
        .oneshot(post_json(
            "/api/tasks/abc/complete",
            serde_json::json!({"username": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"error": "Task not found"})
    );
}

#[tokio::test]
async fn missing_or_non_json_body_is_missing_username() {
    let app = test_app("nobody");

    let resp = app
        .clone()
        .oneshot(
            Request::post(routes::task_complete(3))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"error": "Missing username"})
    );

    let resp = app
        .oneshot(
            Request::post(routes::LOGIN)
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        serde_json::json!({"error": "Missing username"})
    );
}

#[tokio::test]
async fn public_dir_is_served_at_root() {
    let dir = temp_path("public", "d");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<canvas id=\"gameCanvas\"></canvas>").unwrap();

    let mut config = ServerConfig::new(temp_path("static", "db"));
    config.public_dir = Some(dir);
    let app = build_router(prepare_state(&config).unwrap(), &config);

    let resp = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("gameCanvas"));
}

#[test]
fn task_file_accepts_both_schemas() {
    let path = temp_path("tasks", "json");
    std::fs::write(
        &path,
        serde_json::json!([
            {"id": 1, "name": "Old street", "x": 12, "y": 38},
            {"id": 6, "name": "Riverside", "reward": "free tea", "lat": 25.0025, "lng": 121.615}
        ])
        .to_string(),
    )
    .unwrap();

    let tasks = load_task_file(&path, &GeoBounds::SHENKENG).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].x, 12.0);
    assert!((tasks[1].x - 50.0).abs() < 1e-6);

    let mut config = ServerConfig::new(temp_path("import", "db"));
    config.tasks_file = Some(path);
    let state = prepare_state(&config).unwrap();
    let stored = state.engine.list_tasks().unwrap();
    assert_eq!(stored.len(), 6);
    assert_eq!(stored[0].name, "Old street");
}

#[test]
fn task_file_with_bad_entry_fails() {
    let path = temp_path("tasks-bad", "json");
    std::fs::write(&path, r#"[{"id": 1, "name": "nowhere"}]"#).unwrap();
    assert!(load_task_file(&path, &GeoBounds::SHENKENG).is_err());
}

#[test]
fn origin_allowlist() {
    use axum::http::HeaderValue;
    let extra = vec!["https://game.example".to_string()];
    let ok = |s: &'static str| is_allowed_origin(&HeaderValue::from_static(s), &extra);
    assert!(ok("http://localhost:5173"));
    assert!(ok("http://127.0.0.1"));
    assert!(ok("https://game.example"));
    assert!(!ok("http://localhost.evil.test"));
    assert!(!ok("https://other.example"));
}
