use super::*;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use shared::domain::{UserId, DEFAULT_AUTHOR};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};

const TOKEN: &str = "session-token";

type Rejection = (StatusCode, Json<ApiError>);

#[derive(Clone, Default)]
struct ServerState {
    posts: Arc<Mutex<Vec<PostPayload>>>,
    logouts: Arc<Mutex<u32>>,
}

fn require_session(headers: &HeaderMap) -> Result<(), Rejection> {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer session-token");
    if authorized {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::unauthorized("missing bearer token")),
        ))
    }
}

async fn http_login(Json(req): Json<LoginRequest>) -> Result<Json<LoginResponse>, Rejection> {
    if req.username == "admin" && req.password == "admin123" {
        Ok(Json(LoginResponse {
            user_id: UserId(1),
            username: req.username,
            token: TOKEN.into(),
        }))
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::unauthorized("invalid credentials")),
        ))
    }
}

async fn http_logout(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<StatusCode, Rejection> {
    require_session(&headers)?;
    *state.logouts.lock().await += 1;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list(State(state): State<ServerState>) -> Json<Vec<PostPayload>> {
    let mut posts = state.posts.lock().await.clone();
    posts.sort_by(|a, b| b.id.cmp(&a.id));
    Json(posts)
}

async fn http_create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostPayload>), Rejection> {
    require_session(&headers)?;
    let mut posts = state.posts.lock().await;
    let id = posts.iter().map(|post| post.id.0).max().unwrap_or(0) + 1;
    let payload = PostPayload {
        id: PostId(id),
        title: req.title,
        author: Some(req.author),
        content: req.content,
        date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("date"),
        files: req.files,
    };
    posts.push(payload.clone());
    Ok((StatusCode::CREATED, Json(payload)))
}

async fn http_delete(
    State(state): State<ServerState>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, Rejection> {
    require_session(&headers)?;
    let mut posts = state.posts.lock().await;
    let before = posts.len();
    posts.retain(|post| post.id.0 != post_id);
    if posts.len() == before {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found("post not found")),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn spawn_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/login", post(http_login))
        .route("/logout", post(http_logout))
        .route("/posts", get(http_list).post(http_create))
        .route("/posts/:post_id", delete(http_delete))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn list_maps_payloads_and_fills_missing_author() {
    let state = ServerState::default();
    state.posts.lock().await.push(PostPayload {
        id: PostId(7),
        title: "Operation: Silent Echo".into(),
        author: None,
        content: "Preliminary signal intelligence.".into(),
        date: NaiveDate::from_ymd_opt(2024, 5, 15).expect("date"),
        files: vec!["spectrum_analysis_v2.pdf".into()],
    });
    let store = HttpPostStore::new(&spawn_server(state).await).expect("store");

    let posts = store.list().await.expect("list");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, PostId(7));
    assert_eq!(posts[0].author, DEFAULT_AUTHOR);
    assert_eq!(posts[0].attachments, vec!["spectrum_analysis_v2.pdf"]);
}

#[tokio::test]
async fn login_token_gates_writes() {
    let state = ServerState::default();
    let store = HttpPostStore::new(&spawn_server(state.clone()).await).expect("store");
    let draft = PostDraft::new("Operation: Low Tide", "Analyst", "Body.", Vec::new());

    assert!(matches!(
        store.create(&draft).await,
        Err(StoreError::Write(_))
    ));
    assert!(!store.authenticate("admin", "wrong").await.expect("reachable"));
    assert!(!store.has_token().await);

    assert!(store.authenticate("admin", "admin123").await.expect("login"));
    let post = store.create(&draft).await.expect("create");
    assert_eq!(post.title, "Operation: Low Tide");
    assert_eq!(state.posts.lock().await.len(), 1);

    store.delete(post.id).await.expect("delete");
    let err = store.delete(post.id).await.expect_err("second delete");
    match err {
        StoreError::Write(message) => assert!(message.contains("404"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn end_session_calls_logout_once_and_drops_token() {
    let state = ServerState::default();
    let store = HttpPostStore::new(&spawn_server(state.clone()).await).expect("store");
    store.authenticate("admin", "admin123").await.expect("login");

    store.end_session().await.expect("logout");
    assert!(!store.has_token().await);
    store.end_session().await.expect("no-op without token");
    assert_eq!(*state.logouts.lock().await, 1);
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let store = HttpPostStore::new(&format!("http://{addr}")).expect("store");
    assert!(matches!(
        store.list().await,
        Err(StoreError::Unavailable(_))
    ));
    assert!(matches!(
        store.authenticate("admin", "admin123").await,
        Err(StoreError::Unavailable(_))
    ));
}

#[test]
fn invalid_server_url_is_rejected() {
    assert!(HttpPostStore::new("not a url").is_err());
    let store = HttpPostStore::new("http://127.0.0.1:8443/api").expect("store");
    assert_eq!(store.base_url().as_str(), "http://127.0.0.1:8443/api/");
}
