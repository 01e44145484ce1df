use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use server_api::{
    authorize, create_post, delete_post, get_post, list_posts, login, logout, seed_user,
    ApiContext, SessionClaims, SessionConfig,
};
use shared::{
    domain::PostId,
    error::{ApiError, ErrorCode},
    protocol::{CreatePostRequest, LoginRequest, LoginResponse, PostPayload},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

type ApiRejection = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        sessions: SessionConfig {
            secret: settings.session_secret.clone(),
            ttl_seconds: settings.session_ttl_seconds,
        },
    };

    if let Some(password) = settings.admin_seed_password() {
        match seed_user(&api, &settings.admin_username, password).await {
            Ok(true) => info!(username = %settings.admin_username, "seeded admin account"),
            Ok(false) => {}
            Err(err) => error!(%err, "failed to seed admin account"),
        }
    } else {
        info!("admin seeding disabled");
    }

    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(http_login))
        .route("/logout", post(http_logout))
        .route("/posts", get(http_list_posts).post(http_create_post))
        .route("/posts/:post_id", get(http_get_post).delete(http_delete_post))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, ApiRejection> {
    state.api.storage.health_check().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiRejection> {
    let response = login(&state.api, &req.username, &req.password)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn http_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiRejection> {
    let claims = session_from_headers(&state, &headers).await?;
    logout(&state.api, &claims).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_posts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PostPayload>>, ApiRejection> {
    let posts = list_posts(&state.api).await.map_err(reject)?;
    Ok(Json(posts))
}

async fn http_get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostPayload>, ApiRejection> {
    let post = get_post(&state.api, PostId(post_id))
        .await
        .map_err(reject)?;
    Ok(Json(post))
}

async fn http_create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostPayload>), ApiRejection> {
    let claims = session_from_headers(&state, &headers).await?;
    let post = create_post(&state.api, &claims, req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn http_delete_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiRejection> {
    let claims = session_from_headers(&state, &headers).await?;
    delete_post(&state.api, &claims, PostId(post_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session_from_headers(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<SessionClaims, ApiRejection> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| reject(ApiError::unauthorized("missing bearer token")))?;
    authorize(&state.api, token).await.map_err(reject)
}

fn reject(err: ApiError) -> ApiRejection {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
