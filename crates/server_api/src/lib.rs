use chrono::Utc;
use shared::{
    domain::{PostDraft, PostId},
    error::{ApiError, ErrorCode},
    protocol::{CreatePostRequest, LoginResponse, PostPayload},
};
use storage::Storage;
use tracing::{info, warn};

mod password;
mod session;

pub use password::{hash_password, verify_password};
pub use session::{decode_session_token, mint_session_token, SessionClaims, SessionConfig};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub sessions: SessionConfig,
}

/// Creates the account unless it already exists. Returns whether it was created.
pub async fn seed_user(ctx: &ApiContext, username: &str, password: &str) -> Result<bool, ApiError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation("username and password are required"));
    }
    let created = ctx
        .storage
        .create_user_if_missing(username, &hash_password(password))
        .await
        .map_err(internal)?;
    Ok(created.is_some())
}

pub async fn login(
    ctx: &ApiContext,
    username: &str,
    password: &str,
) -> Result<LoginResponse, ApiError> {
    let user = ctx
        .storage
        .load_user(username)
        .await
        .map_err(internal)?;
    let Some(user) = user.filter(|user| verify_password(&user.password_hash, password)) else {
        warn!(%username, "rejected login");
        return Err(ApiError::unauthorized("invalid credentials"));
    };

    let (token, _) = mint_session_token(&ctx.sessions, user.user_id, &user.username)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;
    info!(username = %user.username, "session issued");
    Ok(LoginResponse {
        user_id: user.user_id,
        username: user.username,
        token,
    })
}

/// Resolves a bearer token to its claims, rejecting revoked or invalid tokens.
pub async fn authorize(ctx: &ApiContext, token: &str) -> Result<SessionClaims, ApiError> {
    let claims = decode_session_token(&ctx.sessions, token)
        .map_err(|_| ApiError::unauthorized("invalid or expired session"))?;
    let revoked = ctx
        .storage
        .is_session_revoked(&claims.jti)
        .await
        .map_err(internal)?;
    if revoked {
        return Err(ApiError::unauthorized("session has been terminated"));
    }
    Ok(claims)
}

pub async fn logout(ctx: &ApiContext, claims: &SessionClaims) -> Result<(), ApiError> {
    ctx.storage
        .revoke_session(&claims.jti, claims.expires_at())
        .await
        .map_err(internal)?;
    if let Err(err) = ctx.storage.prune_revoked_sessions(Utc::now()).await {
        warn!(%err, "failed to prune revoked sessions");
    }
    info!(username = %claims.username(), "session terminated");
    Ok(())
}

pub async fn list_posts(ctx: &ApiContext) -> Result<Vec<PostPayload>, ApiError> {
    let posts = ctx.storage.list_posts().await.map_err(internal)?;
    Ok(posts
        .into_iter()
        .map(|stored| PostPayload::from(shared::domain::Post::from(stored)))
        .collect())
}

pub async fn get_post(ctx: &ApiContext, post_id: PostId) -> Result<PostPayload, ApiError> {
    let stored = ctx
        .storage
        .load_post(post_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("post not found"))?;
    Ok(PostPayload::from(shared::domain::Post::from(stored)))
}

pub async fn create_post(
    ctx: &ApiContext,
    claims: &SessionClaims,
    request: CreatePostRequest,
) -> Result<PostPayload, ApiError> {
    let draft = PostDraft::from(request)
        .normalized()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let stored = ctx
        .storage
        .insert_post(&draft, Utc::now())
        .await
        .map_err(internal)?;
    info!(
        post_id = stored.post_id.0,
        username = %claims.username(),
        attachments = stored.attachments.len(),
        "post published"
    );
    Ok(PostPayload::from(shared::domain::Post::from(stored)))
}

pub async fn delete_post(
    ctx: &ApiContext,
    claims: &SessionClaims,
    post_id: PostId,
) -> Result<(), ApiError> {
    let removed = ctx
        .storage
        .delete_post(post_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(ApiError::not_found("post not found"));
    }
    info!(post_id = post_id.0, username = %claims.username(), "post deleted");
    Ok(())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> ApiContext {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let ctx = ApiContext {
            storage,
            sessions: SessionConfig {
                secret: "s".into(),
                ttl_seconds: 60,
            },
        };
        seed_user(&ctx, "admin", "admin123").await.expect("seed");
        ctx
    }

    fn request(title: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            author: "NorthByte Analyst".into(),
            content: "coordinated frequency hopping".into(),
            files: vec!["signal_log_raw.txt".into()],
        }
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let ctx = setup().await;
        let err = login(&ctx, "admin", "wrong").await.expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::Unauthorized));

        let err = login(&ctx, "ghost", "admin123")
            .await
            .expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::Unauthorized));
    }

    #[tokio::test]
    async fn seed_user_does_not_overwrite_existing_password() {
        let ctx = setup().await;
        assert!(!seed_user(&ctx, "admin", "changed").await.expect("seed"));
        login(&ctx, "admin", "admin123").await.expect("original password");
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let ctx = setup().await;
        let session = login(&ctx, "admin", "admin123").await.expect("login");
        let claims = authorize(&ctx, &session.token).await.expect("authorize");
        logout(&ctx, &claims).await.expect("logout");

        let err = authorize(&ctx, &session.token)
            .await
            .expect_err("revoked");
        assert!(matches!(err.code, ErrorCode::Unauthorized));
    }

    #[tokio::test]
    async fn create_assigns_distinct_ids_and_lists_newest_first() {
        let ctx = setup().await;
        let session = login(&ctx, "admin", "admin123").await.expect("login");
        let claims = authorize(&ctx, &session.token).await.expect("authorize");

        let first = create_post(&ctx, &claims, request("First"))
            .await
            .expect("first");
        let second = create_post(&ctx, &claims, request("Second"))
            .await
            .expect("second");
        assert_ne!(first.id, second.id);
        assert_eq!(first.date, Utc::now().date_naive());

        let posts = list_posts(&ctx).await.expect("list");
        let ids: Vec<_> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let ctx = setup().await;
        let session = login(&ctx, "admin", "admin123").await.expect("login");
        let claims = authorize(&ctx, &session.token).await.expect("authorize");

        let err = create_post(&ctx, &claims, request("   "))
            .await
            .expect_err("should fail");
        assert!(matches!(err.code, ErrorCode::Validation));
        assert!(list_posts(&ctx).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let ctx = setup().await;
        let session = login(&ctx, "admin", "admin123").await.expect("login");
        let claims = authorize(&ctx, &session.token).await.expect("authorize");
        let post = create_post(&ctx, &claims, request("Doomed"))
            .await
            .expect("create");

        delete_post(&ctx, &claims, post.id).await.expect("delete");
        let err = delete_post(&ctx, &claims, post.id)
            .await
            .expect_err("already gone");
        assert!(matches!(err.code, ErrorCode::NotFound));
        let err = get_post(&ctx, post.id).await.expect_err("gone");
        assert!(matches!(err.code, ErrorCode::NotFound));
    }
}
