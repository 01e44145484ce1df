use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use shared::{
    domain::{Post, PostDraft, PostId},
    error::ApiError,
    protocol::{CreatePostRequest, LoginRequest, LoginResponse, PostPayload},
};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::{PostStore, StoreError};

/// [`PostStore`] backed by the REST server. Holds the bearer token handed
/// out by a successful login for the write endpoints.
pub struct HttpPostStore {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpPostStore {
    pub fn new(server_url: &str) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, StoreError> {
        let trimmed = server_url.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        let base_url = Url::parse(&normalized).map_err(|err| {
            StoreError::Unavailable(format!("invalid server url {server_url:?}: {err}"))
        })?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|err| StoreError::Unavailable(format!("invalid endpoint {path}: {err}")))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let token = self.token.read().await;
        match token.as_deref() {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(StoreError::Write("not authenticated".into())),
        }
    }
}

async fn failure_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(err) => format!("{status}: {}", err.message),
        Err(_) => status.to_string(),
    }
}

fn unavailable(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn write_failed(err: reqwest::Error) -> StoreError {
    StoreError::Write(err.to_string())
}

#[async_trait]
impl PostStore for HttpPostStore {
    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        let response = self
            .http
            .get(self.endpoint("posts")?)
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(failure_message(response).await));
        }
        let payloads: Vec<PostPayload> = response.json().await.map_err(unavailable)?;
        debug!(count = payloads.len(), "fetched posts");
        Ok(payloads.into_iter().map(Post::from).collect())
    }

    async fn create(&self, draft: &PostDraft) -> Result<Post, StoreError> {
        let request = self
            .http
            .post(self.endpoint("posts")?)
            .json(&CreatePostRequest::from(draft));
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(write_failed)?;
        if !response.status().is_success() {
            return Err(StoreError::Write(failure_message(response).await));
        }
        let payload: PostPayload = response.json().await.map_err(write_failed)?;
        Ok(payload.into())
    }

    async fn delete(&self, id: PostId) -> Result<(), StoreError> {
        let request = self.http.delete(self.endpoint(&format!("posts/{}", id.0))?);
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(write_failed)?;
        if !response.status().is_success() {
            return Err(StoreError::Write(failure_message(response).await));
        }
        Ok(())
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let response = self
            .http
            .post(self.endpoint("login")?)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(unavailable)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(failure_message(response).await));
        }
        let login: LoginResponse = response.json().await.map_err(unavailable)?;
        *self.token.write().await = Some(login.token);
        Ok(true)
    }

    async fn end_session(&self) -> Result<(), StoreError> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };
        let response = self
            .http
            .post(self.endpoint("logout")?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(failure_message(response).await));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
