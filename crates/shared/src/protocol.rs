use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Post, PostDraft, PostId, UserId, DEFAULT_AUTHOR};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub files: Vec<String>,
}

impl From<&PostDraft> for CreatePostRequest {
    fn from(draft: &PostDraft) -> Self {
        Self {
            title: draft.title.clone(),
            author: draft.author.clone(),
            content: draft.content.clone(),
            files: draft.attachments.clone(),
        }
    }
}

impl From<CreatePostRequest> for PostDraft {
    fn from(value: CreatePostRequest) -> Self {
        Self {
            title: value.title,
            author: value.author,
            content: value.content,
            attachments: value.files,
        }
    }
}

/// Wire shape of a post as served by `GET /posts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPayload {
    pub id: PostId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub files: Vec<String>,
}

impl From<Post> for PostPayload {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            author: Some(post.author),
            content: post.content,
            date: post.published_on,
            files: post.attachments,
        }
    }
}

impl From<PostPayload> for Post {
    fn from(payload: PostPayload) -> Self {
        let author = payload
            .author
            .filter(|author| !author.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
        Self {
            id: payload.id,
            title: payload.title,
            author,
            content: payload.content,
            published_on: payload.date,
            attachments: payload.files,
        }
    }
}
