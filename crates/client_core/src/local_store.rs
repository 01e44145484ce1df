use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{Post, PostDraft, PostId};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{PostStore, StoreError};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    posts: Vec<Post>,
}

/// [`PostStore`] kept in process memory, optionally mirrored to a JSON file
/// after every write.
pub struct LocalPostStore {
    path: Option<PathBuf>,
    username: String,
    password: String,
    posts: Mutex<Vec<Post>>,
}

/// The report a fresh store starts with.
pub fn seed_post() -> Post {
    Post {
        id: PostId(1),
        title: "Operation: Silent Echo".to_string(),
        author: shared::domain::DEFAULT_AUTHOR.to_string(),
        content: "Analysis of deep-sea cable anomalies suggests targeted interference pattern \
                  matching Group 77 signatures. Preliminary signal intelligence reveals \
                  coordinated frequency hopping."
            .to_string(),
        published_on: NaiveDate::from_ymd_opt(2024, 5, 15).unwrap_or(NaiveDate::MIN),
        attachments: vec![
            "spectrum_analysis_v2.pdf".to_string(),
            "signal_log_raw.txt".to_string(),
        ],
    }
}

impl LocalPostStore {
    pub fn in_memory() -> Self {
        Self::with_posts(vec![seed_post()])
    }

    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            path: None,
            username: "admin".to_string(),
            password: "admin123".to_string(),
            posts: Mutex::new(posts),
        }
    }

    /// Loads the document at `path`, seeding and writing it when the file
    /// does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let posts = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: StoreDocument = serde_json::from_slice(&bytes).map_err(|err| {
                    StoreError::Unavailable(format!("corrupt store {}: {err}", path.display()))
                })?;
                if document.version != DOCUMENT_VERSION {
                    return Err(StoreError::Unavailable(format!(
                        "unsupported store version {} in {}",
                        document.version,
                        path.display()
                    )));
                }
                document.posts
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "creating local post store");
                let posts = vec![seed_post()];
                write_document(&path, &posts).await?;
                posts
            }
            Err(err) => {
                return Err(StoreError::Unavailable(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };

        let mut store = Self::with_posts(posts);
        store.path = Some(path);
        Ok(store)
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, posts: &[Post]) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => write_document(path, posts).await,
            None => Ok(()),
        }
    }
}

async fn write_document(path: &Path, posts: &[Post]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|err| {
            StoreError::Write(format!("failed to create {}: {err}", parent.display()))
        })?;
    }
    let document = StoreDocument {
        version: DOCUMENT_VERSION,
        posts: posts.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&document)
        .map_err(|err| StoreError::Write(format!("failed to encode store: {err}")))?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, bytes).await.map_err(|err| {
        StoreError::Write(format!("failed to write {}: {err}", staging.display()))
    })?;
    tokio::fs::rename(&staging, path).await.map_err(|err| {
        StoreError::Write(format!("failed to replace {}: {err}", path.display()))
    })
}

/// Millisecond timestamp, bumped past `last` so ids stay strictly increasing.
fn next_post_id(posts: &[Post]) -> PostId {
    let now = Utc::now().timestamp_millis();
    let last = posts.iter().map(|post| post.id.0).max().unwrap_or(0);
    PostId(now.max(last + 1))
}

#[async_trait]
impl PostStore for LocalPostStore {
    async fn list(&self) -> Result<Vec<Post>, StoreError> {
        let mut posts = self.posts.lock().await.clone();
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(posts)
    }

    async fn create(&self, draft: &PostDraft) -> Result<Post, StoreError> {
        let draft = draft
            .normalized()
            .map_err(|err| StoreError::Write(err.to_string()))?;
        let mut posts = self.posts.lock().await;
        let post = Post {
            id: next_post_id(&posts),
            title: draft.title,
            author: draft.author,
            content: draft.content,
            published_on: Utc::now().date_naive(),
            attachments: draft.attachments,
        };
        let mut updated = posts.clone();
        updated.push(post.clone());
        self.persist(&updated).await?;
        *posts = updated;
        Ok(post)
    }

    async fn delete(&self, id: PostId) -> Result<(), StoreError> {
        let mut posts = self.posts.lock().await;
        if !posts.iter().any(|post| post.id == id) {
            return Err(StoreError::Write(format!("post {id} not found")));
        }
        let updated: Vec<Post> = posts.iter().filter(|post| post.id != id).cloned().collect();
        self.persist(&updated).await?;
        *posts = updated;
        Ok(())
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        let accepted = username == self.username && password == self.password;
        if !accepted {
            warn!(%username, "local credential check failed");
        }
        Ok(accepted)
    }

    async fn end_session(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/local_store_tests.rs"]
mod tests;
