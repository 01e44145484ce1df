use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{Post, PostDraft, PostId, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct StoredPost {
    pub post_id: PostId,
    pub title: String,
    pub author: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub attachments: Vec<String>,
}

impl From<StoredPost> for Post {
    fn from(stored: StoredPost) -> Self {
        Self {
            id: stored.post_id,
            title: stored.title,
            author: stored.author,
            content: stored.content,
            published_on: stored.published_at.date_naive(),
            attachments: stored.attachments,
        }
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(%database_url, "storage ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Creates the user or replaces the stored password hash.
    pub async fn upsert_user(&self, username: &str, password_hash: &str) -> Result<UserId> {
        let rec = sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES (?, ?)
             ON CONFLICT(username) DO UPDATE SET password_hash=excluded.password_hash
             RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    /// Inserts the user only when the name is free. Returns `None` when it
    /// already existed, leaving its password untouched.
    pub async fn create_user_if_missing(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<UserId>> {
        let row = sqlx::query(
            "INSERT INTO users (username, password_hash) VALUES (?, ?)
             ON CONFLICT(username) DO NOTHING
             RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| UserId(r.get::<i64, _>(0))))
    }

    pub async fn load_user(&self, username: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StoredUser {
            user_id: UserId(r.get::<i64, _>(0)),
            username: r.get::<String, _>(1),
            password_hash: r.get::<String, _>(2),
        }))
    }

    /// All posts, newest identifier first.
    pub async fn list_posts(&self) -> Result<Vec<StoredPost>> {
        let rows = sqlx::query(
            "SELECT id, title, author, content, published_at FROM posts ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let file_rows =
            sqlx::query("SELECT post_id, filename FROM post_files ORDER BY post_id, position")
                .fetch_all(&self.pool)
                .await?;
        let mut files: HashMap<i64, Vec<String>> = HashMap::new();
        for row in file_rows {
            files
                .entry(row.get::<i64, _>(0))
                .or_default()
                .push(row.get::<String, _>(1));
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let post_id = r.get::<i64, _>(0);
                StoredPost {
                    post_id: PostId(post_id),
                    title: r.get::<String, _>(1),
                    author: r.get::<String, _>(2),
                    content: r.get::<String, _>(3),
                    published_at: r.get::<DateTime<Utc>, _>(4),
                    attachments: files.remove(&post_id).unwrap_or_default(),
                }
            })
            .collect())
    }

    pub async fn load_post(&self, post_id: PostId) -> Result<Option<StoredPost>> {
        let row = sqlx::query(
            "SELECT id, title, author, content, published_at FROM posts WHERE id = ?",
        )
        .bind(post_id.0)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let attachments = sqlx::query(
            "SELECT filename FROM post_files WHERE post_id = ? ORDER BY position",
        )
        .bind(post_id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| r.get::<String, _>(0))
        .collect();

        Ok(Some(StoredPost {
            post_id: PostId(row.get::<i64, _>(0)),
            title: row.get::<String, _>(1),
            author: row.get::<String, _>(2),
            content: row.get::<String, _>(3),
            published_at: row.get::<DateTime<Utc>, _>(4),
            attachments,
        }))
    }

    /// Writes the post and its attachment names atomically; the identifier
    /// comes from SQLite and is never reused after deletion.
    pub async fn insert_post(
        &self,
        draft: &PostDraft,
        published_at: DateTime<Utc>,
    ) -> Result<StoredPost> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO posts (title, author, content, published_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(&draft.content)
        .bind(published_at)
        .fetch_one(&mut *tx)
        .await?;
        let post_id = PostId(rec.get::<i64, _>(0));

        for (position, filename) in draft.attachments.iter().enumerate() {
            sqlx::query("INSERT INTO post_files (post_id, position, filename) VALUES (?, ?, ?)")
                .bind(post_id.0)
                .bind(position as i64)
                .bind(filename)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(StoredPost {
            post_id,
            title: draft.title.clone(),
            author: draft.author.clone(),
            content: draft.content.clone(),
            published_at,
            attachments: draft.attachments.clone(),
        })
    }

    /// Returns whether a post was removed.
    pub async fn delete_post(&self, post_id: PostId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM post_files WHERE post_id = ?")
            .bind(post_id.0)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }

    pub async fn revoke_session(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO revoked_sessions (token_id, expires_at) VALUES (?, ?)
             ON CONFLICT(token_id) DO NOTHING",
        )
        .bind(token_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_session_revoked(&self, token_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM revoked_sessions WHERE token_id = ?")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Drops revocation records whose tokens would have expired anyway.
    pub async fn prune_revoked_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
