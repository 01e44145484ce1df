use super::*;
use chrono::TimeZone;

fn draft(title: &str, files: &[&str]) -> PostDraft {
    PostDraft::new(
        title,
        "NorthByte Analyst",
        "signal intelligence summary",
        files.iter().map(|f| f.to_string()).collect(),
    )
}

fn may_15() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 9, 30, 0)
        .single()
        .expect("timestamp")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn lists_posts_newest_identifier_first_with_files() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .insert_post(&draft("Operation: Silent Echo", &["spectrum.pdf", "raw.txt"]), may_15())
        .await
        .expect("first");
    let second = storage
        .insert_post(&draft("Operation: Low Tide", &[]), may_15() - chrono::Duration::days(30))
        .await
        .expect("second");

    let posts = storage.list_posts().await.expect("posts");
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].post_id, second.post_id);
    assert_eq!(posts[1].post_id, first.post_id);
    assert!(posts[0].attachments.is_empty());
    assert_eq!(posts[1].attachments, vec!["spectrum.pdf", "raw.txt"]);
}

#[tokio::test]
async fn load_post_round_trips_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let stored = storage
        .insert_post(&draft("Operation: Silent Echo", &["log.txt"]), may_15())
        .await
        .expect("insert");

    let loaded = storage
        .load_post(stored.post_id)
        .await
        .expect("load")
        .expect("post exists");
    assert_eq!(loaded.title, "Operation: Silent Echo");
    assert_eq!(loaded.published_at, may_15());
    assert_eq!(loaded.attachments, vec!["log.txt"]);

    let post = Post::from(loaded);
    assert_eq!(post.published_on.to_string(), "2024-05-15");
}

#[tokio::test]
async fn delete_reports_missing_posts_and_never_reuses_ids() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let stored = storage
        .insert_post(&draft("Ephemeral", &["a.bin"]), may_15())
        .await
        .expect("insert");

    assert!(storage.delete_post(stored.post_id).await.expect("delete"));
    assert!(!storage.delete_post(stored.post_id).await.expect("second delete"));
    assert!(storage
        .load_post(stored.post_id)
        .await
        .expect("load")
        .is_none());

    let next = storage
        .insert_post(&draft("Successor", &[]), may_15())
        .await
        .expect("insert");
    assert!(next.post_id > stored.post_id);
}

#[tokio::test]
async fn create_user_if_missing_keeps_existing_password() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .create_user_if_missing("admin", "hash-one")
        .await
        .expect("create");
    assert!(created.is_some());

    let again = storage
        .create_user_if_missing("admin", "hash-two")
        .await
        .expect("create again");
    assert!(again.is_none());

    let user = storage
        .load_user("admin")
        .await
        .expect("load")
        .expect("user");
    assert_eq!(user.password_hash, "hash-one");

    storage.upsert_user("admin", "hash-three").await.expect("upsert");
    let user = storage
        .load_user("admin")
        .await
        .expect("load")
        .expect("user");
    assert_eq!(user.password_hash, "hash-three");
}

#[tokio::test]
async fn revoked_sessions_are_tracked_and_pruned() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .revoke_session("token-a", may_15())
        .await
        .expect("revoke");
    assert!(storage.is_session_revoked("token-a").await.expect("check"));
    assert!(!storage.is_session_revoked("token-b").await.expect("check"));

    let pruned = storage
        .prune_revoked_sessions(may_15() + chrono::Duration::seconds(1))
        .await
        .expect("prune");
    assert_eq!(pruned, 1);
    assert!(!storage.is_session_revoked("token-a").await.expect("check"));
}
