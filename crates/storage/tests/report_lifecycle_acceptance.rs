use chrono::Utc;
use shared::domain::{Post, PostDraft};
use storage::Storage;

#[tokio::test]
async fn reports_survive_reopen_and_deletion_is_permanent() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("factshield.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage
        .create_user_if_missing("admin", "seeded-hash")
        .await
        .expect("seed admin");
    let kept = storage
        .insert_post(
            &PostDraft::new(
                "Operation: Silent Echo",
                "NorthByte Analyst",
                "Analysis of deep-sea cable anomalies.",
                vec!["spectrum_analysis_v2.pdf".into(), "signal_log_raw.txt".into()],
            ),
            Utc::now(),
        )
        .await
        .expect("kept post");
    let expunged = storage
        .insert_post(
            &PostDraft::new("Operation: Glass Harbor", "Field Desk", "draft", Vec::new()),
            Utc::now(),
        )
        .await
        .expect("expunged post");
    assert!(storage
        .delete_post(expunged.post_id)
        .await
        .expect("delete"));
    drop(storage);

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let posts: Vec<Post> = reopened
        .list_posts()
        .await
        .expect("posts")
        .into_iter()
        .map(Post::from)
        .collect();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, kept.post_id);
    assert_eq!(
        posts[0].attachments,
        vec!["spectrum_analysis_v2.pdf", "signal_log_raw.txt"]
    );

    let admin = reopened
        .load_user("admin")
        .await
        .expect("load admin")
        .expect("admin exists");
    assert_eq!(admin.password_hash, "seeded-hash");
}
