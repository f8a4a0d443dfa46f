//! Post CRUD and dashboard tests.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

// ===========================================================================
// Dashboard
// ===========================================================================

#[tokio::test]
async fn dashboard_requires_auth() {
    let app = app().await;

    let resp = app.get("/dashboard", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dashboard_lists_posts_newest_first() {
    let app = app().await;
    let user = app.create_user("dash_order").await;

    let now = OffsetDateTime::now_utc();
    let older = app
        .create_post_at(user.id, "dash older post", now - Duration::minutes(5))
        .await;
    let newer = app.create_post_at(user.id, "dash newer post", now).await;

    let resp = app.get("/dashboard", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let posts = body.as_array().unwrap();
    let ids: Vec<&str> = posts.iter().map(|p| p["id"].as_str().unwrap()).collect();

    let newer_pos = ids.iter().position(|id| *id == newer.to_string()).unwrap();
    let older_pos = ids.iter().position(|id| *id == older.to_string()).unwrap();
    assert!(newer_pos < older_pos, "newest post must come first");
}

#[tokio::test]
async fn dashboard_carries_owner_and_counts() {
    let app = app().await;
    let user = app.create_user("dash_counts").await;
    let post_id = app.create_post_for_user(user.id, "dash counted post").await;

    app.post_json(&format!("/posts/{}/like", post_id), json!({}), Some(&user.access_token))
        .await;
    app.post_json(
        &format!("/posts/{}/comment", post_id),
        json!({ "text": "first!" }),
        Some(&user.access_token),
    )
    .await;

    let resp = app.get("/dashboard", Some(&user.access_token)).await;
    let body = resp.json();
    let post = body
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"].as_str() == Some(&post_id.to_string()))
        .expect("post missing from dashboard");

    assert_eq!(post["owner_username"].as_str().unwrap(), user.username);
    assert_eq!(post["like_count"].as_i64().unwrap(), 1);
    assert_eq!(post["comment_count"].as_i64().unwrap(), 1);
}

// ===========================================================================
// Create
// ===========================================================================

#[tokio::test]
async fn create_post_valid() {
    let app = app().await;
    let user = app.create_user("post_create").await;

    let resp = app
        .post_json(
            "/posts",
            json!({ "title": "Hello", "content": "World" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["message"].as_str().unwrap(), "Post created successfully!");
    assert_eq!(body["title"].as_str().unwrap(), "Hello");
    assert_eq!(body["owner_id"].as_str().unwrap(), user.id.to_string());
    assert!(body["image_id"].is_null());
}

#[tokio::test]
async fn create_post_requires_auth() {
    let app = app().await;

    let resp = app
        .post_json("/posts", json!({ "title": "t", "content": "c" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_post_blank_fields_persists_nothing() {
    let app = app().await;
    let user = app.create_user("post_blank").await;

    for body in [
        json!({ "title": "", "content": "something" }),
        json!({ "title": "something", "content": "   " }),
    ] {
        let resp = app.post_json("/posts", body, Some(&user.access_token)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.error_message(), "title and content are required");
    }

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM posts WHERE owner_id = $1")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn create_post_with_attachments() {
    let app = app().await;
    let user = app.create_user("post_media").await;
    let image_id = app.create_media(user.id, "image").await;
    let video_id = app.create_media(user.id, "video").await;

    let resp = app
        .post_json(
            "/posts",
            json!({
                "title": "With media",
                "content": "body",
                "image_id": image_id.to_string(),
                "video_id": video_id.to_string()
            }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["image_id"].as_str().unwrap(), image_id.to_string());
    assert_eq!(body["video_id"].as_str().unwrap(), video_id.to_string());
}

#[tokio::test]
async fn create_post_rejects_foreign_media() {
    let app = app().await;
    let owner = app.create_user("media_owner").await;
    let thief = app.create_user("media_thief").await;
    let image_id = app.create_media(owner.id, "image").await;

    let resp = app
        .post_json(
            "/posts",
            json!({
                "title": "Stolen",
                "content": "body",
                "image_id": image_id.to_string()
            }),
            Some(&thief.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid image_id");
}

#[tokio::test]
async fn create_post_rejects_kind_mismatch() {
    let app = app().await;
    let user = app.create_user("media_kind").await;
    let video_id = app.create_media(user.id, "video").await;

    // A video attached in the image slot is rejected
    let resp = app
        .post_json(
            "/posts",
            json!({
                "title": "Mismatch",
                "content": "body",
                "image_id": video_id.to_string()
            }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid image_id");
}

// ===========================================================================
// Read / update / delete
// ===========================================================================

#[tokio::test]
async fn get_nonexistent_post() {
    let app = app().await;
    let user = app.create_user("post_get404").await;

    let resp = app
        .get(&format!("/posts/{}", Uuid::new_v4()), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn update_post_overwrites_title_and_content() {
    let app = app().await;
    let user = app.create_user("post_update").await;
    let post_id = app.create_post_for_user(user.id, "original title").await;

    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "title": "new title", "content": "new content" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["message"].as_str().unwrap(), "Post updated successfully!");
    assert_eq!(body["title"].as_str().unwrap(), "new title");
    assert_eq!(body["content"].as_str().unwrap(), "new content");
}

#[tokio::test]
async fn update_post_retains_attachments_when_omitted() {
    let app = app().await;
    let user = app.create_user("post_keep_media").await;
    let image_id = app.create_media(user.id, "image").await;

    let resp = app
        .post_json(
            "/posts",
            json!({
                "title": "t",
                "content": "c",
                "image_id": image_id.to_string()
            }),
            Some(&user.access_token),
        )
        .await;
    let post_id = resp.json()["id"].as_str().unwrap().to_string();

    // No image_id in the edit: the existing attachment stays
    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "title": "t2", "content": "c2" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["image_id"].as_str().unwrap(), image_id.to_string());

    // A new image_id replaces it
    let replacement = app.create_media(user.id, "image").await;
    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "title": "t3", "content": "c3", "image_id": replacement.to_string() }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["image_id"].as_str().unwrap(), replacement.to_string());
}

#[tokio::test]
async fn update_post_wrong_user_is_not_found_and_unchanged() {
    let app = app().await;
    let owner = app.create_user("post_upd_owner").await;
    let other = app.create_user("post_upd_other").await;
    let post_id = app.create_post_for_user(owner.id, "untouchable").await;

    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "title": "hacked", "content": "hacked" }),
            Some(&other.access_token),
        )
        .await;

    // Ownership miss surfaces as 404, not 403
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let title: String = sqlx::query_scalar("SELECT title FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(title, "untouchable");
}

#[tokio::test]
async fn delete_post() {
    let app = app().await;
    let user = app.create_user("post_delete").await;
    let post_id = app.create_post_for_user(user.id, "doomed").await;

    let resp = app
        .delete(&format!("/posts/{}", post_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_post_wrong_user_is_not_found_and_post_survives() {
    let app = app().await;
    let owner = app.create_user("post_del_owner").await;
    let other = app.create_user("post_del_other").await;
    let post_id = app.create_post_for_user(owner.id, "survivor").await;

    let resp = app
        .delete(&format!("/posts/{}", post_id), Some(&other.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&owner.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}
