//! Media upload intent tests. The blob upload itself goes straight to
//! object storage via the presigned URL, so these only cover the intent
//! endpoint.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn create_upload_requires_auth() {
    let app = app().await;

    let resp = app
        .post_json(
            "/media/upload",
            json!({ "kind": "image", "content_type": "image/jpeg", "bytes": 1024 }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_upload_valid_image() {
    let app = app().await;
    let user = app.create_user("upload_ok").await;

    let resp = app
        .post_json(
            "/media/upload",
            json!({ "kind": "image", "content_type": "image/png", "bytes": 2048 }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert!(body["media_id"].is_string());
    let object_key = body["object_key"].as_str().unwrap();
    assert!(object_key.ends_with(".png"));
    assert!(body["upload_url"].as_str().unwrap().contains(object_key));

    // The media row is recorded with the caller as owner
    let owner: uuid::Uuid = sqlx::query_scalar("SELECT owner_id FROM media WHERE id = $1")
        .bind(body["media_id"].as_str().unwrap().parse::<uuid::Uuid>().unwrap())
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(owner, user.id);
}

#[tokio::test]
async fn create_upload_rejects_bad_sizes() {
    let app = app().await;
    let user = app.create_user("upload_sizes").await;

    let resp = app
        .post_json(
            "/media/upload",
            json!({ "kind": "image", "content_type": "image/jpeg", "bytes": 0 }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "bytes must be greater than 0");

    let resp = app
        .post_json(
            "/media/upload",
            json!({ "kind": "video", "content_type": "video/mp4", "bytes": 999_999_999_999i64 }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "upload exceeds max size");
}

#[tokio::test]
async fn create_upload_rejects_kind_content_type_mismatch() {
    let app = app().await;
    let user = app.create_user("upload_mismatch").await;

    let resp = app
        .post_json(
            "/media/upload",
            json!({ "kind": "image", "content_type": "video/mp4", "bytes": 1024 }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid upload request");
}

#[tokio::test]
async fn get_media_returns_download_url() {
    let app = app().await;
    let user = app.create_user("media_fetch").await;
    let media_id = app.create_media(user.id, "image").await;

    let resp = app
        .get(&format!("/media/{}", media_id), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"].as_str().unwrap(), media_id.to_string());
    assert_eq!(body["kind"].as_str().unwrap(), "image");
    assert!(body["download_url"].is_string());
}

#[tokio::test]
async fn get_media_unknown_id() {
    let app = app().await;
    let user = app.create_user("media_404").await;

    let resp = app
        .get(&format!("/media/{}", uuid::Uuid::new_v4()), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_upload_rejects_unknown_content_type() {
    let app = app().await;
    let user = app.create_user("upload_unknown").await;

    let resp = app
        .post_json(
            "/media/upload",
            json!({ "kind": "image", "content_type": "application/pdf", "bytes": 1024 }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}
