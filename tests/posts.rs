//! Post CRUD Tests
//!
//! Covers post creation, reading, updating (ownership and edit window),
//! deleting, author listings and the home feed.

mod common;

use axum::http::StatusCode;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Create & Read
// ===========================================================================

#[tokio::test]
async fn create_post_with_tags() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_create").await;

    let resp = app
        .post_json(
            "/posts",
            json!({
                "content": "  hello world  ",
                "image": "images/cat.png",
                "tags": ["Rust", "#rust", "axum"]
            }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["content"], "hello world");
    assert_eq!(body["image"], "images/cat.png");
    assert_eq!(body["author"], user.username);
    assert_eq!(body["author_first_name"], "Test");
    assert_eq!(body["tags"], json!(["axum", "rust"]));
    assert_eq!(body["likes_count"], 0);
    assert_eq!(body["comments_count"], 0);
    assert_eq!(body["favorites_count"], 0);
}

#[tokio::test]
async fn create_post_without_content() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_empty").await;

    let resp = app
        .post_json("/posts", json!({ "content": "   " }), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["fields"][0]["field"], "content");
}

#[tokio::test]
async fn create_post_no_auth() {
    let Some(app) = app().await else { return };

    let resp = app
        .post_json("/posts", json!({ "content": "anonymous" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_post() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_get").await;
    let post_id = app.create_post_for_user(user.id).await;

    let resp = app
        .get(&format!("/posts/{}", post_id), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["id"], post_id.to_string());
    assert_eq!(resp.json()["tags"], json!([]));
}

#[tokio::test]
async fn get_nonexistent_post() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_get_missing").await;

    let resp = app
        .get(&format!("/posts/{}", Uuid::new_v4()), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

// ===========================================================================
// Update
// ===========================================================================

#[tokio::test]
async fn update_post_content() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_update").await;
    let post_id = app.create_post_for_user(user.id).await;

    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "content": "edited" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["content"], "edited");
}

#[tokio::test]
async fn update_post_wrong_user() {
    let Some(app) = app().await else { return };
    let owner = app.create_user("post_upd_owner").await;
    let other = app.create_user("post_upd_other").await;
    let post_id = app.create_post_for_user(owner.id).await;

    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "content": "hijacked" }),
            Some(&other.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn update_post_after_edit_window() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_upd_late").await;
    let post_id = app.create_post_for_user(user.id).await;
    app.backdate_post(post_id, 25).await;

    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "content": "too late" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_kind(), "edit_window_expired");

    let content: String = sqlx::query_scalar("SELECT content FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(content, "test content");
}

#[tokio::test]
async fn update_post_inside_edit_window() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_upd_early").await;
    let post_id = app.create_post_for_user(user.id).await;
    app.backdate_post(post_id, 23).await;

    let resp = app
        .patch_json(
            &format!("/posts/{}", post_id),
            json!({ "content": "just in time" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
}

// ===========================================================================
// Delete
// ===========================================================================

#[tokio::test]
async fn delete_post() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_delete").await;
    let post_id = app.create_post_for_user(user.id).await;

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
async fn delete_post_wrong_user() {
    let Some(app) = app().await else { return };
    let owner = app.create_user("post_del_owner").await;
    let other = app.create_user("post_del_other").await;
    let post_id = app.create_post_for_user(owner.id).await;

    let resp = app
        .delete(&format!("/posts/{}", post_id), Some(&other.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(exists);
}

#[tokio::test]
async fn delete_nonexistent_post() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_del_missing").await;

    let resp = app
        .delete(&format!("/posts/{}", Uuid::new_v4()), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Listings
// ===========================================================================

#[tokio::test]
async fn list_user_posts_paginates() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_list").await;
    for _ in 0..12 {
        app.create_post_for_user(user.id).await;
    }

    let resp = app
        .get(&format!("/users/{}/posts", user.id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 10);
    let cursor = body["next_cursor"].as_str().unwrap().to_string();

    let resp = app
        .get(
            &format!("/users/{}/posts?cursor={}", user.id, cursor),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert!(body["next_cursor"].is_null());
}

#[tokio::test]
async fn list_with_garbage_cursor() {
    let Some(app) = app().await else { return };
    let user = app.create_user("post_list_cursor").await;

    let resp = app
        .get(
            &format!("/users/{}/posts?cursor=not-a-cursor", user.id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feed_with_out_of_range_cursor() {
    let Some(app) = app().await else { return };
    let user = app.create_user("feed_bad_cursor").await;
    let cursor = URL_SAFE_NO_PAD.encode(format!("-377705116800000000000/{}", Uuid::new_v4()));

    let resp = app
        .get(&format!("/feed?cursor={}", cursor), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid cursor");
}

#[tokio::test]
async fn feed_shows_own_and_followed_posts() {
    let Some(app) = app().await else { return };
    let reader = app.create_user("feed_reader").await;
    let followed = app.create_user("feed_followed").await;
    let stranger = app.create_user("feed_stranger").await;

    let own_post = app.create_post_for_user(reader.id).await;
    app.backdate_post(own_post, 1).await;
    let followed_post = app.create_post_for_user(followed.id).await;
    let stranger_post = app.create_post_for_user(stranger.id).await;

    let resp = app
        .post_json(
            "/follow",
            json!({ "followed": followed.id }),
            Some(&reader.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app.get("/feed", Some(&reader.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let ids: Vec<String> = resp.json()["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(ids, vec![followed_post.to_string(), own_post.to_string()]);
    assert!(!ids.contains(&stranger_post.to_string()));
}
