//! User Settings Tests
//!
//! Covers reading and updating the caller's profile and deleting the account.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn get_own_profile() {
    let Some(app) = app().await else { return };
    let user = app.create_user("usr_get").await;

    let resp = app.get("/profile", Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["email"], user.email);
    assert_eq!(body["is_checked"], false);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn update_profile_partially() {
    let Some(app) = app().await else { return };
    let user = app.create_user("usr_update").await;

    let resp = app
        .put_json(
            "/profile",
            json!({ "phone": "+1 555 0100", "street": "Main St", "first_name": "Ada" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["phone"], "+1 555 0100");
    assert_eq!(body["street"], "Main St");
    assert_eq!(body["first_name"], "Ada");
    assert_eq!(body["username"], user.username);
}

#[tokio::test]
async fn update_profile_username_conflict() {
    let Some(app) = app().await else { return };
    let user = app.create_user("usr_conflict_a").await;
    let other = app.create_user("usr_conflict_b").await;

    let resp = app
        .put_json(
            "/profile",
            json!({ "username": other.username }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_kind(), "validation_error");
    assert_eq!(resp.json()["fields"][0]["field"], "username");
}

#[tokio::test]
async fn update_profile_blank_name() {
    let Some(app) = app().await else { return };
    let user = app.create_user("usr_blank").await;

    let resp = app
        .put_json("/profile", json!({ "last_name": "  " }), Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_account_cascades() {
    let Some(app) = app().await else { return };
    let user = app.create_user("usr_delete").await;
    let post_id = app.create_post_for_user(user.id).await;

    let resp = app
        .post_json("/send-code", json!({ "email": user.email }), None)
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.delete("/account", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(posts, 0);

    // Codes survive with a null owner
    let orphaned: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM verification_codes WHERE code = $1 AND user_id IS NULL",
    )
    .bind(app.last_code_sent_to(&user.email).unwrap())
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(orphaned, 1);

    // The token of a deleted account no longer reaches a profile
    let resp = app.get("/profile", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_after_account_deletion() {
    let Some(app) = app().await else { return };
    let user = app.create_user("usr_deleted_writer").await;
    let other = app.create_user("usr_deleted_other").await;
    let post_id = app.create_post_for_user(other.id).await;

    let resp = app.delete("/account", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let token = Some(user.access_token.as_str());
    let attempts = [
        app.post_json("/posts", json!({ "content": "from beyond" }), token).await,
        app.post_json("/follow", json!({ "followed": other.id }), token).await,
        app.post_json(&format!("/like/{}", post_id), json!({}), token).await,
        app.post_json("/favorites", json!({ "post_id": post_id }), token).await,
        app.post_json(
            &format!("/posts/{}/comments", post_id),
            json!({ "content": "still here?" }),
            token,
        )
        .await,
    ];

    for resp in attempts {
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.error_kind(), "user_not_found");
    }
}
