use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/token/refresh", post(handlers::refresh_token))
        .route("/signup", post(handlers::signup))
        .route("/change-password", post(handlers::change_password))
}

pub fn password_reset() -> Router<AppState> {
    Router::new()
        .route("/send-code", post(handlers::send_code))
        .route("/validate-code", post(handlers::validate_code))
        .route("/reset-password", post(handlers::reset_password))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(handlers::get_profile_settings).put(handlers::update_profile),
        )
        .route("/account", delete(handlers::delete_account))
        .route("/follow", post(handlers::follow_user))
        .route("/unfollow", post(handlers::unfollow_user))
        .route("/user/:username", get(handlers::get_user_profile))
        .route("/users/:id/posts", get(handlers::list_user_posts))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route(
            "/posts/:id",
            get(handlers::get_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/posts/:id/comments",
            get(handlers::list_post_comments).post(handlers::create_comment),
        )
        .route(
            "/comments/:id",
            patch(handlers::update_comment).delete(handlers::delete_comment),
        )
        .route(
            "/like/:post_id",
            post(handlers::like_post).delete(handlers::unlike_post),
        )
        .route(
            "/favorites",
            get(handlers::get_favorites)
                .post(handlers::favorite_post)
                .delete(handlers::unfavorite_post),
        )
}

pub fn feed() -> Router<AppState> {
    Router::new().route("/feed", get(handlers::home_feed))
}
