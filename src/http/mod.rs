use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::password_reset())
        .merge(routes::users())
        .merge(routes::posts())
        .merge(routes::feed())
        .with_state(state)
}
