pub mod auth;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod password_reset;
pub mod posts;
pub mod social;
pub mod users;
