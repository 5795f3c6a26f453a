#![allow(dead_code)]

use std::sync::Arc;

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

use rootnet::config::AppConfig;
use rootnet::infra::db::Db;
use rootnet::infra::mail::MemoryMailer;
use rootnet::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// "0123456789abcdef0123456789abcdef" (32 bytes), test-only
const TEST_PASETO_ACCESS_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
// "fedcba9876543210fedcba9876543210" (32 bytes), test-only
const TEST_PASETO_REFRESH_KEY: &str = "ZmVkY2JhOTg3NjU0MzIxMGZlZGNiYTk4NzY1NDMyMTA=";
pub const DEFAULT_PASSWORD: &str = "testpassword123";

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub mailer: MemoryMailer,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    /// Machine-readable error kind, e.g. `invalid_credentials`.
    pub fn error_kind(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    pub fn error_message(&self) -> String {
        self.json()["message"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Database prepared once per test binary; `None` when no test database is configured.
static PREPARED_DB: OnceCell<Option<()>> = OnceCell::const_new();

/// Builds a TestApp for the current test, or `None` when `TEST_DATABASE_BASE_URL` is unset.
///
/// Every `#[tokio::test]` runs on its own runtime, so each test gets its own pool.
pub async fn app() -> Option<TestApp> {
    PREPARED_DB.get_or_init(prepare_database).await.as_ref()?;
    Some(TestApp::connect().await)
}

async fn prepare_database() -> Option<()> {
    let base_url = match std::env::var("TEST_DATABASE_BASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_BASE_URL not set, skipping database tests");
            return None;
        }
    };
    let test_db = std::env::var("TEST_DATABASE_NAME").unwrap_or_else(|_| "rootnet_test".into());

    // ---- Create test database if needed ----
    let admin_pool = PgPool::connect(&format!("{}/postgres", base_url))
        .await
        .expect("cannot connect to postgres admin database");

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&test_db)
            .fetch_one(&admin_pool)
            .await
            .expect("failed to check test db existence");

    if !exists {
        // CREATE DATABASE cannot run inside a transaction
        sqlx::query(&format!("CREATE DATABASE \"{}\"", test_db))
            .execute(&admin_pool)
            .await
            .expect("failed to create test database");
    }
    admin_pool.close().await;

    // ---- Start from an empty schema, then migrate through the production code path ----
    let database_url = format!("{}/{}", base_url, test_db);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("cannot connect to test database");

    sqlx::raw_sql("DROP SCHEMA IF EXISTS public CASCADE; CREATE SCHEMA public;")
        .execute(&pool)
        .await
        .expect("failed to reset test schema");

    let db = Db::from_pool(pool.clone());
    db.migrate().await.expect("migrations failed");
    pool.close().await;

    // ---- Configure AppConfig through the environment, as in production ----
    assert_eq!(STANDARD.decode(TEST_PASETO_ACCESS_KEY).unwrap().len(), 32);
    assert_eq!(STANDARD.decode(TEST_PASETO_REFRESH_KEY).unwrap().len(), 32);

    std::env::set_var("DATABASE_URL", &database_url);
    std::env::set_var("PASETO_ACCESS_KEY", TEST_PASETO_ACCESS_KEY);
    std::env::set_var("PASETO_REFRESH_KEY", TEST_PASETO_REFRESH_KEY);
    std::env::set_var("DB_MAX_CONNECTIONS", "5");
    std::env::set_var("DB_CONNECT_TIMEOUT_SECONDS", "30");
    std::env::remove_var("SMTP_HOST");

    Some(())
}

impl TestApp {
    async fn connect() -> Self {
        let config = AppConfig::from_env().expect("failed to build AppConfig");
        let db = Db::connect(&config).await.expect("Db::connect failed");
        let mailer = MemoryMailer::new();
        let state = AppState::new(&config, db, Arc::new(mailer.clone()));
        let router = rootnet::http::router(state.clone());

        TestApp {
            router,
            state,
            mailer,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, Some(body), token).await
    }

    pub async fn put_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::PUT, path, Some(body), token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, None, token).await
    }

    pub async fn delete_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, Some(body), token).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Create a user directly in the DB and issue tokens without going through login.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let username = format!("testuser_{}", suffix);
        let email = format!("test_{}@example.com", suffix);
        let password = DEFAULT_PASSWORD;

        let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .expect("password hash failed")
            .to_string();

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (email, username, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, 'Test', $4) RETURNING id",
        )
        .bind(&email)
        .bind(&username)
        .bind(&hash)
        .bind(format!("User {}", suffix))
        .fetch_one(self.pool())
        .await
        .expect("insert test user failed");

        let tokens = self
            .state
            .auth_service()
            .issue_token_pair(user_id)
            .await
            .expect("issue_token_pair failed");

        TestUser {
            id: user_id,
            username,
            email,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    /// Insert a post directly in DB. Returns the post id.
    pub async fn create_post_for_user(&self, author_id: Uuid) -> Uuid {
        sqlx::query_scalar(
            "INSERT INTO posts (author_id, content) VALUES ($1, 'test content') RETURNING id",
        )
        .bind(author_id)
        .fetch_one(self.pool())
        .await
        .expect("insert test post failed")
    }

    /// Move a post's creation time into the past.
    pub async fn backdate_post(&self, post_id: Uuid, hours: i32) {
        sqlx::query(
            "UPDATE posts SET created_at = now() - make_interval(hours => $2) WHERE id = $1",
        )
        .bind(post_id)
        .bind(hours)
        .execute(self.pool())
        .await
        .expect("backdate post failed");
    }

    /// Most recent verification code emailed to `email`, read from the in-memory mailbox.
    pub fn last_code_sent_to(&self, email: &str) -> Option<String> {
        let sent = self.mailer.sent_to(email);
        let body = &sent.last()?.html_body;
        let start = body.find("inline-block;'>")? + "inline-block;'>".len();
        let end = body[start..].find('<')? + start;
        Some(body[start..end].to_string())
    }

    /// Return the pool for direct DB assertions.
    pub fn pool(&self) -> &PgPool {
        self.state.db.pool()
    }
}
