pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::auth::AuthService;
use crate::app::password_reset::PasswordResetService;
use crate::config::AppConfig;
use crate::infra::{db::Db, mail::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub mailer: Arc<dyn Mailer>,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub code_ttl_minutes: u64,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            mailer,
            paseto_access_key: config.paseto_access_key,
            paseto_refresh_key: config.paseto_refresh_key,
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
            code_ttl_minutes: config.code_ttl_minutes,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.paseto_access_key,
            self.paseto_refresh_key,
            self.access_ttl_minutes,
            self.refresh_ttl_days,
        )
    }

    pub fn password_reset_service(&self) -> PasswordResetService {
        PasswordResetService::new(self.db.clone(), self.mailer.clone(), self.code_ttl_minutes)
    }
}
