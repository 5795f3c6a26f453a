use std::sync::Arc;

use anyhow::anyhow;
use rand::Rng;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::app::auth::{hash_password, revoke_all_refresh_tokens};
use crate::app::error::{check_password_policy, unique_violation, FieldError, ServiceError, ServiceResult};
use crate::domain::verification::VerificationCode;
use crate::infra::db::Db;
use crate::infra::mail::{Mailer, OutgoingEmail};

pub const CODE_LENGTH: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 5;

const CODE_COLUMNS: &str = "id, code, user_id, is_used, used_at, created_at";

fn code_from_row(row: &PgRow) -> VerificationCode {
    VerificationCode {
        id: row.get("id"),
        code: row.get("code"),
        user_id: row.get("user_id"),
        is_used: row.get("is_used"),
        used_at: row.get("used_at"),
        created_at: row.get("created_at"),
    }
}

#[derive(Debug, Clone)]
pub struct ResetRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Codes move from requested to validated (`is_used`) to consumed (deleted).
#[derive(Clone)]
pub struct PasswordResetService {
    db: Db,
    mailer: Arc<dyn Mailer>,
    code_ttl_minutes: u64,
}

impl PasswordResetService {
    pub fn new(db: Db, mailer: Arc<dyn Mailer>, code_ttl_minutes: u64) -> Self {
        Self {
            db,
            mailer,
            code_ttl_minutes,
        }
    }

    /// Returns `Ok(false)` when no account uses `email`; callers answer the same either way.
    pub async fn send_code(&self, email: &str) -> ServiceResult<bool> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "email",
                "email is required",
            )]));
        }

        let user_id: Option<uuid::Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(self.db.pool())
            .await?;
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => {
                tracing::info!("password reset requested for unknown email");
                return Ok(false);
            }
        };

        let code = self.store_new_code(user_id).await?;
        self.mailer
            .send(OutgoingEmail {
                to: email,
                subject: "Reset password".to_string(),
                html_body: reset_email_body(&code.code),
            })
            .await?;

        tracing::info!(user_id = %user_id, "password reset code sent");
        Ok(true)
    }

    /// Marks an unused, unexpired code as validated. A code validates at most once.
    pub async fn validate_code(&self, code: &str) -> ServiceResult<VerificationCode> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(ServiceError::InvalidCode);
        }

        let row = sqlx::query(&format!(
            "UPDATE verification_codes \
             SET is_used = TRUE, used_at = now() \
             WHERE code = $1 \
               AND is_used = FALSE \
               AND user_id IS NOT NULL \
               AND created_at > now() - make_interval(mins => $2) \
             RETURNING {}",
            CODE_COLUMNS
        ))
        .bind(&code)
        .bind(self.code_ttl_minutes as i32)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| code_from_row(&row))
            .ok_or(ServiceError::InvalidCode)
    }

    pub async fn reset_password(&self, request: ResetRequest) -> ServiceResult<()> {
        let email = request.email.trim().to_lowercase();
        let code = normalize_code(&request.code);

        let mut missing = Vec::new();
        for (field, value) in [
            ("code", code.as_str()),
            ("email", email.as_str()),
            ("new_password", request.new_password.as_str()),
            ("confirm_password", request.confirm_password.as_str()),
        ] {
            if value.is_empty() {
                missing.push(FieldError::new(field, format!("{} is required", field)));
            }
        }
        if !missing.is_empty() {
            return Err(ServiceError::invalid_fields(missing));
        }
        if request.new_password != request.confirm_password {
            return Err(ServiceError::PasswordMismatch);
        }
        check_password_policy("new_password", &request.new_password)?;

        let mut tx = self.db.pool().begin().await?;
        let user_id: Option<uuid::Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => {
                tx.rollback().await?;
                return Err(ServiceError::UserNotFound);
            }
        };

        let consumed = sqlx::query(
            "DELETE FROM verification_codes \
             WHERE code = $1 \
               AND user_id = $2 \
               AND is_used = TRUE \
               AND created_at > now() - make_interval(mins => $3)",
        )
        .bind(&code)
        .bind(user_id)
        .bind(self.code_ttl_minutes as i32)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(ServiceError::InvalidCode);
        }

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(&request.new_password)?)
            .execute(&mut *tx)
            .await?;
        let revoked = revoke_all_refresh_tokens(user_id, &mut tx).await?;

        tx.commit().await?;
        tracing::info!(user_id = %user_id, revoked_sessions = revoked, "password reset completed");
        Ok(())
    }

    async fn store_new_code(&self, user_id: uuid::Uuid) -> ServiceResult<VerificationCode> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let result = sqlx::query(&format!(
                "INSERT INTO verification_codes (code, user_id) VALUES ($1, $2) RETURNING {}",
                CODE_COLUMNS
            ))
            .bind(generate_code())
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await;

            match result {
                Ok(row) => return Ok(code_from_row(&row)),
                Err(err) if unique_violation(&err).is_some() => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(anyhow!("could not generate a unique verification code").into())
    }
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn reset_email_body(code: &str) -> String {
    format!(
        "<html>\
         <body style='font-family: Arial, sans-serif; line-height: 1.6; color: #333;'>\
         <h2 style='color: #2c3e50;'>Verification code</h2>\
         <p>Use the following code to reset your password:</p>\
         <h3 style='background-color: #f4f4f4; padding: 10px; display: inline-block;'>{}</h3>\
         <p>The code is valid for a limited time. If you did not request it, ignore this email.</p>\
         <p>The RootNet team</p>\
         </body>\
         </html>",
        code
    )
}
