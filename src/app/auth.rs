use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::error::{
    check_password_policy, unique_violation, FieldError, ServiceError, ServiceResult,
};
use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::user::User;
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "rootnet";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl_minutes: u64,
    refresh_ttl_days: u64,
}

impl AuthService {
    pub fn new(
        db: Db,
        access_key: [u8; 32],
        refresh_key: [u8; 32],
        access_ttl_minutes: u64,
        refresh_ttl_days: u64,
    ) -> Self {
        Self {
            db,
            access_key,
            refresh_key,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    pub async fn signup(&self, new_user: NewUser) -> ServiceResult<User> {
        let email = new_user.email.trim().to_lowercase();
        let username = new_user.username.trim().to_lowercase();
        let first_name = new_user.first_name.trim().to_string();
        let last_name = new_user.last_name.trim().to_string();

        let mut missing = Vec::new();
        for (field, value) in [
            ("email", &email),
            ("username", &username),
            ("first_name", &first_name),
            ("last_name", &last_name),
        ] {
            if value.is_empty() {
                missing.push(FieldError::new(field, format!("{} is required", field)));
            }
        }
        if !email.is_empty() && !looks_like_email(&email) {
            missing.push(FieldError::new("email", "email is not a valid address"));
        }
        if !missing.is_empty() {
            return Err(ServiceError::invalid_fields(missing));
        }
        check_password_policy("password", &new_user.password)?;

        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1) AS email_taken, \
                    EXISTS (SELECT 1 FROM users WHERE username = $2) AS username_taken",
        )
        .bind(&email)
        .bind(&username)
        .fetch_one(self.db.pool())
        .await?;

        let mut conflicts = Vec::new();
        if row.get::<bool, _>("email_taken") {
            conflicts.push(FieldError::new("email", "a user with this email already exists"));
        }
        if row.get::<bool, _>("username_taken") {
            conflicts.push(FieldError::new("username", "a user with this username already exists"));
        }
        if !conflicts.is_empty() {
            return Err(ServiceError::invalid_fields(conflicts));
        }

        let password_hash = hash_password(&new_user.password)?;
        let row = sqlx::query(&format!(
            "INSERT INTO users (email, username, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&email)
        .bind(&username)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| match unique_violation(&err) {
            Some(constraint) => conflict_error(&constraint),
            None => err.into(),
        })?;

        Ok(user_from_row(&row))
    }

    /// Unknown email and wrong password both end in `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<(User, TokenPair)> {
        let email = email.trim().to_lowercase();
        let row = sqlx::query(&format!(
            "SELECT {}, password_hash FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(&email)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Err(ServiceError::InvalidCredentials),
        };

        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() || !verify_password(password, &password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }

        let user = user_from_row(&row);
        let tokens = self.issue_token_pair(user.id).await?;
        Ok((user, tokens))
    }

    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        let invalid = || ServiceError::Unauthorized("invalid refresh token".to_string());
        let (user_id, refresh_id) = self
            .verify_refresh_token(refresh_token)
            .map_err(|_| invalid())?;
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.pool().begin().await?;
        let row = sqlx::query(
            "SELECT id \
             FROM refresh_tokens \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now() \
             FOR UPDATE",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_none() {
            tx.rollback().await?;
            return Err(invalid());
        }

        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now(), replaced_by = $1 \
             WHERE id = $2 AND revoked_at IS NULL",
        )
        .bind(tokens.refresh_id)
        .bind(refresh_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(tokens.pair)
    }

    /// Blacklists a refresh token owned by `user_id`.
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> ServiceResult<()> {
        let invalid = || ServiceError::BadRequest("invalid refresh token".to_string());
        let (token_user_id, refresh_id) = self
            .verify_refresh_token(refresh_token)
            .map_err(|_| invalid())?;
        if token_user_id != user_id {
            return Err(invalid());
        }

        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND token_hash = $3 AND revoked_at IS NULL",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(refresh_token))
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(invalid());
        }
        Ok(())
    }

    pub async fn authenticate_access_token(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token, self.access_key)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let user_id = claim_uuid(&claims, "sub")?;
        Ok(Some(AuthSession { user_id }))
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> ServiceResult<()> {
        let password_hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(self.db.pool())
                .await?;

        let password_hash = password_hash
            .ok_or_else(|| ServiceError::Unauthorized("user no longer exists".to_string()))?;
        if !verify_password(current_password, &password_hash)? {
            return Err(ServiceError::Unauthorized(
                "current password is incorrect".to_string(),
            ));
        }
        if new_password != confirm_password {
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "confirm_password",
                "passwords do not match",
            )]));
        }
        check_password_policy("new_password", new_password)?;

        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(hash_password(new_password)?)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let mut tx = self.db.pool().begin().await?;
        let tokens = self.issue_token_pair_with_tx(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(tokens.pair)
    }

    fn decrypt_claims(&self, token: &str, key_bytes: [u8; 32]) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&key_bytes)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn build_access_claims(&self, user_id: Uuid) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.access_ttl_minutes * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.add_additional("typ", "access")?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::minutes(self.access_ttl_minutes as i64);
        Ok((claims, expires_at))
    }

    fn build_refresh_claims(
        &self,
        user_id: Uuid,
        refresh_id: Uuid,
    ) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.refresh_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&refresh_id.to_string())?;
        claims.add_additional("typ", "refresh")?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.refresh_ttl_days as i64);
        Ok((claims, expires_at))
    }

    async fn issue_token_pair_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IssuedTokens> {
        let (access_claims, access_expires_at) = self.build_access_claims(user_id)?;
        let access_key = SymmetricKey::<V4>::from(&self.access_key)?;
        let access_token = local::encrypt(&access_key, &access_claims, None, None)?;

        let refresh_id = Uuid::new_v4();
        let (refresh_claims, refresh_expires_at) =
            self.build_refresh_claims(user_id, refresh_id)?;
        let refresh_key = SymmetricKey::<V4>::from(&self.refresh_key)?;
        let refresh_token = local::encrypt(&refresh_key, &refresh_claims, None, None)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user_id)
        .bind(hash_token(&refresh_token))
        .bind(refresh_expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(IssuedTokens {
            refresh_id,
            pair: TokenPair {
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
            },
        })
    }

    fn verify_refresh_token(&self, token: &str) -> Result<(Uuid, Uuid)> {
        let claims = match self.decrypt_claims(token, self.refresh_key)? {
            Some(claims) => claims,
            None => return Err(anyhow!("invalid refresh token")),
        };
        if !has_token_type(&claims, "refresh") {
            return Err(anyhow!("invalid refresh token"));
        }
        let user_id = claim_uuid(&claims, "sub")?;
        let refresh_id = claim_uuid(&claims, "jti")?;
        Ok((user_id, refresh_id))
    }
}

struct IssuedTokens {
    refresh_id: Uuid,
    pair: TokenPair,
}

/// Revokes every live refresh token of a user inside an existing transaction.
pub(crate) async fn revoke_all_refresh_tokens(
    user_id: Uuid,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = now() \
         WHERE user_id = $1 AND revoked_at IS NULL",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) fn conflict_error(constraint: &str) -> ServiceError {
    if constraint.contains("users_email_key") {
        return ServiceError::invalid_fields(vec![FieldError::new(
            "email",
            "a user with this email already exists",
        )]);
    }
    if constraint.contains("users_username_key") {
        return ServiceError::invalid_fields(vec![FieldError::new(
            "username",
            "a user with this username already exists",
        )]);
    }
    ServiceError::validation("value already in use")
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

pub(crate) fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_never_equals_plaintext() {
        let hash = hash_password("Secret123").unwrap();
        assert_ne!(hash, "Secret123");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Secret123", &hash).unwrap());
        assert!(!verify_password("Secret124", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("Secret123").unwrap();
        let second = hash_password("Secret123").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@x.com"));
        assert!(!looks_like_email("a@x"));
        assert!(!looks_like_email("@x.com"));
        assert!(!looks_like_email("ax.com"));
    }

    #[test]
    fn conflict_error_names_the_field() {
        match conflict_error("users_username_key") {
            ServiceError::Validation { fields, .. } => assert_eq!(fields[0].field, "username"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
