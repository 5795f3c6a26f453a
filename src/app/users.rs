use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::auth::{conflict_error, looks_like_email};
use crate::app::error::{unique_violation, FieldError, ServiceError, ServiceResult};
use crate::domain::user::User;
use crate::infra::db::Db;

pub(crate) const USER_COLUMNS: &str = "id, email, username, first_name, last_name, phone, street, \
     house_number, profile_photo, is_checked, created_at";

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        street: row.get("street"),
        house_number: row.get("house_number"),
        profile_photo: row.get("profile_photo"),
        is_checked: row.get("is_checked"),
        created_at: row.get("created_at"),
    }
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub house_number: Option<String>,
    pub profile_photo: Option<String>,
}

impl ProfileUpdate {
    fn normalized(self) -> ServiceResult<Self> {
        let email = self.email.map(|value| value.trim().to_lowercase());
        let username = self.username.map(|value| value.trim().to_lowercase());
        let first_name = self.first_name.map(|value| value.trim().to_string());
        let last_name = self.last_name.map(|value| value.trim().to_string());

        let mut errors = Vec::new();
        if let Some(email) = &email {
            if !looks_like_email(email) {
                errors.push(FieldError::new("email", "email is not a valid address"));
            }
        }
        for (field, value) in [
            ("username", &username),
            ("first_name", &first_name),
            ("last_name", &last_name),
        ] {
            if matches!(value, Some(value) if value.is_empty()) {
                errors.push(FieldError::new(field, format!("{} cannot be empty", field)));
            }
        }
        if !errors.is_empty() {
            return Err(ServiceError::invalid_fields(errors));
        }

        Ok(Self {
            email,
            username,
            first_name,
            last_name,
            ..self
        })
    }
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: Uuid) -> ServiceResult<User> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|row| user_from_row(&row))
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn get_by_username(&self, username: &str) -> ServiceResult<User> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username.trim().to_lowercase())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| user_from_row(&row))
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> ServiceResult<User> {
        let update = update.normalized()?;
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET email = COALESCE($2, email), \
                 username = COALESCE($3, username), \
                 first_name = COALESCE($4, first_name), \
                 last_name = COALESCE($5, last_name), \
                 phone = COALESCE($6, phone), \
                 street = COALESCE($7, street), \
                 house_number = COALESCE($8, house_number), \
                 profile_photo = COALESCE($9, profile_photo) \
             WHERE id = $1 \
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(update.email)
        .bind(update.username)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone)
        .bind(update.street)
        .bind(update.house_number)
        .bind(update.profile_photo)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|err| match unique_violation(&err) {
            Some(constraint) => conflict_error(&constraint),
            None => err.into(),
        })?;

        row.map(|row| user_from_row(&row))
            .ok_or(ServiceError::UserNotFound)
    }

    /// Posts, comments, likes, favorites, follows and refresh tokens cascade;
    /// verification codes keep a null owner.
    pub async fn delete_account(&self, user_id: Uuid) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }
}
