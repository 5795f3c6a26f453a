use sqlx::Row;
use uuid::Uuid;

use crate::app::error::{
    acting_user_missing, unique_violation, FieldError, ServiceError, ServiceResult,
};
use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocialCounts {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn follow(&self, follower_id: Uuid, followed_id: Uuid) -> ServiceResult<Follow> {
        if follower_id == followed_id {
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "followed",
                "you cannot follow yourself",
            )]));
        }

        let mut tx = self.db.pool().begin().await?;

        let target = sqlx::query("SELECT id FROM users WHERE id = $1 FOR SHARE")
            .bind(followed_id)
            .fetch_optional(&mut *tx)
            .await?;
        if target.is_none() {
            tx.rollback().await?;
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "followed",
                "user to follow does not exist",
            )]));
        }

        let row = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) \
             VALUES ($1, $2) \
             RETURNING follower_id, followed_id, created_at",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| match unique_violation(&err) {
            Some(_) => ServiceError::AlreadyExists("you already follow this user".to_string()),
            None => acting_user_missing(err),
        })?;

        tx.commit().await?;

        Ok(Follow {
            follower_id: row.get("follower_id"),
            followed_id: row.get("followed_id"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) -> ServiceResult<()> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2")
            .bind(follower_id)
            .bind(followed_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFollowing);
        }
        Ok(())
    }

    pub async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    pub async fn counts(&self, user_id: Uuid) -> ServiceResult<SocialCounts> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM follows WHERE followed_id = $1) AS followers, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following, \
                (SELECT COUNT(*) FROM posts WHERE author_id = $1) AS posts",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(SocialCounts {
            followers: row.get("followers"),
            following: row.get("following"),
            posts: row.get("posts"),
        })
    }
}
