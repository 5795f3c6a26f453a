use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::error::{acting_user_missing, FieldError, ServiceError, ServiceResult};
use crate::app::pagination::{cursor_binds, Cursor, Page, PAGE_SIZE};
use crate::app::posts::{post_from_row, POST_COLUMNS, POST_FROM};
use crate::domain::engagement::{Comment, Favorite, Like};
use crate::domain::post::Post;
use crate::infra::db::Db;

pub const MAX_COMMENT_LEN: usize = 2000;

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn check_comment(content: &str) -> ServiceResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ServiceError::invalid_fields(vec![FieldError::new(
            "content",
            "content is required",
        )]));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(ServiceError::invalid_fields(vec![FieldError::new(
            "content",
            format!("comments are limited to {} characters", MAX_COMMENT_LEN),
        )]));
    }
    Ok(content.to_string())
}

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn ensure_post_exists(&self, post_id: Uuid) -> ServiceResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        if !exists {
            return Err(ServiceError::NotFound("post"));
        }
        Ok(())
    }

    pub async fn like_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<Like> {
        self.ensure_post_exists(post_id).await?;
        let row = sqlx::query(
            "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING id, user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(acting_user_missing)?;

        match row {
            Some(row) => Ok(Like {
                id: row.get("id"),
                user_id: row.get("user_id"),
                post_id: row.get("post_id"),
                created_at: row.get("created_at"),
            }),
            None => Err(ServiceError::AlreadyExists(
                "you already liked this post".to_string(),
            )),
        }
    }

    pub async fn unlike_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<()> {
        self.ensure_post_exists(post_id).await?;
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("like"));
        }
        Ok(())
    }

    pub async fn favorite_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<Favorite> {
        self.ensure_post_exists(post_id).await?;
        let row = sqlx::query(
            "INSERT INTO favorites (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING \
             RETURNING id, user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(acting_user_missing)?;

        match row {
            Some(row) => Ok(Favorite {
                id: row.get("id"),
                user_id: row.get("user_id"),
                post_id: row.get("post_id"),
                created_at: row.get("created_at"),
            }),
            None => Err(ServiceError::AlreadyExists(
                "post is already in your favorites".to_string(),
            )),
        }
    }

    pub async fn unfavorite_post(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<()> {
        self.ensure_post_exists(post_id).await?;
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("favorite"));
        }
        Ok(())
    }

    pub async fn is_favorited(&self, user_id: Uuid, post_id: Uuid) -> ServiceResult<bool> {
        self.ensure_post_exists(post_id).await?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// Favorited posts, most recently favorited first. The cursor walks the favorites.
    pub async fn list_favorites(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
    ) -> ServiceResult<Page<Post>> {
        let (cursor_created_at, cursor_id) = cursor_binds(cursor);
        let rows = sqlx::query(&format!(
            "SELECT fav.id AS favorite_id, fav.created_at AS favorited_at, {} {} \
             JOIN favorites fav ON fav.post_id = p.id AND fav.user_id = $1 \
             WHERE ($2::timestamptz IS NULL OR (fav.created_at, fav.id) < ($2, $3)) \
             ORDER BY fav.created_at DESC, fav.id DESC \
             LIMIT $4",
            POST_COLUMNS, POST_FROM
        ))
        .bind(user_id)
        .bind(cursor_created_at)
        .bind(cursor_id)
        .bind(PAGE_SIZE + 1)
        .fetch_all(self.db.pool())
        .await?;

        let entries: Vec<(Cursor, Post)> = rows
            .iter()
            .map(|row| {
                (
                    Cursor::new(row.get("favorited_at"), row.get("favorite_id")),
                    post_from_row(row),
                )
            })
            .collect();
        let page = Page::from_rows(entries, |entry| entry.0);

        Ok(Page {
            items: page.items.into_iter().map(|(_, post)| post).collect(),
            next_cursor: page.next_cursor,
        })
    }

    pub async fn create_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        content: &str,
    ) -> ServiceResult<Comment> {
        let content = check_comment(content)?;
        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO comments (post_id, author_id, content) \
                SELECT $1, $2, $3 \
                WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1) \
                RETURNING id, post_id, author_id, content, created_at, updated_at \
             ) \
             SELECT c.*, u.username AS author \
             FROM inserted c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await
        .map_err(acting_user_missing)?;

        row.map(|row| comment_from_row(&row))
            .ok_or(ServiceError::NotFound("post"))
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
    ) -> ServiceResult<Page<Comment>> {
        self.ensure_post_exists(post_id).await?;
        let (cursor_created_at, cursor_id) = cursor_binds(cursor);
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, u.username AS author, c.content, \
                    c.created_at, c.updated_at \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = $1 \
               AND ($2::timestamptz IS NULL OR (c.created_at, c.id) < ($2, $3)) \
             ORDER BY c.created_at DESC, c.id DESC \
             LIMIT $4",
        )
        .bind(post_id)
        .bind(cursor_created_at)
        .bind(cursor_id)
        .bind(PAGE_SIZE + 1)
        .fetch_all(self.db.pool())
        .await?;

        let comments = rows.iter().map(comment_from_row).collect();
        Ok(Page::from_rows(comments, |comment: &Comment| {
            Cursor::new(comment.created_at, comment.id)
        }))
    }

    pub async fn update_comment(
        &self,
        comment_id: Uuid,
        caller_id: Uuid,
        content: &str,
    ) -> ServiceResult<Comment> {
        let content = check_comment(content)?;
        self.check_comment_author(comment_id, caller_id).await?;

        let row = sqlx::query(
            "WITH updated AS ( \
                UPDATE comments SET content = $2, updated_at = now() \
                WHERE id = $1 \
                RETURNING id, post_id, author_id, content, created_at, updated_at \
             ) \
             SELECT c.*, u.username AS author \
             FROM updated c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(comment_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await
        .map_err(acting_user_missing)?;

        row.map(|row| comment_from_row(&row))
            .ok_or(ServiceError::NotFound("comment"))
    }

    pub async fn delete_comment(&self, comment_id: Uuid, caller_id: Uuid) -> ServiceResult<()> {
        self.check_comment_author(comment_id, caller_id).await?;
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("comment"));
        }
        Ok(())
    }

    async fn check_comment_author(&self, comment_id: Uuid, caller_id: Uuid) -> ServiceResult<()> {
        let author_id: Option<Uuid> =
            sqlx::query_scalar("SELECT author_id FROM comments WHERE id = $1")
                .bind(comment_id)
                .fetch_optional(self.db.pool())
                .await?;

        match author_id {
            None => Err(ServiceError::NotFound("comment")),
            Some(author_id) if author_id != caller_id => Err(ServiceError::Forbidden(
                "only the author can change this comment".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}
