use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::error::{acting_user_missing, FieldError, ServiceError, ServiceResult};
use crate::app::pagination::{cursor_binds, Cursor, Page, PAGE_SIZE};
use crate::domain::post::{is_editable, Post};
use crate::infra::db::Db;

pub const MAX_TAGS: usize = 10;

/// Columns every post query selects; `post_from_row` reads them.
pub(crate) const POST_COLUMNS: &str = "p.id, p.author_id, u.username AS author, \
        u.first_name AS author_first_name, u.last_name AS author_last_name, \
        p.content, p.image, p.created_at, p.updated_at, \
        ARRAY( \
            SELECT t.name FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
            WHERE pt.post_id = p.id ORDER BY t.name \
        ) AS tags, \
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count, \
        (SELECT COUNT(*) FROM favorites f WHERE f.post_id = p.id) AS favorites_count, \
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count";

/// Source tables for `POST_COLUMNS`; callers append joins, `WHERE` and `ORDER BY`.
pub(crate) const POST_FROM: &str = "FROM posts p JOIN users u ON u.id = p.author_id";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        author_first_name: row.get("author_first_name"),
        author_last_name: row.get("author_last_name"),
        content: row.get("content"),
        image: row.get("image"),
        tags: row.get("tags"),
        comments_count: row.get("comments_count"),
        favorites_count: row.get("favorites_count"),
        likes_count: row.get("likes_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(crate) fn post_cursor(post: &Post) -> Cursor {
    Cursor::new(post.created_at, post.id)
}

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub content: Option<String>,
    pub image: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: Uuid, new_post: NewPost) -> ServiceResult<Post> {
        let content = new_post.content.trim().to_string();
        if content.is_empty() {
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "content",
                "content is required",
            )]));
        }
        let tags = normalize_tags(new_post.tags);
        if tags.len() > MAX_TAGS {
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "tags",
                format!("a post can have at most {} tags", MAX_TAGS),
            )]));
        }

        let mut tx = self.db.pool().begin().await?;
        let post_id: Uuid = sqlx::query_scalar(
            "INSERT INTO posts (author_id, content, image) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(author_id)
        .bind(&content)
        .bind(new_post.image)
        .fetch_one(&mut *tx)
        .await
        .map_err(acting_user_missing)?;

        for tag in &tags {
            let tag_id: Uuid = sqlx::query_scalar(
                "INSERT INTO tags (name) VALUES ($1) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                 RETURNING id",
            )
            .bind(tag)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(post_id = %post_id, author_id = %author_id, tags = tags.len(), "post created");
        self.get_post(post_id).await
    }

    pub async fn get_post(&self, post_id: Uuid) -> ServiceResult<Post> {
        let row = sqlx::query(&format!(
            "SELECT {} {} WHERE p.id = $1",
            POST_COLUMNS, POST_FROM
        ))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(|row| post_from_row(&row))
            .ok_or(ServiceError::NotFound("post"))
    }

    /// Only the author may edit, and only within the edit window.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        caller_id: Uuid,
        update: PostUpdate,
    ) -> ServiceResult<Post> {
        let content = update.content.map(|content| content.trim().to_string());
        if matches!(&content, Some(content) if content.is_empty()) {
            return Err(ServiceError::invalid_fields(vec![FieldError::new(
                "content",
                "content cannot be empty",
            )]));
        }

        let mut tx = self.db.pool().begin().await?;
        let (author_id, created_at) = lock_post(&mut tx, post_id).await?;
        if author_id != caller_id {
            tx.rollback().await?;
            return Err(ServiceError::Forbidden(
                "only the author can edit this post".to_string(),
            ));
        }
        if !is_editable(created_at, OffsetDateTime::now_utc()) {
            tx.rollback().await?;
            return Err(ServiceError::EditWindowExpired);
        }

        sqlx::query(
            "UPDATE posts \
             SET content = COALESCE($2, content), \
                 image = COALESCE($3, image), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(post_id)
        .bind(content)
        .bind(update.image)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_post(post_id).await
    }

    pub async fn delete_post(&self, post_id: Uuid, caller_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.db.pool().begin().await?;
        let (author_id, _) = lock_post(&mut tx, post_id).await?;
        if author_id != caller_id {
            tx.rollback().await?;
            return Err(ServiceError::Forbidden(
                "only the author can delete this post".to_string(),
            ));
        }

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(post_id = %post_id, author_id = %author_id, "post deleted");
        Ok(())
    }

    pub async fn list_by_author(
        &self,
        author_id: Uuid,
        cursor: Option<Cursor>,
    ) -> ServiceResult<Page<Post>> {
        let (cursor_created_at, cursor_id) = cursor_binds(cursor);
        let rows = sqlx::query(&format!(
            "SELECT {} {} \
             WHERE p.author_id = $1 \
               AND ($2::timestamptz IS NULL OR (p.created_at, p.id) < ($2, $3)) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $4",
            POST_COLUMNS, POST_FROM
        ))
        .bind(author_id)
        .bind(cursor_created_at)
        .bind(cursor_id)
        .bind(PAGE_SIZE + 1)
        .fetch_all(self.db.pool())
        .await?;

        let posts = rows.iter().map(post_from_row).collect();
        Ok(Page::from_rows(posts, post_cursor))
    }
}

async fn lock_post(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    post_id: Uuid,
) -> ServiceResult<(Uuid, OffsetDateTime)> {
    let row = sqlx::query("SELECT author_id, created_at FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await?;

    match row {
        Some(row) => Ok((row.get("author_id"), row.get("created_at"))),
        None => Err(ServiceError::NotFound("post")),
    }
}

/// Trims, lowercases and deduplicates tag names, keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}
