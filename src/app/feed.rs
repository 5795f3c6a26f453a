use uuid::Uuid;

use crate::app::error::ServiceResult;
use crate::app::pagination::{cursor_binds, Cursor, Page, PAGE_SIZE};
use crate::app::posts::{post_cursor, post_from_row, POST_COLUMNS, POST_FROM};
use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Posts by the user and everyone they follow, newest first.
    pub async fn get_home_feed(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
    ) -> ServiceResult<Page<Post>> {
        let (cursor_created_at, cursor_id) = cursor_binds(cursor);
        let rows = sqlx::query(&format!(
            "SELECT {} {} \
             WHERE (p.author_id = $1 \
                    OR p.author_id IN (SELECT followed_id FROM follows WHERE follower_id = $1)) \
               AND ($2::timestamptz IS NULL OR (p.created_at, p.id) < ($2, $3)) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $4",
            POST_COLUMNS, POST_FROM
        ))
        .bind(user_id)
        .bind(cursor_created_at)
        .bind(cursor_id)
        .bind(PAGE_SIZE + 1)
        .fetch_all(self.db.pool())
        .await?;

        let posts = rows.iter().map(post_from_row).collect();
        Ok(Page::from_rows(posts, post_cursor))
    }
}
