use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Posts can be edited for this long after creation.
pub const EDIT_WINDOW: Duration = Duration::hours(24);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub content: String,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub comments_count: i64,
    pub favorites_count: i64,
    pub likes_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub fn is_editable(created_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now <= created_at + EDIT_WINDOW
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editable_inside_window() {
        let created = OffsetDateTime::now_utc();
        assert!(is_editable(created, created));
        assert!(is_editable(created, created + Duration::hours(23)));
        assert!(is_editable(created, created + EDIT_WINDOW));
    }

    #[test]
    fn not_editable_after_window() {
        let created = OffsetDateTime::now_utc();
        assert!(!is_editable(created, created + Duration::hours(24) + Duration::seconds(1)));
        assert!(!is_editable(created, created + Duration::days(3)));
    }
}
