use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of items per page for every cursor-paginated listing.
pub const PAGE_SIZE: i64 = 10;

/// Years a cursor may point into; Postgres rejects `timestamptz` binds far outside them.
const CURSOR_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Position after the last item of a page ordered by `(created_at DESC, id DESC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

impl Cursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    pub fn encode(&self) -> String {
        let raw = format!("{}/{}", self.created_at.unix_timestamp_nanos(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value.as_bytes()).ok()?;
        let raw = String::from_utf8(bytes).ok()?;
        let (nanos, id) = raw.split_once('/')?;
        let nanos = nanos.parse::<i128>().ok()?;
        let created_at = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .filter(|created_at| CURSOR_YEARS.contains(&created_at.year()))?;
        let id = Uuid::parse_str(id).ok()?;
        Some(Self { created_at, id })
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// Builds a page from rows fetched with `LIMIT PAGE_SIZE + 1`; the extra row only signals
    /// that another page exists.
    pub fn from_rows(mut rows: Vec<T>, key: impl Fn(&T) -> Cursor) -> Self {
        let page_size = PAGE_SIZE as usize;
        if rows.len() > page_size {
            rows.truncate(page_size);
            let next_cursor = rows.last().map(&key);
            Self {
                items: rows,
                next_cursor,
            }
        } else {
            Self {
                items: rows,
                next_cursor: None,
            }
        }
    }
}

/// Splits an optional cursor into the nullable bind parameters the listing queries expect.
pub fn cursor_binds(cursor: Option<Cursor>) -> (Option<OffsetDateTime>, Option<Uuid>) {
    match cursor {
        Some(cursor) => (Some(cursor.created_at), Some(cursor.id)),
        None => (None, None),
    }
}
