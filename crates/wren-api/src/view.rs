//! Row-to-display conversions. Kept out of wren-db so the storage layer
//! stays independent of the page-facing types.

use chrono::{DateTime, Utc};
use tracing::warn;
use wren_db::models::{MessageRow, UserRow};
use wren_types::{Message, User};

fn parse_created_at(raw: &str, what: &str, id: i64) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt created_at '{}' on {} {}: {}", raw, what, id, e);
        DateTime::default()
    })
}

pub fn user_from_row(row: UserRow) -> User {
    let created_at = parse_created_at(&row.created_at, "user", row.id);
    User {
        id: row.id,
        username: row.username,
        email: row.email,
        image_url: row.image_url,
        header_image_url: row.header_image_url,
        bio: row.bio,
        location: row.location,
        created_at,
    }
}

pub fn message_from_row(row: MessageRow) -> Message {
    let created_at = parse_created_at(&row.created_at, "message", row.id);
    Message {
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        text: row.text,
        created_at,
    }
}

pub fn users_from_rows(rows: Vec<UserRow>) -> Vec<User> {
    rows.into_iter().map(user_from_row).collect()
}

pub fn messages_from_rows(rows: Vec<MessageRow>) -> Vec<Message> {
    rows.into_iter().map(message_from_row).collect()
}
