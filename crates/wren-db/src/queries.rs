use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{MessageRow, UserRow};
use crate::{Database, DbError};

const USER_COLS: &str =
    "id, username, email, password, image_url, header_image_url, bio, location, created_at";

/// Fixed-width RFC 3339 so lexicographic ORDER BY matches time order.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        image_url: &str,
        header_image_url: &str,
    ) -> Result<UserRow, DbError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (username, email, password, image_url, header_image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![username, email, password_hash, image_url, header_image_url, now()],
            )?;
            let id = tx.last_insert_rowid();
            query_user_by_id(tx, id)?.ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, DbError> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("SELECT {USER_COLS} FROM users WHERE username = ?1"))?
                .query_row([username], user_from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// All users, newest first; with `search`, only usernames containing it.
    pub fn list_users(&self, search: Option<&str>) -> Result<Vec<UserRow>, DbError> {
        self.with_conn(|conn| match search {
            Some(q) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLS} FROM users WHERE username LIKE ?1 ORDER BY id DESC"
                ))?;
                let rows = stmt
                    .query_map([format!("%{q}%")], user_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {USER_COLS} FROM users ORDER BY id DESC"))?;
                let rows = stmt
                    .query_map([], user_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            }
        })
    }

    pub fn update_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
        image_url: &str,
        header_image_url: &str,
        bio: &str,
        location: &str,
    ) -> Result<(), DbError> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5,
                     bio = ?6, location = ?7
                 WHERE id = ?1",
                params![id, username, email, image_url, header_image_url, bio, location],
            )?;
            Ok(())
        })
    }

    /// Deletes the user row; FK cascades remove their messages, follow
    /// edges in both directions, and likes within the same transaction.
    pub fn delete_user(&self, id: i64) -> Result<(), DbError> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Follow graph --

    pub fn follow(&self, follower_id: i64, followee_id: i64) -> Result<(), DbError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO follows (followee_id, follower_id) VALUES (?1, ?2)",
                [followee_id, follower_id],
            )?;
            Ok(())
        })
    }

    /// No-op (not an error) when the edge does not exist.
    pub fn unfollow(&self, follower_id: i64, followee_id: i64) -> Result<(), DbError> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM follows WHERE followee_id = ?1 AND follower_id = ?2",
                [followee_id, follower_id],
            )?;
            Ok(())
        })
    }

    pub fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| edge_exists(conn, follower_id, followee_id))
    }

    pub fn is_followed_by(&self, user_id: i64, other_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| edge_exists(conn, other_id, user_id))
    }

    pub fn following_of(&self, user_id: i64) -> Result<Vec<UserRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLS} FROM users
                 WHERE id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
                 ORDER BY id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn followers_of(&self, user_id: i64) -> Result<Vec<UserRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLS} FROM users
                 WHERE id IN (SELECT follower_id FROM follows WHERE followee_id = ?1)
                 ORDER BY id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, user_id: i64, text: &str) -> Result<i64, DbError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO messages (user_id, text, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, text, now()],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>, DbError> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                     FROM messages m JOIN users u ON u.id = m.user_id
                     WHERE m.id = ?1",
                )?
                .query_row([id], message_from_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<(), DbError> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn messages_of_user(&self, user_id: i64) -> Result<Vec<MessageRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                 FROM messages m JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Most recent messages by `user_id` or anyone they follow, newest
    /// first, ties broken by id for determinism.
    pub fn home_feed(&self, user_id: i64, limit: u32) -> Result<Vec<MessageRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                 FROM messages m JOIN users u ON u.id = m.user_id
                 WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    /// Toggle a like: removes the edge if present, inserts it otherwise.
    /// Returns true when the message is liked after the call.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> Result<bool, DbError> {
        self.with_tx(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    [user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                tx.execute(
                    "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    [user_id, message_id],
                )?;
                Ok(false)
            } else {
                tx.execute(
                    "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                    [user_id, message_id],
                )?;
                Ok(true)
            }
        })
    }

    pub fn has_liked(&self, user_id: i64, message_id: i64) -> Result<bool, DbError> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    [user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Ids of every message the user has liked, for rendering toggle state.
    pub fn liked_message_ids(&self, user_id: i64) -> Result<Vec<i64>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }

    pub fn likes_of_user(&self, user_id: i64) -> Result<Vec<MessageRow>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.user_id, u.username, m.text, m.created_at
                 FROM likes l
                 JOIN messages m ON m.id = l.message_id
                 JOIN users u ON u.id = m.user_id
                 WHERE l.user_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC",
            )?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = conn
        .prepare(&format!("SELECT {USER_COLS} FROM users WHERE id = ?1"))?
        .query_row([id], user_from_row)
        .optional()?;
    Ok(row)
}

fn edge_exists(conn: &Connection, follower_id: i64, followee_id: i64) -> Result<bool, DbError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM follows WHERE followee_id = ?1 AND follower_id = ?2",
            [followee_id, follower_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn message_from_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}
