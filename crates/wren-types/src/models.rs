use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_URL: &str = "https://placehold.co/200x200?text=user";

pub const DEFAULT_HEADER_IMAGE_URL: &str = "https://placehold.co/1200x300?text=wren";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// A single posted message, carrying the author's username so pages never
/// need a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
