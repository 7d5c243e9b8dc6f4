//! Submitted form payloads. Every field defaults to empty so a missing
//! input reaches the validation layer as "required" instead of failing
//! deserialization with a bare 422.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub header_image_url: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    /// Current password, re-entered to confirm the edit.
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub csrf_token: String,
}

/// Payload for mutating endpoints that carry no fields of their own
/// (logout, follow/unfollow, like toggle, deletes).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
    /// Where the like toggle should send the user back to.
    pub came_from: Option<String>,
}
