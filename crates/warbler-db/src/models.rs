//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the page models in warbler-types.

use std::fmt;

use chrono::{DateTime, Utc};

pub const DEFAULT_IMAGE_URL: &str = "/static/images/default-pic.png";
pub const DEFAULT_HEADER_IMAGE_URL: &str = "/static/images/warbler-hero.jpg";

/// Longest message text the schema accepts, in characters.
pub const MAX_MESSAGE_LEN: usize = 140;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    /// Argon2 PHC string.
    pub password: String,
}

impl fmt::Display for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User #{}: {}, {}>", self.id, self.username, self.email)
    }
}

/// A user waiting to be inserted.
///
/// Every column is optional so that a missing value reaches the schema as
/// NULL and fails there, the same way a half-filled form would.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Explicit id; `None` lets SQLite pick the next rowid.
    pub id: Option<i64>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
    /// Already hashed.
    pub password: Option<String>,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password_hash: &str) -> Self {
        Self {
            id: None,
            email: Some(email.to_string()),
            username: Some(username.to_string()),
            image_url: None,
            password: Some(password_hash.to_string()),
        }
    }
}

/// Editable profile fields. `None` image fields reset to the defaults.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

/// Relationship counts shown alongside a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileCounts {
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub author_username: String,
    pub author_image_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub id: Option<i64>,
    pub text: Option<String>,
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    pub user_id: i64,
}

impl NewMessage {
    pub fn new(user_id: i64, text: &str) -> Self {
        Self {
            id: None,
            text: Some(text.to_string()),
            timestamp: None,
            user_id,
        }
    }
}

/// A directed follow edge: `user_following_id` follows
/// `user_being_followed_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Follow {
    pub user_being_followed_id: i64,
    pub user_following_id: i64,
}
