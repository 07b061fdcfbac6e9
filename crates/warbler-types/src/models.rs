use chrono::{DateTime, Utc};
use serde::Serialize;

/// Public view of a user, as rendered into pages. Never carries the
/// password hash.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
}

/// A user together with the relationship counts shown on profile pages.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user: User,
    pub messages: i64,
    pub following: i64,
    pub followers: i64,
    pub likes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// `timestamp` formatted for display.
    pub posted: String,
    pub user_id: i64,
    pub author_username: String,
    pub author_image_url: String,
    /// Whether the viewing user has liked this message.
    pub liked: bool,
}
