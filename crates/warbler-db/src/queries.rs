use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};

use crate::models::{
    DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, Follow, MessageRow, NewMessage, NewUser,
    ProfileCounts, UserRow, UserUpdate,
};
use crate::{Database, DbError, DbResult};

const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.image_url, u.header_image_url, u.bio, u.location, u.password";

// Messages are always joined with their author.
const MESSAGE_COLUMNS: &str = "m.id, m.text, m.timestamp, m.user_id, u.username, u.image_url";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser) -> DbResult<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, image_url, password)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id,
                    user.email,
                    user.username,
                    user.image_url.as_deref().unwrap_or(DEFAULT_IMAGE_URL),
                    user.password,
                ],
            )?;

            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("user {id}")))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1"),
                    [username],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All users, or those whose username contains `search`
    /// (ASCII case-insensitive). A blank search lists everyone.
    pub fn list_users(&self, search: Option<&str>) -> DbResult<Vec<UserRow>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS} FROM users u
                     WHERE ?1 IS NULL OR instr(lower(u.username), lower(?1)) > 0
                     ORDER BY u.id"
                ),
                params![search],
            )
        })
    }

    pub fn update_user(&self, id: i64, update: &UserUpdate) -> DbResult<UserRow> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET username = ?1, email = ?2, image_url = ?3, header_image_url = ?4,
                     bio = ?5, location = ?6
                 WHERE id = ?7",
                params![
                    update.username,
                    update.email,
                    update.image_url.as_deref().unwrap_or(DEFAULT_IMAGE_URL),
                    update
                        .header_image_url
                        .as_deref()
                        .unwrap_or(DEFAULT_HEADER_IMAGE_URL),
                    update.bio,
                    update.location,
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }

            query_user_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("user {id}")))
        })
    }

    /// Deletes the user; their messages, follows and likes go with them.
    pub fn delete_user(&self, id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }

    pub fn get_user_profile(&self, id: i64) -> DbResult<Option<(UserRow, ProfileCounts)>> {
        self.with_conn(|conn| {
            let Some(user) = query_user_by_id(conn, id)? else {
                return Ok(None);
            };
            let counts = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM messages WHERE user_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_following_id = ?1),
                    (SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1),
                    (SELECT COUNT(*) FROM likes WHERE user_id = ?1)",
                [id],
                |row| {
                    Ok(ProfileCounts {
                        messages: row.get(0)?,
                        following: row.get(1)?,
                        followers: row.get(2)?,
                        likes: row.get(3)?,
                    })
                },
            )?;
            Ok(Some((user, counts)))
        })
    }

    // -- Messages --

    pub fn create_message(&self, message: &NewMessage) -> DbResult<MessageRow> {
        let timestamp = format_timestamp(message.timestamp.unwrap_or_else(Utc::now));

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, text, timestamp, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![message.id, message.text, timestamp, message.user_id],
            )?;

            let id = conn.last_insert_rowid();
            query_message_by_id(conn, id)?
                .ok_or_else(|| DbError::NotFound(format!("message {id}")))
        })
    }

    pub fn get_message(&self, id: i64) -> DbResult<Option<MessageRow>> {
        self.with_conn(|conn| query_message_by_id(conn, id))
    }

    pub fn delete_message(&self, id: i64) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("message {id}")));
            }
            Ok(())
        })
    }

    /// The user's own messages, newest first.
    pub fn messages_for_user(&self, user_id: i64, limit: u32) -> DbResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS}
                     FROM messages m JOIN users u ON u.id = m.user_id
                     WHERE m.user_id = ?1
                     ORDER BY m.timestamp DESC, m.id DESC
                     LIMIT ?2"
                ),
                params![user_id, limit],
            )
        })
    }

    pub fn message_count(&self, user_id: i64) -> DbResult<i64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM messages WHERE user_id = ?1", user_id))
    }

    /// Home timeline: messages by the user and by everyone they follow,
    /// newest first.
    pub fn timeline(&self, user_id: i64, limit: u32) -> DbResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS}
                     FROM messages m JOIN users u ON u.id = m.user_id
                     WHERE m.user_id = ?1
                        OR m.user_id IN (
                            SELECT user_being_followed_id FROM follows
                            WHERE user_following_id = ?1
                        )
                     ORDER BY m.timestamp DESC, m.id DESC
                     LIMIT ?2"
                ),
                params![user_id, limit],
            )
        })
    }

    // -- Follows --

    /// Insert a follow edge. Following the same user twice is an
    /// integrity error.
    pub fn create_follow(&self, follow: &Follow) -> DbResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO follows (user_being_followed_id, user_following_id) VALUES (?1, ?2)",
                params![follow.user_being_followed_id, follow.user_following_id],
            )?;
            Ok(())
        })
    }

    pub fn follow(&self, follower_id: i64, followed_id: i64) -> DbResult<()> {
        self.create_follow(&Follow {
            user_being_followed_id: followed_id,
            user_following_id: follower_id,
        })
    }

    /// Returns false if there was no edge to remove.
    pub fn unfollow(&self, follower_id: i64, followed_id: i64) -> DbResult<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                params![followed_id, follower_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn is_following(&self, follower_id: i64, followed_id: i64) -> DbResult<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE user_being_followed_id = ?1 AND user_following_id = ?2",
                    params![followed_id, follower_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Users that `user_id` follows.
    pub fn following(&self, user_id: i64) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS}
                     FROM follows f JOIN users u ON u.id = f.user_being_followed_id
                     WHERE f.user_following_id = ?1
                     ORDER BY u.username"
                ),
                [user_id],
            )
        })
    }

    /// Users following `user_id`.
    pub fn followers(&self, user_id: i64) -> DbResult<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_users(
                conn,
                &format!(
                    "SELECT {USER_COLUMNS}
                     FROM follows f JOIN users u ON u.id = f.user_following_id
                     WHERE f.user_being_followed_id = ?1
                     ORDER BY u.username"
                ),
                [user_id],
            )
        })
    }

    pub fn following_count(&self, user_id: i64) -> DbResult<i64> {
        self.with_conn(|conn| {
            count(conn, "SELECT COUNT(*) FROM follows WHERE user_following_id = ?1", user_id)
        })
    }

    pub fn followers_count(&self, user_id: i64) -> DbResult<i64> {
        self.with_conn(|conn| {
            count(conn, "SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1", user_id)
        })
    }

    // -- Likes --

    /// Toggle a like: removes it if present, inserts it if not.
    /// Returns true when the message is liked afterwards.
    pub fn toggle_like(&self, user_id: i64, message_id: i64) -> DbResult<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM likes WHERE user_id = ?1 AND message_id = ?2",
                    params![user_id, message_id],
                    |row| row.get(0),
                )
                .optional()?;

            let liked = if let Some(like_id) = existing {
                tx.execute("DELETE FROM likes WHERE id = ?1", [like_id])?;
                false
            } else {
                tx.execute(
                    "INSERT INTO likes (user_id, message_id) VALUES (?1, ?2)",
                    params![user_id, message_id],
                )?;
                true
            };

            tx.commit()?;
            Ok(liked)
        })
    }

    /// Messages the user liked, most recently liked first.
    pub fn liked_messages(&self, user_id: i64) -> DbResult<Vec<MessageRow>> {
        self.with_conn(|conn| {
            query_messages(
                conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS}
                     FROM likes l
                     JOIN messages m ON m.id = l.message_id
                     JOIN users u ON u.id = m.user_id
                     WHERE l.user_id = ?1
                     ORDER BY l.id DESC"
                ),
                [user_id],
            )
        })
    }

    pub fn liked_message_ids(&self, user_id: i64) -> DbResult<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM likes WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    pub fn likes_count(&self, user_id: i64) -> DbResult<i64> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM likes WHERE user_id = ?1", user_id))
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> DbResult<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_message_by_id(conn: &Connection, id: i64) -> DbResult<Option<MessageRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS}
                 FROM messages m JOIN users u ON u.id = m.user_id
                 WHERE m.id = ?1"
            ),
            [id],
            message_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_users<P: Params>(conn: &Connection, sql: &str, params: P) -> DbResult<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_messages<P: Params>(conn: &Connection, sql: &str, params: P) -> DbResult<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn count(conn: &Connection, sql: &str, id: i64) -> DbResult<i64> {
    Ok(conn.query_row(sql, [id], |row| row.get(0))?)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        image_url: row.get(3)?,
        header_image_url: row.get(4)?,
        bio: row.get(5)?,
        location: row.get(6)?,
        password: row.get(7)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let raw: String = row.get(2)?;
    let timestamp = parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp,
        user_id: row.get(3)?,
        author_username: row.get(4)?,
        author_image_url: row.get(5)?,
    })
}

// Stored as RFC 3339 UTC with millisecond precision, the same shape as the
// column default, so text order is time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
