use rusqlite::Connection;
use tracing::info;

use crate::DbResult;

pub fn run(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                INTEGER PRIMARY KEY,
            email             TEXT NOT NULL UNIQUE,
            username          TEXT NOT NULL UNIQUE,
            image_url         TEXT NOT NULL DEFAULT '/static/images/default-pic.png',
            header_image_url  TEXT NOT NULL DEFAULT '/static/images/warbler-hero.jpg',
            bio               TEXT,
            location          TEXT,
            password          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY,
            text        TEXT NOT NULL
                        CONSTRAINT message_text_length CHECK (length(text) <= 140),
            timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_user
            ON messages(user_id, timestamp);

        CREATE TABLE IF NOT EXISTS follows (
            user_being_followed_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            user_following_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (user_being_followed_id, user_following_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_following
            ON follows(user_following_id);

        CREATE TABLE IF NOT EXISTS likes (
            id          INTEGER PRIMARY KEY,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message_id  INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            UNIQUE(user_id, message_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

/// Drop every table, children first so foreign keys never dangle.
pub fn drop_all(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS likes;
        DROP TABLE IF EXISTS follows;
        DROP TABLE IF EXISTS messages;
        DROP TABLE IF EXISTS users;
        ",
    )?;

    info!("Database tables dropped");
    Ok(())
}
