pub mod cascade;
mod models;

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub use models::{Comment, Group, GroupRef, Post, User};
pub(crate) use models::{CommentRow, PostRow, COMMENT_SELECT, POST_SELECT};

// Foreign keys carry no ON DELETE actions: removals go through `cascade`.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS post_groups (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY NOT NULL,
    text TEXT NOT NULL,
    pub_date INTEGER NOT NULL,
    author_id TEXT NOT NULL REFERENCES users (id),
    group_id TEXT REFERENCES post_groups (id),
    image TEXT
);
CREATE INDEX IF NOT EXISTS posts_pub_date ON posts (pub_date);
CREATE INDEX IF NOT EXISTS posts_author ON posts (author_id);
CREATE INDEX IF NOT EXISTS posts_group ON posts (group_id);

CREATE TABLE IF NOT EXISTS comments (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT REFERENCES posts (id),
    author_id TEXT NOT NULL REFERENCES users (id),
    text TEXT NOT NULL,
    created INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS comments_post ON comments (post_id);

CREATE TABLE IF NOT EXISTS follows (
    user_id TEXT NOT NULL REFERENCES users (id),
    author_id TEXT NOT NULL REFERENCES users (id),
    UNIQUE (user_id, author_id)
);
CREATE INDEX IF NOT EXISTS follows_author ON follows (author_id);
"#;

/// Opens a pool with foreign key enforcement on. `sqlite::memory:` needs
/// `max_connections = 1`, every connection would get its own database otherwise.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub async fn init_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    Ok(())
}

/// Current time truncated to what the store keeps.
pub fn now() -> AppResult<OffsetDateTime> {
    from_micros(to_micros(OffsetDateTime::now_utc()))
}

pub fn to_micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}

pub fn from_micros(micros: i64) -> AppResult<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(micros as i128 * 1_000)?)
}

pub(crate) fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| AppError::Internal(anyhow::anyhow!("stored id {id:?}: {e}")))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let db_pool = connect("sqlite::memory:", 1).await.unwrap();
    init_schema(&db_pool).await.unwrap();
    db_pool
}
