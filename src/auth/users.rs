use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{self, User},
    forms::{clean_max_length, clean_required, FieldError, FormErrors},
    AppError, AppResult,
};

use super::password;

pub const USERNAME_MAX: usize = 150;

// first path segments the router already owns
const RESERVED: &[&str] = &["auth", "follow", "group", "media", "new"];

pub fn clean_username(raw: &str) -> Result<String, FieldError> {
    let username = clean_max_length(clean_required(raw)?, USERNAME_MAX)?;
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(FieldError::InvalidUsername);
    }
    if RESERVED.contains(&username.as_str()) {
        return Err(FieldError::Reserved);
    }
    Ok(username)
}

pub async fn create_user(db_pool: &SqlitePool, username: &str, password: &str) -> AppResult<User> {
    let mut errors = FormErrors::new();
    let username = errors.take("username", clean_username(username));
    let password = errors.take("password", clean_required(password).map(|_| password));
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::Validation(errors));
    };

    let id = Uuid::now_v7();
    let password_hash = password::hash_password(password)?;

    let inserted = sqlx::query("INSERT INTO users (id,username,password_hash) VALUES (?,?,?)")
        .bind(id.to_string())
        .bind(&username)
        .bind(password_hash)
        .execute(db_pool)
        .await;

    match inserted {
        Ok(_) => {}
        Err(err) if db::is_unique_violation(&err) => {
            return Err(AppError::Validation(FormErrors::single(
                "username",
                FieldError::Duplicate {
                    model: "User",
                    field: "username",
                },
            )));
        }
        Err(err) => return Err(err.into()),
    }

    tracing::info!(user_id = %id, %username, "user created");
    Ok(User { id, username })
}

pub async fn user_by_id(db_pool: &SqlitePool, id: Uuid) -> AppResult<Option<User>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id=?")
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?;

    Ok(row.map(|(username,)| User { id, username }))
}

pub async fn user_by_username(db_pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT id,username FROM users WHERE username=?")
            .bind(username)
            .fetch_optional(db_pool)
            .await?;

    row.map(|(id, username)| {
        Ok(User {
            id: db::parse_id(&id)?,
            username,
        })
    })
    .transpose()
}

/// Like [`user_by_username`], but a missing user is a `NotFound`.
pub async fn require_user(db_pool: &SqlitePool, username: &str) -> AppResult<User> {
    user_by_username(db_pool, username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {username}")))
}

/// `None` for an unknown username and for a wrong password alike.
pub async fn authenticate(
    db_pool: &SqlitePool,
    username: &str,
    password: &str,
) -> AppResult<Option<User>> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT id,username,password_hash FROM users WHERE username=?")
            .bind(username)
            .fetch_optional(db_pool)
            .await?;

    let Some((id, username, password_hash)) = row else {
        return Ok(None);
    };
    if !password::verify_password(password, &password_hash)? {
        return Ok(None);
    }

    Ok(Some(User {
        id: db::parse_id(&id)?,
        username,
    }))
}
