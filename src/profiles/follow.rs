use axum::{
    debug_handler,
    extract::{Path, State},
    response::Response,
};
use sqlx::SqlitePool;

use crate::{auth::users, db::User, found, session::AuthUser, AppResult, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    /// Following yourself is silently ignored.
    SelfFollowIgnored,
}

/// Insert-if-absent in one statement; repeating it leaves a single edge.
pub async fn follow(
    db_pool: &SqlitePool,
    user: &User,
    author_username: &str,
) -> AppResult<FollowOutcome> {
    let author = users::require_user(db_pool, author_username).await?;
    if author.id == user.id {
        return Ok(FollowOutcome::SelfFollowIgnored);
    }

    let inserted = sqlx::query(
        "INSERT INTO follows (user_id,author_id) VALUES (?,?) ON CONFLICT DO NOTHING",
    )
    .bind(user.id.to_string())
    .bind(author.id.to_string())
    .execute(db_pool)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(FollowOutcome::AlreadyFollowing);
    }
    tracing::info!(user = %user.username, author = %author.username, "followed");
    Ok(FollowOutcome::Followed)
}

/// `true` when an edge was removed.
pub async fn unfollow(db_pool: &SqlitePool, user: &User, author_username: &str) -> AppResult<bool> {
    let author = users::require_user(db_pool, author_username).await?;

    let removed = sqlx::query("DELETE FROM follows WHERE user_id=? AND author_id=?")
        .bind(user.id.to_string())
        .bind(author.id.to_string())
        .execute(db_pool)
        .await?
        .rows_affected();

    if removed > 0 {
        tracing::info!(user = %user.username, author = %author.username, "unfollowed");
    }
    Ok(removed > 0)
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile_follow(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    follow(&db_pool, &user, &username).await?;
    Ok(found(&format!("/{username}/")))
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile_unfollow(
    AuthUser(user): AuthUser,
    State(db_pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    unfollow(&db_pool, &user, &username).await?;
    Ok(found(&format!("/{username}/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, AppError};

    async fn edges(db_pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(db_pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn follow_unfollow_follow_leaves_one_edge() {
        let db_pool = test_pool().await;
        let reader = users::create_user(&db_pool, "reader", "123456").await.unwrap();
        users::create_user(&db_pool, "golum", "123456").await.unwrap();

        assert_eq!(
            follow(&db_pool, &reader, "golum").await.unwrap(),
            FollowOutcome::Followed
        );
        assert_eq!(
            follow(&db_pool, &reader, "golum").await.unwrap(),
            FollowOutcome::AlreadyFollowing
        );
        assert_eq!(edges(&db_pool).await, 1);

        assert!(unfollow(&db_pool, &reader, "golum").await.unwrap());
        assert!(!unfollow(&db_pool, &reader, "golum").await.unwrap());
        assert_eq!(edges(&db_pool).await, 0);

        follow(&db_pool, &reader, "golum").await.unwrap();
        assert_eq!(edges(&db_pool).await, 1);
    }

    #[tokio::test]
    async fn self_follow_is_ignored() {
        let db_pool = test_pool().await;
        let golum = users::create_user(&db_pool, "golum", "123456").await.unwrap();

        assert_eq!(
            follow(&db_pool, &golum, "golum").await.unwrap(),
            FollowOutcome::SelfFollowIgnored
        );
        assert_eq!(edges(&db_pool).await, 0);
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let db_pool = test_pool().await;
        let reader = users::create_user(&db_pool, "reader", "123456").await.unwrap();

        let followed = follow(&db_pool, &reader, "nobody").await;
        assert!(matches!(followed, Err(AppError::NotFound(_))));
        let unfollowed = unfollow(&db_pool, &reader, "nobody").await;
        assert!(matches!(unfollowed, Err(AppError::NotFound(_))));
    }
}
