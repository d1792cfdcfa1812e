//! Deletion rules for every reference in the schema.
//!
//! | reference           | on delete of target |
//! |---------------------|---------------------|
//! | post.author         | cascade             |
//! | post.group          | set null            |
//! | comment.post        | cascade             |
//! | comment.author      | cascade             |
//! | follow.user/author  | cascade             |
//!
//! The schema declares the foreign keys without actions, so skipping one of
//! these functions and deleting a referenced row directly fails.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub async fn delete_post(db_pool: &SqlitePool, post_id: Uuid) -> AppResult<()> {
    let id = post_id.to_string();
    let mut tx = db_pool.begin().await?;

    let comments = sqlx::query("DELETE FROM comments WHERE post_id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM posts WHERE id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::not_found("post"));
    }

    tx.commit().await?;
    tracing::info!(%post_id, comments, "post deleted");
    Ok(())
}

pub async fn delete_group(db_pool: &SqlitePool, group_id: Uuid) -> AppResult<()> {
    let id = group_id.to_string();
    let mut tx = db_pool.begin().await?;

    let detached = sqlx::query("UPDATE posts SET group_id=NULL WHERE group_id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM post_groups WHERE id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::not_found("group"));
    }

    tx.commit().await?;
    tracing::info!(%group_id, detached, "group deleted");
    Ok(())
}

pub async fn delete_user(db_pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let id = user_id.to_string();
    let mut tx = db_pool.begin().await?;

    let follows = sqlx::query("DELETE FROM follows WHERE user_id=? OR author_id=?")
        .bind(&id)
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let comments = sqlx::query(
        "DELETE FROM comments \
         WHERE author_id=? OR post_id IN (SELECT id FROM posts WHERE author_id=?)",
    )
    .bind(&id)
    .bind(&id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let posts = sqlx::query("DELETE FROM posts WHERE author_id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let deleted = sqlx::query("DELETE FROM users WHERE id=?")
        .bind(&id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::not_found("user"));
    }

    tx.commit().await?;
    tracing::info!(%user_id, follows, comments, posts, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::users,
        db::test_pool,
        forms::{CommentForm, GroupForm, PostForm},
        groups,
        media::MediaStore,
        posts::{listing, mutation},
        profiles::follow,
    };

    async fn count(db_pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(db_pool).await.unwrap()
    }

    fn text_form(text: &str, group: Option<Uuid>) -> PostForm {
        PostForm {
            text: text.to_owned(),
            group: group.map(|id| id.to_string()),
            ..PostForm::default()
        }
    }

    #[tokio::test]
    async fn deleting_a_group_keeps_its_posts() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        let group = groups::create_group(
            &db_pool,
            GroupForm {
                title: "testgroup".to_owned(),
                slug: "testslug".to_owned(),
                description: String::new(),
            },
        )
        .await
        .unwrap();
        let form = text_form("grouped", Some(group.id));
        let post = mutation::create_post(&db_pool, &media, &author, form).await.unwrap();
        assert_eq!(post.group.as_ref().map(|g| g.id), Some(group.id));

        delete_group(&db_pool, group.id).await.unwrap();

        let post = listing::post_by_id(&db_pool, post.id).await.unwrap().unwrap();
        assert_eq!(post.group, None);
        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM post_groups").await, 0);
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_comments() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        let post = mutation::create_post(&db_pool, &media, &author, text_form("hello", None))
            .await
            .unwrap();
        mutation::add_comment(&db_pool, &author, post.id, CommentForm { text: "first".to_owned() })
            .await
            .unwrap();

        delete_post(&db_pool, post.id).await.unwrap();

        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM comments").await, 0);
        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM posts").await, 0);
        assert!(matches!(delete_post(&db_pool, post.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_a_user_removes_everything_they_own() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let gone = users::create_user(&db_pool, "gone", "123456").await.unwrap();
        let stays = users::create_user(&db_pool, "stays", "123456").await.unwrap();

        let gone_post = mutation::create_post(&db_pool, &media, &gone, text_form("by gone", None))
            .await
            .unwrap();
        let stays_post =
            mutation::create_post(&db_pool, &media, &stays, text_form("by stays", None))
                .await
                .unwrap();
        // a comment by `stays` on gone's post, one by `gone` on stays' post
        mutation::add_comment(&db_pool, &stays, gone_post.id, CommentForm { text: "a".to_owned() })
            .await
            .unwrap();
        mutation::add_comment(&db_pool, &gone, stays_post.id, CommentForm { text: "b".to_owned() })
            .await
            .unwrap();
        follow::follow(&db_pool, &gone, "stays").await.unwrap();
        follow::follow(&db_pool, &stays, "gone").await.unwrap();

        delete_user(&db_pool, gone.id).await.unwrap();

        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM follows").await, 0);
        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM comments").await, 0);
        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM posts").await, 1);
        assert_eq!(count(&db_pool, "SELECT COUNT(*) FROM users").await, 1);
    }

    #[tokio::test]
    async fn raw_delete_of_a_referenced_user_is_refused() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        mutation::create_post(&db_pool, &media, &author, text_form("pinned", None))
            .await
            .unwrap();

        let raw = sqlx::query("DELETE FROM users WHERE id=?")
            .bind(author.id.to_string())
            .execute(&db_pool)
            .await;
        assert!(raw.is_err());
    }
}
