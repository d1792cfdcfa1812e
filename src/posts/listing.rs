//! Paginated reads. Every listing is ordered newest first, ties broken by id.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::users,
    db::{self, Comment, CommentRow, Group, Post, PostRow, User, COMMENT_SELECT, POST_SELECT},
    groups,
    paginator::{Page, Paginator},
    AppError, AppResult,
};

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy)]
enum Scope {
    All,
    Group(Uuid),
    Author(Uuid),
    FollowedBy(Uuid),
}

impl Scope {
    fn filter(self) -> (&'static str, Option<String>) {
        match self {
            Scope::All => ("", None),
            Scope::Group(id) => ("WHERE p.group_id=?", Some(id.to_string())),
            Scope::Author(id) => ("WHERE p.author_id=?", Some(id.to_string())),
            Scope::FollowedBy(id) => (
                "WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id=?)",
                Some(id.to_string()),
            ),
        }
    }
}

async fn page_of(
    db_pool: &SqlitePool,
    scope: Scope,
    page_size: u32,
    raw_page: Option<&str>,
) -> AppResult<Page<Post>> {
    let (filter, param) = scope.filter();

    let count_sql = format!("SELECT COUNT(*) FROM posts p {filter}");
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(param) = &param {
        count = count.bind(param);
    }
    let count = count.fetch_one(db_pool).await?;

    let paginator = Paginator::new(count.max(0) as u64, page_size);
    let number = paginator.page_number(raw_page);

    let rows_sql =
        format!("{POST_SELECT} {filter} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?");
    let mut rows = sqlx::query_as::<_, PostRow>(&rows_sql);
    if let Some(param) = &param {
        rows = rows.bind(param);
    }
    let rows = rows
        .bind(i64::from(paginator.per_page()))
        .bind(paginator.offset(number) as i64)
        .fetch_all(db_pool)
        .await?;

    let posts = rows.into_iter().map(Post::try_from).collect::<AppResult<Vec<_>>>()?;
    Ok(paginator.page(number, posts))
}

pub async fn list_posts(
    db_pool: &SqlitePool,
    page_size: u32,
    page: Option<&str>,
) -> AppResult<Page<Post>> {
    page_of(db_pool, Scope::All, page_size, page).await
}

pub async fn list_group_posts(
    db_pool: &SqlitePool,
    slug: &str,
    page_size: u32,
    page: Option<&str>,
) -> AppResult<(Group, Page<Post>)> {
    let group = groups::group_by_slug(db_pool, slug)
        .await?
        .ok_or_else(|| AppError::not_found(format!("group {slug}")))?;
    let posts = page_of(db_pool, Scope::Group(group.id), page_size, page).await?;
    Ok((group, posts))
}

pub async fn list_author_posts(
    db_pool: &SqlitePool,
    username: &str,
    page_size: u32,
    page: Option<&str>,
) -> AppResult<(User, Page<Post>)> {
    let author = users::require_user(db_pool, username).await?;
    let posts = page_of(db_pool, Scope::Author(author.id), page_size, page).await?;
    Ok((author, posts))
}

/// Posts by everyone `user` follows.
pub async fn list_followed_posts(
    db_pool: &SqlitePool,
    user: &User,
    page_size: u32,
    page: Option<&str>,
) -> AppResult<Page<Post>> {
    page_of(db_pool, Scope::FollowedBy(user.id), page_size, page).await
}

pub async fn is_following(
    db_pool: &SqlitePool,
    user: Option<&User>,
    author: &User,
) -> AppResult<bool> {
    let Some(user) = user else {
        return Ok(false);
    };

    let edge = sqlx::query("SELECT 1 FROM follows WHERE user_id=? AND author_id=?")
        .bind(user.id.to_string())
        .bind(author.id.to_string())
        .fetch_optional(db_pool)
        .await?;
    Ok(edge.is_some())
}

pub async fn post_by_id(db_pool: &SqlitePool, post_id: Uuid) -> AppResult<Option<Post>> {
    let sql = format!("{POST_SELECT} WHERE p.id=?");
    let row = sqlx::query_as::<_, PostRow>(&sql)
        .bind(post_id.to_string())
        .fetch_optional(db_pool)
        .await?;

    row.map(Post::try_from).transpose()
}

/// The post only if it exists and `username` wrote it.
pub async fn get_post(db_pool: &SqlitePool, username: &str, post_id: &str) -> AppResult<Post> {
    let not_found = || AppError::not_found(format!("post {username}/{post_id}"));

    let post_id = Uuid::parse_str(post_id).map_err(|_| not_found())?;
    match post_by_id(db_pool, post_id).await? {
        Some(post) if post.author.username == username => Ok(post),
        _ => Err(not_found()),
    }
}

/// Oldest first.
pub async fn post_comments(db_pool: &SqlitePool, post_id: Uuid) -> AppResult<Vec<Comment>> {
    let sql = format!("{COMMENT_SELECT} WHERE c.post_id=? ORDER BY c.created, c.id");
    let rows = sqlx::query_as::<_, CommentRow>(&sql)
        .bind(post_id.to_string())
        .fetch_all(db_pool)
        .await?;

    rows.into_iter().map(Comment::try_from).collect()
}

pub async fn author_post_count(db_pool: &SqlitePool, author: &User) -> AppResult<i64> {
    count_by(db_pool, "SELECT COUNT(*) FROM posts WHERE author_id=?", author).await
}

pub async fn follower_count(db_pool: &SqlitePool, author: &User) -> AppResult<i64> {
    count_by(db_pool, "SELECT COUNT(*) FROM follows WHERE author_id=?", author).await
}

pub async fn following_count(db_pool: &SqlitePool, user: &User) -> AppResult<i64> {
    count_by(db_pool, "SELECT COUNT(*) FROM follows WHERE user_id=?", user).await
}

async fn count_by(db_pool: &SqlitePool, sql: &str, user: &User) -> AppResult<i64> {
    Ok(sqlx::query_scalar(sql)
        .bind(user.id.to_string())
        .fetch_one(db_pool)
        .await?)
}
