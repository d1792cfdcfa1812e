use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::{from_micros, parse_id};

/// An account. Owned by the identity side; posts, comments and follows
/// only reference it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// The slice of a group a post listing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    /// Set once at creation, never moved by edits.
    pub pub_date: OffsetDateTime,
    pub author: User,
    pub group: Option<GroupRef>,
    /// Reference into the media store.
    pub image: Option<String>,
}

impl Post {
    pub fn url(&self) -> String {
        format!("/{}/{}/", self.author.username, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Option<Uuid>,
    pub author: User,
    pub text: String,
    pub created: OffsetDateTime,
}

pub(crate) const POST_SELECT: &str = r#"
SELECT p.id, p.text, p.pub_date, p.image,
       u.id AS author_id, u.username AS author_username,
       g.id AS group_id, g.slug AS group_slug, g.title AS group_title
FROM posts p
JOIN users u ON u.id = p.author_id
LEFT JOIN post_groups g ON g.id = p.group_id
"#;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    id: String,
    text: String,
    pub_date: i64,
    image: Option<String>,
    author_id: String,
    author_username: String,
    group_id: Option<String>,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl TryFrom<PostRow> for Post {
    type Error = AppError;

    fn try_from(row: PostRow) -> AppResult<Self> {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupRef {
                id: parse_id(&id)?,
                slug,
                title,
            }),
            _ => None,
        };

        Ok(Post {
            id: parse_id(&row.id)?,
            text: row.text,
            pub_date: from_micros(row.pub_date)?,
            author: User {
                id: parse_id(&row.author_id)?,
                username: row.author_username,
            },
            group,
            image: row.image,
        })
    }
}

pub(crate) const COMMENT_SELECT: &str = r#"
SELECT c.id, c.post_id, c.text, c.created,
       u.id AS author_id, u.username AS author_username
FROM comments c
JOIN users u ON u.id = c.author_id
"#;

#[derive(sqlx::FromRow)]
pub(crate) struct CommentRow {
    id: String,
    post_id: Option<String>,
    text: String,
    created: i64,
    author_id: String,
    author_username: String,
}

impl TryFrom<CommentRow> for Comment {
    type Error = AppError;

    fn try_from(row: CommentRow) -> AppResult<Self> {
        Ok(Comment {
            id: parse_id(&row.id)?,
            post_id: row.post_id.as_deref().map(parse_id).transpose()?,
            author: User {
                id: parse_id(&row.author_id)?,
                username: row.author_username,
            },
            text: row.text,
            created: from_micros(row.created)?,
        })
    }
}
