use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{self, Comment, Post, User},
    forms::{CommentForm, PostForm},
    groups,
    media::MediaStore,
    AppError, AppResult,
};

use super::listing;

pub async fn create_post(
    db_pool: &SqlitePool,
    media: &MediaStore,
    author: &User,
    form: PostForm,
) -> AppResult<Post> {
    let cleaned = form.clean().await?;
    let group = groups::resolve_choice(db_pool, cleaned.group).await?;
    let image = match &cleaned.image {
        Some(image) => Some(media.store(image).await?),
        None => None,
    };

    let id = Uuid::now_v7();
    let pub_date = db::now()?;

    let inserted = sqlx::query(
        "INSERT INTO posts (id,text,pub_date,author_id,group_id,image) VALUES (?,?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(&cleaned.text)
    .bind(db::to_micros(pub_date))
    .bind(author.id.to_string())
    .bind(group.as_ref().map(|group| group.id.to_string()))
    .bind(&image)
    .execute(db_pool)
    .await;

    if let Err(err) = inserted {
        if let Some(image) = &image {
            media.discard(image).await;
        }
        return Err(err.into());
    }

    tracing::info!(post_id = %id, author = %author.username, "post created");
    Ok(Post {
        id,
        text: cleaned.text,
        pub_date,
        author: author.clone(),
        group,
        image,
    })
}

/// Rewrites text, group and image of a post. Its `pub_date` stays put, and
/// without a new upload or `image-clear` so does its image. A rejected form
/// leaves the post untouched. A replaced or cleared image file is removed.
pub async fn edit_post(
    db_pool: &SqlitePool,
    media: &MediaStore,
    editor: &User,
    post_id: Uuid,
    form: PostForm,
) -> AppResult<Post> {
    let post = listing::post_by_id(db_pool, post_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("post {post_id}")))?;
    if post.author.id != editor.id {
        tracing::warn!(%post_id, editor = %editor.username, "edit by non-author refused");
        return Err(AppError::PermissionDenied);
    }

    let cleaned = form.clean().await?;
    let group = groups::resolve_choice(db_pool, cleaned.group).await?;
    let uploaded = match &cleaned.image {
        Some(image) => Some(media.store(image).await?),
        None => None,
    };
    let image = match &uploaded {
        Some(uploaded) => Some(uploaded.clone()),
        None if cleaned.clear_image => None,
        None => post.image.clone(),
    };

    let group_id = group.as_ref().map(|group| group.id);
    let updated = update_post(db_pool, post_id, &cleaned.text, group_id, image.as_deref()).await;
    if let Err(err) = updated {
        if let Some(uploaded) = &uploaded {
            media.discard(uploaded).await;
        }
        return Err(err);
    }

    if let Some(old) = post.image.as_deref() {
        if image.as_deref() != Some(old) {
            media.discard(old).await;
        }
    }

    tracing::info!(%post_id, author = %editor.username, "post edited");
    Ok(Post {
        text: cleaned.text,
        group,
        image,
        ..post
    })
}

/// NotFound when the row is gone, e.g. deleted since it was read.
async fn update_post(
    db_pool: &SqlitePool,
    post_id: Uuid,
    text: &str,
    group_id: Option<Uuid>,
    image: Option<&str>,
) -> AppResult<()> {
    let updated = sqlx::query("UPDATE posts SET text=?, group_id=?, image=? WHERE id=?")
        .bind(text)
        .bind(group_id.map(|id| id.to_string()))
        .bind(image)
        .bind(post_id.to_string())
        .execute(db_pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::not_found(format!("post {post_id}")));
    }
    Ok(())
}

pub async fn add_comment(
    db_pool: &SqlitePool,
    author: &User,
    post_id: Uuid,
    form: CommentForm,
) -> AppResult<Comment> {
    if listing::post_by_id(db_pool, post_id).await?.is_none() {
        return Err(AppError::not_found(format!("post {post_id}")));
    }
    let text = form.clean().map_err(AppError::Validation)?;

    let id = Uuid::now_v7();
    let created = db::now()?;

    sqlx::query("INSERT INTO comments (id,post_id,author_id,text,created) VALUES (?,?,?,?,?)")
        .bind(id.to_string())
        .bind(post_id.to_string())
        .bind(author.id.to_string())
        .bind(&text)
        .bind(db::to_micros(created))
        .execute(db_pool)
        .await?;

    tracing::info!(comment_id = %id, %post_id, author = %author.username, "comment added");
    Ok(Comment {
        id,
        post_id: Some(post_id),
        author: author.clone(),
        text,
        created,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axum::body::Bytes;
    use image::ImageFormat;

    use super::*;
    use crate::{
        auth::users,
        db::test_pool,
        forms::{GroupForm, Upload},
    };

    fn png() -> Bytes {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    const INVALID_IMAGE: &str =
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

    fn text_form(text: &str) -> PostForm {
        PostForm {
            text: text.to_owned(),
            ..PostForm::default()
        }
    }

    fn image_form(text: &str) -> PostForm {
        PostForm {
            image: Some(Upload {
                filename: "small.png".to_owned(),
                bytes: png(),
            }),
            ..text_form(text)
        }
    }

    fn comment(text: &str) -> CommentForm {
        CommentForm {
            text: text.to_owned(),
        }
    }

    fn stored_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("posts"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn created_post_shows_in_author_listing() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();

        let post = create_post(&db_pool, &media, &author, text_form("  Test post  "))
            .await
            .unwrap();
        assert_eq!(post.text, "Test post");

        let (_, page) = listing::list_author_posts(&db_pool, "golum", 10, None).await.unwrap();
        assert_eq!(page.items, [post]);
    }

    #[tokio::test]
    async fn blank_text_and_unknown_group_are_rejected() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();

        match create_post(&db_pool, &media, &author, text_form("   ")).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("text"), ["This field is required."])
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let form = PostForm {
            group: Some(Uuid::now_v7().to_string()),
            ..text_form("hi")
        };
        match create_post(&db_pool, &media, &author, form).await {
            Err(AppError::Validation(errors)) => assert_eq!(
                errors.get("group"),
                ["Select a valid choice. That choice is not one of the available choices."]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn edit_keeps_pub_date_and_image() {
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

        let post = create_post(&db_pool, &media, &author, image_form("before"))
            .await
            .unwrap();
        let image = post.image.clone().unwrap();
        assert!(dir.path().join(&image).exists());

        let form = PostForm {
            group: Some(group.id.to_string()),
            ..text_form("after")
        };
        let edited = edit_post(&db_pool, &media, &author, post.id, form).await.unwrap();
        assert_eq!(edited.text, "after");
        assert_eq!(edited.pub_date, post.pub_date);
        assert_eq!(edited.image.as_deref(), Some(image.as_str()));
        assert_eq!(edited.group.map(|g| g.id), Some(group.id));

        let stored = listing::post_by_id(&db_pool, post.id).await.unwrap().unwrap();
        assert_eq!(stored.pub_date, post.pub_date);
        assert_eq!(stored.text, "after");

        let cleared = PostForm {
            clear_image: true,
            ..text_form("after")
        };
        let cleared = edit_post(&db_pool, &media, &author, post.id, cleared).await.unwrap();
        assert_eq!(cleared.image, None);
    }

    #[tokio::test]
    async fn bad_upload_keeps_previous_image() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        let post = create_post(&db_pool, &media, &author, image_form("with image"))
            .await
            .unwrap();

        let form = PostForm {
            image: Some(Upload {
                filename: "file.txt".to_owned(),
                bytes: Bytes::from_static(b"Text\n"),
            }),
            ..text_form("changed")
        };
        match edit_post(&db_pool, &media, &author, post.id, form).await {
            Err(AppError::Validation(errors)) => assert_eq!(errors.get("image"), [INVALID_IMAGE]),
            other => panic!("expected validation error, got {other:?}"),
        }

        let stored = listing::post_by_id(&db_pool, post.id).await.unwrap().unwrap();
        assert_eq!(stored, post);
        assert!(dir.path().join(post.image.unwrap()).exists());
        assert_eq!(stored_files(&dir), 1);
    }

    #[tokio::test]
    async fn only_the_author_edits() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        let other = users::create_user(&db_pool, "frodo", "123456").await.unwrap();
        let post = create_post(&db_pool, &media, &author, text_form("mine"))
            .await
            .unwrap();

        assert!(matches!(
            edit_post(&db_pool, &media, &other, post.id, text_form("theirs")).await,
            Err(AppError::PermissionDenied)
        ));
        assert!(matches!(
            edit_post(&db_pool, &media, &author, Uuid::now_v7(), text_form("x")).await,
            Err(AppError::NotFound(_))
        ));
        let stored = listing::post_by_id(&db_pool, post.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "mine");
    }

    #[tokio::test]
    async fn comments_need_a_post_and_text() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        let post = create_post(&db_pool, &media, &author, text_form("hello"))
            .await
            .unwrap();

        let missing = add_comment(&db_pool, &author, Uuid::now_v7(), comment("x")).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let blank = add_comment(&db_pool, &author, post.id, comment(" ")).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        add_comment(&db_pool, &author, post.id, comment("first")).await.unwrap();
        add_comment(&db_pool, &author, post.id, comment("second")).await.unwrap();

        let texts: Vec<_> = listing::post_comments(&db_pool, post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|comment| comment.text)
            .collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn replaced_and_cleared_images_are_removed() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let author = users::create_user(&db_pool, "golum", "123456").await.unwrap();
        let post = create_post(&db_pool, &media, &author, image_form("first"))
            .await
            .unwrap();
        let first = post.image.clone().unwrap();

        let replaced = edit_post(&db_pool, &media, &author, post.id, image_form("second"))
            .await
            .unwrap();
        let second = replaced.image.clone().unwrap();
        assert_ne!(first, second);
        assert!(!dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());

        let cleared = PostForm {
            clear_image: true,
            ..text_form("third")
        };
        edit_post(&db_pool, &media, &author, post.id, cleared).await.unwrap();
        assert!(!dir.path().join(&second).exists());
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn failed_insert_leaves_no_file_behind() {
        let db_pool = test_pool().await;
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        // never saved, so the author foreign key rejects the row
        let ghost = User {
            id: Uuid::now_v7(),
            username: "ghost".to_owned(),
        };

        let created = create_post(&db_pool, &media, &ghost, image_form("boo")).await;
        assert!(matches!(created, Err(AppError::Internal(_))));
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn updating_a_vanished_post_is_not_found() {
        let db_pool = test_pool().await;
        let updated = update_post(&db_pool, Uuid::now_v7(), "text", None, None).await;
        assert!(matches!(updated, Err(AppError::NotFound(_))));
    }
}
