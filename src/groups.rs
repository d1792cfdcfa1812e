use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::{self, Group, GroupRef},
    forms::{FieldError, FormErrors, GroupForm},
    AppError, AppResult,
};

/// Groups exist only through this call; posting never creates one.
pub async fn create_group(db_pool: &SqlitePool, form: GroupForm) -> AppResult<Group> {
    let cleaned = form.clean().map_err(AppError::Validation)?;
    let id = Uuid::now_v7();

    let inserted =
        sqlx::query("INSERT INTO post_groups (id,title,slug,description) VALUES (?,?,?,?)")
            .bind(id.to_string())
            .bind(&cleaned.title)
            .bind(&cleaned.slug)
            .bind(&cleaned.description)
            .execute(db_pool)
            .await;

    if let Err(err) = inserted {
        if db::is_unique_violation(&err) {
            let field = if err.to_string().contains("post_groups.slug") {
                "slug"
            } else {
                "title"
            };
            return Err(AppError::Validation(FormErrors::single(
                field,
                FieldError::Duplicate { model: "Group", field },
            )));
        }
        return Err(err.into());
    }

    tracing::info!(group_id = %id, slug = %cleaned.slug, "group created");
    Ok(Group {
        id,
        title: cleaned.title,
        slug: cleaned.slug,
        description: cleaned.description,
    })
}

pub async fn group_by_slug(db_pool: &SqlitePool, slug: &str) -> AppResult<Option<Group>> {
    let row: Option<(String, String, String, String)> =
        sqlx::query_as("SELECT id,title,slug,description FROM post_groups WHERE slug=?")
            .bind(slug)
            .fetch_optional(db_pool)
            .await?;

    row.map(|(id, title, slug, description)| {
        Ok(Group {
            id: db::parse_id(&id)?,
            title,
            slug,
            description,
        })
    })
    .transpose()
}

/// Resolves a chosen group id, refusing ids that name no group.
pub async fn resolve_choice(
    db_pool: &SqlitePool,
    group_id: Option<Uuid>,
) -> AppResult<Option<GroupRef>> {
    let Some(group_id) = group_id else {
        return Ok(None);
    };

    let row: Option<(String, String)> =
        sqlx::query_as("SELECT slug,title FROM post_groups WHERE id=?")
            .bind(group_id.to_string())
            .fetch_optional(db_pool)
            .await?;

    match row {
        Some((slug, title)) => Ok(Some(GroupRef {
            id: group_id,
            slug,
            title,
        })),
        None => Err(AppError::Validation(FormErrors::single(
            "group",
            FieldError::InvalidChoice,
        ))),
    }
}

pub async fn list_groups(db_pool: &SqlitePool) -> AppResult<Vec<Group>> {
    let rows: Vec<(String, String, String, String)> =
        sqlx::query_as("SELECT id,title,slug,description FROM post_groups ORDER BY title")
            .fetch_all(db_pool)
            .await?;

    rows.into_iter()
        .map(|(id, title, slug, description)| {
            Ok(Group {
                id: db::parse_id(&id)?,
                title,
                slug,
                description,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn form(title: &str, slug: &str) -> GroupForm {
        GroupForm {
            title: title.to_owned(),
            slug: slug.to_owned(),
            description: "about".to_owned(),
        }
    }

    #[tokio::test]
    async fn creates_and_finds_by_slug() {
        let db_pool = test_pool().await;
        let group = create_group(&db_pool, form("testgroup", "testslug")).await.unwrap();

        let found = group_by_slug(&db_pool, "testslug").await.unwrap().unwrap();
        assert_eq!(found, group);
        assert!(group_by_slug(&db_pool, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_and_title_are_validation_errors() {
        let db_pool = test_pool().await;
        create_group(&db_pool, form("cats", "cats")).await.unwrap();

        match create_group(&db_pool, form("felines", "cats")).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("slug"), ["Group with this slug already exists."]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        match create_group(&db_pool, form("cats", "felines")).await {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("title"), ["Group with this title already exists."]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_choice_is_rejected() {
        let db_pool = test_pool().await;
        assert_eq!(resolve_choice(&db_pool, None).await.unwrap(), None);
        assert!(matches!(
            resolve_choice(&db_pool, Some(Uuid::now_v7())).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn lists_by_title() {
        let db_pool = test_pool().await;
        create_group(&db_pool, form("zebras", "zebras")).await.unwrap();
        create_group(&db_pool, form("aardvarks", "aardvarks")).await.unwrap();

        let titles: Vec<_> = list_groups(&db_pool)
            .await
            .unwrap()
            .into_iter()
            .map(|group| group.title)
            .collect();
        assert_eq!(titles, ["aardvarks", "zebras"]);
    }
}
