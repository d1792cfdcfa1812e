use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{auth::users, db::User, AppError, AppState};

pub const USER_ID: &str = "user_id";

/// Whoever the session says is logged in, if anyone. A session naming a
/// user that no longer exists counts as anonymous.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| msg)?;

        let Some(user_id) = session.get::<String>(USER_ID).await? else {
            return Ok(CurrentUser(None));
        };
        let Ok(user_id) = Uuid::parse_str(&user_id) else {
            return Ok(CurrentUser(None));
        };

        Ok(CurrentUser(users::user_by_id(&state.db_pool, user_id).await?))
    }
}

/// A logged in user; anonymous requests are sent to the login page with
/// the current path as `next`.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        user.map(AuthUser).ok_or_else(|| AppError::LoginRequired {
            next: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| parts.uri.path().to_owned()),
        })
    }
}
