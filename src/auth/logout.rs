use axum::{debug_handler, extract::Query, response::Response};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{found, AppResult};

use super::safe_next;

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) next: Option<String>,
}

#[debug_handler]
pub(crate) async fn logout(
    Query(LogoutQuery { next }): Query<LogoutQuery>,
    session: Session,
) -> AppResult<Response> {
    session.flush().await?;
    Ok(found(safe_next(next.as_deref())))
}
