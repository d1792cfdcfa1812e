pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod forms;
pub mod groups;
pub mod media;
pub mod paginator;
pub mod posts;
pub mod profiles;
pub mod res;
pub mod session;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sqlx::SqlitePool;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use forms::FormErrors;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub media: media::MediaStore,
    pub page_cache: cache::PageCache,
    pub settings: Settings,
}

/// Request-independent knobs the handlers read.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub page_size: u32,
    pub max_upload_bytes: usize,
    pub session_idle: time::Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: paginator::DEFAULT_PAGE_SIZE,
            max_upload_bytes: 5 * 1024 * 1024,
            session_idle: time::Duration::hours(1),
        }
    }
}

/// Builds the whole site. Only the index route goes through the page cache.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(state.settings.session_idle));

    let index = get(posts::index).layer(middleware::from_fn_with_state(
        state.clone(),
        cache::cache_page,
    ));

    Router::new()
        .route("/", index)
        .merge(auth::router())
        .merge(posts::router())
        .merge(profiles::router())
        .nest_service("/media", ServeDir::new(state.media.root()))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.settings.max_upload_bytes))
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

async fn not_found(uri: Uri) -> Response {
    res::not_found(uri.path())
}

// usernames may be non-ASCII
const LOCATION_ESCAPES: &AsciiSet = &CONTROLS.add(b' ');

/// `302 Found` to `location`. axum's `Redirect::to` answers 303.
pub fn found(location: &str) -> Response {
    let location = utf8_percent_encode(location, LOCATION_ESCAPES).to_string();
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid form: {0}")]
    Validation(FormErrors),

    #[error("{0} not found")]
    NotFound(String),

    #[error("login required to reach {next}")]
    LoginRequired { next: String },

    #[error("permission denied")]
    PermissionDenied,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, errors.to_string()).into_response()
            }
            AppError::NotFound(what) => {
                tracing::debug!(%what, "not found");
                res::not_found(&what)
            }
            AppError::LoginRequired { next } => found(&auth::login_url(&next)),
            AppError::PermissionDenied => res::forbidden(),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "unhandled error");
                res::server_error()
            }
        }
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Internal(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(std::io::Error);
apperr_impl!(time::error::Format);
apperr_impl!(time::error::ComponentRange);

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Internal(anyhow::anyhow!("password hashing: {err}"))
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}
