use anyhow::Context;
use clap::{Parser, Subcommand};
use scribbles::{
    app,
    auth::users,
    cache::PageCache,
    config::Config,
    db::{self, cascade},
    forms::GroupForm,
    groups,
    media::MediaStore,
    AppError, AppState,
};
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "scribbles", about = "A small blogging site", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default)
    Serve,
    CreateUser {
        username: String,
        password: String,
    },
    CreateGroup {
        slug: String,
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a user with their posts, comments and follows
    DeleteUser { username: String },
    /// Delete a group; its posts stay, ungrouped
    DeleteGroup { slug: String },
    DeletePost { post_id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scribbles=info,tower_http=info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;
    db::init_schema(&db_pool).await.context("creating schema")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db_pool).await,
        command => admin(&db_pool, command).await.map_err(report),
    }
}

async fn serve(config: Config, db_pool: SqlitePool) -> anyhow::Result<()> {
    let state = AppState {
        db_pool,
        media: MediaStore::new(&config.media_root),
        page_cache: PageCache::new(config.index_cache_ttl),
        settings: config.settings(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        media_root = %config.media_root.display(),
        "listening"
    );

    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn admin(db_pool: &SqlitePool, command: Command) -> Result<(), AppError> {
    match command {
        Command::Serve => {}
        Command::CreateUser { username, password } => {
            let user = users::create_user(db_pool, &username, &password).await?;
            println!("created user {} ({})", user.username, user.id);
        }
        Command::CreateGroup {
            slug,
            title,
            description,
        } => {
            let group = groups::create_group(
                db_pool,
                GroupForm {
                    title,
                    slug,
                    description,
                },
            )
            .await?;
            println!("created group {} ({})", group.slug, group.id);
        }
        Command::DeleteUser { username } => {
            let user = users::require_user(db_pool, &username).await?;
            cascade::delete_user(db_pool, user.id).await?;
            println!("deleted user {username}");
        }
        Command::DeleteGroup { slug } => {
            let group = groups::group_by_slug(db_pool, &slug)
                .await?
                .ok_or_else(|| AppError::not_found(format!("group {slug}")))?;
            cascade::delete_group(db_pool, group.id).await?;
            println!("deleted group {slug}");
        }
        Command::DeletePost { post_id } => {
            cascade::delete_post(db_pool, post_id).await?;
            println!("deleted post {post_id}");
        }
    }
    Ok(())
}

fn report(err: AppError) -> anyhow::Error {
    match err {
        AppError::Internal(err) => err,
        err => anyhow::anyhow!("{err}"),
    }
}
