use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use postdeck::config::{Backend, Cli, Config};
use postdeck::db;
use postdeck::routes::build_router;
use postdeck::state::AppState;
use postdeck::store::{DocumentClient, Stores};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    let stores = match config.store.backend {
        Backend::Sqlite => {
            let db_path = config.db_path();
            let pool = db::create_pool(&db_path, config.database.pool_size)?;
            db::run_migrations(&pool)?;
            tracing::info!("Using SQLite store at {}", db_path.display());
            Stores::sqlite(pool)
        }
        Backend::Search => {
            let client = DocumentClient::new(&config.search)?;
            tracing::info!("Using document store at {}", config.search.url);
            Stores::document(client)
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = build_router(AppState::new(stores, config));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
