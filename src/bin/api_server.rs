// HTTP API server binary for crosslist
// Provides RESTful sync endpoints for the main web app

use anyhow::Result;
use crosslist::api::ApiServer;
use crosslist::database_ops::db::Db;
use crosslist::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    crosslist::tracing::init_tracing("info,sqlx=warn")?;

    tracing::info!("Initializing crosslist API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();

    // Load configuration from environment
    let server = ApiServer::from_env()?;

    // Initialize database connection
    let database_url = env_util::db_url()?;
    let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&database_url, max_connections).await?;

    tracing::info!("Database connected successfully");

    // Start HTTP server
    server.run(db).await?;

    Ok(())
}
