//! Event guest worker - backend service for bulk guest import and export
//!
//! This worker connects to NATS and handles guest file requests from the back-office UI.

mod cli;
mod config;
mod db;
mod defaults;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::Config;
use services::guest_import::csv_format::write_template;
use services::guest_import::GuestImporter;
use services::guest_store::PgGuestStore;
use services::role_directory::RoleDirectory;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "guest-worker.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,event_guest_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Template { out } => {
            let bytes = write_template()?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Template written to {} ({} bytes)", out.display(), bytes.len());
        }
        Command::Migrate => {
            let config = Config::from_env()?;
            let pool = db::create_pool(&config.database_url).await?;
            db::run_migrations(&pool).await?;
        }
        Command::Import { file } => {
            let config = Config::from_env()?;
            let importer = connect_importer(&config).await?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let (report, _) = importer.import(&bytes).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Export { out } => {
            let config = Config::from_env()?;
            let importer = connect_importer(&config).await?;
            let bytes = importer.export().await?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Export written to {} ({} bytes)", out.display(), bytes.len());
        }
        Command::Serve => serve().await?,
    }

    Ok(())
}

fn load_roles(config: &Config) -> Result<RoleDirectory> {
    let roles = match &config.guest_roles_file {
        Some(path) => RoleDirectory::from_file(path)?,
        None => RoleDirectory::with_defaults(),
    };
    info!("Role directory ready with {} roles", roles.len());
    Ok(roles)
}

async fn connect_importer(config: &Config) -> Result<Arc<GuestImporter>> {
    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    let store = Arc::new(PgGuestStore::new(pool));
    Ok(Arc::new(GuestImporter::new(store, load_roles(config)?, config.import_max_bytes)))
}

async fn serve() -> Result<()> {
    info!("Starting event guest worker...");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let importer = connect_importer(&config).await?;

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    if let Err(e) = handlers::start_handlers(nats_client, importer).await {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}
