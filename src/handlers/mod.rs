//! NATS message handlers

pub mod guest_import;
pub mod ping;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use tokio::select;
use tracing::{error, info};

use crate::services::guest_import::GuestImporter;

/// Subscribe to all subjects and run the handlers until one of them stops
pub async fn start_handlers(client: Client, importer: Arc<GuestImporter>) -> Result<()> {
    info!("Starting message handlers (store: {})...", importer.store().name());

    let ping_sub = client.subscribe("sukien.ping").await?;
    let import_sub = client.subscribe("sukien.guest.import").await?;
    let template_sub = client.subscribe("sukien.guest.import.template").await?;
    let history_sub = client.subscribe("sukien.guest.import.history").await?;
    let export_sub = client.subscribe("sukien.guest.export").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_import = client.clone();
    let client_template = client.clone();
    let client_history = client.clone();
    let client_export = client.clone();
    let importer_export = Arc::clone(&importer);

    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let import_handle = tokio::spawn(async move {
        guest_import::handle_import(client_import, import_sub, importer).await
    });

    let template_handle = tokio::spawn(async move {
        guest_import::handle_template(client_template, template_sub).await
    });

    let history_handle = tokio::spawn(async move {
        guest_import::handle_history(client_history, history_sub).await
    });

    let export_handle = tokio::spawn(async move {
        guest_import::handle_export(client_export, export_sub, importer_export).await
    });

    info!("All handlers started");

    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = import_handle => {
            error!("Import handler finished: {:?}", result);
        }
        result = template_handle => {
            error!("Template handler finished: {:?}", result);
        }
        result = history_handle => {
            error!("Import history handler finished: {:?}", result);
        }
        result = export_handle => {
            error!("Export handler finished: {:?}", result);
        }
    }

    Ok(())
}
