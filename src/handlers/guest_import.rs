//! Guest import, template, export and history handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::defaults::{CSV_CONTENT_TYPE, EXPORT_FILENAME, TEMPLATE_FILENAME};
use crate::services::guest_import::csv_format::write_template;
use crate::services::guest_import::{GuestImporter, ImportError, RoutedBatches};
use crate::services::import_history::IMPORT_HISTORY;
use crate::types::{
    EmptyPayload, ErrorResponse, FileDownloadResponse, GuestImportRequest, GuestsChangedEvent,
    HistoryRequest, ImportReport, Request, SuccessResponse,
};

/// Cache invalidation event for guest lists and revenue views
pub const GUEST_CHANGED_SUBJECT: &str = "sukien.guest.changed";

async fn send<T: Serialize>(client: &Client, reply: async_nats::Subject, response: &T) -> Result<()> {
    client.publish(reply, serde_json::to_vec(response)?.into()).await?;
    Ok(())
}

pub fn file_response(filename: &str, bytes: &[u8]) -> FileDownloadResponse {
    FileDownloadResponse {
        filename: filename.to_string(),
        content_type: CSV_CONTENT_TYPE.to_string(),
        file_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        size_bytes: bytes.len() as u64,
    }
}

pub fn changed_event(report: &ImportReport, batches: &RoutedBatches) -> GuestsChangedEvent {
    GuestsChangedEvent {
        imported_count: report.imported_count,
        categories: batches.touched_categories(),
        timestamp: Utc::now(),
    }
}

/// Handle sukien.guest.import
///
/// Messages are processed one at a time: the next import is read only after the
/// previous one has been committed or rejected.
pub async fn handle_import(
    client: Client,
    mut subscriber: Subscriber,
    importer: Arc<GuestImporter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Import message without reply subject");
                continue;
            }
        };

        let request: Request<GuestImportRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = send(&client, reply, &error).await;
                continue;
            }
        };

        let filename = request.payload.filename.clone();
        let started_at = Utc::now();
        info!("Importing guests from '{}' ({} bytes)", filename, request.payload.csv_content.len());

        match importer.import(request.payload.csv_content.as_bytes()).await {
            Ok((report, batches)) => {
                IMPORT_HISTORY.record_completed(request.id, &filename, started_at, &report);

                if report.imported_count > 0 {
                    let event = changed_event(&report, &batches);
                    if let Err(e) = send(&client, GUEST_CHANGED_SUBJECT.into(), &event).await {
                        warn!("Failed to publish guest change event: {}", e);
                    }
                }

                send(&client, reply, &SuccessResponse::new(request.id, report)).await?;
            }
            Err(e) => {
                match &e {
                    ImportError::Persistence { .. } | ImportError::Store(_) => {
                        error!("Import of '{}' failed: {}", filename, e)
                    }
                    _ => warn!("Import of '{}' rejected: {}", filename, e),
                }
                IMPORT_HISTORY.record_failed(request.id, &filename, started_at, &e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                send(&client, reply, &error).await?;
            }
        }
    }

    Ok(())
}

/// Handle sukien.guest.import.template
pub async fn handle_template(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = send(&client, reply, &error).await;
                continue;
            }
        };

        match write_template() {
            Ok(bytes) => {
                debug!("Sending import template ({} bytes)", bytes.len());
                let response = SuccessResponse::new(request.id, file_response(TEMPLATE_FILENAME, &bytes));
                send(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Failed to build import template: {}", e);
                let error = ErrorResponse::new(request.id, "TEMPLATE_ERROR", e.to_string());
                send(&client, reply, &error).await?;
            }
        }
    }

    Ok(())
}

/// Handle sukien.guest.export
pub async fn handle_export(
    client: Client,
    mut subscriber: Subscriber,
    importer: Arc<GuestImporter>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = send(&client, reply, &error).await;
                continue;
            }
        };

        match importer.export().await {
            Ok(bytes) => {
                info!("Exported guest file ({} bytes)", bytes.len());
                let response = SuccessResponse::new(request.id, file_response(EXPORT_FILENAME, &bytes));
                send(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Guest export failed: {:#}", e);
                let error = ErrorResponse::new(request.id, "EXPORT_ERROR", e.to_string());
                send(&client, reply, &error).await?;
            }
        }
    }

    Ok(())
}

/// Handle sukien.guest.import.history
pub async fn handle_history(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => continue,
        };

        let request: Request<HistoryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = send(&client, reply, &error).await;
                continue;
            }
        };

        let history = IMPORT_HISTORY.get_recent(request.payload.limit);
        send(&client, reply, &SuccessResponse::new(request.id, history)).await?;
    }

    Ok(())
}
