//! Import history
//!
//! Keeps the most recent import outcomes in memory for operator review.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::guest_import::ImportError;
use crate::types::ImportReport;

const MAX_HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryEntry {
    pub id: Uuid,
    pub filename: String,
    pub status: ImportStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub imported_count: usize,
    pub skipped_count: usize,
    pub dropped_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryResponse {
    pub imports: Vec<ImportHistoryEntry>,
    pub total: usize,
}

/// Bounded history, newest first
pub struct ImportHistoryService {
    history: RwLock<VecDeque<ImportHistoryEntry>>,
}

impl ImportHistoryService {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(VecDeque::with_capacity(MAX_HISTORY_SIZE)),
        }
    }

    pub fn record_completed(&self, id: Uuid, filename: &str, started_at: DateTime<Utc>, report: &ImportReport) {
        let completed_at = Utc::now();
        self.add_entry(ImportHistoryEntry {
            id,
            filename: filename.to_string(),
            status: ImportStatus::Completed,
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
            imported_count: report.imported_count,
            skipped_count: report.skipped_count(),
            dropped_count: report.dropped.len(),
            error_code: None,
            error: None,
        });
    }

    pub fn record_failed(&self, id: Uuid, filename: &str, started_at: DateTime<Utc>, error: &ImportError) {
        let completed_at = Utc::now();
        self.add_entry(ImportHistoryEntry {
            id,
            filename: filename.to_string(),
            status: ImportStatus::Failed,
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
            imported_count: 0,
            skipped_count: 0,
            dropped_count: 0,
            error_code: Some(error.code().to_string()),
            error: Some(error.to_string()),
        });
    }

    fn add_entry(&self, entry: ImportHistoryEntry) {
        let mut history = self.history.write();
        if history.len() >= MAX_HISTORY_SIZE {
            history.pop_back();
        }
        history.push_front(entry);
    }

    pub fn get_recent(&self, limit: usize) -> ImportHistoryResponse {
        let history = self.history.read();
        ImportHistoryResponse {
            imports: history.iter().take(limit).cloned().collect(),
            total: history.len(),
        }
    }
}

impl Default for ImportHistoryService {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ms(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> u64 {
    (completed_at - started_at).num_milliseconds().max(0) as u64
}

// Global instance for easy access
lazy_static::lazy_static! {
    pub static ref IMPORT_HISTORY: ImportHistoryService = ImportHistoryService::new();
}
