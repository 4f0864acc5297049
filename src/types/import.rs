//! Guest import/export types

use serde::{Deserialize, Serialize};

use super::guest::GuestCategory;

/// Machine header of the guest CSV file. The field order is part of the file contract.
pub const IMPORT_HEADERS: [&str; 13] = [
    "id",
    "name",
    "role",
    "phone",
    "type",
    "referrer",
    "notes",
    "secondary_info",
    "sponsorship",
    "paid_amount",
    "payment_source",
    "materials",
    "facebook_link",
];

/// Human-readable header written above the machine header
pub const DISPLAY_HEADERS: [&str; 13] = [
    "ID (để trống nếu thêm mới)",
    "Họ và tên",
    "Vai trò",
    "Số điện thoại",
    "Phân loại (Chức vụ/Khách mời)",
    "Người giới thiệu",
    "Ghi chú",
    "Thông tin phụ",
    "Tài trợ",
    "Đã thanh toán",
    "Nguồn thanh toán",
    "Tư liệu",
    "Link Facebook",
];

/// One data line of an import file. Blank cells are `None`.
///
/// Key cells (id, role, phone, type and the two amounts) are trimmed. Free-text cells keep
/// their content as written so an exported file imports back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub guest_type: Option<String>,
    pub referrer: Option<String>,
    pub notes: Option<String>,
    pub secondary_info: Option<String>,
    pub sponsorship: Option<String>,
    pub paid_amount: Option<String>,
    pub payment_source: Option<String>,
    pub materials: Option<String>,
    pub facebook_link: Option<String>,
}

impl ImportRow {
    /// Build a row by zipping cells positionally against [`IMPORT_HEADERS`].
    /// Missing trailing cells stay `None`, extra cells are ignored.
    pub fn from_cells<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut row = ImportRow::default();
        for (idx, cell) in cells.into_iter().enumerate().take(IMPORT_HEADERS.len()) {
            match idx {
                0 => row.id = key(cell),
                1 => row.name = text(cell),
                2 => row.role = key(cell),
                3 => row.phone = key(cell),
                4 => row.guest_type = key(cell),
                5 => row.referrer = text(cell),
                6 => row.notes = text(cell),
                7 => row.secondary_info = text(cell),
                8 => row.sponsorship = key(cell),
                9 => row.paid_amount = key(cell),
                10 => row.payment_source = text(cell),
                11 => row.materials = text(cell),
                _ => row.facebook_link = text(cell),
            }
        }
        row
    }

    /// Cells in header order, empty string for `None`
    pub fn to_cells(&self) -> [&str; 13] {
        fn cell(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("")
        }
        [
            cell(&self.id),
            cell(&self.name),
            cell(&self.role),
            cell(&self.phone),
            cell(&self.guest_type),
            cell(&self.referrer),
            cell(&self.notes),
            cell(&self.secondary_info),
            cell(&self.sponsorship),
            cell(&self.paid_amount),
            cell(&self.payment_source),
            cell(&self.materials),
            cell(&self.facebook_link),
        ]
    }
}

fn key(cell: &str) -> Option<String> {
    Some(cell.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn text(cell: &str) -> Option<String> {
    Some(cell).filter(|v| !v.trim().is_empty()).map(str::to_string)
}

/// Row skipped because its phone already belongs to another guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    /// 1-based line number of the data row in the file
    pub row_number: usize,
    pub phone: String,
    pub reason: String,
}

/// Row dropped because its category could not be determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedRow {
    pub row_number: usize,
    pub role: Option<String>,
    pub guest_type: Option<String>,
}

/// Outcome of a successful import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total_rows: usize,
    pub imported_count: usize,
    pub created_count: usize,
    pub updated_count: usize,
    pub revenue_count: usize,
    pub payment_count: usize,
    pub created_ids: Vec<String>,
    pub skipped: Vec<SkippedRow>,
    pub dropped: Vec<DroppedRow>,
    pub message: String,
}

impl ImportReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Payload of `sukien.guest.import`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestImportRequest {
    pub filename: String,
    pub csv_content: String,
}

/// Downloadable file returned by template/export requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDownloadResponse {
    pub filename: String,
    pub content_type: String,
    pub file_base64: String,
    pub size_bytes: u64,
}

/// Published on `sukien.guest.changed` after a successful import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestsChangedEvent {
    pub imported_count: usize,
    pub categories: Vec<GuestCategory>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
