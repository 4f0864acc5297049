//! Guest types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Guest category. Each category is persisted to its own guest, revenue and payment tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuestCategory {
    /// VIP / official-role guest
    #[serde(rename = "Chức vụ")]
    Vip,
    /// Regular invited guest
    #[serde(rename = "Khách mời")]
    Regular,
}

impl GuestCategory {
    pub const ALL: [GuestCategory; 2] = [GuestCategory::Vip, GuestCategory::Regular];

    /// Label used in CSV files and the role configuration
    pub fn label(&self) -> &'static str {
        match self {
            GuestCategory::Vip => "Chức vụ",
            GuestCategory::Regular => "Khách mời",
        }
    }

    /// Parse a category label. Surrounding whitespace is ignored, everything else is exact.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "Chức vụ" => Some(GuestCategory::Vip),
            "Khách mời" => Some(GuestCategory::Regular),
            _ => None,
        }
    }

    pub fn guest_table(&self) -> &'static str {
        match self {
            GuestCategory::Vip => "vip_guests",
            GuestCategory::Regular => "guests",
        }
    }

    pub fn revenue_table(&self) -> &'static str {
        match self {
            GuestCategory::Vip => "vip_guest_revenue",
            GuestCategory::Regular => "guest_revenue",
        }
    }

    pub fn payment_table(&self) -> &'static str {
        match self {
            GuestCategory::Vip => "vip_guest_payments",
            GuestCategory::Regular => "guest_payments",
        }
    }
}

impl std::fmt::Display for GuestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Role configuration entry: which category a role belongs to and which id prefix it uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntry {
    pub name: String,
    pub category: GuestCategory,
    #[serde(default)]
    pub id_prefix: Option<String>,
}

/// Identifier and phone of a guest that already exists in the store
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExistingGuest {
    pub id: String,
    pub phone: Option<String>,
}

/// Snapshot of existing guests of both categories, read once before an import
#[derive(Debug, Clone, Default)]
pub struct ExistingGuests {
    pub vip: Vec<ExistingGuest>,
    pub regular: Vec<ExistingGuest>,
}

impl ExistingGuests {
    pub fn iter(&self) -> impl Iterator<Item = &ExistingGuest> {
        self.vip.iter().chain(self.regular.iter())
    }

    pub fn len(&self) -> usize {
        self.vip.len() + self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Guest upsert payload. VIP-only fields stay `None` for regular guests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestRecord {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub referrer: Option<String>,
    pub notes: Option<String>,
    pub materials: Option<String>,
    pub slug: String,
    pub secondary_info: Option<String>,
    pub facebook_link: Option<String>,
}

/// Revenue upsert payload, one per guest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueRecord {
    pub guest_id: String,
    /// Sponsorship in whole đồng
    pub sponsorship: i64,
    /// Regular guests only
    pub payment_source: Option<String>,
}

/// Initial payment for a newly created guest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub guest_id: String,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
    pub note: String,
}

/// Guest joined with its revenue row, as written to the export file
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct GuestExportRow {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub referrer: Option<String>,
    pub notes: Option<String>,
    pub secondary_info: Option<String>,
    pub sponsorship: Option<i64>,
    pub paid_amount: Option<i64>,
    pub payment_source: Option<String>,
    pub materials: Option<String>,
    pub facebook_link: Option<String>,
}
