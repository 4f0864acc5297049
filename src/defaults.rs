use crate::types::{GuestCategory, RoleEntry};

/// Zero-padding width of generated guest ids
pub const ID_SEQUENCE_WIDTH: usize = 3;

/// Payment source stored for regular guests when the file leaves it empty
pub const EMPTY_PAYMENT_SOURCE: &str = "Trống";

/// Note attached to payments synthesized from `paid_amount`
pub const INITIAL_PAYMENT_NOTE: &str = "Thanh toán ban đầu (import)";

pub const TEMPLATE_FILENAME: &str = "mau-import-khach-moi.csv";
pub const EXPORT_FILENAME: &str = "danh-sach-khach-moi.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub const DEFAULT_IMPORT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Id prefix for rows that carry a category but no role
pub fn fallback_prefix(category: GuestCategory) -> &'static str {
    match category {
        GuestCategory::Vip => "CV",
        GuestCategory::Regular => "KM",
    }
}

/// Built-in role table: (role, category, id prefix)
const DEFAULT_ROLES: &[(&str, GuestCategory, &str)] = &[
    ("Prime Speaker", GuestCategory::Vip, "PS"),
    ("Guest Speaker", GuestCategory::Vip, "GS"),
    ("Ban Cố Vấn", GuestCategory::Vip, "BCV"),
    ("Ban Tổ Chức", GuestCategory::Vip, "BTC"),
    ("Khách phổ thông", GuestCategory::Regular, "KPT"),
    ("Khách VIP", GuestCategory::Regular, "VIP"),
    ("Tình Nguyện Viên", GuestCategory::Regular, "TNV"),
];

pub fn default_roles() -> Vec<RoleEntry> {
    DEFAULT_ROLES
        .iter()
        .map(|(name, category, prefix)| RoleEntry {
            name: name.to_string(),
            category: *category,
            id_prefix: Some(prefix.to_string()),
        })
        .collect()
}
