//! Guest role configuration queries

use anyhow::Result;
use sqlx::{FromRow, PgPool};
use tracing::warn;

use crate::types::{GuestCategory, RoleEntry};

#[derive(Debug, FromRow)]
struct GuestRoleRow {
    name: String,
    category: String,
    id_prefix: Option<String>,
}

/// Role → category entries from `guest_roles`. Rows with an unknown category are ignored.
pub async fn list_roles(pool: &PgPool) -> Result<Vec<RoleEntry>> {
    let rows = sqlx::query_as::<_, GuestRoleRow>(
        "SELECT name, category, id_prefix FROM guest_roles ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| match GuestCategory::from_label(&row.category) {
            Some(category) => Some(RoleEntry {
                name: row.name,
                category,
                id_prefix: row.id_prefix,
            }),
            None => {
                warn!("Ignoring role '{}' with unknown category '{}'", row.name, row.category);
                None
            }
        })
        .collect())
}
