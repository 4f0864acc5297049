//! Guest, revenue and payment queries for both guest categories

use std::collections::HashSet;

use anyhow::Result;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::types::{
    ExistingGuest, GuestCategory, GuestExportRow, GuestRecord, PaymentRecord, RevenueRecord,
};

/// Rows per statement, well below the Postgres bind parameter limit
const CHUNK_SIZE: usize = 1000;

/// Keep the last occurrence of each key, preserving order.
/// A single upsert statement must not touch the same row twice.
fn last_per_key<'a, T, F>(items: &'a [T], key: F) -> Vec<&'a T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    let mut kept: Vec<&T> = items.iter().rev().filter(|item| seen.insert(key(*item))).collect();
    kept.reverse();
    kept
}

/// Ids and phones of every guest in the category
pub async fn list_existing(pool: &PgPool, category: GuestCategory) -> Result<Vec<ExistingGuest>> {
    let query = format!("SELECT id, phone FROM {} ORDER BY id", category.guest_table());
    let rows = sqlx::query_as::<_, ExistingGuest>(&query)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Guests joined with their revenue row and the sum of their payments
pub async fn list_for_export(pool: &PgPool, category: GuestCategory) -> Result<Vec<GuestExportRow>> {
    let (vip_columns, payment_source) = match category {
        GuestCategory::Vip => ("g.secondary_info, g.facebook_link", "NULL::TEXT"),
        GuestCategory::Regular => ("NULL::TEXT AS secondary_info, NULL::TEXT AS facebook_link", "r.payment_source"),
    };

    let query = format!(
        r#"
        SELECT
            g.id, g.name, g.role, g.phone, g.referrer, g.notes, g.materials,
            {vip_columns},
            r.sponsorship,
            p.paid_amount,
            {payment_source} AS payment_source
        FROM {guests} g
        LEFT JOIN {revenue} r ON r.guest_id = g.id
        LEFT JOIN (
            SELECT guest_id, SUM(amount)::BIGINT AS paid_amount
            FROM {payments}
            GROUP BY guest_id
        ) p ON p.guest_id = g.id
        ORDER BY g.id
        "#,
        guests = category.guest_table(),
        revenue = category.revenue_table(),
        payments = category.payment_table(),
    );

    let rows = sqlx::query_as::<_, GuestExportRow>(&query)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Insert or update guests by id. An existing non-empty slug is kept.
pub async fn upsert_guests(
    conn: &mut PgConnection,
    category: GuestCategory,
    guests: &[GuestRecord],
) -> Result<()> {
    let guests = last_per_key(guests, |g| g.id.as_str());
    let is_vip = category == GuestCategory::Vip;

    for chunk in guests.chunks(CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} AS t (id, name, role, phone, referrer, notes, materials, slug",
            category.guest_table()
        ));
        if is_vip {
            builder.push(", secondary_info, facebook_link");
        }
        builder.push(") ");

        builder.push_values(chunk, |mut b, guest| {
            b.push_bind(&guest.id)
                .push_bind(&guest.name)
                .push_bind(&guest.role)
                .push_bind(&guest.phone)
                .push_bind(&guest.referrer)
                .push_bind(&guest.notes)
                .push_bind(&guest.materials)
                .push_bind(&guest.slug);
            if is_vip {
                b.push_bind(&guest.secondary_info).push_bind(&guest.facebook_link);
            }
        });

        builder.push(
            r#"
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                role = EXCLUDED.role,
                phone = EXCLUDED.phone,
                referrer = EXCLUDED.referrer,
                notes = EXCLUDED.notes,
                materials = EXCLUDED.materials,
                slug = COALESCE(NULLIF(t.slug, ''), EXCLUDED.slug),
                updated_at = now()
            "#,
        );
        if is_vip {
            builder.push(
                ", secondary_info = EXCLUDED.secondary_info, facebook_link = EXCLUDED.facebook_link",
            );
        }

        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Insert or update revenue rows by guest id
pub async fn upsert_revenue(
    conn: &mut PgConnection,
    category: GuestCategory,
    revenue: &[RevenueRecord],
) -> Result<()> {
    let revenue = last_per_key(revenue, |r| r.guest_id.as_str());
    let is_vip = category == GuestCategory::Vip;

    for chunk in revenue.chunks(CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (guest_id, sponsorship{}) ",
            category.revenue_table(),
            if is_vip { "" } else { ", payment_source" }
        ));

        builder.push_values(chunk, |mut b, row| {
            b.push_bind(&row.guest_id).push_bind(row.sponsorship);
            if !is_vip {
                b.push_bind(&row.payment_source);
            }
        });

        builder.push(" ON CONFLICT (guest_id) DO UPDATE SET sponsorship = EXCLUDED.sponsorship, updated_at = now()");
        if !is_vip {
            builder.push(", payment_source = EXCLUDED.payment_source");
        }

        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Append payments
pub async fn insert_payments(
    conn: &mut PgConnection,
    category: GuestCategory,
    payments: &[PaymentRecord],
) -> Result<()> {
    for chunk in payments.chunks(CHUNK_SIZE) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (id, guest_id, amount, paid_at, note) ",
            category.payment_table()
        ));

        builder.push_values(chunk, |mut b, payment| {
            b.push_bind(payment.id)
                .push_bind(&payment.guest_id)
                .push_bind(payment.amount)
                .push_bind(payment.paid_at)
                .push_bind(&payment.note);
        });

        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}
