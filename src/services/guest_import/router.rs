//! Row routing: category resolution and payload bucketing

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::defaults::{EMPTY_PAYMENT_SOURCE, INITIAL_PAYMENT_NOTE};
use crate::services::role_directory::RoleDirectory;
use crate::services::slug::slugify;
use crate::types::{GuestCategory, GuestRecord, ImportRow, PaymentRecord, RevenueRecord};

/// Write batches of one category
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBatch {
    pub guests: Vec<GuestRecord>,
    pub revenue: Vec<RevenueRecord>,
    pub payments: Vec<PaymentRecord>,
}

impl CategoryBatch {
    pub fn is_empty(&self) -> bool {
        self.guests.is_empty() && self.revenue.is_empty() && self.payments.is_empty()
    }
}

/// All write batches of one import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutedBatches {
    pub vip: CategoryBatch,
    pub regular: CategoryBatch,
}

impl RoutedBatches {
    pub fn get(&self, category: GuestCategory) -> &CategoryBatch {
        match category {
            GuestCategory::Vip => &self.vip,
            GuestCategory::Regular => &self.regular,
        }
    }

    fn get_mut(&mut self, category: GuestCategory) -> &mut CategoryBatch {
        match category {
            GuestCategory::Vip => &mut self.vip,
            GuestCategory::Regular => &mut self.regular,
        }
    }

    pub fn guest_count(&self) -> usize {
        self.vip.guests.len() + self.regular.guests.len()
    }

    pub fn revenue_count(&self) -> usize {
        self.vip.revenue.len() + self.regular.revenue.len()
    }

    pub fn payment_count(&self) -> usize {
        self.vip.payments.len() + self.regular.payments.len()
    }

    /// Categories that received at least one write
    pub fn touched_categories(&self) -> Vec<GuestCategory> {
        GuestCategory::ALL
            .into_iter()
            .filter(|c| !self.get(*c).is_empty())
            .collect()
    }

    /// Append the payloads for one accepted row.
    ///
    /// `is_new` is true when the id was generated by this import. Only new guests get a
    /// payment synthesized from `paid_amount`.
    pub fn route(
        &mut self,
        category: GuestCategory,
        guest_id: &str,
        is_new: bool,
        row: &ImportRow,
        now: DateTime<Utc>,
    ) {
        let batch = self.get_mut(category);
        let name = row.name.clone().unwrap_or_default();
        let is_vip = category == GuestCategory::Vip;

        batch.guests.push(GuestRecord {
            id: guest_id.to_string(),
            slug: slugify(&name),
            name,
            role: row.role.clone(),
            phone: row.phone.clone(),
            referrer: row.referrer.clone(),
            notes: row.notes.clone(),
            materials: row.materials.clone(),
            secondary_info: if is_vip { row.secondary_info.clone() } else { None },
            facebook_link: if is_vip { row.facebook_link.clone() } else { None },
        });

        let has_revenue = row.sponsorship.is_some() || (!is_vip && row.payment_source.is_some());
        if has_revenue {
            batch.revenue.push(RevenueRecord {
                guest_id: guest_id.to_string(),
                sponsorship: coerce_amount(row.sponsorship.as_deref()),
                payment_source: if is_vip {
                    None
                } else {
                    Some(
                        row.payment_source
                            .clone()
                            .unwrap_or_else(|| EMPTY_PAYMENT_SOURCE.to_string()),
                    )
                },
            });
        }

        let paid = coerce_amount(row.paid_amount.as_deref());
        if is_new && paid > 0 {
            batch.payments.push(PaymentRecord {
                id: Uuid::new_v4(),
                guest_id: guest_id.to_string(),
                amount: paid,
                paid_at: now,
                note: INITIAL_PAYMENT_NOTE.to_string(),
            });
        }
    }
}

/// Explicit `type` first, then the role lookup
pub fn resolve_category(row: &ImportRow, roles: &RoleDirectory) -> Option<GuestCategory> {
    row.guest_type
        .as_deref()
        .and_then(GuestCategory::from_label)
        .or_else(|| row.role.as_deref().and_then(|role| roles.category_of(role)))
}

/// Whole đồng from a cell. Unparsable or absent values count as 0.
pub fn coerce_amount(value: Option<&str>) -> i64 {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64)
        .unwrap_or(0)
}
