//! Guest store abstraction
//!
//! The import pipeline talks to the store only through these traits:
//! - `PgGuestStore` for production (one transaction per import)
//! - `memory::MemoryGuestStore` for tests (deterministic, failure injection)

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::queries;
use crate::types::{
    ExistingGuests, GuestCategory, GuestExportRow, GuestRecord, PaymentRecord, RevenueRecord,
    RoleEntry,
};

/// Read side of the store used before an import
#[async_trait]
pub trait GuestStore: Send + Sync {
    /// Ids and phones of all guests of both categories
    async fn load_existing(&self) -> Result<ExistingGuests>;

    /// Role → category configuration kept in the store
    async fn load_roles(&self) -> Result<Vec<RoleEntry>>;

    /// Guests of one category joined with revenue and payment totals
    async fn load_export(&self, category: GuestCategory) -> Result<Vec<GuestExportRow>>;

    /// Start the write side of one import
    async fn begin(&self) -> Result<Box<dyn ImportWriter>>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}

/// Write side of one import. Nothing is visible to readers before `commit`.
#[async_trait]
pub trait ImportWriter: Send {
    async fn upsert_guests(&mut self, category: GuestCategory, guests: &[GuestRecord]) -> Result<()>;

    async fn upsert_revenue(&mut self, category: GuestCategory, revenue: &[RevenueRecord]) -> Result<()>;

    async fn insert_payments(&mut self, category: GuestCategory, payments: &[PaymentRecord]) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgGuestStore {
    pool: PgPool,
}

impl PgGuestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuestStore for PgGuestStore {
    async fn load_existing(&self) -> Result<ExistingGuests> {
        Ok(ExistingGuests {
            vip: queries::guest::list_existing(&self.pool, GuestCategory::Vip).await?,
            regular: queries::guest::list_existing(&self.pool, GuestCategory::Regular).await?,
        })
    }

    async fn load_roles(&self) -> Result<Vec<RoleEntry>> {
        queries::role::list_roles(&self.pool).await
    }

    async fn load_export(&self, category: GuestCategory) -> Result<Vec<GuestExportRow>> {
        queries::guest::list_for_export(&self.pool, category).await
    }

    async fn begin(&self) -> Result<Box<dyn ImportWriter>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgImportWriter { tx: Some(tx) }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Dropping the writer without `commit` rolls the transaction back
struct PgImportWriter {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgImportWriter {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or_else(|| anyhow!("Import transaction already finished"))
    }
}

#[async_trait]
impl ImportWriter for PgImportWriter {
    async fn upsert_guests(&mut self, category: GuestCategory, guests: &[GuestRecord]) -> Result<()> {
        let tx = self.tx()?;
        queries::guest::upsert_guests(&mut **tx, category, guests).await
    }

    async fn upsert_revenue(&mut self, category: GuestCategory, revenue: &[RevenueRecord]) -> Result<()> {
        let tx = self.tx()?;
        queries::guest::upsert_revenue(&mut **tx, category, revenue).await
    }

    async fn insert_payments(&mut self, category: GuestCategory, payments: &[PaymentRecord]) -> Result<()> {
        let tx = self.tx()?;
        queries::guest::insert_payments(&mut **tx, category, payments).await
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or_else(|| anyhow!("Import transaction already finished"))?;
        tx.commit().await?;
        Ok(())
    }
}
