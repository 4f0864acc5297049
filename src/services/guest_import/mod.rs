//! Bulk guest import
//!
//! Pipeline for one uploaded file:
//! 1. parse and validate the header contract (`csv_format`)
//! 2. resolve each row's category, drop rows without one (`router`)
//! 3. skip rows whose phone belongs to another guest (`session`)
//! 4. allocate ids for new guests (`session`)
//! 5. bucket guest, revenue and payment payloads per category (`router`)
//! 6. write the batches in one store transaction (`submitter`)
//!
//! Steps 2-5 are synchronous and order dependent; only step 6 awaits the store.

pub mod csv_format;
pub mod error;
pub mod router;
pub mod session;
pub mod submitter;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub use error::{ImportError, SubmitStage};
pub use router::RoutedBatches;

use crate::defaults::fallback_prefix;
use crate::services::guest_store::GuestStore;
use crate::services::role_directory::RoleDirectory;
use crate::types::{DroppedRow, ExistingGuests, GuestCategory, ImportReport, SkippedRow};
use csv_format::{parse_import_file, ImportRows};
use router::resolve_category;
use session::{ImportSession, PhoneCheck};

/// Outcome of reconciling a file against the store snapshot, before anything is written
#[derive(Debug, Default)]
pub struct ImportPlan {
    pub total_rows: usize,
    pub batches: RoutedBatches,
    pub created_ids: Vec<String>,
    pub updated_count: usize,
    pub skipped: Vec<SkippedRow>,
    pub dropped: Vec<DroppedRow>,
}

impl ImportPlan {
    /// `batches` are the routed payloads taken out of this plan
    fn into_report(self, batches: &RoutedBatches) -> ImportReport {
        let imported_count = batches.guest_count();
        let message = summary_message(imported_count, self.skipped.len(), self.dropped.len());
        ImportReport {
            total_rows: self.total_rows,
            imported_count,
            created_count: self.created_ids.len(),
            updated_count: self.updated_count,
            revenue_count: batches.revenue_count(),
            payment_count: batches.payment_count(),
            created_ids: self.created_ids,
            skipped: self.skipped,
            dropped: self.dropped,
            message,
        }
    }
}

fn summary_message(imported: usize, skipped: usize, dropped: usize) -> String {
    let mut message = format!("Đã nhập thành công {} khách.", imported);
    if skipped > 0 {
        message.push_str(&format!(" Bỏ qua {} dòng trùng SĐT.", skipped));
    }
    if dropped > 0 {
        message.push_str(&format!(" Bỏ qua {} dòng không xác định được loại khách.", dropped));
    }
    message
}

/// Reconcile parsed rows against the existing guests.
///
/// Rows are processed strictly in file order. Category is resolved first so a dropped row
/// neither claims a phone nor consumes an id.
pub fn plan_import(
    rows: ImportRows,
    existing: &ExistingGuests,
    roles: &RoleDirectory,
    now: DateTime<Utc>,
) -> Result<ImportPlan, ImportError> {
    let rows: Vec<_> = rows.collect();
    let mut session = ImportSession::new(existing);
    session.reserve_ids(rows.iter().filter_map(|(_, row)| row.id.as_deref()));

    let mut plan = ImportPlan {
        total_rows: rows.len(),
        ..Default::default()
    };

    for (row_number, row) in &rows {
        let Some(category) = resolve_category(row, roles) else {
            warn!(
                "Row {}: cannot determine guest category (role {:?}, type {:?}), dropping",
                row_number, row.role, row.guest_type
            );
            plan.dropped.push(DroppedRow {
                row_number: *row_number,
                role: row.role.clone(),
                guest_type: row.guest_type.clone(),
            });
            continue;
        };

        if let PhoneCheck::Duplicate(skipped) =
            session.check_phone(*row_number, row.phone.as_deref(), row.id.as_deref())
        {
            info!("Row {}: {}", row_number, skipped.reason);
            plan.skipped.push(skipped);
            continue;
        }

        let (guest_id, is_new) = match row.id.as_deref() {
            Some(id) => (id.to_string(), false),
            None => {
                let prefix = match row.role.as_deref() {
                    Some(role) => roles.prefix_for(role),
                    None => fallback_prefix(category).to_string(),
                };
                (session.allocate_id(&prefix)?, true)
            }
        };

        session.claim_phone(row.phone.as_deref(), &guest_id);
        plan.batches.route(category, &guest_id, is_new, row, now);

        if is_new {
            plan.created_ids.push(guest_id);
        } else {
            plan.updated_count += 1;
        }
    }

    Ok(plan)
}

/// Runs imports against a guest store
pub struct GuestImporter {
    store: Arc<dyn GuestStore>,
    roles: RoleDirectory,
    max_bytes: usize,
}

impl GuestImporter {
    pub fn new(store: Arc<dyn GuestStore>, roles: RoleDirectory, max_bytes: usize) -> Self {
        Self {
            store,
            roles,
            max_bytes,
        }
    }

    pub fn store(&self) -> &Arc<dyn GuestStore> {
        &self.store
    }

    /// Import one file. Either every accepted row is written or nothing is.
    pub async fn import(&self, bytes: &[u8]) -> Result<(ImportReport, RoutedBatches), ImportError> {
        if bytes.len() > self.max_bytes {
            warn!("Import file of {} bytes exceeds limit of {}", bytes.len(), self.max_bytes);
            return Err(ImportError::MalformedFile);
        }

        let rows = parse_import_file(bytes)?;
        debug!("Parsed {} data rows", rows.remaining());

        let existing = self
            .store
            .load_existing()
            .await
            .map_err(|e| ImportError::Store(e.to_string()))?;
        let stored_roles = self
            .store
            .load_roles()
            .await
            .map_err(|e| ImportError::Store(e.to_string()))?;

        let mut roles = self.roles.clone();
        roles.merge(stored_roles);

        let mut plan = plan_import(rows, &existing, &roles, Utc::now())?;

        if plan.batches.guest_count() > 0 {
            let mut writer = self
                .store
                .begin()
                .await
                .map_err(|e| ImportError::Store(e.to_string()))?;
            submitter::submit(writer.as_mut(), &plan.batches).await?;
        }

        let batches = std::mem::take(&mut plan.batches);
        let report = plan.into_report(&batches);
        info!(
            "Import finished on {}: {} imported, {} skipped, {} dropped",
            self.store.name(),
            report.imported_count,
            report.skipped_count(),
            report.dropped.len()
        );

        Ok((report, batches))
    }

    /// All guests in the import file layout, VIP first. Re-importing the file updates
    /// the same guests.
    pub async fn export(&self) -> anyhow::Result<Vec<u8>> {
        let mut rows = Vec::new();
        for category in GuestCategory::ALL {
            let guests = self.store.load_export(category).await?;
            debug!("Exporting {} guests from {}", guests.len(), category.guest_table());
            rows.extend(guests.iter().map(|g| csv_format::export_row(category, g)));
        }
        csv_format::write_guest_file(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guest_store::memory::MemoryGuestStore;
    use crate::types::{RoleEntry, DISPLAY_HEADERS, IMPORT_HEADERS};

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut lines = vec![DISPLAY_HEADERS.join(","), IMPORT_HEADERS.join(",")];
        lines.extend(rows.iter().map(|r| r.to_string()));
        lines.join("\n").into_bytes()
    }

    fn importer(store: &MemoryGuestStore) -> GuestImporter {
        GuestImporter::new(
            Arc::new(store.clone()),
            RoleDirectory::with_defaults(),
            crate::defaults::DEFAULT_IMPORT_MAX_BYTES,
        )
    }

    #[tokio::test]
    async fn test_clean_import() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            ",Nguyễn Văn A,Prime Speaker,0901000001,,,,,1000000,,,,",
            ",Trần Thị B,Khách phổ thông,0901000002,,,,,500000,,,,",
        ]);

        let (report, batches) = tokio_test::assert_ok!(importer(&store).import(&file).await);

        assert_eq!(report.created_ids, vec!["PS001", "KPT001"]);
        assert_eq!(report.imported_count, 2);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.payment_count, 0);
        assert_eq!(batches.vip.revenue[0].sponsorship, 1_000_000);
        assert_eq!(batches.regular.revenue[0].sponsorship, 500_000);
        assert_eq!(report.message, "Đã nhập thành công 2 khách.");

        let state = store.state.lock();
        assert_eq!(state.guests["PS001"].0, GuestCategory::Vip);
        assert_eq!(state.guests["KPT001"].1.slug, "tran-thi-b");
        assert_eq!(state.revenue.len(), 2);
        assert!(state.payments.is_empty());
        assert_eq!(state.commits, 1);
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_skipped() {
        let store = MemoryGuestStore::new().with_guest(GuestCategory::Vip, "PS003", Some("0912345678"));
        let file = csv(&[",Lê Văn C,Prime Speaker,0912345678,,,,,,,,,"]);

        let (report, batches) = importer(&store).import(&file).await.unwrap();

        assert_eq!(report.skipped_count(), 1);
        assert!(report.skipped[0].reason.contains("0912345678"));
        assert_eq!(report.imported_count, 0);
        assert_eq!(batches.guest_count(), 0);
        assert!(store.state.lock().calls.is_empty());
        assert_eq!(report.message, "Đã nhập thành công 0 khách. Bỏ qua 1 dòng trùng SĐT.");
    }

    #[tokio::test]
    async fn test_unknown_role_is_dropped_without_error() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            ",Phạm D,Nonexistent Role,0903,,,,,,,,,",
            ",Hoàng E,Guest Speaker,0904,,,,,,,,,",
        ]);

        let (report, batches) = importer(&store).import(&file).await.unwrap();

        assert_eq!(report.total_rows, 2);
        assert_eq!(report.imported_count, 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].row_number, 1);
        assert_eq!(report.dropped[0].role.as_deref(), Some("Nonexistent Role"));
        assert!(batches.vip.guests.iter().all(|g| g.name != "Phạm D"));
        assert!(batches.regular.guests.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_row_does_not_claim_phone() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            ",Phạm D,Nonexistent Role,0903,,,,,,,,,",
            ",Phạm D,Khách VIP,0903,,,,,,,,,",
        ]);

        let (report, _) = importer(&store).import(&file).await.unwrap();
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.created_ids, vec!["VIP001"]);
    }

    #[tokio::test]
    async fn test_generated_ids_increase_past_existing() {
        let store = MemoryGuestStore::new()
            .with_guest(GuestCategory::Vip, "GS001", None)
            .with_guest(GuestCategory::Vip, "GS012", None);
        let rows: Vec<String> = (0..5)
            .map(|i| format!(",Speaker {},Guest Speaker,09050000{:02},,,,,,,,,", i, i))
            .collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

        let (report, _) = importer(&store).import(&csv(&rows)).await.unwrap();

        let suffixes: Vec<u32> = report
            .created_ids
            .iter()
            .map(|id| id.trim_start_matches("GS").parse().unwrap())
            .collect();
        assert_eq!(suffixes, vec![13, 14, 15, 16, 17]);
    }

    #[tokio::test]
    async fn test_same_id_same_phone_is_not_duplicate() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            "KPT007,Ngô F,Khách phổ thông,0906,,,,,,,,,",
            "KPT007,Ngô F,Khách phổ thông,0906,,,,,200000,,,,",
            "KPT008,Ngô G,Khách phổ thông,0906,,,,,,,,,",
            ",Ngô H,Khách phổ thông,0906,,,,,,,,,",
        ]);

        let (report, _) = importer(&store).import(&file).await.unwrap();

        assert_eq!(report.updated_count, 2);
        let skipped_rows: Vec<usize> = report.skipped.iter().map(|s| s.row_number).collect();
        assert_eq!(skipped_rows, vec![3, 4]);
        assert_eq!(store.state.lock().revenue["KPT007"].1.sponsorship, 200_000);
    }

    #[tokio::test]
    async fn test_every_accepted_row_lands_in_exactly_one_category() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            ",A,Prime Speaker,,,,,,,,,,",
            ",B,Prime Speaker,,Khách mời,,,,,,,,",
            ",C,,,Chức vụ,,,,,,,,",
            ",D,Tình Nguyện Viên,,,,,,,,,,",
            ",E,,,,,,,,,,,",
        ]);

        let (report, batches) = importer(&store).import(&file).await.unwrap();

        assert_eq!(report.imported_count + report.dropped.len(), report.total_rows);
        let vip: Vec<&str> = batches.vip.guests.iter().map(|g| g.name.as_str()).collect();
        let regular: Vec<&str> = batches.regular.guests.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(vip, vec!["A", "C"]);
        assert_eq!(regular, vec!["B", "D"]);
        assert!(report.created_ids.contains(&"CV001".to_string()));
    }

    #[tokio::test]
    async fn test_initial_payment_only_for_new_rows() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            "KPT001,Existing,Khách phổ thông,,,,,,,300000,,,",
            ",Fresh,Khách phổ thông,,,,,,,300000,,,",
        ]);

        let (report, batches) = importer(&store).import(&file).await.unwrap();

        assert_eq!(report.payment_count, 1);
        assert_eq!(batches.regular.payments[0].guest_id, report.created_ids[0]);
        assert_eq!(batches.regular.payments[0].amount, 300_000);
    }

    #[tokio::test]
    async fn test_generated_id_skips_explicit_id_in_batch() {
        let store = MemoryGuestStore::new();
        let file = csv(&[
            ",New,Prime Speaker,,,,,,,,,,",
            "PS001,Explicit,Prime Speaker,,,,,,,,,,",
        ]);

        let (report, _) = importer(&store).import(&file).await.unwrap();
        assert_eq!(report.created_ids, vec!["PS002"]);
        assert_eq!(store.state.lock().guests["PS001"].1.name, "Explicit");
    }

    #[tokio::test]
    async fn test_store_roles_override_defaults() {
        let store = MemoryGuestStore::new().with_role(RoleEntry {
            name: "Khách VIP".to_string(),
            category: GuestCategory::Vip,
            id_prefix: Some("KV".to_string()),
        });
        let file = csv(&[",A,Khách VIP,,,,,,,,,,"]);

        let (report, batches) = importer(&store).import(&file).await.unwrap();
        assert_eq!(report.created_ids, vec!["KV001"]);
        assert_eq!(batches.vip.guests.len(), 1);
    }

    #[tokio::test]
    async fn test_header_mismatch_writes_nothing() {
        let store = MemoryGuestStore::new();
        let file = b"id,name\n,A".to_vec();

        let err = importer(&store).import(&file).await.unwrap_err();
        assert_eq!(err.code(), "HEADER_MISMATCH");
        assert!(store.state.lock().calls.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let store = MemoryGuestStore::new();
        let importer = GuestImporter::new(Arc::new(store.clone()), RoleDirectory::with_defaults(), 16);

        let err = importer.import(&csv(&[",A,Prime Speaker,,,,,,,,,,"])).await.unwrap_err();
        assert!(matches!(err, ImportError::MalformedFile));
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_store_error() {
        let store = MemoryGuestStore::new().failing_load();
        let err = importer(&store)
            .import(&csv(&[",A,Prime Speaker,,,,,,,,,,"]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORE_ERROR");
    }

    #[tokio::test]
    async fn test_persistence_failure_rolls_back_whole_import() {
        let store = MemoryGuestStore::new().failing_at(SubmitStage::Payments(GuestCategory::Vip));
        let file = csv(&[",A,Prime Speaker,,,,,,1000,500,,,"]);

        let err = importer(&store).import(&file).await.unwrap_err();

        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert!(err.to_string().starts_with("Lỗi khi lưu thanh toán Chức vụ"));
        let state = store.state.lock();
        assert!(state.guests.is_empty());
        assert!(state.revenue.is_empty());
        assert_eq!(state.commits, 0);
    }

    #[tokio::test]
    async fn test_reimporting_export_updates_same_guests() {
        let store = MemoryGuestStore::new();
        let importer = importer(&store);
        let file = csv(&[
            ",Nguyễn Văn A,Prime Speaker,0901,,,,\"CEO, ABC\",1000000,400000,,,https://facebook.com/a",
            ",Trần Thị B,Khách phổ thông,0902,,,,,,250000,Chuyển khoản,,",
        ]);
        importer.import(&file).await.unwrap();

        let exported = importer.export().await.unwrap();
        let (report, batches) = importer.import(&exported).await.unwrap();

        assert_eq!(report.created_count, 0);
        assert_eq!(report.updated_count, 2);
        assert_eq!(report.skipped_count(), 0);
        assert_eq!(report.payment_count, 0);
        assert_eq!(batches.vip.guests[0].secondary_info.as_deref(), Some("CEO, ABC"));
        assert_eq!(batches.regular.revenue[0].payment_source.as_deref(), Some("Chuyển khoản"));

        let state = store.state.lock();
        assert_eq!(state.guests.len(), 2);
        assert_eq!(state.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_separator_only_row_is_dropped() {
        let store = MemoryGuestStore::new();
        let file = format!("{}\n,,,,,,,,,,,,", IMPORT_HEADERS.join(","));

        let (report, _) = importer(&store).import(file.as_bytes()).await.unwrap();

        assert_eq!(report.total_rows, 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.imported_count, 0);
        assert!(store.state.lock().calls.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_id_sequence_fails_without_writing() {
        let store = MemoryGuestStore::new().with_guest(GuestCategory::Vip, "PS99999999999999999999", None);
        let file = csv(&[
            "PS002,Explicit,Prime Speaker,,,,,,,,,,",
            ",New,Prime Speaker,,,,,,,,,,",
        ]);

        let err = importer(&store).import(&file).await.unwrap_err();

        assert_eq!(err.code(), "ID_SEQUENCE_EXHAUSTED");
        assert!(store.state.lock().calls.is_empty());
        assert_eq!(store.state.lock().guests.len(), 1);
    }

    #[test]
    fn test_summary_message_mentions_dropped_rows() {
        assert_eq!(
            summary_message(3, 0, 2),
            "Đã nhập thành công 3 khách. Bỏ qua 2 dòng không xác định được loại khách."
        );
    }
}
