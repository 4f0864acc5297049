//! Per-import reconciliation state
//!
//! An [`ImportSession`] owns the phone index and the id counters for exactly one import run.
//! Rows must be fed in file order: the decision for row k depends on rows 1..k-1.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::error::ImportError;
use crate::defaults::ID_SEQUENCE_WIDTH;
use crate::types::{ExistingGuests, SkippedRow};

/// Outcome of claiming a row's phone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneCheck {
    /// Row may proceed
    Free,
    /// Phone belongs to another guest
    Duplicate(SkippedRow),
}

#[derive(Debug)]
pub struct ImportSession {
    /// phone -> owning guest id
    phone_index: HashMap<String, String>,
    /// prefix -> last sequence handed out
    id_counters: HashMap<String, u64>,
    /// ids present in the store before the import
    existing_ids: HashSet<String>,
    /// existing ids plus ids reserved or generated by this batch
    taken_ids: HashSet<String>,
}

impl ImportSession {
    pub fn new(existing: &ExistingGuests) -> Self {
        let mut phone_index = HashMap::with_capacity(existing.len());
        let mut existing_ids = HashSet::with_capacity(existing.len());

        for guest in existing.iter() {
            existing_ids.insert(guest.id.clone());
            if let Some(phone) = guest.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                phone_index.insert(phone.to_string(), guest.id.clone());
            }
        }

        Self {
            phone_index,
            id_counters: HashMap::new(),
            taken_ids: existing_ids.clone(),
            existing_ids,
        }
    }

    /// Reserve explicit ids carried by the batch so generated ids never collide with them
    pub fn reserve_ids<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        self.taken_ids.extend(ids.into_iter().map(str::to_string));
    }

    /// Would this row's phone conflict with a different guest?
    ///
    /// `row_id` is the identifier carried by the row, if any. A row without an id
    /// conflicts with any existing owner of the phone.
    pub fn check_phone(&self, row_number: usize, phone: Option<&str>, row_id: Option<&str>) -> PhoneCheck {
        let Some(phone) = phone else {
            return PhoneCheck::Free;
        };

        match self.phone_index.get(phone) {
            Some(owner) if row_id != Some(owner.as_str()) => PhoneCheck::Duplicate(SkippedRow {
                row_number,
                phone: phone.to_string(),
                reason: format!("SĐT {} đã tồn tại.", phone),
            }),
            _ => PhoneCheck::Free,
        }
    }

    /// Record `phone` as owned by `guest_id` for the rest of the batch
    pub fn claim_phone(&mut self, phone: Option<&str>, guest_id: &str) {
        if let Some(phone) = phone {
            self.phone_index.insert(phone.to_string(), guest_id.to_string());
        }
    }

    /// Next free id for `prefix`, e.g. `PS004`.
    ///
    /// Fails when the sequence for `prefix` cannot go higher than an existing suffix.
    pub fn allocate_id(&mut self, prefix: &str) -> Result<String, ImportError> {
        if !self.id_counters.contains_key(prefix) {
            let start = self.initial_sequence(prefix)?;
            self.id_counters.insert(prefix.to_string(), start);
        }

        let counter = self.id_counters.entry(prefix.to_string()).or_insert(0);
        let id = loop {
            *counter = counter
                .checked_add(1)
                .ok_or_else(|| exhausted(prefix))?;
            let candidate = format!("{}{:0width$}", prefix, *counter, width = ID_SEQUENCE_WIDTH);
            if !self.taken_ids.contains(&candidate) {
                break candidate;
            }
        };

        if id.len() > prefix.len() + ID_SEQUENCE_WIDTH {
            warn!("Generated id {} exceeds {} digits", id, ID_SEQUENCE_WIDTH);
        }

        self.taken_ids.insert(id.clone());
        Ok(id)
    }

    /// Count of existing ids with this prefix, raised to the highest numeric suffix
    fn initial_sequence(&self, prefix: &str) -> Result<u64, ImportError> {
        let mut count = 0u64;
        let mut highest = 0u64;

        for id in &self.existing_ids {
            let Some(suffix) = id.strip_prefix(prefix) else {
                continue;
            };
            if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            count += 1;
            let n = suffix.parse::<u64>().map_err(|_| {
                warn!("Existing id {} has a suffix too large to continue", id);
                exhausted(prefix)
            })?;
            highest = highest.max(n);
        }

        Ok(count.max(highest))
    }
}

fn exhausted(prefix: &str) -> ImportError {
    ImportError::IdSequenceExhausted(prefix.to_string())
}
