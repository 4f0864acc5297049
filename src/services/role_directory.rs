//! Role directory
//!
//! One lookup serving both role → category and role → id prefix. Entries are layered:
//! built-in defaults, then an optional JSON file, then the `guest_roles` table.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::defaults::default_roles;
use crate::types::{GuestCategory, RoleEntry};

#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    entries: HashMap<String, RoleEntry>,
}

impl RoleDirectory {
    /// Directory with only the built-in roles
    pub fn with_defaults() -> Self {
        let mut directory = Self::default();
        directory.merge(default_roles());
        directory
    }

    /// Load extra entries from a JSON file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read role file {}", path.display()))?;
        let entries: Vec<RoleEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid role file {}", path.display()))?;
        info!("Loaded {} role entries from {}", entries.len(), path.display());

        let mut directory = Self::with_defaults();
        directory.merge(entries);
        Ok(directory)
    }

    /// Later entries win. An entry without a prefix keeps the prefix already known for the role.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = RoleEntry>) {
        for mut entry in entries {
            let key = entry.name.trim().to_string();
            if key.is_empty() {
                continue;
            }
            if entry.id_prefix.as_deref().map_or(true, |p| p.trim().is_empty()) {
                entry.id_prefix = self.entries.get(&key).and_then(|e| e.id_prefix.clone());
            }
            debug!("Role '{}' -> {} ({:?})", key, entry.category, entry.id_prefix);
            entry.name = key.clone();
            self.entries.insert(key, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn category_of(&self, role: &str) -> Option<GuestCategory> {
        self.entries.get(role.trim()).map(|e| e.category)
    }

    /// Configured prefix, else the first two characters of the role upper-cased
    pub fn prefix_for(&self, role: &str) -> String {
        let role = role.trim();
        if let Some(prefix) = self.entries.get(role).and_then(|e| e.id_prefix.as_deref()) {
            return prefix.trim().to_string();
        }
        role.chars().take(2).collect::<String>().to_uppercase()
    }
}
