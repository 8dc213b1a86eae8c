//! Catalog upserts
//!
//! Turns raw listing items into catalog entries and writes them in a single
//! transaction, keyed by slug.

use crate::crawler::upstream::RawListingItem;
use crate::storage::{CatalogEntry, Storage, StorageResult};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of one upsert batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    /// Items turned into catalog writes
    pub written: usize,

    /// Items dropped for lacking a slug or name
    pub skipped: usize,
}

/// Normalizes raw items into catalog entries
///
/// Items without a usable slug or name are dropped. When the same slug appears
/// more than once, the last occurrence wins, matching what sequential upserts
/// would leave behind.
pub fn prepare_entries(items: Vec<RawListingItem>) -> (Vec<CatalogEntry>, usize) {
    let mut entries: Vec<CatalogEntry> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for item in items {
        let raw_id = item.id.clone();
        match item.into_entry() {
            Some(entry) => match positions.get(&entry.slug) {
                Some(&index) => {
                    debug!(slug = %entry.slug, "Duplicate slug in listing, keeping latest");
                    entries[index] = entry;
                }
                None => {
                    positions.insert(entry.slug.clone(), entries.len());
                    entries.push(entry);
                }
            },
            None => {
                warn!(upstream_id = ?raw_id, "Skipping listing item without slug or name");
                skipped += 1;
            }
        }
    }

    (entries, skipped)
}

/// Upserts all items in one batch
///
/// Re-running with the same input leaves the catalog unchanged apart from
/// `updated_at`. A storage failure aborts the whole batch.
pub fn upsert_all<S: Storage + ?Sized>(
    storage: &mut S,
    items: Vec<RawListingItem>,
) -> StorageResult<UpsertSummary> {
    let (entries, skipped) = prepare_entries(items);
    let written = storage.upsert_catalog(&entries)?;

    Ok(UpsertSummary { written, skipped })
}
