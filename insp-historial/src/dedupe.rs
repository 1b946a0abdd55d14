//! Identity keys and first-seen deduplication
//!
//! Two records with the same identity key denote the same logical regulador.
//! Listings can repeat records across overlapping pages or when the backend
//! is inconsistent; only the first occurrence is kept.

use crate::normalize::normalize_plate;
use crate::types::{HistorialRow, RawHistorialItem};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// `(normalized plate, fase1 id, fase2 id, ultima_fecha_cierre)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub placa: String,
    pub fase1_id: Option<String>,
    pub fase2_id: Option<String>,
    pub ultima_fecha_cierre: Option<DateTime<Utc>>,
}

impl IdentityKey {
    pub fn of_item(item: &RawHistorialItem) -> Self {
        Self {
            placa: normalize_plate(item.raw_plate().unwrap_or_default()),
            fase1_id: item.fase1_id().map(str::to_string),
            fase2_id: item.fase2_id().map(str::to_string),
            ultima_fecha_cierre: item.ultima_fecha_cierre,
        }
    }

    pub fn of_row(row: &HistorialRow) -> Self {
        Self {
            placa: normalize_plate(&row.placa),
            fase1_id: row.fase1_id.clone(),
            fase2_id: row.fase2_id.clone(),
            ultima_fecha_cierre: row.ultima_fecha_cierre,
        }
    }
}

/// Keep the first occurrence per key, preserving relative order
///
/// Idempotent: a deduplicated list has unique keys, so a second pass keeps
/// every element.
pub fn dedupe_by_key<T, K, F>(items: Vec<T>, key_fn: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(key_fn(item)))
        .collect()
}

/// Collapse duplicate raw items
pub fn dedupe_raw(items: Vec<RawHistorialItem>) -> Vec<RawHistorialItem> {
    let before = items.len();
    let unique = dedupe_by_key(items, IdentityKey::of_item);

    if unique.len() != before {
        debug!(
            before,
            after = unique.len(),
            "Dropped duplicate historial items"
        );
    }

    unique
}

/// Collapse rows that share an identity key
pub fn dedupe_rows(rows: Vec<HistorialRow>) -> Vec<HistorialRow> {
    dedupe_by_key(rows, IdentityKey::of_row)
}
