//! Second-pass reconciliation of enriched rows
//!
//! Hydration can reveal that rows which looked distinct describe one
//! regulador, typically a pending snapshot (fase1 only) or an exit-only
//! snapshot (fase2 only) next to the completed record (fase1 + fase2). Rows
//! sharing a phase id on the same plate are grouped (see [`MergeKey`]) and
//! every group collapses to its preferred row.
//!
//! # Preference
//! `RowPreference` ranks rows by:
//! 1. [`row_score`], higher wins
//! 2. most recent of `ultima_fecha_cierre`, `fecha_salida`, `fecha_entrada`
//! 3. canonical order of the row contents (only reached by rows that differ
//!    in fields the first two criteria ignore)
//!
//! The winner then takes `proveedor`/`transportista`, and any phase it
//! lacks, from the other rows in preference order, wherever its own slot is
//! empty. A group is merged in
//! one step from the original rows, so the result does not depend on the
//! order the duplicates arrived in.

use crate::dedupe::IdentityKey;
use crate::enrich::stay_minutes;
use crate::normalize::normalize_plate;
use crate::types::HistorialRow;
use insp_common::human_time::format_minutes_opt;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Completeness score of a row
///
/// `2·[fase2] + [proveedor] + [transportista] + [tiempo_estadia]`
pub fn row_score(row: &HistorialRow) -> u8 {
    2 * row.fase2_id.is_some() as u8
        + row.proveedor.is_some() as u8
        + row.transportista.is_some() as u8
        + row.tiempo_estadia_min.is_some() as u8
}

/// Comparator choosing which of two duplicate rows survives
#[derive(Debug, Clone, Copy, Default)]
pub struct RowPreference;

impl RowPreference {
    /// `Greater` when `a` is preferred over `b`
    ///
    /// Total order: `Equal` only for identical rows.
    pub fn compare(&self, a: &HistorialRow, b: &HistorialRow) -> Ordering {
        row_score(a)
            .cmp(&row_score(b))
            .then_with(|| a.latest_activity().cmp(&b.latest_activity()))
            .then_with(|| a.cmp(b))
    }
}

/// Link between rows describing the same regulador
///
/// A row carries the entry key when it has a fase1 id and the exit key when
/// it has a fase2 id. Rows with neither phase only link on a full identity
/// key match. Every pair sharing an [`IdentityKey`] shares a `MergeKey`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MergeKey {
    Entry { placa: String, fase1_id: String },
    Exit { placa: String, fase2_id: String },
    Identity(IdentityKey),
}

impl MergeKey {
    /// Every key `row` can be joined on
    pub fn keys_of(row: &HistorialRow) -> Vec<Self> {
        let placa = normalize_plate(&row.placa);
        let mut keys = Vec::with_capacity(2);

        if let Some(fase1_id) = &row.fase1_id {
            keys.push(MergeKey::Entry {
                placa: placa.clone(),
                fase1_id: fase1_id.clone(),
            });
        }
        if let Some(fase2_id) = &row.fase2_id {
            keys.push(MergeKey::Exit {
                placa,
                fase2_id: fase2_id.clone(),
            });
        }
        if keys.is_empty() {
            keys.push(MergeKey::Identity(IdentityKey::of_row(row)));
        }

        keys
    }
}

/// Union-find over row indices
struct Groups {
    parent: Vec<usize>,
}

impl Groups {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Smaller index becomes the root
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Collapse a group of duplicates into one row
///
/// `None` only for an empty group.
pub fn merge_group(mut rows: Vec<HistorialRow>) -> Option<HistorialRow> {
    let preference = RowPreference;
    rows.sort_by(|a, b| preference.compare(b, a));

    let mut rows = rows.into_iter();
    let winner = rows.next()?;
    Some(absorb(winner, rows))
}

/// Merge two rows known to describe the same regulador
///
/// Commutative: `merge_pair(a, b) == merge_pair(b, a)`.
pub fn merge_pair(a: &HistorialRow, b: &HistorialRow) -> HistorialRow {
    let (winner, donor) = match RowPreference.compare(a, b) {
        Ordering::Less => (b, a),
        _ => (a, b),
    };
    absorb(winner.clone(), std::iter::once(donor.clone()))
}

/// Fill the winner's empty slots from donors, best donor first
///
/// Actors are taken per slot. A missing phase is taken together with its
/// date and questionnaire, and the stay is recomputed when both ends become
/// known.
fn absorb<I>(mut winner: HistorialRow, donors: I) -> HistorialRow
where
    I: IntoIterator<Item = HistorialRow>,
{
    for donor in donors {
        if winner.proveedor.is_none() {
            winner.proveedor = donor.proveedor;
        }
        if winner.transportista.is_none() {
            winner.transportista = donor.transportista;
        }
        if winner.fase1_id.is_none() && donor.fase1_id.is_some() {
            winner.fase1_id = donor.fase1_id;
            winner.fecha_entrada = donor.fecha_entrada;
            winner.cuestionario_fase1 = donor.cuestionario_fase1;
        }
        if winner.fase2_id.is_none() && donor.fase2_id.is_some() {
            winner.fase2_id = donor.fase2_id;
            winner.fecha_salida = donor.fecha_salida;
            winner.cuestionario_fase2 = donor.cuestionario_fase2;
        }
    }

    if winner.tiempo_estadia_min.is_none() {
        winner.tiempo_estadia_min = stay_minutes(winner.fecha_entrada, winner.fecha_salida);
        winner.tiempo_estadia_humano = format_minutes_opt(winner.tiempo_estadia_min);
    }

    winner.refresh_estado();
    winner
}

/// Merge every group of duplicates, keeping first-seen group order
///
/// Rows sharing any [`MergeKey`] are joined, transitively, so a pending
/// entry, an exit-only snapshot and the completed record of one regulador
/// end up in the same group whatever order they arrive in.
pub fn merge_rows(rows: Vec<HistorialRow>) -> Vec<HistorialRow> {
    let before = rows.len();
    let mut groups = Groups::new(rows.len());
    let mut owners: HashMap<MergeKey, usize> = HashMap::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        for key in MergeKey::keys_of(row) {
            match owners.get(&key) {
                Some(&owner) => groups.union(owner, i),
                None => {
                    owners.insert(key, i);
                }
            }
        }
    }

    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut buckets: Vec<Vec<HistorialRow>> = Vec::new();

    for (i, row) in rows.into_iter().enumerate() {
        let root = groups.find(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(row);
    }

    let merged: Vec<HistorialRow> = buckets.into_iter().filter_map(merge_group).collect();

    if merged.len() != before {
        debug!(before, after = merged.len(), "Merged duplicate historial rows");
    }

    merged
}
