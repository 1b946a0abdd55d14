//! In-memory filter, sort and pagination over merged rows
//!
//! Rows are recomputed from scratch on every change of the view options;
//! nothing here keeps state between calls.

use crate::normalize::{fold_text, folded_contains};
use crate::types::{ActorRef, ActorTipo, Estado, HistorialRow};
use serde::Serialize;
use std::cmp::Ordering;

/// Estado filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstadoFiltro {
    #[default]
    Todos,
    Completo,
    Pendiente,
}

impl EstadoFiltro {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoFiltro::Todos => "todos",
            EstadoFiltro::Completo => "completo",
            EstadoFiltro::Pendiente => "pendiente",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todos" => Some(EstadoFiltro::Todos),
            "completo" => Some(EstadoFiltro::Completo),
            "pendiente" => Some(EstadoFiltro::Pendiente),
            _ => None,
        }
    }

    fn accepts(&self, estado: Estado) -> bool {
        match self {
            EstadoFiltro::Todos => true,
            EstadoFiltro::Completo => estado == Estado::Completo,
            EstadoFiltro::Pendiente => estado == Estado::Pendiente,
        }
    }
}

/// Sort key
///
/// "Oldest first" is `Reciente` with `SortDir::Asc`, not a separate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Reciente,
    Placa,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Reciente => "reciente",
            SortKey::Placa => "placa",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reciente" => Some(SortKey::Reciente),
            "placa" => Some(SortKey::Placa),
            _ => None,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDir::Asc),
            "desc" => Some(SortDir::Desc),
            _ => None,
        }
    }
}

/// Actor restriction on one slot
///
/// An exact `id` takes precedence over the `text` substring match. With
/// neither set the filter lets every row through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorFilter {
    pub tipo: ActorTipo,
    pub id: Option<String>,
    pub text: String,
}

impl ActorFilter {
    fn accepts(&self, row: &HistorialRow) -> bool {
        let actor = row.actor(self.tipo);

        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            return actor.map(|a| a.id == id).unwrap_or(false);
        }

        if fold_text(&self.text).is_empty() {
            return true;
        }

        actor.map(|a| actor_matches_text(a, &self.text)).unwrap_or(false)
    }
}

fn actor_matches_text(actor: &ActorRef, text: &str) -> bool {
    folded_contains(&actor.nombre, text)
        || actor
            .documento
            .as_deref()
            .map(|doc| folded_contains(doc, text))
            .unwrap_or(false)
}

/// Filter, sort and page options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub estado: EstadoFiltro,
    pub search: String,
    pub actor: Option<ActorFilter>,
    pub sort: SortKey,
    pub dir: SortDir,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            estado: EstadoFiltro::Todos,
            search: String::new(),
            actor: None,
            sort: SortKey::Reciente,
            dir: SortDir::Desc,
            page: 1,
            page_size: crate::query::DEFAULT_PAGE_SIZE as usize,
        }
    }
}

/// One page of the filtered, sorted set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<HistorialRow>,
    /// Filtered count before slicing
    pub count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Totals by estado over a row set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistorialSummary {
    pub total: usize,
    pub completos: usize,
    pub pendientes: usize,
}

/// All predicates of `opts` hold for `row` (AND)
pub fn matches(row: &HistorialRow, opts: &ViewOptions) -> bool {
    opts.estado.accepts(row.estado)
        && folded_contains(&row.placa, &opts.search)
        && opts.actor.as_ref().map(|f| f.accepts(row)).unwrap_or(true)
}

/// Comparator for the given key, ascending
///
/// `Reciente` orders by `ultima_fecha_cierre ?? fecha_salida ?? fecha_entrada`;
/// rows with none of them sort as the oldest.
pub fn compare_rows(a: &HistorialRow, b: &HistorialRow, key: SortKey) -> Ordering {
    match key {
        SortKey::Reciente => recency_key(a).cmp(&recency_key(b)),
        SortKey::Placa => fold_text(&a.placa)
            .cmp(&fold_text(&b.placa))
            .then_with(|| a.placa.cmp(&b.placa)),
    }
}

fn recency_key(row: &HistorialRow) -> Option<chrono::DateTime<chrono::Utc>> {
    row.ultima_fecha_cierre
        .or(row.fecha_salida)
        .or(row.fecha_entrada)
}

/// Filter and sort without slicing (feeds the CSV export)
///
/// The sort is stable and the direction flips the comparator, so rows that
/// compare equal keep their incoming order in both directions.
pub fn filter_sort(rows: &[HistorialRow], opts: &ViewOptions) -> Vec<HistorialRow> {
    let mut filtered: Vec<HistorialRow> = rows
        .iter()
        .filter(|row| matches(row, opts))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let ordering = compare_rows(a, b, opts.sort);
        match opts.dir {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    });

    filtered
}

/// Slice a sorted set into the requested 1-based page
///
/// Returns `[max(0, (page-1)*size), min(len, page*size))`. A page past the
/// end is empty; it is not clamped to the last page.
pub fn paginate(rows: Vec<HistorialRow>, page: usize, page_size: usize) -> Page {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let count = rows.len();
    let total_pages = count.div_ceil(page_size);

    let start = (page - 1).saturating_mul(page_size).min(count);
    let end = page.saturating_mul(page_size).min(count);

    let rows = rows.into_iter().skip(start).take(end - start).collect();

    Page {
        rows,
        count,
        page,
        page_size,
        total_pages,
    }
}

/// Filter, sort and slice in one call
pub fn filter_sort_paginate(rows: &[HistorialRow], opts: &ViewOptions) -> Page {
    paginate(filter_sort(rows, opts), opts.page, opts.page_size)
}

/// Count rows by estado
pub fn summarize(rows: &[HistorialRow]) -> HistorialSummary {
    rows.iter().fold(HistorialSummary::default(), |mut acc, row| {
        acc.total += 1;
        match row.estado {
            Estado::Completo => acc.completos += 1,
            Estado::Pendiente => acc.pendientes += 1,
        }
        acc
    })
}
