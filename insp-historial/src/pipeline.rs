//! Historial load pipeline
//!
//! Composes the stages behind one call:
//!
//! # Stages
//! 1. **Fetch**: `GET /historial/reguladores/` under the request budget
//! 2. **Dedupe**: drop raw items sharing an identity key
//! 3. **Hydrate** (optional): fill missing actors from submission details
//! 4. **Enrich**: project display rows
//! 5. **Merge**: collapse rows describing the same regulador
//! 6. **View**: filter, sort and slice the requested page
//!
//! # Load sequencing
//! Each load carries a [`LoadTicket`] from a shared [`LoadSequencer`]. The
//! ticket is checked after the fetch and after hydration; when a newer load
//! has started the result is dropped and [`LoadOutcome::Stale`] is returned.
//!
//! # Error Handling
//! Fetch errors surface to the caller. Hydration errors never do; they are
//! logged and listed in the [`HydrationReport`].

use crate::cache::DetailCache;
use crate::client::{FetchOptions, HistorialClient};
use crate::csv_export::{export_csv, CsvExport};
use crate::dedupe::dedupe_raw;
use crate::enrich::enrich_all;
use crate::error::HistorialResult;
use crate::hydrator::{ActorHydrator, HydrationReport, DEFAULT_CONCURRENCY};
use crate::merge::merge_rows;
use crate::query::{HistorialParams, HistorialQuery};
use crate::types::{HistorialRow, RawHistorialItem};
use crate::view::{filter_sort, filter_sort_paginate, summarize, HistorialSummary, Page, ViewOptions};
use chrono::{DateTime, Utc};
use insp_common::config::TomlConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Issues load tickets with increasing sequence numbers
#[derive(Debug, Clone, Default)]
pub struct LoadSequencer {
    latest: Arc<AtomicU64>,
}

impl LoadSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load, superseding every earlier ticket
    pub fn begin(&self) -> LoadTicket {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            seq,
            latest: Arc::clone(&self.latest),
        }
    }
}

/// Identifies one load; stale once a newer ticket is issued
#[derive(Debug, Clone)]
pub struct LoadTicket {
    seq: u64,
    latest: Arc<AtomicU64>,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.seq
    }
}

/// Pipeline options
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Fetch submission details for rows missing actors
    pub hydrate_actors: bool,
    /// Concurrent detail fetches per chunk
    pub concurrency: usize,
    /// Budget and cancellation for the listing fetch
    pub fetch: FetchOptions,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            hydrate_actors: true,
            concurrency: DEFAULT_CONCURRENCY,
            fetch: FetchOptions::default(),
        }
    }
}

impl EnrichOptions {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        Self {
            concurrency: toml_config.hydration_concurrency,
            ..Self::default()
        }
    }
}

/// Result of a current load
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedHistorial {
    /// Every merged row, unfiltered (feeds the summary and exports)
    pub rows: Vec<HistorialRow>,
    /// Requested page of the filtered, sorted set
    pub page: Page,
    pub summary: HistorialSummary,
    pub hydration: HydrationReport,
}

/// Outcome of a load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Current(EnrichedHistorial),
    /// Superseded by a newer load; discard
    Stale,
}

impl LoadOutcome {
    pub fn into_current(self) -> Option<EnrichedHistorial> {
        match self {
            LoadOutcome::Current(enriched) => Some(enriched),
            LoadOutcome::Stale => None,
        }
    }
}

/// Enrich, merge and order items that are already hydrated (or never will be)
pub fn build_rows(items: &[RawHistorialItem]) -> Vec<HistorialRow> {
    merge_rows(enrich_all(items))
}

/// CSV export of the rows matching `view`, in view order, ignoring paging
pub fn export_view(rows: &[HistorialRow], view: &ViewOptions, now: DateTime<Utc>) -> CsvExport {
    export_csv(&filter_sort(rows, view), now)
}

/// Historial loader bound to one browsing session
///
/// Owns the session's detail cache and load sequencer; clones share both.
#[derive(Debug, Clone)]
pub struct HistorialService {
    client: HistorialClient,
    cache: DetailCache,
    sequencer: LoadSequencer,
}

impl HistorialService {
    pub fn new(client: HistorialClient) -> Self {
        Self::with_cache(client, DetailCache::new())
    }

    /// Use an existing cache, e.g. one shared with a detail view
    pub fn with_cache(client: HistorialClient, cache: DetailCache) -> Self {
        Self {
            client,
            cache,
            sequencer: LoadSequencer::new(),
        }
    }

    pub fn client(&self) -> &HistorialClient {
        &self.client
    }

    pub fn cache(&self) -> &DetailCache {
        &self.cache
    }

    pub fn sequencer(&self) -> &LoadSequencer {
        &self.sequencer
    }

    /// Start a load for `query` with a fresh ticket
    pub async fn load(
        &self,
        query: &HistorialQuery,
        opts: &EnrichOptions,
    ) -> HistorialResult<LoadOutcome> {
        let ticket = self.sequencer.begin();
        self.fetch_historial_enriched(&query.server_params(), &query.view_options(), opts, &ticket)
            .await
    }

    /// Run every stage for one load
    ///
    /// # Errors
    /// Listing fetch failures (`Network`, `Timeout`, `Cancelled`, `Http`,
    /// `Decode`). Detail fetch failures are not errors.
    pub async fn fetch_historial_enriched(
        &self,
        params: &HistorialParams,
        view: &ViewOptions,
        opts: &EnrichOptions,
        ticket: &LoadTicket,
    ) -> HistorialResult<LoadOutcome> {
        info!(
            seq = ticket.seq(),
            fecha_desde = ?params.fecha_desde,
            fecha_hasta = ?params.fecha_hasta,
            solo_completados = params.solo_completados,
            "Loading historial"
        );

        // Stage 1-2: fetch and collapse exact duplicates
        let items = self.client.fetch_historial(params, &opts.fetch).await?;
        let fetched = items.len();
        let items = dedupe_raw(items);

        if !ticket.is_current() {
            debug!(seq = ticket.seq(), "Discarding stale load after fetch");
            return Ok(LoadOutcome::Stale);
        }

        // Stage 3: hydrate actors
        let (items, hydration) = if opts.hydrate_actors {
            ActorHydrator::new(&self.client, &self.cache)
                .with_concurrency(opts.concurrency)
                .hydrate_actors(items)
                .await
        } else {
            (items, HydrationReport::default())
        };

        if !ticket.is_current() {
            debug!(seq = ticket.seq(), "Discarding stale load after hydration");
            return Ok(LoadOutcome::Stale);
        }

        // Stage 4-6: project, merge, view
        let rows = build_rows(&items);
        let page = filter_sort_paginate(&rows, view);
        let summary = summarize(&rows);

        info!(
            seq = ticket.seq(),
            fetched,
            unique = items.len(),
            rows = rows.len(),
            matching = page.count,
            hydration_failures = hydration.failed_ids.len(),
            "Historial loaded"
        );

        Ok(LoadOutcome::Current(EnrichedHistorial {
            rows,
            page,
            summary,
            hydration,
        }))
    }
}
