//! Actor hydration
//!
//! Listing endpoints often return submissions without their provider or
//! carrier. For every referenced submission whose actor data is incomplete,
//! the hydrator fetches the submission detail and fills the gaps.
//!
//! # Algorithm
//! 1. Collect the distinct submission ids (fase1, fase2) lacking an actor
//! 2. Skip ids already in the session cache
//! 3. Fetch the rest in chunks of `concurrency`; each chunk runs concurrently
//!    and every call settles on its own, so one failure never aborts its
//!    siblings
//! 4. Store successes in the cache (set once, never evicted)
//! 5. Copy cached data into the items, filling only fields that are `None`
//!
//! There is no cancellation: chunks of an abandoned load still finish and
//! populate the cache.

use crate::cache::DetailCache;
use crate::error::HistorialResult;
use crate::types::{ActorTipo, RawHistorialItem, SubmissionDetail, SubmissionLite};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default number of concurrent detail fetches
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Lowest accepted concurrency
pub const MIN_CONCURRENCY: usize = 2;

/// Source of submission details
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, id: &str) -> HistorialResult<SubmissionDetail>;
}

/// Outcome of one hydration pass
///
/// Failures never fail the load; affected rows keep whatever actor data
/// they already had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HydrationReport {
    /// Distinct submission ids lacking actor data
    pub requested: usize,
    /// Already cached from an earlier load
    pub from_cache: usize,
    /// Fetched successfully in this pass
    pub fetched: usize,
    /// Ids whose fetch failed
    pub failed_ids: Vec<String>,
}

impl HydrationReport {
    /// Some referenced submissions could not be hydrated
    pub fn is_partial(&self) -> bool {
        !self.failed_ids.is_empty()
    }
}

/// Batched, concurrency-limited actor hydrator
pub struct ActorHydrator<'a> {
    source: &'a dyn DetailSource,
    cache: &'a DetailCache,
    concurrency: usize,
}

impl<'a> ActorHydrator<'a> {
    pub fn new(source: &'a dyn DetailSource, cache: &'a DetailCache) -> Self {
        Self {
            source,
            cache,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the chunk width, floored at `MIN_CONCURRENCY`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(MIN_CONCURRENCY);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Hydrate actor data into `items`
    ///
    /// Never fails: per-id errors are logged and listed in the report.
    pub async fn hydrate_actors(
        &self,
        items: Vec<RawHistorialItem>,
    ) -> (Vec<RawHistorialItem>, HydrationReport) {
        let ids = ids_needing_actors(&items);
        let mut report = HydrationReport {
            requested: ids.len(),
            ..Default::default()
        };

        if ids.is_empty() {
            return (items, report);
        }

        let mut missing = Vec::with_capacity(ids.len());
        for id in &ids {
            if self.cache.contains(id).await {
                report.from_cache += 1;
            } else {
                missing.push(id.clone());
            }
        }

        debug!(
            requested = report.requested,
            from_cache = report.from_cache,
            to_fetch = missing.len(),
            concurrency = self.concurrency,
            "Hydrating submission actors"
        );

        for chunk in missing.chunks(self.concurrency) {
            let settled = join_all(chunk.iter().map(|id| async move {
                (id, self.source.fetch_detail(id).await)
            }))
            .await;

            for (id, result) in settled {
                match result {
                    Ok(detail) => {
                        self.cache.insert_if_absent(id.clone(), detail).await;
                        report.fetched += 1;
                    }
                    Err(e) => {
                        warn!(submission_id = %id, error = %e, "Submission detail fetch failed");
                        report.failed_ids.push(id.clone());
                    }
                }
            }
        }

        let cached = self.cache.get_many(ids.iter().map(String::as_str)).await;
        let items = items
            .into_iter()
            .map(|mut item| {
                for fase in [item.fase1.as_mut(), item.fase2.as_mut()].into_iter().flatten() {
                    if let Some(detail) = cached.get(&fase.id) {
                        fill_from_detail(fase, &detail.submission);
                    }
                }
                item
            })
            .collect();

        if report.is_partial() {
            warn!(
                failed = report.failed_ids.len(),
                requested = report.requested,
                "Actor hydration incomplete"
            );
        }

        (items, report)
    }
}

/// Distinct ids, in first-seen order, of submissions missing an actor
pub fn ids_needing_actors(items: &[RawHistorialItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .flat_map(|item| [item.fase1.as_ref(), item.fase2.as_ref()])
        .flatten()
        .filter(|fase| !fase.has_complete_actors())
        .filter(|fase| seen.insert(fase.id.clone()))
        .map(|fase| fase.id.clone())
        .collect()
}

/// Copy detail data into `target`, only where `target` has nothing
///
/// Existing values are never overwritten, so a sparse detail response can
/// not clobber a richer listing entry.
pub fn fill_from_detail(target: &mut SubmissionLite, detail: &SubmissionLite) {
    if target.proveedor.is_none() {
        target.proveedor = detail.actor(ActorTipo::Proveedor);
    }
    if target.proveedor_id.is_none() {
        target.proveedor_id = detail.proveedor_id.clone();
    }
    if target.transportista.is_none() {
        target.transportista = detail.actor(ActorTipo::Transportista);
    }
    if target.transportista_id.is_none() {
        target.transportista_id = detail.transportista_id.clone();
    }
    if target.placa_vehiculo.is_none() {
        target.placa_vehiculo = detail.placa_vehiculo.clone();
    }
    if target.fecha_cierre.is_none() {
        target.fecha_cierre = detail.fecha_cierre;
    }
    if target.cuestionario.is_none() {
        target.cuestionario = detail.cuestionario.clone();
    }
    if target.tipo_fase.is_none() {
        target.tipo_fase = detail.tipo_fase.clone();
    }
}
