//! # Historial reconciliation and enrichment
//!
//! Turns the portal's paginated, partially duplicated regulador listing into
//! a canonical view: deduplicated, actor-enriched, merged, then filtered,
//! sorted and paged in memory. Exports the same view as CSV.
//!
//! Data flows one way:
//! query codec → fetch → dedupe → hydrate → enrich → merge → view / CSV.
//! Only the fetch and hydrate stages perform I/O.
//!
//! ```rust,ignore
//! let client = HistorialClient::new(ClientConfig::from_toml(&toml_config, None)?)?;
//! let service = HistorialService::new(client);
//! let query = query::decode(&params_from_url);
//! if let LoadOutcome::Current(historial) = service.load(&query, &EnrichOptions::default()).await? {
//!     render(historial.page);
//! }
//! ```

pub mod cache;
pub mod client;
pub mod csv_export;
pub mod dedupe;
pub mod enrich;
pub mod error;
pub mod hydrator;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod types;
pub mod view;

pub use crate::cache::DetailCache;
pub use crate::client::{ClientConfig, FetchOptions, HistorialClient};
pub use crate::error::{HistorialError, HistorialResult};
pub use crate::hydrator::{ActorHydrator, DetailSource, HydrationReport};
pub use crate::merge::RowPreference;
pub use crate::pipeline::{
    EnrichOptions, EnrichedHistorial, HistorialService, LoadOutcome, LoadSequencer, LoadTicket,
};
pub use crate::query::{HistorialParams, HistorialQuery};
pub use crate::types::{
    ActorRef, ActorTipo, Estado, HistorialRow, RawHistorialItem, SubmissionDetail, SubmissionLite,
};
pub use crate::view::{Page, ViewOptions};
