//! # Inspection Portal Common Library
//!
//! Shared code for the inspection portal client crates:
//! - Error type and result alias
//! - TOML configuration loading and value resolution
//! - Tracing subscriber initialisation
//! - Human-readable duration formatting

pub mod config;
pub mod error;
pub mod human_time;
pub mod logging;

pub use error::{Error, Result};
