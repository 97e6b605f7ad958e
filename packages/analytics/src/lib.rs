#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate statistics over the merged crash-rate artifact.
//!
//! Classifies enriched segments against municipal boundaries, computes
//! length-weighted average crash rates across the seven road-class
//! partitions, and ranks counties by crashes per resident.

pub mod county;
pub mod municipal;
pub mod vmt;

use crash_map_ingest::IngestError;

/// Errors that can occur during analytics operations.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// I/O error (artifact read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A source file could not be loaded.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}
