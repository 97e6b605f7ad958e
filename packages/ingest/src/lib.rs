#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Flat-file ingestion for the crash-map pipeline.
//!
//! Loads the MDT source files (yearly traffic-count CSVs and `GeoJSON`
//! exports, the five-year crash CSV, the on-system routes table, and the
//! census county table) into the shared model types. Loaders skip and count
//! rows with unusable identifiers but fail fast when a required file or
//! column is missing entirely.

pub mod census;
pub mod crashes;
pub mod geometry;
pub mod parsing;
pub mod progress;
pub mod routes;
pub mod traffic;

/// Errors that can occur while reading source files.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A required column is absent from a CSV header.
    #[error("missing required column `{column}` in {file}")]
    MissingColumn {
        /// File the column was expected in.
        file: String,
        /// The missing column name.
        column: String,
    },
}

/// Finds the index of a named column in a CSV header row.
#[must_use]
pub(crate) fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Like [`column_index`] but fatal when the column is absent.
pub(crate) fn require_column(
    headers: &csv::StringRecord,
    name: &str,
    file: &std::path::Path,
) -> Result<usize, IngestError> {
    column_index(headers, name).ok_or_else(|| IngestError::MissingColumn {
        file: file.display().to_string(),
        column: name.to_string(),
    })
}
