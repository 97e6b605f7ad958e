//! On-system routes table: departmental route -> public signed route.

use std::collections::BTreeMap;
use std::path::Path;

use crate::parsing::strip_trailing_letter;
use crate::{IngestError, require_column};

/// Loads the on-system routes table and returns a mapping from the
/// departmental route (trailing subsection letter stripped) to the public
/// signed route (e.g. `"N-1"` -> `"US-2"`).
///
/// When several rows map to the same departmental route, the first
/// non-empty signed route wins. A missing file is not fatal; the mapping
/// is enrichment, so an empty map is returned with a warning.
///
/// # Errors
///
/// Returns [`IngestError`] if an existing file cannot be read or lacks the
/// expected columns.
pub fn load_signed_routes(path: &Path) -> Result<BTreeMap<String, String>, IngestError> {
    if !path.exists() {
        log::warn!(
            "On-system routes file not found: {}; signed route names will be empty",
            path.display()
        );
        return Ok(BTreeMap::new());
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let dept = require_column(&headers, "DEPARTMENTAL ROUTE", path)?;
    let signed = require_column(&headers, "SIGNED ROUTE", path)?;

    let mut mapping: BTreeMap<String, String> = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let key = record.get(dept).map(strip_trailing_letter).unwrap_or_default();
        if key.is_empty() {
            continue;
        }
        let signed_route = record
            .get(signed)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        match mapping.get(&key) {
            Some(existing) if !existing.is_empty() => {}
            Some(_) if signed_route.is_empty() => {}
            _ => {
                mapping.insert(key, signed_route);
            }
        }
    }

    log::debug!(
        "Loaded {} departmental -> signed route mappings from {}",
        mapping.len(),
        path.display()
    );

    Ok(mapping)
}
