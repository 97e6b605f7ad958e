//! Yearly traffic-count CSV loaders.
//!
//! The base year's file defines the segment universe; earlier years are
//! loaded as plain AADT tables for the multi-year averaging pass.

use std::path::{Path, PathBuf};

use crash_map_models::{AadtTable, Segment, SegmentKey};

use crate::parsing::{normalize_id, parse_milepost, parse_optional_f64};
use crate::{IngestError, column_index, require_column};

/// Returns the conventional path of a year's traffic-count CSV under the
/// data directory: `Traffic_Yearly_Counts_{year}/TYC_{year}.csv`.
#[must_use]
pub fn traffic_csv_path(data_dir: &Path, year: u16) -> PathBuf {
    data_dir
        .join(format!("Traffic_Yearly_Counts_{year}"))
        .join(format!("TYC_{year}.csv"))
}

/// Segments loaded from the base-year file, plus the count of rows that
/// were skipped for unusable identifiers.
#[derive(Debug)]
pub struct SegmentLoad {
    /// One segment per usable row, in file order.
    pub segments: Vec<Segment>,
    /// Rows skipped because an identifier field was missing or unparseable.
    pub skipped: u64,
}

/// An AADT table for one year, plus the count of skipped rows.
#[derive(Debug)]
pub struct AadtLoad {
    /// Observations indexed by segment and span key.
    pub table: AadtTable,
    /// Rows skipped because an identifier field was missing or unparseable.
    pub skipped: u64,
}

/// Reads the segment key columns shared by every yearly count file.
/// Returns `None` when any identifier is empty or a milepost fails to
/// parse; such rows are skip-counted by the callers.
fn read_key(
    record: &csv::StringRecord,
    corr: usize,
    mp: usize,
    endmp: usize,
    dept: usize,
) -> Option<(SegmentKey, f64, f64)> {
    let corridor_id = normalize_id(record.get(corr)?);
    let start_ref = record.get(mp)?.trim().to_string();
    let end_ref = record.get(endmp)?.trim().to_string();
    let route_id = normalize_id(record.get(dept)?);
    if corridor_id.is_empty() || route_id.is_empty() {
        return None;
    }
    let start_mp = parse_milepost(&start_ref)?;
    let end_mp = parse_milepost(&end_ref)?;
    Some((
        SegmentKey {
            corridor_id,
            start_ref,
            end_ref,
            route_id,
        },
        start_mp,
        end_mp,
    ))
}

/// Loads the base-year traffic-count file as the segment universe.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or unreadable, or if a
/// required identifier column is absent from the header.
pub fn load_base_segments(path: &Path) -> Result<SegmentLoad, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let corr = require_column(&headers, "CORR_ID", path)?;
    let mp = require_column(&headers, "CORR_MP", path)?;
    let endmp = require_column(&headers, "CORR_ENDMP", path)?;
    let dept = require_column(&headers, "DEPT_ID", path)?;
    let length = column_index(&headers, "SEC_LNT_MI");
    let aadt = column_index(&headers, "TYC_AADT");

    let mut segments = Vec::new();
    let mut skipped = 0u64;

    for record in reader.records() {
        let record = record?;
        let Some((key, start_mp, end_mp)) = read_key(&record, corr, mp, endmp, dept) else {
            skipped += 1;
            continue;
        };
        segments.push(Segment {
            key,
            start_mp,
            end_mp,
            length_mi: length.and_then(|i| record.get(i)).and_then(parse_optional_f64),
            base_aadt: aadt.and_then(|i| record.get(i)).and_then(parse_optional_f64),
        });
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} rows with unusable identifiers in {}",
            path.display()
        );
    }

    Ok(SegmentLoad { segments, skipped })
}

/// Loads one year's traffic-count file as an AADT lookup table.
///
/// Rows without a numeric AADT value contribute no observation (the year
/// simply has no data for that segment); rows with unusable identifiers
/// are skip-counted.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or unreadable, or if a
/// required identifier column is absent from the header.
pub fn load_year_aadt(path: &Path, year: u16) -> Result<AadtLoad, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let corr = require_column(&headers, "CORR_ID", path)?;
    let mp = require_column(&headers, "CORR_MP", path)?;
    let endmp = require_column(&headers, "CORR_ENDMP", path)?;
    let dept = require_column(&headers, "DEPT_ID", path)?;
    let aadt = column_index(&headers, "TYC_AADT");

    let mut table = AadtTable::new(year);
    let mut skipped = 0u64;

    for record in reader.records() {
        let record = record?;
        let Some((key, _, _)) = read_key(&record, corr, mp, endmp, dept) else {
            skipped += 1;
            continue;
        };
        if let Some(value) = aadt.and_then(|i| record.get(i)).and_then(parse_optional_f64) {
            table.insert(key, value);
        }
    }

    log::debug!(
        "Loaded {} AADT observations for {year} from {}",
        table.len(),
        path.display()
    );

    Ok(AadtLoad { table, skipped })
}
