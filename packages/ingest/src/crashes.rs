//! Crash-record CSV loading.

use std::path::Path;

use crash_map_models::CrashRecord;

use crate::parsing::normalize_id;
use crate::{IngestError, column_index, require_column};

/// Crash records plus the count of rows skipped for missing identifiers.
#[derive(Debug)]
pub struct CrashLoad {
    /// One record per usable row, in file order.
    pub records: Vec<CrashRecord>,
    /// Rows skipped because the corridor or milepost field was empty.
    pub skipped: u64,
}

/// Loads the five-year crash file.
///
/// Rows missing the corridor or milepost reference are skipped and counted;
/// the run does not abort for a minority of malformed rows.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or unreadable, or if the
/// `CORRIDOR`/`REF_POINT` columns are absent from the header.
pub fn load_crash_records(path: &Path) -> Result<CrashLoad, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let corridor = require_column(&headers, "CORRIDOR", path)?;
    let ref_point = require_column(&headers, "REF_POINT", path)?;
    let county = column_index(&headers, "COUNTY");
    let severity = column_index(&headers, "SEVERITY");

    let mut records = Vec::new();
    let mut skipped = 0u64;

    for record in reader.records() {
        let record = record?;
        let corridor_id = record.get(corridor).map(normalize_id).unwrap_or_default();
        let ref_point = record
            .get(ref_point)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if corridor_id.is_empty() || ref_point.is_empty() {
            skipped += 1;
            continue;
        }
        let non_empty = |i: usize| {
            record
                .get(i)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };
        records.push(CrashRecord {
            corridor_id,
            ref_point,
            county: county.and_then(non_empty),
            severity: severity.and_then(non_empty),
        });
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} crash rows missing corridor or milepost in {}",
            path.display()
        );
    }

    Ok(CrashLoad { records, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_crashes_and_counts_skips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crashes.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            b"CORRIDOR,REF_POINT,COUNTY\n\
              c000001,012+0.5000,Lewis and Clark\n\
              C000002,,Missoula\n\
              ,034+0.0000,Gallatin\n",
        )
        .unwrap();

        let load = load_crash_records(&path).unwrap();
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.skipped, 2);
        assert_eq!(load.records[0].corridor_id, "C000001");
        assert_eq!(load.records[0].county.as_deref(), Some("Lewis and Clark"));
        assert_eq!(load.records[0].severity, None);
    }
}
