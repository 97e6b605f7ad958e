//! Census county population table.

use std::collections::BTreeMap;
use std::path::Path;

use crate::{IngestError, require_column};

/// Loads county populations keyed by lowercased, trimmed county name.
///
/// Rows with an empty county or non-numeric population are skipped.
///
/// # Errors
///
/// Returns [`IngestError`] if the file is missing or unreadable, or lacks
/// the `COUNTY`/`TOT_POP` columns.
pub fn load_county_populations(path: &Path) -> Result<BTreeMap<String, u64>, IngestError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let county = require_column(&headers, "COUNTY", path)?;
    let population = require_column(&headers, "TOT_POP", path)?;

    let mut populations = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let name = record
            .get(county)
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let Some(pop) = record.get(population).and_then(|v| v.trim().parse::<u64>().ok()) else {
            continue;
        };
        populations.insert(name, pop);
    }

    Ok(populations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_populations_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            b"COUNTY,TOT_POP\n\
              Yellowstone ,170000\n\
              GALLATIN,120000\n\
              Broken,abc\n",
        )
        .unwrap();

        let populations = load_county_populations(&path).unwrap();
        assert_eq!(populations.get("yellowstone"), Some(&170_000));
        assert_eq!(populations.get("gallatin"), Some(&120_000));
        assert_eq!(populations.len(), 2);
    }
}
