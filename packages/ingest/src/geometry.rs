//! Segment geometry loading from the yearly traffic-count `GeoJSON` exports.
//!
//! Geometry is keyed by the same composite identifiers as the CSV rows, so
//! the merge pass can attach line geometry to enriched segments. Only the
//! keys actually needed are kept, and the first year that carries a key
//! wins; later (older) years only fill gaps.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crash_map_models::SegmentKey;
use geojson::GeoJson;
use serde_json::Value;

use crate::IngestError;
use crate::parsing::normalize_id;

/// Candidate locations for a year's `GeoJSON` export, in probe order.
/// Source drops have used both a flat layout and per-year directories
/// (with either extension casing).
#[must_use]
pub fn traffic_geojson_candidates(data_dir: &Path, year: u16) -> [PathBuf; 3] {
    let year_dir = data_dir.join(format!("Traffic_Yearly_Counts_{year}"));
    [
        data_dir
            .join("Traffic_Yearly_Counts")
            .join(format!("TYC_{year}.json")),
        year_dir.join(format!("TYC_{year}.json")),
        year_dir.join(format!("TYC_{year}.JSON")),
    ]
}

/// Geometry found for the requested keys, plus per-year file accounting.
#[derive(Debug, Default)]
pub struct GeometryLoad {
    /// Geometry by segment key, first year found wins.
    pub geometries: BTreeMap<SegmentKey, geojson::Geometry>,
    /// Years for which no readable `GeoJSON` export was found.
    pub years_missing: Vec<u16>,
}

fn prop_string(properties: &serde_json::Map<String, Value>, name: &str) -> String {
    match properties.get(name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn collect_features(
    geojson: GeoJson,
    needed: &BTreeSet<SegmentKey>,
    geometries: &mut BTreeMap<SegmentKey, geojson::Geometry>,
) {
    let GeoJson::FeatureCollection(collection) = geojson else {
        return;
    };
    for feature in collection.features {
        let Some(properties) = &feature.properties else {
            continue;
        };
        let key = SegmentKey {
            corridor_id: normalize_id(&prop_string(properties, "CORR_ID")),
            start_ref: prop_string(properties, "CORR_MP"),
            end_ref: prop_string(properties, "CORR_ENDMP"),
            route_id: normalize_id(&prop_string(properties, "DEPT_ID")),
        };
        if !needed.contains(&key) || geometries.contains_key(&key) {
            continue;
        }
        if let Some(geometry) = feature.geometry {
            geometries.insert(key, geometry);
        }
    }
}

/// Loads line geometry for `needed` keys from the yearly `GeoJSON` exports,
/// probing each year's candidate paths in order. Unreadable files are
/// logged and skipped; a year with no readable export is recorded in
/// [`GeometryLoad::years_missing`].
#[must_use]
pub fn load_segment_geometries(
    data_dir: &Path,
    years: &[u16],
    needed: &BTreeSet<SegmentKey>,
) -> GeometryLoad {
    let mut load = GeometryLoad::default();

    for &year in years {
        let mut found = false;
        for candidate in traffic_geojson_candidates(data_dir, year) {
            if !candidate.exists() {
                continue;
            }
            let parsed = std::fs::read_to_string(&candidate)
                .map_err(IngestError::from)
                .and_then(|content| content.parse::<GeoJson>().map_err(IngestError::from));
            match parsed {
                Ok(geojson) => {
                    collect_features(geojson, needed, &mut load.geometries);
                    found = true;
                    break;
                }
                Err(err) => {
                    log::warn!("Unreadable GeoJSON {}: {err}", candidate.display());
                }
            }
        }
        if !found {
            load.years_missing.push(year);
        }
    }

    log::info!(
        "Loaded geometry for {} of {} segments ({} years without exports)",
        load.geometries.len(),
        needed.len(),
        load.years_missing.len()
    );

    load
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn key(corridor: &str) -> SegmentKey {
        SegmentKey {
            corridor_id: corridor.into(),
            start_ref: "000+0.0000".into(),
            end_ref: "001+0.0000".into(),
            route_id: "N-1".into(),
        }
    }

    fn feature_json(corridor: &str, lon: f64) -> String {
        format!(
            r#"{{"type":"Feature","geometry":{{"type":"LineString","coordinates":[[{lon},46.0],[{lon},46.1]]}},"properties":{{"CORR_ID":"{corridor}","CORR_MP":"000+0.0000","CORR_ENDMP":"001+0.0000","DEPT_ID":"N-1"}}}}"#
        )
    }

    #[test]
    fn first_year_found_wins() {
        let dir = tempfile::tempdir().unwrap();
        for (year, lon) in [(2023u16, -110.0), (2022, -111.0)] {
            let year_dir = dir.path().join(format!("Traffic_Yearly_Counts_{year}"));
            std::fs::create_dir_all(&year_dir).unwrap();
            let mut file =
                std::fs::File::create(year_dir.join(format!("TYC_{year}.json"))).unwrap();
            write!(
                file,
                r#"{{"type":"FeatureCollection","features":[{}]}}"#,
                feature_json("C000001", lon)
            )
            .unwrap();
        }

        let needed: BTreeSet<_> = [key("C000001")].into();
        let load = load_segment_geometries(dir.path(), &[2023, 2022], &needed);
        assert!(load.years_missing.is_empty());
        let geometry = load.geometries.get(&key("C000001")).unwrap();
        let geojson::Value::LineString(coords) = &geometry.value else {
            panic!("expected LineString");
        };
        assert!((coords[0][0] - -110.0).abs() < f64::EPSILON);
    }

    #[test]
    fn records_years_without_exports() {
        let dir = tempfile::tempdir().unwrap();
        let needed: BTreeSet<_> = [key("C000001")].into();
        let load = load_segment_geometries(dir.path(), &[2023], &needed);
        assert!(load.geometries.is_empty());
        assert_eq!(load.years_missing, vec![2023]);
    }

    #[test]
    fn ignores_keys_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let year_dir = dir.path().join("Traffic_Yearly_Counts_2023");
        std::fs::create_dir_all(&year_dir).unwrap();
        let mut file = std::fs::File::create(year_dir.join("TYC_2023.json")).unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            feature_json("C000009", -110.0)
        )
        .unwrap();

        let needed: BTreeSet<_> = [key("C000001")].into();
        let load = load_segment_geometries(dir.path(), &[2023], &needed);
        assert!(load.geometries.is_empty());
    }
}
