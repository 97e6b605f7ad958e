#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Merge orchestrator for the crash-map pipeline.
//!
//! Runs the single enrichment pass over all highway segments: loads the
//! yearly traffic counts, averages AADT per segment, matches crash records
//! through the corridor index, computes the normalized crash rate, and
//! writes the map-ready `GeoJSON` plus a flattened CSV with one-to-one row
//! correspondence. Data-quality counters are collected throughout and
//! written as a summary artifact, a required output for analysts rather
//! than optional logging.

pub mod routes;
pub mod simplify;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crash_map_corridor::CorridorIndex;
use crash_map_ingest::progress::ProgressCallback;
use crash_map_ingest::{IngestError, crashes, geometry, routes as route_names, traffic};
use crash_map_models::{AadtTable, EnrichedSegment, RouteClass, Segment, SegmentKey};
use crash_map_traffic::average::average_aadt;
use crash_map_traffic::rates::{
    average_annual_crashes, crash_rate_per_100m_vmt, vehicle_miles_traveled,
};
use crash_map_traffic::ANALYSIS_YEARS;
use geojson::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};

/// File name of the geometry-preserving merge artifact.
pub const MERGED_LINES_GEOJSON: &str = "merged_traffic_lines.geojson";

/// File name of the flattened tabular merge artifact.
pub const MERGED_LINES_CSV: &str = "merged_traffic_lines.csv";

/// File name of the data-quality summary artifact.
pub const MERGE_SUMMARY_JSON: &str = "merge_summary.json";

/// Urban routes kept in the output despite the off-system prefix filter.
/// These carry enough through-traffic to matter for corridor-level safety
/// comparisons.
pub const KEEP_URBAN_ROUTES: [&str; 5] = ["U-5832", "U-8133", "U-1216", "U-602", "U-8135"];

/// Errors that can occur during the merge pass.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// I/O error (artifact write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV artifact write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON artifact write failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A source file could not be loaded.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Input and output locations for the merge pass.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Directory holding the `Traffic_Yearly_Counts_{year}` subdirectories.
    pub data_dir: PathBuf,
    /// Five-year crash records CSV.
    pub crash_csv: PathBuf,
    /// On-system routes table (departmental -> signed route names).
    pub routes_csv: PathBuf,
    /// Directory the merge artifacts are written to.
    pub output_dir: PathBuf,
}

/// Result of the merge pass: every enriched segment (one per input
/// segment) plus the data-quality summary.
#[derive(Debug)]
pub struct MergeOutput {
    /// One enriched record per loaded segment, in file order.
    pub enriched: Vec<EnrichedSegment>,
    /// Data-quality counters for the run.
    pub summary: MergeSummary,
}

/// End-of-run data-quality counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    /// ISO 8601 timestamp of the run.
    pub generated_at: String,
    /// Base year whose count file defined the segment universe.
    pub base_year: u16,
    /// Segments loaded from the base-year file.
    pub segments_loaded: usize,
    /// Segments written to the merged artifacts.
    pub segments_written: usize,
    /// Segments whose AADT average rests on a single year (low confidence).
    pub segments_single_year: usize,
    /// Segments with no AADT observation in any searched year.
    pub segments_without_aadt: usize,
    /// Segments dropped for zero or unknown traffic volume.
    pub segments_filtered_low_volume: usize,
    /// Segments dropped by the off-system route prefix filter.
    pub segments_filtered_off_system: usize,
    /// Reportable segments with no geometry in any year's export.
    pub segments_missing_geometry: usize,
    /// Traffic rows skipped across all years for unusable identifiers.
    pub traffic_rows_skipped: u64,
    /// Crash rows read from the crash file.
    pub crash_rows_read: usize,
    /// Crash rows skipped by the loader for missing identifiers.
    pub crash_rows_skipped: u64,
    /// Crash rows whose milepost reference failed to parse.
    pub crash_rows_unparseable: u64,
    /// Crash rows matched to a segment.
    pub crash_rows_matched: u64,
    /// Crash rows whose identifier matched no segment.
    pub crash_rows_unmatched: u64,
}

impl MergeSummary {
    /// Logs the counters analysts use to judge data quality.
    pub fn log(&self) {
        log::info!(
            "Merged {} of {} segments (base year {})",
            self.segments_written,
            self.segments_loaded,
            self.base_year
        );
        log::info!(
            "Crashes: {} read, {} matched, {} unmatched, {} skipped, {} unparseable",
            self.crash_rows_read,
            self.crash_rows_matched,
            self.crash_rows_unmatched,
            self.crash_rows_skipped,
            self.crash_rows_unparseable
        );
        log::info!(
            "Traffic averages: {} single-year, {} without any AADT, {} traffic rows skipped",
            self.segments_single_year,
            self.segments_without_aadt,
            self.traffic_rows_skipped
        );
        log::info!(
            "Filtered: {} low-volume, {} off-system; {} reportable segments missing geometry",
            self.segments_filtered_low_volume,
            self.segments_filtered_off_system,
            self.segments_missing_geometry
        );
    }
}

/// Flattened per-segment output row. Serialized verbatim into both the
/// `GeoJSON` feature properties and the CSV, keeping the two artifacts in
/// one-to-one correspondence. Column names follow the MDT source files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedLineProps {
    /// Composite segment key, underscore-joined.
    #[serde(rename = "SEGMENT_KEY")]
    pub segment_key: String,
    /// Corridor identifier.
    #[serde(rename = "CORRIDOR")]
    pub corridor: String,
    /// Raw starting milepost reference.
    #[serde(rename = "CORR_MP")]
    pub start_ref: String,
    /// Raw ending milepost reference.
    #[serde(rename = "CORR_ENDMP")]
    pub end_ref: String,
    /// Internal departmental route.
    #[serde(rename = "DEPT_ID")]
    pub route_id: String,
    /// Departmental route classification.
    #[serde(rename = "ROUTE_CLASS")]
    pub route_class: RouteClass,
    /// Public signed route name, empty when unmapped.
    #[serde(rename = "SIGNED_ROUTE")]
    pub signed_route: String,
    /// Official section length in miles.
    #[serde(rename = "SEC_LNT_MI")]
    pub length_mi: Option<f64>,
    /// Multi-year averaged AADT.
    #[serde(rename = "TYC_AADT")]
    pub averaged_aadt: Option<f64>,
    /// Years contributing to the AADT average.
    #[serde(rename = "YEARS_WITH_DATA")]
    pub years_used: u32,
    /// Crashes matched over the analysis period.
    #[serde(rename = "TOTAL_CRASHES")]
    pub total_crashes: u64,
    /// Mean crashes per year.
    #[serde(rename = "AVG_CRASHES")]
    pub avg_crashes: f64,
    /// Crashes per 100 million vehicle-miles traveled; `None` when the
    /// segment's volume or length is unknown or zero.
    #[serde(rename = "PER_100M_VMT")]
    pub crash_rate: Option<f64>,
}

impl MergedLineProps {
    fn from_enriched(enriched: &EnrichedSegment) -> Self {
        Self {
            segment_key: enriched.key.to_string(),
            corridor: enriched.key.corridor_id.clone(),
            start_ref: enriched.key.start_ref.clone(),
            end_ref: enriched.key.end_ref.clone(),
            route_id: enriched.key.route_id.clone(),
            route_class: enriched.route_class,
            signed_route: enriched.signed_route.clone().unwrap_or_default(),
            length_mi: enriched.length_mi,
            averaged_aadt: enriched.averaged_aadt,
            years_used: enriched.years_used,
            total_crashes: enriched.crash_count,
            avg_crashes: enriched.avg_annual_crashes,
            crash_rate: enriched.crash_rate_per_100m_vmt,
        }
    }
}

/// Runs the full merge pass and writes the artifacts.
///
/// # Errors
///
/// Returns [`GenerateError`] if a required input file is missing or
/// unreadable, or an artifact cannot be written. Malformed rows and
/// unmatched records never abort the run; they are counted in the
/// returned [`MergeSummary`].
pub fn run_merge(
    config: &MergeConfig,
    progress: &dyn ProgressCallback,
) -> Result<MergeOutput, GenerateError> {
    let base_year = ANALYSIS_YEARS[0];
    let base_path = traffic::traffic_csv_path(&config.data_dir, base_year);
    log::info!("Loading base segments from {}", base_path.display());
    let base = traffic::load_base_segments(&base_path)?;

    let mut traffic_rows_skipped = base.skipped;
    let tables = load_aadt_tables(config, &base.segments, &mut traffic_rows_skipped)?;

    let index = CorridorIndex::build(&base.segments);
    log::info!(
        "Corridor index ready: {} corridors over {} segments",
        index.corridor_count(),
        index.segment_count()
    );

    let crash_load = crashes::load_crash_records(&config.crash_csv)?;
    let crash_match = match_crashes(&crash_load.records, &index);

    let signed_routes = route_names::load_signed_routes(&config.routes_csv)?;

    progress.set_total(base.segments.len() as u64);
    let mut enriched = Vec::with_capacity(base.segments.len());
    for segment in &base.segments {
        enriched.push(enrich_segment(
            segment,
            &tables,
            &crash_match.counts,
            &signed_routes,
        ));
        progress.inc(1);
    }
    progress.finish(format!("Enriched {} segments", enriched.len()));

    let reportable: Vec<&EnrichedSegment> = enriched.iter().filter(|e| is_reportable(e)).collect();
    let filtered_low_volume = enriched
        .iter()
        .filter(|e| !e.averaged_aadt.is_some_and(|aadt| aadt >= 1.0))
        .count();
    let filtered_off_system = enriched.len() - reportable.len() - filtered_low_volume;

    let needed: BTreeSet<SegmentKey> = reportable.iter().map(|e| e.key.clone()).collect();
    let geometry_load =
        geometry::load_segment_geometries(&config.data_dir, &ANALYSIS_YEARS, &needed);

    std::fs::create_dir_all(&config.output_dir)?;
    let written = write_artifacts(&config.output_dir, &reportable, &geometry_load.geometries)?;

    let summary = MergeSummary {
        generated_at: chrono::Utc::now().to_rfc3339(),
        base_year,
        segments_loaded: base.segments.len(),
        segments_written: written,
        segments_single_year: enriched.iter().filter(|e| e.years_used == 1).count(),
        segments_without_aadt: enriched.iter().filter(|e| e.years_used == 0).count(),
        segments_filtered_low_volume: filtered_low_volume,
        segments_filtered_off_system: filtered_off_system,
        segments_missing_geometry: reportable.len() - written,
        traffic_rows_skipped,
        crash_rows_read: crash_load.records.len(),
        crash_rows_skipped: crash_load.skipped,
        crash_rows_unparseable: crash_match.unparseable,
        crash_rows_matched: crash_match.matched,
        crash_rows_unmatched: crash_match.unmatched,
    };
    write_summary(&config.output_dir, &summary)?;
    summary.log();

    Ok(MergeOutput { enriched, summary })
}

/// Loads the AADT tables for every analysis year. The base year's table is
/// built from the already-loaded segment universe instead of re-reading
/// its file; missing older-year files are logged and skipped.
fn load_aadt_tables(
    config: &MergeConfig,
    base_segments: &[Segment],
    traffic_rows_skipped: &mut u64,
) -> Result<Vec<AadtTable>, GenerateError> {
    let base_year = ANALYSIS_YEARS[0];
    let mut base_table = AadtTable::new(base_year);
    for segment in base_segments {
        if let Some(aadt) = segment.base_aadt {
            base_table.insert(segment.key.clone(), aadt);
        }
    }

    let mut tables = vec![base_table];
    for &year in &ANALYSIS_YEARS[1..] {
        let path = traffic::traffic_csv_path(&config.data_dir, year);
        if !path.exists() {
            log::warn!("No traffic counts for {year}: {} missing", path.display());
            continue;
        }
        let load = traffic::load_year_aadt(&path, year)?;
        *traffic_rows_skipped += load.skipped;
        tables.push(load.table);
    }
    Ok(tables)
}

struct CrashMatch {
    counts: BTreeMap<SegmentKey, u64>,
    matched: u64,
    unmatched: u64,
    unparseable: u64,
}

/// Resolves every crash record against the corridor index. Unmatched and
/// unparseable rows are counted, never dropped silently.
fn match_crashes(records: &[crash_map_models::CrashRecord], index: &CorridorIndex) -> CrashMatch {
    let mut result = CrashMatch {
        counts: BTreeMap::new(),
        matched: 0,
        unmatched: 0,
        unparseable: 0,
    };
    for record in records {
        let Some(milepost) = crash_map_ingest::parsing::parse_milepost(&record.ref_point) else {
            result.unparseable += 1;
            continue;
        };
        match index.locate(&record.corridor_id, milepost) {
            Some(key) => {
                *result.counts.entry(key.clone()).or_insert(0) += 1;
                result.matched += 1;
            }
            None => result.unmatched += 1,
        }
    }
    result
}

/// Produces the write-once enriched record for one segment.
fn enrich_segment(
    segment: &Segment,
    tables: &[AadtTable],
    crash_counts: &BTreeMap<SegmentKey, u64>,
    signed_routes: &BTreeMap<String, String>,
) -> EnrichedSegment {
    let average = average_aadt(&segment.key, tables);
    let crash_count = crash_counts.get(&segment.key).copied().unwrap_or(0);

    let crash_rate = match (&average, segment.length_mi) {
        (Some(avg), Some(length)) => {
            crash_rate_per_100m_vmt(crash_count, vehicle_miles_traveled(avg.aadt, length))
        }
        _ => None,
    };

    let signed_route = signed_routes
        .get(&crash_map_ingest::parsing::strip_trailing_letter(
            &segment.key.route_id,
        ))
        .filter(|name| !name.is_empty())
        .cloned();

    EnrichedSegment {
        route_class: segment.key.route_class(),
        key: segment.key.clone(),
        signed_route,
        length_mi: segment.length_mi,
        averaged_aadt: average.as_ref().map(|avg| avg.aadt),
        years_used: average.as_ref().map_or(0, |avg| avg.years_used),
        crash_count,
        avg_annual_crashes: average_annual_crashes(crash_count),
        crash_rate_per_100m_vmt: crash_rate,
    }
}

/// Whether a segment belongs in the published artifacts: it must carry
/// real traffic volume and sit on the on-system network (with the named
/// urban-route exceptions).
fn is_reportable(enriched: &EnrichedSegment) -> bool {
    if !enriched.averaged_aadt.is_some_and(|aadt| aadt >= 1.0) {
        return false;
    }
    enriched.route_class.is_on_system()
        || KEEP_URBAN_ROUTES.contains(&enriched.key.route_id.as_str())
}

/// Writes the merged `GeoJSON` and CSV artifacts with one-to-one row
/// correspondence, returning the number of rows written. Reportable
/// segments without geometry are left out of both.
fn write_artifacts(
    output_dir: &Path,
    reportable: &[&EnrichedSegment],
    geometries: &BTreeMap<SegmentKey, geojson::Geometry>,
) -> Result<usize, GenerateError> {
    let mut features = Vec::with_capacity(reportable.len());
    let mut rows = Vec::with_capacity(reportable.len());

    for enriched in reportable {
        let Some(geometry) = geometries.get(&enriched.key) else {
            continue;
        };
        let props = MergedLineProps::from_enriched(enriched);
        let serde_json::Value::Object(properties) = serde_json::to_value(&props)? else {
            continue;
        };
        features.push(Feature {
            bbox: None,
            geometry: Some(geometry.clone()),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
        rows.push(props);
    }

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    let geojson_path = output_dir.join(MERGED_LINES_GEOJSON);
    let tmp = output_dir.join(format!("{MERGED_LINES_GEOJSON}.tmp"));
    std::fs::write(&tmp, serde_json::to_string(&collection)?)?;
    std::fs::rename(&tmp, &geojson_path)?;
    log::info!("Wrote {} lines to {}", rows.len(), geojson_path.display());

    let csv_path = output_dir.join(MERGED_LINES_CSV);
    let mut writer = csv::Writer::from_path(&csv_path)?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote {}", csv_path.display());

    Ok(rows.len())
}

/// Writes the summary artifact with an atomic rename.
fn write_summary(output_dir: &Path, summary: &MergeSummary) -> Result<(), GenerateError> {
    let path = output_dir.join(MERGE_SUMMARY_JSON);
    let tmp = output_dir.join(format!("{MERGE_SUMMARY_JSON}.tmp"));
    std::fs::write(&tmp, serde_json::to_string_pretty(summary)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crash_map_models::{CrashRecord, SegmentKey};

    fn enriched(route_id: &str, aadt: Option<f64>) -> EnrichedSegment {
        let key = SegmentKey {
            corridor_id: "C000001".into(),
            start_ref: "000+0.0000".into(),
            end_ref: "001+0.0000".into(),
            route_id: route_id.into(),
        };
        EnrichedSegment {
            route_class: key.route_class(),
            key,
            signed_route: None,
            length_mi: Some(1.0),
            averaged_aadt: aadt,
            years_used: u32::from(aadt.is_some()),
            crash_count: 0,
            avg_annual_crashes: 0.0,
            crash_rate_per_100m_vmt: None,
        }
    }

    #[test]
    fn off_system_routes_are_not_reportable() {
        assert!(is_reportable(&enriched("N-1", Some(100.0))));
        assert!(!is_reportable(&enriched("X-12345", Some(100.0))));
        assert!(!is_reportable(&enriched("U-9999", Some(100.0))));
    }

    #[test]
    fn keep_list_overrides_urban_filter() {
        assert!(is_reportable(&enriched("U-8133", Some(100.0))));
    }

    #[test]
    fn low_volume_segments_are_not_reportable() {
        assert!(!is_reportable(&enriched("N-1", Some(0.0))));
        assert!(!is_reportable(&enriched("N-1", None)));
    }

    #[test]
    fn crash_matching_accounts_for_every_row() {
        let key = SegmentKey {
            corridor_id: "C000001".into(),
            start_ref: "000+0.0000".into(),
            end_ref: "010+0.0000".into(),
            route_id: "N-1".into(),
        };
        let segments = vec![Segment {
            key: key.clone(),
            start_mp: 0.0,
            end_mp: 10.0,
            length_mi: Some(10.0),
            base_aadt: Some(5000.0),
        }];
        let index = CorridorIndex::build(&segments);

        let crash = |corridor: &str, ref_point: &str| CrashRecord {
            corridor_id: corridor.into(),
            ref_point: ref_point.into(),
            county: None,
            severity: None,
        };
        let records = vec![
            crash("C000001", "005+0.0000"),
            crash("C999999", "005+0.0000"),
            crash("C000001", "bogus"),
        ];

        let result = match_crashes(&records, &index);
        assert_eq!(result.matched, 1);
        assert_eq!(result.unmatched, 1);
        assert_eq!(result.unparseable, 1);
        assert_eq!(result.counts.get(&key), Some(&1));
        assert_eq!(result.counts.values().sum::<u64>(), 1);
    }

    #[test]
    fn props_row_mirrors_enriched_record() {
        let mut record = enriched("N-1", Some(4000.0));
        record.crash_count = 10;
        record.avg_annual_crashes = 2.0;
        record.crash_rate_per_100m_vmt = Some(2.19);
        let props = MergedLineProps::from_enriched(&record);
        assert_eq!(props.segment_key, record.key.to_string());
        assert_eq!(props.total_crashes, 10);
        assert_eq!(props.signed_route, "");
        assert_eq!(props.crash_rate, Some(2.19));
    }
}
