//! Length-weighted crash-rate statistics across road-class partitions.
//!
//! Consumes the merged crash-rate artifact, classifies each segment
//! against municipal boundaries, and computes the length-weighted average
//! crash rate for the seven named partitions. Segments with an undefined
//! crash rate are excluded from both the numerator and the denominator of
//! every average (never treated as zero), and segments touching an
//! excluded consolidated government contribute to no partition at all.

use std::path::PathBuf;

use crash_map_ingest::progress::ProgressCallback;
use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::AnalyticsError;
use crate::municipal::{Membership, MunicipalIndex};

/// File name of the partition statistics artifact.
pub const VMT_STATISTICS_CSV: &str = "vmt_statistics.csv";

/// Mean radius used for geometric length fallbacks, in miles.
const EARTH_RADIUS_MILES: f64 = 3958.8;

/// The seven road-class partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Partition {
    /// Every on-system segment, regardless of municipality.
    AllOnSystem,
    /// Segments outside municipal limits.
    Outside,
    /// Non-interstate segments outside municipal limits.
    NonInterstateOutside,
    /// Interstate segments outside municipal limits.
    InterstateOutside,
    /// Segments inside municipal limits.
    Inside,
    /// Non-interstate segments inside municipal limits.
    NonInterstateInside,
    /// Interstate segments inside municipal limits.
    InterstateInside,
}

impl Partition {
    /// All partitions, in reporting order.
    pub const ALL: [Self; 7] = [
        Self::AllOnSystem,
        Self::Outside,
        Self::NonInterstateOutside,
        Self::InterstateOutside,
        Self::Inside,
        Self::NonInterstateInside,
        Self::InterstateInside,
    ];

    /// Human-readable report label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllOnSystem => "All on-system roads",
            Self::Outside => "All roads OUTSIDE municipality limits",
            Self::NonInterstateOutside => "Non-interstates OUTSIDE municipality limits",
            Self::InterstateOutside => "Interstates OUTSIDE municipality limits",
            Self::Inside => "All roads INSIDE municipality limits",
            Self::NonInterstateInside => "Non-interstates INSIDE municipality limits",
            Self::InterstateInside => "Interstates INSIDE municipality limits",
        }
    }

    /// Partition membership predicate. Excluded segments belong to no
    /// partition.
    #[must_use]
    pub const fn contains(self, interstate: bool, membership: Membership) -> bool {
        if matches!(membership, Membership::Excluded) {
            return false;
        }
        let inside = matches!(membership, Membership::Inside);
        match self {
            Self::AllOnSystem => true,
            Self::Outside => !inside,
            Self::NonInterstateOutside => !inside && !interstate,
            Self::InterstateOutside => !inside && interstate,
            Self::Inside => inside,
            Self::NonInterstateInside => inside && !interstate,
            Self::InterstateInside => inside && interstate,
        }
    }
}

/// One merged segment prepared for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSample {
    /// Composite segment key, for diagnostics.
    pub segment_key: String,
    /// Section length in miles (official, or geometric fallback).
    pub length_mi: f64,
    /// Crash rate per 100M VMT; `None` when undefined.
    pub crash_rate: Option<f64>,
    /// Whether the segment is signed or designated as an interstate.
    pub interstate: bool,
    /// Municipal boundary classification.
    pub membership: Membership,
    /// Crashes over the analysis period.
    pub total_crashes: u64,
    /// Daily vehicle-miles traveled (length x AADT).
    pub daily_vmt: f64,
}

/// Aggregate statistics for one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionStats {
    /// Partition name (`SCREAMING_SNAKE_CASE`).
    pub partition: String,
    /// Segments contributing to the average.
    pub segments: usize,
    /// Total road miles across contributing segments.
    pub total_length_mi: f64,
    /// Total crashes across contributing segments.
    pub total_crashes: u64,
    /// Total daily vehicle-miles traveled.
    pub total_daily_vmt: f64,
    /// Length-weighted average crash rate per 100M VMT; `None` when the
    /// partition has no contributing road miles.
    pub weighted_rate_per_100m_vmt: Option<f64>,
    /// Expected miles driven per crash at the weighted rate.
    pub expected_miles_per_crash: Option<f64>,
}

/// Computes the length-weighted statistics for one partition. The sum is
/// associative and commutative, so the result is invariant to segment
/// ordering.
#[must_use]
pub fn partition_stats(partition: Partition, samples: &[SegmentSample]) -> PartitionStats {
    let mut weighted_sum = 0.0;
    let mut total_length = 0.0;
    let mut total_crashes = 0u64;
    let mut total_daily_vmt = 0.0;
    let mut segments = 0usize;

    for sample in samples {
        let Some(rate) = sample.crash_rate else {
            continue;
        };
        if !partition.contains(sample.interstate, sample.membership) {
            continue;
        }
        weighted_sum += rate * sample.length_mi;
        total_length += sample.length_mi;
        total_crashes += sample.total_crashes;
        total_daily_vmt += sample.daily_vmt;
        segments += 1;
    }

    let weighted_rate = (total_length > 0.0).then(|| weighted_sum / total_length);
    let expected_miles_per_crash = weighted_rate
        .filter(|rate| *rate > 0.0)
        .map(|rate| 100_000_000.0 / rate);

    PartitionStats {
        partition: partition.to_string(),
        segments,
        total_length_mi: total_length,
        total_crashes,
        total_daily_vmt,
        weighted_rate_per_100m_vmt: weighted_rate,
        expected_miles_per_crash,
    }
}

/// Computes all seven partitions in reporting order.
#[must_use]
pub fn compute_partition_stats(samples: &[SegmentSample]) -> Vec<PartitionStats> {
    Partition::ALL
        .iter()
        .map(|&partition| partition_stats(partition, samples))
        .collect()
}

/// Input and output locations for the statistics pass.
#[derive(Debug, Clone)]
pub struct VmtConfig {
    /// Merged crash-rate `GeoJSON` produced by the merge pass.
    pub traffic_geojson: PathBuf,
    /// Municipal boundaries `GeoJSON`.
    pub municipalities_geojson: PathBuf,
    /// Directory the statistics artifact is written to.
    pub output_dir: PathBuf,
}

/// Runs the partition statistics pass and writes the summary CSV.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if an input file is missing or unreadable,
/// or the artifact cannot be written.
pub fn run_vmt_stats(
    config: &VmtConfig,
    progress: &dyn ProgressCallback,
) -> Result<Vec<PartitionStats>, AnalyticsError> {
    let index = MunicipalIndex::load(&config.municipalities_geojson)?;

    let content = std::fs::read_to_string(&config.traffic_geojson)?;
    let geojson = content.parse::<GeoJson>().map_err(AnalyticsError::GeoJson)?;
    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        _ => Vec::new(),
    };

    progress.set_total(features.len() as u64);
    let mut samples = Vec::with_capacity(features.len());
    let mut skipped = 0u64;
    for feature in &features {
        match sample_from_feature(feature, &index) {
            Some(sample) => samples.push(sample),
            None => skipped += 1,
        }
        progress.inc(1);
    }
    progress.finish(format!("Classified {} segments", samples.len()));

    if skipped > 0 {
        log::warn!("Skipped {skipped} features without usable length or geometry");
    }

    let stats = compute_partition_stats(&samples);

    std::fs::create_dir_all(&config.output_dir)?;
    let csv_path = config.output_dir.join(VMT_STATISTICS_CSV);
    let mut writer = csv::Writer::from_path(&csv_path)?;
    for row in &stats {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!("Wrote partition statistics to {}", csv_path.display());

    log_report(&stats);
    Ok(stats)
}

/// Builds one aggregation sample from a merged feature. Returns `None`
/// when the feature lacks both an official length and line geometry to
/// measure; such features are skip-counted by the caller.
fn sample_from_feature(feature: &Feature, index: &MunicipalIndex) -> Option<SegmentSample> {
    let props = feature.properties.as_ref()?;
    let geometry = feature.geometry.as_ref()?;
    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;

    let length_mi = prop_f64(props, "SEC_LNT_MI")
        .filter(|length| *length > 0.0)
        .or_else(|| geometry_length_miles(&geo_geom))?;

    let signed_route = prop_str(props, "SIGNED_ROUTE");
    let route_id = prop_str(props, "DEPT_ID");
    let interstate = signed_route.starts_with("I-") || route_id.starts_with("I-");

    let aadt = prop_f64(props, "TYC_AADT").unwrap_or(0.0);
    let daily_vmt = if aadt > 0.0 { length_mi * aadt } else { 0.0 };

    Some(SegmentSample {
        segment_key: prop_str(props, "SEGMENT_KEY"),
        length_mi,
        crash_rate: prop_f64(props, "PER_100M_VMT"),
        interstate,
        membership: index.classify(&geo_geom),
        total_crashes: prop_f64(props, "TOTAL_CRASHES").map_or(0, |v| v as u64),
        daily_vmt,
    })
}

fn prop_str(props: &serde_json::Map<String, Value>, name: &str) -> String {
    props
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Reads a numeric property, tolerating numbers serialized as strings.
fn prop_f64(props: &serde_json::Map<String, Value>, name: &str) -> Option<f64> {
    match props.get(name) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn haversine_miles(a: geo::Coord<f64>, b: geo::Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lat = (b.y - a.y).to_radians();
    let delta_lon = (b.x - a.x).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().atan2((1.0 - h).sqrt())
}

fn line_length_miles(line: &geo::LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|pair| haversine_miles(pair[0], pair[1]))
        .sum()
}

/// Geometric length fallback for features without an official section
/// length. Only line geometry has a meaningful length here.
fn geometry_length_miles(geometry: &geo::Geometry<f64>) -> Option<f64> {
    match geometry {
        geo::Geometry::LineString(line) => Some(line_length_miles(line)),
        geo::Geometry::MultiLineString(lines) => {
            Some(lines.0.iter().map(line_length_miles).sum())
        }
        _ => None,
    }
}

fn log_report(stats: &[PartitionStats]) {
    for row in stats {
        log::info!(
            "{}: {} segments, {:.2} road miles, {} crashes, weighted rate {}",
            row.partition,
            row.segments,
            row.total_length_mi,
            row.total_crashes,
            row.weighted_rate_per_100m_vmt
                .map_or_else(|| "undefined".to_string(), |rate| format!("{rate:.2}")),
        );
    }

    let rate_of = |name: &str| {
        stats
            .iter()
            .find(|row| row.partition == name)
            .and_then(|row| row.weighted_rate_per_100m_vmt)
    };
    if let (Some(inside), Some(outside)) = (rate_of("INSIDE"), rate_of("OUTSIDE"))
        && outside > 0.0
    {
        log::info!(
            "Crash rate ratio (inside/outside municipalities): {:.2}x",
            inside / outside
        );
    }
    if let (Some(non_interstate), Some(interstate)) = (
        rate_of("NON_INTERSTATE_OUTSIDE"),
        rate_of("INTERSTATE_OUTSIDE"),
    ) && interstate > 0.0
    {
        log::info!(
            "Crash rate ratio (non-interstate/interstate, outside): {:.2}x",
            non_interstate / interstate
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(
        rate: Option<f64>,
        length: f64,
        interstate: bool,
        membership: Membership,
    ) -> SegmentSample {
        SegmentSample {
            segment_key: "C000001_000+0.0000_001+0.0000_N-1".into(),
            length_mi: length,
            crash_rate: rate,
            interstate,
            membership,
            total_crashes: 1,
            daily_vmt: length * 1000.0,
        }
    }

    #[test]
    fn weights_rates_by_length() {
        let samples = vec![
            sample(Some(2.0), 1.0, false, Membership::Outside),
            sample(Some(4.0), 3.0, false, Membership::Outside),
        ];
        let stats = partition_stats(Partition::Outside, &samples);
        assert_eq!(stats.segments, 2);
        assert!((stats.weighted_rate_per_100m_vmt.unwrap() - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn average_is_order_invariant() {
        let mut samples = vec![
            sample(Some(1.0), 2.0, false, Membership::Outside),
            sample(Some(5.0), 0.5, false, Membership::Outside),
            sample(Some(3.0), 4.0, false, Membership::Outside),
        ];
        let forward = partition_stats(Partition::Outside, &samples);
        samples.reverse();
        let backward = partition_stats(Partition::Outside, &samples);
        assert_eq!(
            forward.weighted_rate_per_100m_vmt,
            backward.weighted_rate_per_100m_vmt
        );
    }

    #[test]
    fn null_rates_are_excluded_not_zeroed() {
        let samples = vec![
            sample(Some(2.0), 1.0, false, Membership::Outside),
            sample(None, 100.0, false, Membership::Outside),
        ];
        let stats = partition_stats(Partition::Outside, &samples);
        assert_eq!(stats.segments, 1);
        assert!((stats.total_length_mi - 1.0).abs() < f64::EPSILON);
        assert!((stats.weighted_rate_per_100m_vmt.unwrap() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn excluded_municipalities_contribute_to_no_partition() {
        let samples = vec![sample(Some(2.0), 1.0, true, Membership::Excluded)];
        for partition in Partition::ALL {
            let stats = partition_stats(partition, &samples);
            assert_eq!(stats.segments, 0, "{partition}");
            assert_eq!(stats.weighted_rate_per_100m_vmt, None);
        }
    }

    #[test]
    fn interstate_outside_lands_in_three_partitions() {
        let member_of: Vec<Partition> = Partition::ALL
            .into_iter()
            .filter(|p| p.contains(true, Membership::Outside))
            .collect();
        assert_eq!(
            member_of,
            vec![
                Partition::AllOnSystem,
                Partition::Outside,
                Partition::InterstateOutside
            ]
        );
    }

    #[test]
    fn empty_partition_has_undefined_rate() {
        let stats = partition_stats(Partition::InterstateInside, &[]);
        assert_eq!(stats.weighted_rate_per_100m_vmt, None);
        assert_eq!(stats.expected_miles_per_crash, None);
    }

    #[test]
    fn one_degree_of_latitude_is_about_69_miles() {
        let line = geo::LineString::from(vec![(0.0, 0.0), (0.0, 1.0)]);
        let length = line_length_miles(&line);
        assert!((length - 69.09).abs() < 0.1, "{length}");
    }
}
