#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared data model for the crash-map pipeline.
//!
//! Defines the composite identifiers used to join crash and traffic-count
//! records to highway segments across source years, the departmental route
//! taxonomy, and the enriched per-segment record produced by the merge pass.
//! All types are plain data; the matching and averaging policies that
//! consume them live in `crash_map_corridor` and `crash_map_traffic`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Composite identity of a highway segment, stable across source years.
///
/// The milepost references are kept as the raw source strings (`"663+0.0150"`
/// form) so the key round-trips byte-for-byte with the yearly count files;
/// parsed numeric mileposts live on [`Segment`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentKey {
    /// Corridor identifier (e.g. `"C000001"`), trimmed and uppercased.
    pub corridor_id: String,
    /// Raw starting milepost reference.
    pub start_ref: String,
    /// Raw ending milepost reference.
    pub end_ref: String,
    /// Departmental route (e.g. `"N-1"`, `"I-90"`), trimmed and uppercased.
    pub route_id: String,
}

impl SegmentKey {
    /// Returns the route-independent span identity used as the fallback
    /// match key when a departmental route was renumbered mid-period.
    #[must_use]
    pub fn span(&self) -> SpanKey {
        SpanKey {
            corridor_id: self.corridor_id.clone(),
            start_ref: self.start_ref.clone(),
            end_ref: self.end_ref.clone(),
        }
    }

    /// Classifies the segment by its departmental route prefix.
    #[must_use]
    pub fn route_class(&self) -> RouteClass {
        RouteClass::from_route_id(&self.route_id)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.corridor_id, self.start_ref, self.end_ref, self.route_id
        )
    }
}

/// Route-independent segment span: corridor plus raw milepost range.
///
/// Two yearly count rows with equal span keys describe the same physical
/// stretch of road even if the departmental route designation changed
/// between years.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanKey {
    /// Corridor identifier.
    pub corridor_id: String,
    /// Raw starting milepost reference.
    pub start_ref: String,
    /// Raw ending milepost reference.
    pub end_ref: String,
}

/// Road classification derived from the departmental route prefix.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteClass {
    /// `I-` routes (Interstate system).
    Interstate,
    /// `N-` routes (National Highway System, signed as US highways).
    National,
    /// `P-` routes (state primary highways).
    Primary,
    /// `S-` routes (state secondary highways).
    Secondary,
    /// `U-` routes (urban system).
    Urban,
    /// `R-`/`L-`/`X-` and anything unrecognized (ramps, local, frontage).
    OffSystem,
}

impl RouteClass {
    /// Classifies a departmental route string by its leading letter.
    #[must_use]
    pub fn from_route_id(route_id: &str) -> Self {
        match route_id.trim_start().chars().next() {
            Some('I' | 'i') => Self::Interstate,
            Some('N' | 'n') => Self::National,
            Some('P' | 'p') => Self::Primary,
            Some('S' | 's') => Self::Secondary,
            Some('U' | 'u') => Self::Urban,
            _ => Self::OffSystem,
        }
    }

    /// Whether this class is part of the state-maintained on-system network
    /// (Interstate, US, or state highway).
    #[must_use]
    pub const fn is_on_system(self) -> bool {
        matches!(
            self,
            Self::Interstate | Self::National | Self::Primary | Self::Secondary
        )
    }
}

/// A stretch of road loaded from the base-year traffic count file.
///
/// Immutable once loaded; one record per physical stretch per source year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Composite identity shared with the yearly count files.
    pub key: SegmentKey,
    /// Parsed starting milepost, in miles along the corridor.
    pub start_mp: f64,
    /// Parsed ending milepost.
    pub end_mp: f64,
    /// Official section length in miles, when present.
    pub length_mi: Option<f64>,
    /// AADT observed in the base year, when present.
    pub base_aadt: Option<f64>,
}

/// A single crash report located by corridor and milepost reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    /// Corridor identifier, trimmed and uppercased.
    pub corridor_id: String,
    /// Raw milepost reference of the crash location.
    pub ref_point: String,
    /// Reporting county, when present.
    pub county: Option<String>,
    /// Source severity code, carried through without interpretation.
    pub severity: Option<String>,
}

/// AADT observations for one source year, indexed by both the primary
/// segment key and the route-independent span key.
///
/// The first row loaded wins on duplicate keys; matching is exact equality
/// only, never nearest-key.
#[derive(Debug, Clone, Default)]
pub struct AadtTable {
    /// Source year the observations were published for.
    pub year: u16,
    by_key: BTreeMap<SegmentKey, f64>,
    by_span: BTreeMap<SpanKey, f64>,
}

impl AadtTable {
    /// Creates an empty table for `year`.
    #[must_use]
    pub fn new(year: u16) -> Self {
        Self {
            year,
            by_key: BTreeMap::new(),
            by_span: BTreeMap::new(),
        }
    }

    /// Records an observation under both keys, keeping the first value seen.
    pub fn insert(&mut self, key: SegmentKey, aadt: f64) {
        self.by_span.entry(key.span()).or_insert(aadt);
        self.by_key.entry(key).or_insert(aadt);
    }

    /// Exact lookup by the full segment key.
    #[must_use]
    pub fn get(&self, key: &SegmentKey) -> Option<f64> {
        self.by_key.get(key).copied()
    }

    /// Exact lookup by the route-independent span key.
    #[must_use]
    pub fn get_span(&self, span: &SpanKey) -> Option<f64> {
        self.by_span.get(span).copied()
    }

    /// Number of distinct segment keys with an observation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the table holds no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// A segment enriched with crash counts, averaged traffic, and the
/// normalized crash-rate metric. Produced once by the merge pass and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedSegment {
    /// Composite segment identity.
    pub key: SegmentKey,
    /// Departmental route classification.
    pub route_class: RouteClass,
    /// Public signed route name (e.g. `"US-93"`), when a mapping exists.
    pub signed_route: Option<String>,
    /// Official section length in miles.
    pub length_mi: Option<f64>,
    /// AADT averaged over the matched years; `None` when no year matched.
    pub averaged_aadt: Option<f64>,
    /// Number of years that contributed to the average. Zero iff
    /// `averaged_aadt` is `None`; one flags a low-confidence average.
    pub years_used: u32,
    /// Crashes matched to this segment over the analysis period.
    pub crash_count: u64,
    /// Crashes per year over the analysis period.
    pub avg_annual_crashes: f64,
    /// Crashes per 100 million vehicle-miles traveled; `None` when the
    /// segment's traffic volume or length is zero or unknown.
    pub crash_rate_per_100m_vmt: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(route_id: &str) -> SegmentKey {
        SegmentKey {
            corridor_id: "C000001".into(),
            start_ref: "000+0.0000".into(),
            end_ref: "001+0.5000".into(),
            route_id: route_id.into(),
        }
    }

    #[test]
    fn segment_key_displays_underscore_joined() {
        assert_eq!(key("N-1").to_string(), "C000001_000+0.0000_001+0.5000_N-1");
    }

    #[test]
    fn span_key_drops_route_id() {
        let a = key("N-1").span();
        let b = key("N-1A").span();
        assert_eq!(a, b);
    }

    #[test]
    fn classifies_route_prefixes() {
        assert_eq!(RouteClass::from_route_id("I-90"), RouteClass::Interstate);
        assert_eq!(RouteClass::from_route_id("N-1"), RouteClass::National);
        assert_eq!(RouteClass::from_route_id("P-21"), RouteClass::Primary);
        assert_eq!(RouteClass::from_route_id("S-279"), RouteClass::Secondary);
        assert_eq!(RouteClass::from_route_id("U-8133"), RouteClass::Urban);
        assert_eq!(RouteClass::from_route_id("X-12345"), RouteClass::OffSystem);
        assert_eq!(RouteClass::from_route_id(""), RouteClass::OffSystem);
    }

    #[test]
    fn on_system_excludes_urban_and_ramps() {
        assert!(RouteClass::Interstate.is_on_system());
        assert!(RouteClass::Secondary.is_on_system());
        assert!(!RouteClass::Urban.is_on_system());
        assert!(!RouteClass::OffSystem.is_on_system());
    }

    #[test]
    fn aadt_table_keeps_first_value_on_duplicates() {
        let mut table = AadtTable::new(2023);
        table.insert(key("N-1"), 4000.0);
        table.insert(key("N-1"), 9999.0);
        assert_eq!(table.get(&key("N-1")), Some(4000.0));
        assert_eq!(table.get_span(&key("N-1").span()), Some(4000.0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn span_lookup_matches_renumbered_route() {
        let mut table = AadtTable::new(2021);
        table.insert(key("N-1A"), 4200.0);
        assert_eq!(table.get(&key("N-1")), None);
        assert_eq!(table.get_span(&key("N-1").span()), Some(4200.0));
    }
}
