//! Multi-year AADT averaging.
//!
//! The match policy is an explicit ordered list of strategies rather than
//! nested conditionals so it can be audited and tested in isolation. Each
//! year contributes at most one observation (the first strategy for that
//! year that hits), and all matches are exact key equality.

use crash_map_models::{AadtTable, SegmentKey};
use serde::{Deserialize, Serialize};

use crate::ANALYSIS_YEARS;

/// Which identifier a strategy matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyKind {
    /// Full segment key: corridor, span, and departmental route.
    Primary,
    /// Route-independent span key, for mid-period route renumbering.
    Span,
}

/// One step of the match policy: look up a single year by a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStrategy {
    /// Source year to search.
    pub year: u16,
    /// Key to match with.
    pub kind: KeyKind,
}

/// The ordered match policy: the two most recent years by primary key
/// only, then each older year by primary key with a span-key fallback.
#[must_use]
pub fn match_strategies() -> Vec<MatchStrategy> {
    let mut strategies = Vec::with_capacity(ANALYSIS_YEARS.len() * 2 - 2);
    for (position, &year) in ANALYSIS_YEARS.iter().enumerate() {
        strategies.push(MatchStrategy {
            year,
            kind: KeyKind::Primary,
        });
        if position >= 2 {
            strategies.push(MatchStrategy {
                year,
                kind: KeyKind::Span,
            });
        }
    }
    strategies
}

/// A defined multi-year traffic average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAverage {
    /// Mean of the matched yearly AADT values.
    pub aadt: f64,
    /// Number of distinct years that contributed. Always >= 1; a value of
    /// one flags a low-confidence average for downstream consumers.
    pub years_used: u32,
}

/// Averages a segment's AADT across the analysis years using the ordered
/// match policy. Returns `None` when no year matched at all: the
/// segment's traffic volume is undefined, which downstream propagates as
/// an undefined crash rate rather than an error.
#[must_use]
pub fn average_aadt(key: &SegmentKey, tables: &[AadtTable]) -> Option<TrafficAverage> {
    let span = key.span();
    let mut sum = 0.0;
    let mut matched_years: Vec<u16> = Vec::with_capacity(ANALYSIS_YEARS.len());

    for strategy in match_strategies() {
        if matched_years.contains(&strategy.year) {
            continue;
        }
        let Some(table) = tables.iter().find(|t| t.year == strategy.year) else {
            continue;
        };
        let value = match strategy.kind {
            KeyKind::Primary => table.get(key),
            KeyKind::Span => table.get_span(&span),
        };
        if let Some(aadt) = value {
            sum += aadt;
            matched_years.push(strategy.year);
        }
    }

    let years_used = u32::try_from(matched_years.len()).ok()?;
    if years_used == 0 {
        return None;
    }
    Some(TrafficAverage {
        aadt: sum / f64::from(years_used),
        years_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(route: &str) -> SegmentKey {
        SegmentKey {
            corridor_id: "C000001".into(),
            start_ref: "000+0.0000".into(),
            end_ref: "001+0.0000".into(),
            route_id: route.into(),
        }
    }

    fn table(year: u16, entries: &[(&str, f64)]) -> AadtTable {
        let mut table = AadtTable::new(year);
        for &(route, aadt) in entries {
            table.insert(key(route), aadt);
        }
        table
    }

    #[test]
    fn policy_order_is_recent_primary_then_span_fallbacks() {
        let strategies = match_strategies();
        let expected = [
            (2023, KeyKind::Primary),
            (2022, KeyKind::Primary),
            (2021, KeyKind::Primary),
            (2021, KeyKind::Span),
            (2020, KeyKind::Primary),
            (2020, KeyKind::Span),
            (2019, KeyKind::Primary),
            (2019, KeyKind::Span),
        ];
        let actual: Vec<_> = strategies.iter().map(|s| (s.year, s.kind)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn averages_all_matched_years() {
        let tables = vec![
            table(2023, &[("N-1", 5000.0)]),
            table(2022, &[("N-1", 4000.0)]),
            table(2021, &[("N-1", 4500.0)]),
        ];
        let average = average_aadt(&key("N-1"), &tables).unwrap();
        assert_eq!(average.years_used, 3);
        assert!((average.aadt - 4500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn two_year_fallback_scenario() {
        // 2023 absent; 2022 matches by primary key, 2021 only via the
        // span fallback after a route renumbering.
        let tables = vec![
            table(2023, &[]),
            table(2022, &[("N-1", 4000.0)]),
            table(2021, &[("N-1A", 4200.0)]),
        ];
        let average = average_aadt(&key("N-1"), &tables).unwrap();
        assert_eq!(average.years_used, 2);
        assert!((average.aadt - 4100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn recent_years_never_use_span_fallback() {
        // The 2022 row only exists under a different route id; without a
        // span strategy for 2022 it must not match.
        let tables = vec![table(2022, &[("N-1A", 4000.0)])];
        assert!(average_aadt(&key("N-1"), &tables).is_none());
    }

    #[test]
    fn single_year_average_is_defined_and_flagged() {
        let tables = vec![table(2019, &[("N-1", 3000.0)])];
        let average = average_aadt(&key("N-1"), &tables).unwrap();
        assert_eq!(average.years_used, 1);
        assert!((average.aadt - 3000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn no_matched_year_is_undefined() {
        assert!(average_aadt(&key("N-1"), &[]).is_none());
    }

    #[test]
    fn primary_match_shadows_span_for_same_year() {
        let mut shadowed = AadtTable::new(2021);
        shadowed.insert(key("N-1"), 4000.0);
        shadowed.insert(key("N-1A"), 9000.0);
        let average = average_aadt(&key("N-1"), &[shadowed]).unwrap();
        assert_eq!(average.years_used, 1);
        assert!((average.aadt - 4000.0).abs() < f64::EPSILON);
    }
}
