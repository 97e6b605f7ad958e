#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory corridor interval index for record-to-segment matching.
//!
//! Built once from the loaded segment universe, read-only afterwards.
//! Each corridor holds its segments sorted by starting milepost; lookups
//! binary-search for the last segment starting at or before the query
//! milepost and accept it when the milepost is within the segment's end.
//!
//! Boundary rule: a milepost shared by two adjacent segments belongs to
//! the downstream segment (the one starting there), because the binary
//! search lands on the later start. The final segment of a corridor keeps
//! its end inclusive so corridor endpoints are not dropped. Every milepost
//! is therefore assigned to at most one segment.

use std::collections::BTreeMap;

use crash_map_models::{Segment, SegmentKey};

struct Interval {
    start: f64,
    end: f64,
    key: SegmentKey,
}

/// Per-corridor interval lists, sorted by starting milepost.
pub struct CorridorIndex {
    corridors: BTreeMap<String, Vec<Interval>>,
    segments: usize,
}

impl CorridorIndex {
    /// Builds the index from the segment universe. Segments with a
    /// reversed milepost range are indexed as-is and simply never match.
    #[must_use]
    pub fn build(segments: &[Segment]) -> Self {
        let mut corridors: BTreeMap<String, Vec<Interval>> = BTreeMap::new();
        for segment in segments {
            corridors
                .entry(segment.key.corridor_id.clone())
                .or_default()
                .push(Interval {
                    start: segment.start_mp,
                    end: segment.end_mp,
                    key: segment.key.clone(),
                });
        }
        for intervals in corridors.values_mut() {
            intervals.sort_by(|a, b| a.start.total_cmp(&b.start));
        }
        let index = Self {
            segments: segments.len(),
            corridors,
        };
        log::debug!(
            "Corridor index: {} corridors, {} segments",
            index.corridors.len(),
            index.segments
        );
        index
    }

    /// Resolves a `(corridor, milepost)` pair to the owning segment, or
    /// `None` when the corridor is unknown or the milepost falls outside
    /// every segment. Callers count `None` results as unmatched.
    #[must_use]
    pub fn locate(&self, corridor_id: &str, milepost: f64) -> Option<&SegmentKey> {
        let intervals = self.corridors.get(corridor_id)?;
        let upper = intervals.partition_point(|iv| iv.start <= milepost);
        let candidate = &intervals[upper.checked_sub(1)?];
        (milepost <= candidate.end).then_some(&candidate.key)
    }

    /// Number of corridors in the index.
    #[must_use]
    pub fn corridor_count(&self) -> usize {
        self.corridors.len()
    }

    /// Number of segments the index was built from.
    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(corridor: &str, start: f64, end: f64, route: &str) -> Segment {
        Segment {
            key: SegmentKey {
                corridor_id: corridor.into(),
                start_ref: format!("{start:03}+0.0000"),
                end_ref: format!("{end:03}+0.0000"),
                route_id: route.into(),
            },
            start_mp: start,
            end_mp: end,
            length_mi: Some(end - start),
            base_aadt: Some(1000.0),
        }
    }

    fn index() -> CorridorIndex {
        CorridorIndex::build(&[
            segment("C000001", 0.0, 10.0, "N-1"),
            segment("C000001", 10.0, 20.0, "N-1A"),
            segment("C000002", 5.0, 6.0, "I-90"),
        ])
    }

    #[test]
    fn locates_interior_milepost() {
        let found = index().locate("C000001", 4.5).cloned().unwrap();
        assert_eq!(found.route_id, "N-1");
    }

    #[test]
    fn shared_boundary_goes_to_downstream_segment() {
        let idx = index();
        let found = idx.locate("C000001", 10.0).cloned().unwrap();
        assert_eq!(found.route_id, "N-1A");
    }

    #[test]
    fn corridor_endpoint_stays_inclusive() {
        let found = index().locate("C000001", 20.0).cloned().unwrap();
        assert_eq!(found.route_id, "N-1A");
    }

    #[test]
    fn rejects_milepost_outside_every_segment() {
        let idx = index();
        assert!(idx.locate("C000001", 25.0).is_none());
        assert!(idx.locate("C000002", 4.9).is_none());
    }

    #[test]
    fn rejects_unknown_corridor() {
        assert!(index().locate("C999999", 1.0).is_none());
    }

    #[test]
    fn counts_corridors_and_segments() {
        let idx = index();
        assert_eq!(idx.corridor_count(), 2);
        assert_eq!(idx.segment_count(), 3);
    }
}
