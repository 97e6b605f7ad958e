//! In-memory spatial index for municipal boundary classification.
//!
//! Loads municipality polygons from a `GeoJSON` file, builds an R-tree,
//! and classifies segment geometry as inside or outside municipal limits.
//! Two consolidated city-county governments are tracked separately: their
//! "municipal" boundary covers an entire county, so counting them as urban
//! would skew every rural/urban comparison. Segments touching them are
//! excluded from aggregate statistics altogether.

use std::path::Path;

use geo::{BoundingRect, Intersects, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

use crate::AnalyticsError;

/// Consolidated `(county, municipality)` governments excluded from every
/// partition aggregate. This is an editorial judgment call, kept as an
/// explicit named list rather than inferred from the data.
pub const EXCLUDED_MUNICIPALITIES: [(&str, &str); 2] = [
    ("Deer Lodge", "Anaconda-Deer Lodge"),
    ("Silver Bow", "Butte-Silver Bow"),
];

/// How a segment relates to municipal boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Touches no municipal boundary.
    Outside,
    /// Intersects at least one ordinary municipality.
    Inside,
    /// Intersects an excluded consolidated city-county; the segment
    /// contributes to no partition aggregate.
    Excluded,
}

/// A municipality polygon stored in the R-tree with its metadata.
struct MunicipalEntry {
    name: String,
    excluded: bool,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for MunicipalEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over municipal boundary polygons.
///
/// Constructed once per run and read-only thereafter.
pub struct MunicipalIndex {
    boundaries: RTree<MunicipalEntry>,
    municipalities: usize,
    excluded: usize,
}

impl MunicipalIndex {
    /// Loads municipality polygons from a `GeoJSON` file and builds the
    /// R-tree index. Features without a usable polygon are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the file is missing or not parseable
    /// as `GeoJSON`.
    pub fn load(path: &Path) -> Result<Self, AnalyticsError> {
        let content = std::fs::read_to_string(path)?;
        let geojson = content
            .parse::<GeoJson>()
            .map_err(AnalyticsError::GeoJson)?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Ok(Self {
                boundaries: RTree::new(),
                municipalities: 0,
                excluded: 0,
            });
        };

        let mut entries = Vec::new();
        let mut excluded = 0usize;
        for feature in collection.features {
            let name = feature
                .properties
                .as_ref()
                .and_then(|props| props.get("NAME"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();

            let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
                log::warn!("Skipping municipality without polygon geometry: {name}");
                continue;
            };

            let is_excluded = EXCLUDED_MUNICIPALITIES
                .iter()
                .any(|&(_, municipality)| municipality == name);
            if is_excluded {
                excluded += 1;
            }

            entries.push(MunicipalEntry {
                name,
                excluded: is_excluded,
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        let index = Self {
            municipalities: entries.len(),
            excluded,
            boundaries: RTree::bulk_load(entries),
        };
        log::info!(
            "Loaded {} municipalities into spatial index ({} excluded consolidated governments)",
            index.municipalities,
            index.excluded
        );
        Ok(index)
    }

    /// Classifies a segment geometry against municipal boundaries.
    /// An excluded consolidated government takes precedence over ordinary
    /// municipalities.
    #[must_use]
    pub fn classify(&self, geometry: &geo::Geometry<f64>) -> Membership {
        let Some(rect) = geometry.bounding_rect() else {
            return Membership::Outside;
        };
        let query = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );

        let mut inside = false;
        for entry in self.boundaries.locate_in_envelope_intersecting(&query) {
            if entry.polygon.intersects(geometry) {
                if entry.excluded {
                    log::debug!("Segment intersects excluded municipality {}", entry.name);
                    return Membership::Excluded;
                }
                inside = true;
            }
        }
        if inside {
            Membership::Inside
        } else {
            Membership::Outside
        }
    }

    /// Number of municipalities loaded into the index.
    #[must_use]
    pub const fn municipality_count(&self) -> usize {
        self.municipalities
    }

    /// Number of loaded municipalities on the exclusion list.
    #[must_use]
    pub const fn excluded_count(&self) -> usize {
        self.excluded
    }
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`]. Handles both
/// `Polygon` and `MultiPolygon`; anything else is not a boundary.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
