//! Per-route extracts of the merged artifact.
//!
//! Splits `merged_traffic_lines.geojson` into per-signed-route (or named
//! group) files for focused corridor pages. Matching is exact string
//! equality on the signed route name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Value;

use crate::GenerateError;

/// Built-in route groupings for the corridor pages that ship with the map.
pub const DEFAULT_ROUTE_GROUPS: &[(&str, &[&str])] = &[
    ("flathead_area", &["MT-35", "MT-82", "MT-200/US-93"]),
    ("helena", &["S-279", "S-518"]),
    ("missoula_area", &["US-93", "US-12"]),
    ("yellowstone", &["US-89", "S-540", "S-571"]),
    ("bozeman_pass", &["I-90"]),
    ("red_lodge", &["US-212", "S-421"]),
];

/// A named set of signed routes extracted into one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGroup {
    /// Output name (sanitized into the file name).
    pub name: String,
    /// Signed routes included in the group.
    pub routes: Vec<String>,
}

impl RouteGroup {
    /// A group holding a single route, named after it.
    #[must_use]
    pub fn single(route: &str) -> Self {
        Self {
            name: route.trim().to_string(),
            routes: vec![route.trim().to_string()],
        }
    }
}

/// The built-in groups as owned values.
#[must_use]
pub fn default_route_groups() -> Vec<RouteGroup> {
    DEFAULT_ROUTE_GROUPS
        .iter()
        .map(|(name, routes)| RouteGroup {
            name: (*name).to_string(),
            routes: routes.iter().map(|r| (*r).to_string()).collect(),
        })
        .collect()
}

/// Loads groups from a JSON file mapping group name to a route array.
///
/// # Errors
///
/// Returns [`GenerateError`] if the file is missing or not valid JSON of
/// the expected shape.
pub fn load_groups_file(path: &Path) -> Result<Vec<RouteGroup>, GenerateError> {
    let content = std::fs::read_to_string(path)?;
    let parsed: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)?;
    Ok(parsed
        .into_iter()
        .map(|(name, routes)| RouteGroup { name, routes })
        .collect())
}

/// Report for one extracted group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    /// Group name as requested.
    pub group: String,
    /// Features written.
    pub features: usize,
    /// Output file path.
    pub path: PathBuf,
}

/// File-name-safe version of a group or route name.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.trim().replace(['/', ' '], "_")
}

fn signed_route_of(feature: &Feature) -> String {
    feature
        .properties
        .as_ref()
        .and_then(|props| props.get("SIGNED_ROUTE"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Extracts each group from the merged `GeoJSON` into
/// `individual_{group}.geojson` under `output_dir`.
///
/// Groups that match no features still produce an (empty) file so page
/// templates can rely on the path existing.
///
/// # Errors
///
/// Returns [`GenerateError`] if the merged file is missing or unreadable,
/// or an output file cannot be written.
pub fn extract_groups(
    merged_path: &Path,
    groups: &[RouteGroup],
    output_dir: &Path,
) -> Result<Vec<ExtractReport>, GenerateError> {
    let content = std::fs::read_to_string(merged_path)?;
    let geojson = content
        .parse::<GeoJson>()
        .map_err(crash_map_ingest::IngestError::from)?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Ok(Vec::new());
    };

    // Index once by signed route; groups then concatenate their routes'
    // features in route order.
    let mut by_route: BTreeMap<String, Vec<&Feature>> = BTreeMap::new();
    for feature in &collection.features {
        by_route.entry(signed_route_of(feature)).or_default().push(feature);
    }

    std::fs::create_dir_all(output_dir)?;
    let mut reports = Vec::with_capacity(groups.len());

    for group in groups {
        let features: Vec<Feature> = group
            .routes
            .iter()
            .filter_map(|route| by_route.get(route.trim()))
            .flatten()
            .map(|&feature| feature.clone())
            .collect();

        let out_path = output_dir.join(format!("individual_{}.geojson", sanitize_name(&group.name)));
        let extracted = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        std::fs::write(&out_path, serde_json::to_string(&extracted)?)?;

        log::info!(
            "Wrote {} features for group \"{}\" to {}",
            extracted.features.len(),
            group.name,
            out_path.display()
        );
        reports.push(ExtractReport {
            group: group.name.clone(),
            features: extracted.features.len(),
            path: out_path,
        });
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn sanitizes_group_names() {
        assert_eq!(sanitize_name("MT-200/US-93"), "MT-200_US-93");
        assert_eq!(sanitize_name("bozeman pass"), "bozeman_pass");
    }

    #[test]
    fn builds_default_groups() {
        let groups = default_route_groups();
        assert_eq!(groups.len(), DEFAULT_ROUTE_GROUPS.len());
        assert!(groups.iter().any(|g| g.name == "bozeman_pass"));
    }

    #[test]
    fn extracts_matching_features_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let merged = dir.path().join("merged_traffic_lines.geojson");
        let mut file = std::fs::File::create(&merged).unwrap();
        file.write_all(
            br#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":{"SIGNED_ROUTE":"I-90"}},
                {"type":"Feature","geometry":{"type":"LineString","coordinates":[[1,1],[2,2]]},"properties":{"SIGNED_ROUTE":"US-93"}}
            ]}"#,
        )
        .unwrap();

        let groups = vec![
            RouteGroup::single("I-90"),
            RouteGroup {
                name: "nowhere".into(),
                routes: vec!["S-000".into()],
            },
        ];
        let out_dir = dir.path().join("individual");
        let reports = extract_groups(&merged, &groups, &out_dir).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].features, 1);
        assert!(reports[0].path.ends_with("individual_I-90.geojson"));
        assert_eq!(reports[1].features, 0);
        assert!(reports[1].path.exists());
    }
}
