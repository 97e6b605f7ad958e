//! File-path conventions for the external geometry simplifier.
//!
//! The simplifier itself is a separate tool; the pipeline only agrees with
//! it on naming. For an input `{base}.geojson` it produces one file per
//! fixed map scale, `{base}-{scale}.geojson`, in the same directory.

use std::path::{Path, PathBuf};

use strum_macros::{AsRefStr, Display, EnumString};

/// The four fixed simplification scales, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum SimplifyScale {
    /// 1:10,000,000, statewide overview.
    #[strum(serialize = "10m")]
    TenMillion,
    /// 1:5,000,000.
    #[strum(serialize = "5m")]
    FiveMillion,
    /// 1:1,000,000.
    #[strum(serialize = "1m")]
    OneMillion,
    /// 1:500,000, corridor detail.
    #[strum(serialize = "500k")]
    FiveHundredK,
}

impl SimplifyScale {
    /// All scales, coarsest first.
    pub const ALL: [Self; 4] = [
        Self::TenMillion,
        Self::FiveMillion,
        Self::OneMillion,
        Self::FiveHundredK,
    ];
}

/// The simplifier's output path for `base` at `scale`.
#[must_use]
pub fn simplified_path(base: &Path, scale: SimplifyScale) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.with_file_name(format!("{stem}-{scale}.geojson"))
}

/// All four expected simplifier outputs for `base`, coarsest first.
#[must_use]
pub fn expected_outputs(base: &Path) -> [PathBuf; 4] {
    SimplifyScale::ALL.map(|scale| simplified_path(base, scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_display_as_map_suffixes() {
        assert_eq!(SimplifyScale::OneMillion.to_string(), "1m");
        assert_eq!(SimplifyScale::FiveHundredK.to_string(), "500k");
    }

    #[test]
    fn builds_suffixed_sibling_paths() {
        let base = Path::new("output/merged_data/merged_traffic_lines.geojson");
        assert_eq!(
            simplified_path(base, SimplifyScale::OneMillion),
            Path::new("output/merged_data/merged_traffic_lines-1m.geojson")
        );
    }

    #[test]
    fn expects_one_output_per_scale() {
        let outputs = expected_outputs(Path::new("lines.geojson"));
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs[0], Path::new("lines-10m.geojson"));
        assert_eq!(outputs[3], Path::new("lines-500k.geojson"));
    }
}
