//! County crash ranking: crashes per 100k residents.
//!
//! Joins the five-year crash file to census county populations. County
//! matching is case-insensitive and trims whitespace; census counties
//! with zero crashes still appear in the ranking.

use std::collections::BTreeMap;
use std::path::Path;

use crash_map_ingest::{census, crashes};
use crash_map_models::CrashRecord;
use serde::{Deserialize, Serialize};

use crate::AnalyticsError;

/// One county's crash totals and population-normalized rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyRanking {
    /// County name, title-cased.
    #[serde(rename = "county")]
    pub county: String,
    /// Crashes reported in the county over the analysis period.
    #[serde(rename = "totalAccidents")]
    pub total_crashes: u64,
    /// Crashes per 100,000 residents; `None` when the county has no
    /// census population.
    #[serde(rename = "accidentsPer100kResidents")]
    pub per_100k_residents: Option<f64>,
}

/// Builds the ranking from loaded records and populations, sorted
/// descending by rate with missing rates last.
#[must_use]
pub fn county_rankings(
    records: &[CrashRecord],
    populations: &BTreeMap<String, u64>,
) -> Vec<CountyRanking> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let Some(county) = &record.county else {
            continue;
        };
        let name = county.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        *counts.entry(name).or_insert(0) += 1;
    }

    // Census counties with no crashes still rank (at zero).
    for county in populations.keys() {
        counts.entry(county.clone()).or_insert(0);
    }

    let mut rankings: Vec<CountyRanking> = counts
        .into_iter()
        .map(|(county, total_crashes)| {
            let per_100k_residents = populations
                .get(&county)
                .filter(|&&population| population > 0)
                .map(|&population| {
                    #[allow(clippy::cast_precision_loss)]
                    let rate = total_crashes as f64 / population as f64 * 100_000.0;
                    rate
                });
            CountyRanking {
                county: title_case(&county),
                total_crashes,
                per_100k_residents,
            }
        })
        .collect();

    rankings.sort_by(|a, b| {
        let rate = |r: &CountyRanking| r.per_100k_residents.unwrap_or(-1.0);
        rate(b).total_cmp(&rate(a))
    });
    rankings
}

/// Loads the inputs, builds the ranking, and writes it as CSV.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if either input file is missing or
/// unreadable, or the output cannot be written.
pub fn run_county_rankings(
    crash_csv: &Path,
    census_csv: &Path,
    output_path: &Path,
) -> Result<Vec<CountyRanking>, AnalyticsError> {
    let crash_load = crashes::load_crash_records(crash_csv)?;
    let populations = census::load_county_populations(census_csv)?;
    let rankings = county_rankings(&crash_load.records, &populations);

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output_path)?;
    for row in &rankings {
        writer.serialize(row)?;
    }
    writer.flush()?;
    log::info!(
        "Wrote {} county rankings to {}",
        rankings.len(),
        output_path.display()
    );

    Ok(rankings)
}

/// Title-cases a lowercased county name (`"lewis and clark"` ->
/// `"Lewis And Clark"`).
fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(county: Option<&str>) -> CrashRecord {
        CrashRecord {
            corridor_id: "C000001".into(),
            ref_point: "000+0.5000".into(),
            county: county.map(ToString::to_string),
            severity: None,
        }
    }

    #[test]
    fn ranks_descending_with_missing_rates_last() {
        let records = vec![
            record(Some("Gallatin")),
            record(Some("gallatin ")),
            record(Some("Mystery")),
            record(Some("Yellowstone")),
        ];
        let populations: BTreeMap<String, u64> =
            [("gallatin".into(), 100_000), ("yellowstone".into(), 50_000)].into();

        let rankings = county_rankings(&records, &populations);
        assert_eq!(rankings[0].county, "Gallatin");
        assert!((rankings[0].per_100k_residents.unwrap() - 2.0).abs() < f64::EPSILON);
        assert_eq!(rankings[1].county, "Yellowstone");
        assert_eq!(rankings.last().unwrap().county, "Mystery");
        assert_eq!(rankings.last().unwrap().per_100k_residents, None);
    }

    #[test]
    fn census_counties_without_crashes_rank_at_zero() {
        let populations: BTreeMap<String, u64> = [("toole".into(), 5000)].into();
        let rankings = county_rankings(&[], &populations);
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].county, "Toole");
        assert_eq!(rankings[0].total_crashes, 0);
        assert!(rankings[0].per_100k_residents.unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn title_cases_multi_word_counties() {
        assert_eq!(title_case("lewis and clark"), "Lewis And Clark");
        assert_eq!(title_case("toole"), "Toole");
    }
}
