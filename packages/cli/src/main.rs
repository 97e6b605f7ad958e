#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crash-map pipeline.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use crash_map_analytics::county::run_county_rankings;
use crash_map_analytics::vmt::{VmtConfig, run_vmt_stats};
use crash_map_cli_utils::{IndicatifProgress, MultiProgress};
use crash_map_generate::routes::{
    RouteGroup, default_route_groups, extract_groups, load_groups_file,
};
use crash_map_generate::{MERGED_LINES_GEOJSON, MergeConfig, run_merge};

#[derive(Parser)]
#[command(name = "crash_map", about = "Highway crash-rate merge and statistics pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge crash records and yearly traffic counts into the enriched
    /// segment artifacts
    Merge {
        /// Directory holding the `Traffic_Yearly_Counts_{year}` data
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Five-year crash records CSV
        #[arg(long, default_value = "raw-mdt-source-data/2019-2023-crash-data.csv")]
        crash_csv: PathBuf,
        /// On-system routes table (departmental -> signed route names)
        #[arg(long, default_value = "raw-mdt-source-data/Montana_On_System_Routes_OD.csv")]
        routes_csv: PathBuf,
        /// Output directory for the merged artifacts
        #[arg(long, default_value = "output/merged_data")]
        output_dir: PathBuf,
    },
    /// Compute length-weighted crash-rate averages across the road-class
    /// partitions
    VmtStats {
        /// Merged traffic lines `GeoJSON` (from `merge`)
        #[arg(long, default_value = "output/merged_data/merged_traffic_lines.geojson")]
        traffic: PathBuf,
        /// Municipal boundaries `GeoJSON`
        #[arg(long, default_value = "data/mt-municipalities-1m.geojson")]
        municipalities: PathBuf,
        /// Output directory for the statistics table
        #[arg(long, default_value = "output/vmt_statistics")]
        output_dir: PathBuf,
    },
    /// Extract per-route (or per-group) `GeoJSON` files from the merged
    /// artifact
    Routes {
        /// Comma-separated list of signed routes (e.g. "US-93,I-90")
        #[arg(long)]
        routes: Option<String>,
        /// File with one signed route per line
        #[arg(long)]
        routes_file: Option<PathBuf>,
        /// Name for one combined output containing all requested routes
        #[arg(long)]
        group: Option<String>,
        /// JSON file mapping group name -> [signed routes]
        #[arg(long)]
        groups_file: Option<PathBuf>,
        /// Input merged `GeoJSON`
        #[arg(long, default_value = "output/merged_data/merged_traffic_lines.geojson")]
        input: PathBuf,
        /// Output directory
        #[arg(long, default_value = "output/individual_roads")]
        output_dir: PathBuf,
    },
    /// Rank counties by crashes per 100k residents
    CountyRates {
        /// Five-year crash records CSV
        #[arg(long, default_value = "raw-mdt-source-data/2019-2023-crash-data.csv")]
        crash_csv: PathBuf,
        /// Census county population CSV
        #[arg(long, default_value = "data/2024-census-county.csv")]
        census_csv: PathBuf,
        /// Output CSV path
        #[arg(long, default_value = "output/ranking_by_county/ranking_by_county.csv")]
        output: PathBuf,
    },
    /// Run merge, partition statistics, default route extracts, and the
    /// county ranking in sequence
    All {
        /// Directory holding the `Traffic_Yearly_Counts_{year}` data
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Five-year crash records CSV
        #[arg(long, default_value = "raw-mdt-source-data/2019-2023-crash-data.csv")]
        crash_csv: PathBuf,
        /// On-system routes table (departmental -> signed route names)
        #[arg(long, default_value = "raw-mdt-source-data/Montana_On_System_Routes_OD.csv")]
        routes_csv: PathBuf,
        /// Municipal boundaries `GeoJSON`
        #[arg(long, default_value = "data/mt-municipalities-1m.geojson")]
        municipalities: PathBuf,
        /// Census county population CSV
        #[arg(long, default_value = "data/2024-census-county.csv")]
        census_csv: PathBuf,
        /// Root output directory
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crash_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Merge {
            data_dir,
            crash_csv,
            routes_csv,
            output_dir,
        } => {
            merge(&multi, data_dir, crash_csv, routes_csv, output_dir)?;
        }
        Commands::VmtStats {
            traffic,
            municipalities,
            output_dir,
        } => {
            vmt_stats(&multi, traffic, municipalities, output_dir)?;
        }
        Commands::Routes {
            routes,
            routes_file,
            group,
            groups_file,
            input,
            output_dir,
        } => {
            let groups = resolve_groups(routes, routes_file, group, groups_file)?;
            extract_groups(&input, &groups, &output_dir)?;
        }
        Commands::CountyRates {
            crash_csv,
            census_csv,
            output,
        } => {
            run_county_rankings(&crash_csv, &census_csv, &output)?;
        }
        Commands::All {
            data_dir,
            crash_csv,
            routes_csv,
            municipalities,
            census_csv,
            output_dir,
        } => {
            let merged_dir = output_dir.join("merged_data");
            merge(
                &multi,
                data_dir,
                crash_csv.clone(),
                routes_csv,
                merged_dir.clone(),
            )?;
            let merged = merged_dir.join(MERGED_LINES_GEOJSON);
            vmt_stats(
                &multi,
                merged.clone(),
                municipalities,
                output_dir.join("vmt_statistics"),
            )?;
            extract_groups(
                &merged,
                &default_route_groups(),
                &output_dir.join("individual_roads"),
            )?;
            run_county_rankings(
                &crash_csv,
                &census_csv,
                &output_dir.join("ranking_by_county/ranking_by_county.csv"),
            )?;
        }
    }

    log::info!("Done in {:.1?}", start.elapsed());
    Ok(())
}

fn merge(
    multi: &MultiProgress,
    data_dir: PathBuf,
    crash_csv: PathBuf,
    routes_csv: PathBuf,
    output_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = MergeConfig {
        data_dir,
        crash_csv,
        routes_csv,
        output_dir,
    };
    let progress = IndicatifProgress::records_bar(multi, "Enriching segments");
    run_merge(&config, progress.as_ref())?;
    Ok(())
}

fn vmt_stats(
    multi: &MultiProgress,
    traffic: PathBuf,
    municipalities: PathBuf,
    output_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = VmtConfig {
        traffic_geojson: traffic,
        municipalities_geojson: municipalities,
        output_dir,
    };
    let progress = IndicatifProgress::records_bar(multi, "Classifying segments");
    run_vmt_stats(&config, progress.as_ref())?;
    Ok(())
}

/// Resolves the requested route groups: an explicit groups file wins,
/// then a named combined group, then one file per requested route, and
/// finally the built-in default groups.
fn resolve_groups(
    routes: Option<String>,
    routes_file: Option<PathBuf>,
    group: Option<String>,
    groups_file: Option<PathBuf>,
) -> Result<Vec<RouteGroup>, Box<dyn std::error::Error>> {
    if let Some(path) = groups_file {
        return Ok(load_groups_file(&path)?);
    }

    let mut requested: Vec<String> = Vec::new();
    if let Some(list) = routes {
        requested.extend(
            list.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(ToString::to_string),
        );
    }
    if let Some(path) = routes_file {
        let content = std::fs::read_to_string(&path)?;
        requested.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(ToString::to_string),
        );
    }

    if let Some(name) = group {
        if requested.is_empty() {
            return Err(format!("--group {name} requires --routes or --routes-file").into());
        }
        return Ok(vec![RouteGroup {
            name,
            routes: requested,
        }]);
    }

    if requested.is_empty() {
        return Ok(default_route_groups());
    }
    Ok(requested.iter().map(|r| RouteGroup::single(r)).collect())
}
