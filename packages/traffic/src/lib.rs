#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Traffic-volume policy for the crash-map pipeline.
//!
//! Two concerns live here: selecting a representative multi-year AADT for
//! each segment ([`average`]) and turning that volume into the normalized
//! crash-rate metric ([`rates`]). Both are pure functions over the shared
//! model types so the policies can be tested in isolation.

pub mod average;
pub mod rates;

/// Analysis years, most recent first. The first two are matched by the
/// primary segment key only; older years also get the span-key fallback
/// for segments whose departmental route was renumbered mid-period.
pub const ANALYSIS_YEARS: [u16; 5] = [2023, 2022, 2021, 2020, 2019];

/// Days in the analysis period: five years of 365 days plus the single
/// leap day (2020).
pub const ANALYSIS_PERIOD_DAYS: f64 = 1826.0;
