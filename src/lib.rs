/*!
 * # Part D Formulary Comparison Library
 *
 * A Rust library for working with Medicare Part D formulary and plan data.
 *
 * ## Features
 *
 * - 📄 **Tolerant Loading**: pipe-delimited CMS extracts decoded through an
 *   ordered list of candidate encodings
 * - 🔑 **Normalized Keys**: NDCs canonicalized to 11-digit zero-padded codes,
 *   plans identified by contract + plan composite keys
 * - 📊 **Coverage Comparison**: added/removed/maintained plan sets and
 *   restriction-metric changes between any two snapshot periods
 * - 📈 **Multi-Period Series**: one long-form metrics table across a whole
 *   sequence of monthly snapshots, ready for delimited export
 * - 🛡️ **Type Safe**: strongly typed records with validation at parse time
 *
 * ## Quick Start
 *
 * ```no_run
 * use partd::prelude::*;
 *
 * # fn main() -> Result<()> {
 * // Load one snapshot per period
 * let old = SnapshotBuilder::new()
 *     .formulary_file("data/2024-12/basic drugs formulary file  20241231.txt")
 *     .plan_file("data/2024-12/plan information  20241231.txt")
 *     .build()?;
 * let new = SnapshotBuilder::new()
 *     .formulary_file("data/2025-02/basic drugs formulary file  20250228.txt")
 *     .plan_file("data/2025-02/plan information  20250228.txt")
 *     .build()?;
 *
 * // Compare plan coverage for one drug
 * let comparison = compare_plan_coverage(&old, &new, "00069197540")?;
 * println!(
 *     "added {} / removed {} / maintained {}",
 *     comparison.added.len(),
 *     comparison.removed.len(),
 *     comparison.maintained.len()
 * );
 * # Ok(())
 * # }
 * ```
 *
 * ## Collecting a Series
 *
 * ```no_run
 * # use partd::prelude::*;
 * # fn main() -> Result<()> {
 * let reader = SnapshotReader::new();
 * let periods = load_period_snapshots(
 *     &[
 *         PeriodFiles {
 *             label: "2024-12".into(),
 *             formulary: "data/2024-12/formulary.txt".into(),
 *             plans: "data/2024-12/plans.txt".into(),
 *         },
 *         PeriodFiles {
 *             label: "2025-02".into(),
 *             formulary: "data/2025-02/formulary.txt".into(),
 *             plans: "data/2025-02/plans.txt".into(),
 *         },
 *     ],
 *     &reader,
 * )?;
 *
 * let drugs = vec![DrugNdcs {
 *     name: "Ozempic".into(),
 *     ndcs: vec!["00169413013".into()],
 * }];
 *
 * let report = collect_series(&periods, &drugs);
 * CsvExporter::new().export(&report.rows, std::path::Path::new("series.csv"))?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Source Files
 *
 * The library reads the two tables of the CMS "Monthly Prescription Drug
 * Plan Formulary and Pharmacy Network Information" releases:
 *
 * - **Formulary file**: `basic drugs formulary file  YYYYMMDD.txt`
 * - **Plan information file**: `plan information  YYYYMMDD.txt`
 *
 * Both are pipe-delimited with a header row and ship in varying text
 * encodings, which is why the loader retries an ordered candidate list.
 */

// Re-export error types from root
pub use error::{PartdError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod reader;
pub mod schema;
pub mod error;
pub mod snapshot;
pub mod metrics;
pub mod compare;
pub mod series;
pub mod export;
pub mod config;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use partd::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::{FormularyRecord, JoinedPlan, Ndc, PlanKey, PlanRecord};
    pub use crate::reader::SnapshotReader;
    pub use crate::schema::{FormularySchema, PlanSchema};
    pub use crate::error::{PartdError, Result};
    pub use crate::snapshot::{
        load_period_snapshots, PeriodFiles, PeriodSnapshot, Snapshot, SnapshotBuilder,
    };
    pub use crate::metrics::{RestrictionMetrics, RestrictionTerms};
    pub use crate::compare::{
        compare_plan_coverage, coverage_percent, FormularyComparison, NdcStats, PlanComparison,
    };
    pub use crate::series::{collect_series, DrugNdcs, DrugSeriesRow, SeriesReport};
    pub use crate::export::{export_report, CsvExporter, JsonExporter, ReportExporter};
    pub use crate::config::{ConfigBuilder, PartdConfig};
    pub use crate::ExportFormat;
}

/// Part D data constants
pub mod constants {
    /// Canonical zero-padded width of an NDC
    pub const NDC_LENGTH: usize = 11;

    /// Separator between contract id and plan id in a plan key
    pub const PLAN_KEY_SEPARATOR: char = '_';

    /// Field delimiter used by the CMS monthly extracts
    pub const FIELD_DELIMITER: u8 = b'|';

    /// Candidate encodings attempted in order when decoding input files
    ///
    /// windows-1252 is the WHATWG decoding of both the `latin1` and `cp1252`
    /// labels seen in the wild for these files.
    pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "windows-1252"];

    /// Rounding precision for plan-joined report metrics
    pub const PLAN_REPORT_DECIMALS: u32 = 1;

    /// Rounding precision for formulary-only (NDC-level) report metrics
    pub const NDC_REPORT_DECIMALS: u32 = 2;

    /// Rounding precision for coverage percentages
    pub const COVERAGE_DECIMALS: u32 = 2;

    /// CMS file naming patterns inside a monthly release archive
    pub const FORMULARY_FILE_PATTERN: &str = "basic drugs formulary file*.txt";
    pub const PLAN_FILE_PATTERN: &str = "plan information*.txt";
}

/// Common recipes and utility functions
pub mod cookbook {
    use crate::prelude::*;
    use std::path::Path;

    /// Load two periods from their four source files and compare plan
    /// coverage for one NDC in one call
    ///
    /// # Example
    /// ```no_run
    /// # use partd::cookbook::compare_files;
    /// # fn main() -> partd::Result<()> {
    /// let comparison = compare_files(
    ///     "old/formulary.txt", "old/plans.txt",
    ///     "new/formulary.txt", "new/plans.txt",
    ///     "00069197540",
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn compare_files<P: AsRef<Path>>(
        old_formulary: P,
        old_plans: P,
        new_formulary: P,
        new_plans: P,
        ndc: &str,
    ) -> Result<PlanComparison> {
        let old = SnapshotBuilder::new()
            .formulary_file(old_formulary)
            .plan_file(old_plans)
            .build()?;
        let new = SnapshotBuilder::new()
            .formulary_file(new_formulary)
            .plan_file(new_plans)
            .build()?;
        compare_plan_coverage(&old, &new, ndc)
    }

    /// Maintained plans that newly require prior authorization
    ///
    /// Returns the plan keys whose PA flag was off in the old period and on
    /// in the new one.
    pub fn plans_with_new_prior_auth(old: &Snapshot, new: &Snapshot, ndc: &Ndc) -> Vec<PlanKey> {
        let old_view = old.plans_covering(ndc);
        let new_view = new.plans_covering(ndc);

        let old_by_key: std::collections::HashMap<&PlanKey, &JoinedPlan> =
            old_view.iter().map(|p| (&p.plan_key, p)).collect();

        let mut keys: Vec<PlanKey> = new_view
            .iter()
            .filter(|p| {
                old_by_key
                    .get(&p.plan_key)
                    .map(|old_plan| !old_plan.prior_auth && p.prior_auth)
                    .unwrap_or(false)
            })
            .map(|p| p.plan_key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Point change in coverage percent between the two compared periods
    pub fn coverage_delta(comparison: &PlanComparison) -> f64 {
        crate::metrics::round_to(
            comparison.new_coverage_percent - comparison.old_coverage_percent,
            crate::constants::COVERAGE_DECIMALS,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::data_types::{Ndc, PlanKey};

    #[test]
    fn test_ndc_validation() {
        assert!(Ndc::new("69197540").is_ok());
        assert!(Ndc::new("1234567890123").is_err());
        assert!(Ndc::new("69197-540").is_err());
        assert_eq!(Ndc::new("69197540").unwrap().as_str(), "00069197540");
    }

    #[test]
    fn test_plan_key() {
        let key = PlanKey::compose("H1234", "001");
        assert_eq!(key.as_str(), "H1234_001");
        assert_eq!(key.to_string(), "H1234_001");
    }
}
