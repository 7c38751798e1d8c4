/*!
 * Immutable period snapshots of formulary and plan tables
 *
 * A `Snapshot` owns the two tables of one reporting period, deduplicated and
 * indexed for the formulary-to-plan join. Snapshots are never mutated after
 * load, so one snapshot can be shared across any number of NDC queries.
 */

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::{Result, PartdError};
use crate::data_types::*;
use crate::reader::SnapshotReader;

/// Point-in-time pair of formulary and plan tables
pub struct Snapshot {
    /// Formulary coverage rules, in file order
    pub formulary: Vec<FormularyRecord>,
    /// Plan records, deduplicated by plan key (first occurrence wins)
    pub plans: Vec<PlanRecord>,
    /// Count of distinct plan keys across the whole plan file, NOT filtered
    /// by any drug; the coverage-percent denominator for this period
    total_plan_count: usize,
    /// formulary id -> indices into `plans`
    formulary_index: HashMap<String, Vec<usize>>,
}

impl Snapshot {
    /// Build a snapshot from loaded tables, deduplicating plans by plan key
    pub fn new(formulary: Vec<FormularyRecord>, plans: Vec<PlanRecord>) -> Self {
        let mut seen = HashSet::with_capacity(plans.len());
        let mut deduped = Vec::with_capacity(plans.len());
        for plan in plans {
            if seen.insert(plan.plan_key()) {
                deduped.push(plan);
            }
        }

        let total_plan_count = deduped.len();

        let mut formulary_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, plan) in deduped.iter().enumerate() {
            formulary_index
                .entry(plan.formulary_id.clone())
                .or_default()
                .push(idx);
        }

        Self {
            formulary,
            plans: deduped,
            total_plan_count,
            formulary_index,
        }
    }

    /// Load a snapshot from a formulary file and a plan information file
    /// using a default reader
    pub fn load<P: AsRef<Path>>(formulary_path: P, plan_path: P) -> Result<Self> {
        SnapshotBuilder::new()
            .formulary_file(formulary_path)
            .plan_file(plan_path)
            .build()
    }

    /// Count of distinct plan keys in this period's plan file
    pub fn total_plan_count(&self) -> usize {
        self.total_plan_count
    }

    /// Count of distinct formulary ids in this period's formulary file
    pub fn distinct_formulary_count(&self) -> usize {
        self.formulary
            .iter()
            .map(|r| r.formulary_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Formulary rules covering one NDC, in file order
    pub fn formulary_rows(&self, ndc: &Ndc) -> Vec<&FormularyRecord> {
        self.formulary.iter().filter(|r| &r.ndc == ndc).collect()
    }

    /// Plan-level coverage view for one NDC: formulary rules filtered to the
    /// NDC, inner-joined to plans on formulary id, one row per plan key
    /// (first occurrence wins)
    pub fn plans_covering(&self, ndc: &Ndc) -> Vec<JoinedPlan> {
        let mut seen = HashSet::new();
        let mut joined = Vec::new();

        for rule in self.formulary.iter().filter(|r| &r.ndc == ndc) {
            let Some(plan_indices) = self.formulary_index.get(&rule.formulary_id) else {
                continue;
            };
            for &idx in plan_indices {
                let plan = &self.plans[idx];
                if seen.insert(plan.plan_key()) {
                    joined.push(JoinedPlan::from_parts(rule, plan));
                }
            }
        }

        joined
    }
}

/// Builder for loading a snapshot from its two source files
///
/// # Example
/// ```no_run
/// # use partd::snapshot::SnapshotBuilder;
/// let snapshot = SnapshotBuilder::new()
///     .formulary_file("data/2025-02/basic drugs formulary file  20250228.txt")
///     .plan_file("data/2025-02/plan information  20250228.txt")
///     .build()?;
/// # Ok::<(), partd::PartdError>(())
/// ```
pub struct SnapshotBuilder {
    formulary_path: Option<PathBuf>,
    plan_path: Option<PathBuf>,
    reader: SnapshotReader,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Create a new snapshot builder with a default reader
    pub fn new() -> Self {
        Self {
            formulary_path: None,
            plan_path: None,
            reader: SnapshotReader::new(),
        }
    }

    /// Set the path to the formulary file
    pub fn formulary_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.formulary_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the path to the plan information file
    pub fn plan_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.plan_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a customized reader (encodings, delimiter, invalid-row policy)
    pub fn reader(mut self, reader: SnapshotReader) -> Self {
        self.reader = reader;
        self
    }

    /// Load both files and build the snapshot
    pub fn build(self) -> Result<Snapshot> {
        let formulary_path = self.formulary_path.ok_or_else(|| PartdError::Custom {
            message: "Formulary file path not specified".to_string(),
            suggestion: Some("Use .formulary_file() to specify the formulary snapshot file".to_string()),
        })?;
        let plan_path = self.plan_path.ok_or_else(|| PartdError::Custom {
            message: "Plan information file path not specified".to_string(),
            suggestion: Some("Use .plan_file() to specify the plan information file".to_string()),
        })?;

        let formulary = self.reader.load_formulary_data(&formulary_path)?;
        let plans = self.reader.load_plan_data(&plan_path)?;

        Ok(Snapshot::new(formulary, plans))
    }
}

/// One labeled period in a chronological series
pub struct PeriodSnapshot {
    /// Period identifier, e.g. `"2025-02"`
    pub label: String,
    pub snapshot: Snapshot,
}

/// Source files for one period, for batch loading
#[derive(Debug, Clone)]
pub struct PeriodFiles {
    pub label: String,
    pub formulary: PathBuf,
    pub plans: PathBuf,
}

/// Load a sequence of period snapshots
///
/// Loads are independent read-only file reads, so with the `parallel`
/// feature they run on the rayon thread pool.
pub fn load_period_snapshots(
    periods: &[PeriodFiles],
    reader: &SnapshotReader,
) -> Result<Vec<PeriodSnapshot>> {
    let load_one = |files: &PeriodFiles| -> Result<PeriodSnapshot> {
        let formulary = reader.load_formulary_data(&files.formulary)?;
        let plans = reader.load_plan_data(&files.plans)?;
        Ok(PeriodSnapshot {
            label: files.label.clone(),
            snapshot: Snapshot::new(formulary, plans),
        })
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        periods.par_iter().map(load_one).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        periods.iter().map(load_one).collect()
    }
}
