/*!
 * Period-over-period coverage comparison for one drug
 *
 * Given two loaded snapshots and a target NDC, computes the plan-level
 * coverage view for each period, the added/removed/maintained plan sets,
 * restriction metrics per group, and coverage percentages.
 */

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::constants::{COVERAGE_DECIMALS, NDC_REPORT_DECIMALS, PLAN_REPORT_DECIMALS};
use crate::data_types::{JoinedPlan, Ndc, PlanKey};
use crate::metrics::{round_to, RestrictionMetrics};
use crate::snapshot::Snapshot;
use crate::Result;

/// Reporting details for one added or removed plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanChangeDetail {
    pub plan_key: PlanKey,
    pub contract_name: String,
    pub plan_name: String,
}

/// Aggregate term changes across the maintained plans
///
/// `pa_changes` and `st_changes` are counts of plans whose flag flipped in
/// either direction, not percentages; divide by the maintained count for a
/// rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MaintainedChanges {
    /// Mean of per-plan tier deltas (new - old); 0 when nothing maintained
    pub avg_tier_delta: f64,
    pub pa_changes: usize,
    pub st_changes: usize,
}

/// Restriction metrics per comparison group
///
/// The removed group's terms are moot once coverage is dropped, so no
/// metrics are computed for it; only membership is reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupMetrics {
    pub all_old: RestrictionMetrics,
    pub all_new: RestrictionMetrics,
    pub maintained_old: RestrictionMetrics,
    pub maintained_new: RestrictionMetrics,
    pub added: RestrictionMetrics,
}

/// Result of comparing plan coverage of one NDC across two periods
#[derive(Debug, Clone, Serialize)]
pub struct PlanComparison {
    pub ndc: Ndc,
    pub added: BTreeSet<PlanKey>,
    pub removed: BTreeSet<PlanKey>,
    pub maintained: BTreeSet<PlanKey>,
    pub added_details: Vec<PlanChangeDetail>,
    pub removed_details: Vec<PlanChangeDetail>,
    pub metrics: GroupMetrics,
    pub changes: MaintainedChanges,
    pub old_coverage_percent: f64,
    pub new_coverage_percent: f64,
    pub old_total_plans: usize,
    pub new_total_plans: usize,
    /// Distinct plans covering the NDC in each period
    pub old_covered_plans: usize,
    pub new_covered_plans: usize,
}

impl PlanComparison {
    /// Compare plan coverage between two snapshots with the default
    /// plan-report rounding
    pub fn compare(old: &Snapshot, new: &Snapshot, ndc: &Ndc) -> Self {
        Self::compare_with_precision(old, new, ndc, PLAN_REPORT_DECIMALS)
    }

    /// Compare plan coverage, rounding group metrics to `decimals` places
    pub fn compare_with_precision(
        old: &Snapshot,
        new: &Snapshot,
        ndc: &Ndc,
        decimals: u32,
    ) -> Self {
        let old_view = old.plans_covering(ndc);
        let new_view = new.plans_covering(ndc);

        let old_by_key: BTreeMap<&PlanKey, &JoinedPlan> =
            old_view.iter().map(|p| (&p.plan_key, p)).collect();
        let new_by_key: BTreeMap<&PlanKey, &JoinedPlan> =
            new_view.iter().map(|p| (&p.plan_key, p)).collect();

        let old_keys: BTreeSet<PlanKey> = old_by_key.keys().map(|k| (*k).clone()).collect();
        let new_keys: BTreeSet<PlanKey> = new_by_key.keys().map(|k| (*k).clone()).collect();

        let maintained: BTreeSet<PlanKey> = old_keys.intersection(&new_keys).cloned().collect();
        let added: BTreeSet<PlanKey> = new_keys.difference(&old_keys).cloned().collect();
        let removed: BTreeSet<PlanKey> = old_keys.difference(&new_keys).cloned().collect();

        // align maintained plans by key (BTreeSet iteration is sorted) and
        // tally per-plan term changes
        let mut tier_delta_sum = 0.0;
        let mut pa_changes = 0;
        let mut st_changes = 0;
        let mut maintained_old_rows = Vec::with_capacity(maintained.len());
        let mut maintained_new_rows = Vec::with_capacity(maintained.len());
        for key in &maintained {
            let old_plan = old_by_key[key];
            let new_plan = new_by_key[key];
            tier_delta_sum += f64::from(new_plan.tier) - f64::from(old_plan.tier);
            if new_plan.prior_auth != old_plan.prior_auth {
                pa_changes += 1;
            }
            if new_plan.step_therapy != old_plan.step_therapy {
                st_changes += 1;
            }
            maintained_old_rows.push(old_plan);
            maintained_new_rows.push(new_plan);
        }

        let changes = MaintainedChanges {
            avg_tier_delta: if maintained.is_empty() {
                0.0
            } else {
                round_to(tier_delta_sum / maintained.len() as f64, NDC_REPORT_DECIMALS)
            },
            pa_changes,
            st_changes,
        };

        let added_rows: Vec<&JoinedPlan> = added.iter().map(|k| new_by_key[k]).collect();

        let metrics = GroupMetrics {
            all_old: RestrictionMetrics::aggregate(old_view.iter(), decimals),
            all_new: RestrictionMetrics::aggregate(new_view.iter(), decimals),
            maintained_old: RestrictionMetrics::aggregate(maintained_old_rows.iter().copied(), decimals),
            maintained_new: RestrictionMetrics::aggregate(maintained_new_rows.iter().copied(), decimals),
            added: RestrictionMetrics::aggregate(added_rows.iter().copied(), decimals),
        };

        let added_details = added.iter().map(|k| detail(new_by_key[k])).collect();
        let removed_details = removed.iter().map(|k| detail(old_by_key[k])).collect();

        Self {
            ndc: ndc.clone(),
            old_coverage_percent: coverage_percent(old_keys.len(), old.total_plan_count()),
            new_coverage_percent: coverage_percent(new_keys.len(), new.total_plan_count()),
            old_total_plans: old.total_plan_count(),
            new_total_plans: new.total_plan_count(),
            old_covered_plans: old_keys.len(),
            new_covered_plans: new_keys.len(),
            added,
            removed,
            maintained,
            added_details,
            removed_details,
            metrics,
            changes,
        }
    }
}

fn detail(plan: &JoinedPlan) -> PlanChangeDetail {
    PlanChangeDetail {
        plan_key: plan.plan_key.clone(),
        contract_name: plan.contract_name.clone(),
        plan_name: plan.plan_name.clone(),
    }
}

/// Normalize a raw NDC string and compare plan coverage across two snapshots
pub fn compare_plan_coverage(old: &Snapshot, new: &Snapshot, raw_ndc: &str) -> Result<PlanComparison> {
    let ndc = Ndc::new(raw_ndc)?;
    Ok(PlanComparison::compare(old, new, &ndc))
}

/// Share of all plans in a period that cover the drug
///
/// Zero total is an explicit zero-coverage result, never a division error.
pub fn coverage_percent(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(covered as f64 / total as f64 * 100.0, COVERAGE_DECIMALS)
}

/// Formulary-level statistics for one NDC in one snapshot (no plan join)
#[derive(Debug, Clone, Serialize)]
pub struct NdcStats {
    pub ndc: Ndc,
    /// Number of formulary rows listing the NDC
    pub row_count: usize,
    /// Distinct formularies listing the NDC
    pub formularies: BTreeSet<String>,
    pub metrics: RestrictionMetrics,
}

impl NdcStats {
    /// Analyze one NDC against a snapshot's formulary table
    pub fn analyze(snapshot: &Snapshot, ndc: &Ndc) -> Self {
        let rows = snapshot.formulary_rows(ndc);
        let formularies = rows.iter().map(|r| r.formulary_id.clone()).collect();

        Self {
            ndc: ndc.clone(),
            row_count: rows.len(),
            formularies,
            metrics: RestrictionMetrics::aggregate(rows.iter().copied(), NDC_REPORT_DECIMALS),
        }
    }
}

/// Result of comparing formulary-level listing of one NDC across two periods
///
/// Same set algebra as [`PlanComparison`] but over formulary ids: which
/// formularies list the drug at all, regardless of which plans use them.
#[derive(Debug, Clone, Serialize)]
pub struct FormularyComparison {
    pub ndc: Ndc,
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub maintained: BTreeSet<String>,
    pub changes: MaintainedChanges,
    pub old_coverage_percent: f64,
    pub new_coverage_percent: f64,
    /// NDC-level requirements per period; `None` when the period has no rows
    pub old_requirements: Option<RestrictionMetrics>,
    pub new_requirements: Option<RestrictionMetrics>,
}

impl FormularyComparison {
    /// Compare formulary-level listing between two snapshots
    pub fn compare(old: &Snapshot, new: &Snapshot, ndc: &Ndc) -> Self {
        let old_rows = old.formulary_rows(ndc);
        let new_rows = new.formulary_rows(ndc);

        let old_ids: BTreeSet<String> =
            old_rows.iter().map(|r| r.formulary_id.clone()).collect();
        let new_ids: BTreeSet<String> =
            new_rows.iter().map(|r| r.formulary_id.clone()).collect();

        let maintained: BTreeSet<String> = old_ids.intersection(&new_ids).cloned().collect();
        let added: BTreeSet<String> = new_ids.difference(&old_ids).cloned().collect();
        let removed: BTreeSet<String> = old_ids.difference(&new_ids).cloned().collect();

        // first row per formulary id represents that formulary's terms
        let mut tier_delta_sum = 0.0;
        let mut pa_changes = 0;
        let mut st_changes = 0;
        for id in &maintained {
            let old_rule = old_rows.iter().find(|r| &r.formulary_id == id).expect("maintained id");
            let new_rule = new_rows.iter().find(|r| &r.formulary_id == id).expect("maintained id");
            tier_delta_sum += f64::from(new_rule.tier) - f64::from(old_rule.tier);
            if new_rule.prior_auth != old_rule.prior_auth {
                pa_changes += 1;
            }
            if new_rule.step_therapy != old_rule.step_therapy {
                st_changes += 1;
            }
        }

        let changes = MaintainedChanges {
            avg_tier_delta: if maintained.is_empty() {
                0.0
            } else {
                round_to(tier_delta_sum / maintained.len() as f64, NDC_REPORT_DECIMALS)
            },
            pa_changes,
            st_changes,
        };

        let old_requirements = (!old_rows.is_empty())
            .then(|| RestrictionMetrics::aggregate(old_rows.iter().copied(), NDC_REPORT_DECIMALS));
        let new_requirements = (!new_rows.is_empty())
            .then(|| RestrictionMetrics::aggregate(new_rows.iter().copied(), NDC_REPORT_DECIMALS));

        Self {
            ndc: ndc.clone(),
            old_coverage_percent: coverage_percent(old_ids.len(), old.distinct_formulary_count()),
            new_coverage_percent: coverage_percent(new_ids.len(), new.distinct_formulary_count()),
            added,
            removed,
            maintained,
            changes,
            old_requirements,
            new_requirements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{FormularyRecord, PlanRecord};

    fn rule(ndc: &str, formulary_id: &str, tier: u32, pa: bool, st: bool) -> FormularyRecord {
        FormularyRecord {
            ndc: Ndc::new(ndc).unwrap(),
            formulary_id: formulary_id.to_string(),
            tier,
            prior_auth: pa,
            step_therapy: st,
        }
    }

    fn plan(contract: &str, plan_id: &str, formulary_id: &str) -> PlanRecord {
        PlanRecord {
            contract_id: contract.to_string(),
            plan_id: plan_id.to_string(),
            contract_name: format!("{} Contract", contract),
            plan_name: format!("{} Plan", plan_id),
            formulary_id: formulary_id.to_string(),
        }
    }

    fn key(s: &str) -> PlanKey {
        let (contract, plan_id) = s.split_once('_').unwrap();
        PlanKey::compose(contract, plan_id)
    }

    #[test]
    fn test_set_algebra_invariants() {
        let old = Snapshot::new(
            vec![rule("1", "F1", 2, false, false), rule("1", "F2", 3, false, false)],
            vec![plan("C1", "1", "F1"), plan("C2", "1", "F2")],
        );
        let new = Snapshot::new(
            vec![rule("1", "F1", 2, false, false), rule("1", "F3", 4, true, false)],
            vec![plan("C1", "1", "F1"), plan("C3", "1", "F3")],
        );

        let cmp = PlanComparison::compare(&old, &new, &Ndc::new("1").unwrap());

        assert!(cmp.added.is_disjoint(&cmp.removed));
        assert_eq!(cmp.maintained, [key("C1_1")].into_iter().collect());
        assert_eq!(cmp.added, [key("C3_1")].into_iter().collect());
        assert_eq!(cmp.removed, [key("C2_1")].into_iter().collect());

        let old_keys: BTreeSet<PlanKey> = cmp.maintained.union(&cmp.removed).cloned().collect();
        let new_keys: BTreeSet<PlanKey> = cmp.maintained.union(&cmp.added).cloned().collect();
        assert_eq!(old_keys.len(), cmp.old_covered_plans);
        assert_eq!(new_keys.len(), cmp.new_covered_plans);
    }

    #[test]
    fn test_maintained_term_changes() {
        let old = Snapshot::new(
            vec![rule("1", "F1", 2, false, false)],
            vec![plan("C1", "1", "F1")],
        );
        let new = Snapshot::new(
            vec![rule("1", "F1", 3, true, false)],
            vec![plan("C1", "1", "F1"), plan("C2", "1", "F1")],
        );

        let cmp = PlanComparison::compare(&old, &new, &Ndc::new("1").unwrap());

        assert_eq!(cmp.maintained, [key("C1_1")].into_iter().collect());
        assert_eq!(cmp.added, [key("C2_1")].into_iter().collect());
        assert!(cmp.removed.is_empty());
        assert_eq!(cmp.changes.pa_changes, 1);
        assert_eq!(cmp.changes.st_changes, 0);
        assert_eq!(cmp.changes.avg_tier_delta, 1.0);
        assert_eq!(cmp.metrics.maintained_old.avg_tier, 2.0);
        assert_eq!(cmp.metrics.maintained_new.avg_tier, 3.0);
        assert_eq!(cmp.metrics.added.avg_tier, 3.0);
    }

    #[test]
    fn test_empty_periods_are_not_errors() {
        let old = Snapshot::new(vec![], vec![]);
        let new = Snapshot::new(vec![], vec![]);
        let cmp = PlanComparison::compare(&old, &new, &Ndc::new("1").unwrap());

        assert!(cmp.added.is_empty() && cmp.removed.is_empty() && cmp.maintained.is_empty());
        assert_eq!(cmp.metrics.all_old, RestrictionMetrics::default());
        assert_eq!(cmp.old_coverage_percent, 0.0);
        assert_eq!(cmp.new_coverage_percent, 0.0);
    }

    #[test]
    fn test_coverage_percent_bounds() {
        assert_eq!(coverage_percent(0, 0), 0.0);
        assert_eq!(coverage_percent(5, 0), 0.0);
        assert_eq!(coverage_percent(1, 3), 33.33);
        assert_eq!(coverage_percent(3, 3), 100.0);
    }

    #[test]
    fn test_ndc_stats_precision() {
        let snapshot = Snapshot::new(
            vec![
                rule("1", "F1", 1, true, false),
                rule("1", "F2", 2, false, false),
                rule("1", "F3", 2, false, false),
            ],
            vec![],
        );
        let stats = NdcStats::analyze(&snapshot, &Ndc::new("1").unwrap());
        assert_eq!(stats.row_count, 3);
        assert_eq!(stats.formularies.len(), 3);
        assert_eq!(stats.metrics.pa_percent, 33.33);
        assert_eq!(stats.metrics.avg_tier, 1.67);
    }

    #[test]
    fn test_formulary_comparison_sets() {
        let old = Snapshot::new(
            vec![
                rule("1", "F1", 2, false, false),
                rule("1", "F2", 3, true, false),
                rule("2", "F9", 1, false, false),
            ],
            vec![],
        );
        let new = Snapshot::new(
            vec![
                rule("1", "F2", 4, true, true),
                rule("1", "F3", 2, false, false),
                rule("2", "F9", 1, false, false),
            ],
            vec![],
        );

        let cmp = FormularyComparison::compare(&old, &new, &Ndc::new("1").unwrap());
        assert_eq!(cmp.maintained, ["F2".to_string()].into_iter().collect());
        assert_eq!(cmp.added, ["F3".to_string()].into_iter().collect());
        assert_eq!(cmp.removed, ["F1".to_string()].into_iter().collect());
        assert_eq!(cmp.changes.avg_tier_delta, 1.0);
        assert_eq!(cmp.changes.st_changes, 1);
        // 2 of 3 distinct formularies list the drug in the old period
        assert_eq!(cmp.old_coverage_percent, 66.67);
    }
}
