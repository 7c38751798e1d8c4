/*!
 * Multi-period series collection
 *
 * Drives the period comparator across an ordered sequence of snapshots and a
 * drug-to-NDC mapping, producing one long-form table of coverage metrics
 * suitable for delimited export.
 */

use serde::Serialize;

use crate::compare::{coverage_percent, PlanComparison};
use crate::constants::PLAN_REPORT_DECIMALS;
use crate::data_types::Ndc;
use crate::metrics::RestrictionMetrics;
use crate::snapshot::PeriodSnapshot;

/// One drug name with the NDCs it is tracked under
#[derive(Debug, Clone)]
pub struct DrugNdcs {
    pub name: String,
    /// Raw NDC strings; normalized (and failures isolated) during collection
    pub ndcs: Vec<String>,
}

/// One row of the long-form series table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugSeriesRow {
    pub drug: String,
    pub ndc: Ndc,
    pub period: String,
    pub coverage_percent: f64,
    pub total_plans: usize,
    pub covered_plans: usize,
    pub maintained: usize,
    pub added: usize,
    pub removed: usize,
    pub avg_tier: f64,
    pub pa_percent: f64,
    pub st_percent: f64,
}

/// A (drug, NDC) entry that could not be collected
#[derive(Debug, Clone, Serialize)]
pub struct SeriesFailure {
    pub drug: String,
    pub ndc: String,
    pub reason: String,
}

/// Collected series rows plus per-NDC failures
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeriesReport {
    pub rows: Vec<DrugSeriesRow>,
    pub failures: Vec<SeriesFailure>,
}

/// Collect coverage metrics for every drug, NDC and period
///
/// `periods` must be in chronological order. For each NDC the first period
/// yields one baseline row (its own aggregates, zero change counts); every
/// consecutive period pair yields one row tagged with the newer period's
/// label. An NDC that fails to normalize is reported as a failure for that
/// (drug, NDC) only; the rest of the batch still completes.
pub fn collect_series(periods: &[PeriodSnapshot], drugs: &[DrugNdcs]) -> SeriesReport {
    let mut report = SeriesReport::default();

    for drug in drugs {
        for raw_ndc in &drug.ndcs {
            let ndc = match Ndc::new(raw_ndc) {
                Ok(ndc) => ndc,
                Err(e) => {
                    report.failures.push(SeriesFailure {
                        drug: drug.name.clone(),
                        ndc: raw_ndc.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(first) = periods.first() {
                report.rows.push(baseline_row(&drug.name, &ndc, first));
            }

            for pair in periods.windows(2) {
                let comparison = PlanComparison::compare(&pair[0].snapshot, &pair[1].snapshot, &ndc);
                report.rows.push(comparison_row(&drug.name, &ndc, &pair[1].label, &comparison));
            }
        }
    }

    // normalizing final sort; computation order already matches for
    // lexicographically ordered period labels
    report.rows.sort_by(|a, b| {
        (&a.drug, &a.ndc, &a.period).cmp(&(&b.drug, &b.ndc, &b.period))
    });

    report
}

/// Non-comparative row for the first period in a series
fn baseline_row(drug: &str, ndc: &Ndc, period: &PeriodSnapshot) -> DrugSeriesRow {
    let view = period.snapshot.plans_covering(ndc);
    let metrics = RestrictionMetrics::aggregate(view.iter(), PLAN_REPORT_DECIMALS);
    let total = period.snapshot.total_plan_count();

    DrugSeriesRow {
        drug: drug.to_string(),
        ndc: ndc.clone(),
        period: period.label.clone(),
        coverage_percent: coverage_percent(view.len(), total),
        total_plans: total,
        covered_plans: view.len(),
        maintained: 0,
        added: 0,
        removed: 0,
        avg_tier: metrics.avg_tier,
        pa_percent: metrics.pa_percent,
        st_percent: metrics.st_percent,
    }
}

fn comparison_row(
    drug: &str,
    ndc: &Ndc,
    period: &str,
    comparison: &PlanComparison,
) -> DrugSeriesRow {
    DrugSeriesRow {
        drug: drug.to_string(),
        ndc: ndc.clone(),
        period: period.to_string(),
        coverage_percent: comparison.new_coverage_percent,
        total_plans: comparison.new_total_plans,
        covered_plans: comparison.new_covered_plans,
        maintained: comparison.maintained.len(),
        added: comparison.added.len(),
        removed: comparison.removed.len(),
        avg_tier: comparison.metrics.all_new.avg_tier,
        pa_percent: comparison.metrics.all_new.pa_percent,
        st_percent: comparison.metrics.all_new.st_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{FormularyRecord, PlanRecord};
    use crate::snapshot::Snapshot;

    fn rule(ndc: &str, formulary_id: &str, tier: u32, pa: bool) -> FormularyRecord {
        FormularyRecord {
            ndc: Ndc::new(ndc).unwrap(),
            formulary_id: formulary_id.to_string(),
            tier,
            prior_auth: pa,
            step_therapy: false,
        }
    }

    fn plan(contract: &str, plan_id: &str, formulary_id: &str) -> PlanRecord {
        PlanRecord {
            contract_id: contract.to_string(),
            plan_id: plan_id.to_string(),
            contract_name: String::new(),
            plan_name: String::new(),
            formulary_id: formulary_id.to_string(),
        }
    }

    fn period(label: &str, snapshot: Snapshot) -> PeriodSnapshot {
        PeriodSnapshot {
            label: label.to_string(),
            snapshot,
        }
    }

    fn three_periods() -> Vec<PeriodSnapshot> {
        vec![
            period(
                "2024-12",
                Snapshot::new(vec![rule("1", "F1", 2, false)], vec![plan("C1", "1", "F1")]),
            ),
            period(
                "2025-01",
                Snapshot::new(
                    vec![rule("1", "F1", 3, true)],
                    vec![plan("C1", "1", "F1"), plan("C2", "1", "F1")],
                ),
            ),
            period(
                "2025-02",
                Snapshot::new(vec![rule("1", "F1", 3, true)], vec![plan("C2", "1", "F1")]),
            ),
        ]
    }

    #[test]
    fn test_one_baseline_plus_one_row_per_pair() {
        let periods = three_periods();
        let drugs = vec![DrugNdcs {
            name: "Example".to_string(),
            ndcs: vec!["1".to_string()],
        }];

        let report = collect_series(&periods, &drugs);
        assert!(report.failures.is_empty());
        assert_eq!(report.rows.len(), 3);

        let labels: Vec<&str> = report.rows.iter().map(|r| r.period.as_str()).collect();
        assert_eq!(labels, vec!["2024-12", "2025-01", "2025-02"]);

        let baseline = &report.rows[0];
        assert_eq!(baseline.maintained + baseline.added + baseline.removed, 0);
        assert_eq!(baseline.covered_plans, 1);
        assert_eq!(baseline.coverage_percent, 100.0);

        let second = &report.rows[1];
        assert_eq!(second.maintained, 1);
        assert_eq!(second.added, 1);
        assert_eq!(second.removed, 0);

        let third = &report.rows[2];
        assert_eq!(third.maintained, 1);
        assert_eq!(third.removed, 1);
    }

    #[test]
    fn test_invalid_ndc_is_isolated() {
        let periods = three_periods();
        let drugs = vec![
            DrugNdcs {
                name: "Bad".to_string(),
                ndcs: vec!["not-an-ndc".to_string()],
            },
            DrugNdcs {
                name: "Good".to_string(),
                ndcs: vec!["1".to_string()],
            },
        ];

        let report = collect_series(&periods, &drugs);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].drug, "Bad");
        // the valid drug still produced its full series
        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().all(|r| r.drug == "Good"));
    }

    #[test]
    fn test_rows_sorted_by_drug_ndc_period() {
        let periods = three_periods();
        let drugs = vec![
            DrugNdcs {
                name: "Zeta".to_string(),
                ndcs: vec!["2".to_string()],
            },
            DrugNdcs {
                name: "Alpha".to_string(),
                ndcs: vec!["1".to_string()],
            },
        ];

        let report = collect_series(&periods, &drugs);
        assert_eq!(report.rows.len(), 6);
        assert!(report.rows.windows(2).all(|w| {
            (&w[0].drug, &w[0].ndc, &w[0].period) <= (&w[1].drug, &w[1].ndc, &w[1].period)
        }));
        assert_eq!(report.rows[0].drug, "Alpha");
    }
}
