/*!
 * Restriction metric aggregation
 *
 * Computes the average tier and the prior-authorization / step-therapy rates
 * over any subset of coverage rows. Empty input is not an error; it means
 * "no applicable plans" and yields all-zero metrics.
 */

use serde::{Deserialize, Serialize};

/// Anything carrying the three coverage-restriction terms
///
/// Implemented by both the raw formulary rule and the plan-joined view row,
/// so NDC-level and plan-level reports share one aggregator.
pub trait RestrictionTerms {
    fn tier(&self) -> u32;
    fn prior_auth(&self) -> bool;
    fn step_therapy(&self) -> bool;
}

impl RestrictionTerms for crate::data_types::FormularyRecord {
    fn tier(&self) -> u32 {
        self.tier
    }
    fn prior_auth(&self) -> bool {
        self.prior_auth
    }
    fn step_therapy(&self) -> bool {
        self.step_therapy
    }
}

impl RestrictionTerms for crate::data_types::JoinedPlan {
    fn tier(&self) -> u32 {
        self.tier
    }
    fn prior_auth(&self) -> bool {
        self.prior_auth
    }
    fn step_therapy(&self) -> bool {
        self.step_therapy
    }
}

/// Aggregate restriction metrics over a row subset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RestrictionMetrics {
    /// Arithmetic mean of the tier level, 0 for an empty subset
    pub avg_tier: f64,
    /// Percent of rows requiring prior authorization
    pub pa_percent: f64,
    /// Percent of rows requiring step therapy
    pub st_percent: f64,
}

impl RestrictionMetrics {
    /// Aggregate over rows, rounding each metric to `decimals` places
    ///
    /// Plan-level reports round to [`crate::constants::PLAN_REPORT_DECIMALS`],
    /// NDC-level reports to [`crate::constants::NDC_REPORT_DECIMALS`].
    pub fn aggregate<'a, T, I>(rows: I, decimals: u32) -> Self
    where
        T: RestrictionTerms + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut count = 0usize;
        let mut tier_sum = 0u64;
        let mut pa_count = 0usize;
        let mut st_count = 0usize;

        for row in rows {
            count += 1;
            tier_sum += u64::from(row.tier());
            if row.prior_auth() {
                pa_count += 1;
            }
            if row.step_therapy() {
                st_count += 1;
            }
        }

        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        Self {
            avg_tier: round_to(tier_sum as f64 / n, decimals),
            pa_percent: round_to(pa_count as f64 / n * 100.0, decimals),
            st_percent: round_to(st_count as f64 / n * 100.0, decimals),
        }
    }
}

/// Round half away from zero to a fixed number of decimal places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{FormularyRecord, Ndc};

    fn rule(tier: u32, pa: bool, st: bool) -> FormularyRecord {
        FormularyRecord {
            ndc: Ndc::new("1").unwrap(),
            formulary_id: "F1".to_string(),
            tier,
            prior_auth: pa,
            step_therapy: st,
        }
    }

    #[test]
    fn test_empty_subset_is_all_zero() {
        let rows: Vec<FormularyRecord> = vec![];
        let metrics = RestrictionMetrics::aggregate(rows.iter(), 1);
        assert_eq!(metrics, RestrictionMetrics::default());
    }

    #[test]
    fn test_all_prior_auth_is_one_hundred_percent() {
        let rows = vec![rule(1, true, false), rule(2, true, false), rule(3, true, true)];
        let metrics = RestrictionMetrics::aggregate(rows.iter(), 1);
        assert_eq!(metrics.pa_percent, 100.0);
        assert_eq!(metrics.avg_tier, 2.0);
    }

    #[test]
    fn test_rounding_precision() {
        // one of three rows flagged: 33.333...%
        let rows = vec![rule(1, true, false), rule(1, false, false), rule(2, false, false)];
        let plan_level = RestrictionMetrics::aggregate(rows.iter(), 1);
        let ndc_level = RestrictionMetrics::aggregate(rows.iter(), 2);
        assert_eq!(plan_level.pa_percent, 33.3);
        assert_eq!(ndc_level.pa_percent, 33.33);
        assert_eq!(plan_level.avg_tier, 1.3);
        assert_eq!(ndc_level.avg_tier, 1.33);
    }
}
