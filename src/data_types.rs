/*!
 * Data type definitions for Part D formulary and plan records
 *
 * This module contains type-safe representations of the rows found in the
 * CMS monthly formulary and plan information extracts, plus the normalized
 * keys used to join and compare them.
 */

use serde::{Deserialize, Serialize};

use crate::constants::{NDC_LENGTH, PLAN_KEY_SEPARATOR};

/// NDC (National Drug Code) - 11-digit zero-padded drug identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ndc(String);

impl Ndc {
    /// Create a new NDC from a raw string, normalizing to the canonical
    /// 11-digit zero-padded form.
    ///
    /// Leading zeros carry no meaning, so `"69197540"` and `"00069197540"`
    /// normalize to the same code.
    pub fn new(raw: &str) -> Result<Self, crate::PartdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(crate::PartdError::invalid_ndc(trimmed));
        }

        let significant = trimmed.trim_start_matches('0');
        let significant = if significant.is_empty() { "0" } else { significant };
        if significant.len() > NDC_LENGTH {
            return Err(crate::PartdError::invalid_ndc(trimmed));
        }

        Ok(Ndc(format!("{:0>width$}", significant, width = NDC_LENGTH)))
    }

    /// Create an NDC from a numeric value (source files sometimes carry the
    /// column as a bare number)
    pub fn from_u64(raw: u64) -> Result<Self, crate::PartdError> {
        Self::new(&raw.to_string())
    }

    /// Get the canonical 11-digit code as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ndc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite plan identifier: contract id + `_` + plan id
///
/// Uniquely identifies one plan offering within a snapshot; the set element
/// for added/removed/maintained computations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanKey(String);

impl PlanKey {
    /// Compose a plan key from its contract and plan id parts
    pub fn compose(contract_id: &str, plan_id: &str) -> Self {
        PlanKey(format!("{}{}{}", contract_id, PLAN_KEY_SEPARATOR, plan_id))
    }

    /// Get the plan key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (drug, formulary) coverage rule from a formulary snapshot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormularyRecord {
    pub ndc: Ndc,
    pub formulary_id: String,
    /// Cost-sharing tier; higher generally means higher patient cost
    pub tier: u32,
    pub prior_auth: bool,
    pub step_therapy: bool,
}

/// One (contract, plan) administrative record from a plan information file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub contract_id: String,
    pub plan_id: String,
    pub contract_name: String,
    pub plan_name: String,
    /// Foreign key into the formulary table
    pub formulary_id: String,
}

impl PlanRecord {
    /// Derive the composite plan key for this record
    pub fn plan_key(&self) -> PlanKey {
        PlanKey::compose(&self.contract_id, &self.plan_id)
    }
}

/// One row of the plan-level coverage view for a single NDC in one period:
/// formulary rows filtered to the NDC, inner-joined to plans on formulary id,
/// deduplicated to one row per plan key.
///
/// Transient; recomputed per (period, NDC) query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedPlan {
    pub plan_key: PlanKey,
    pub contract_id: String,
    pub plan_id: String,
    pub contract_name: String,
    pub plan_name: String,
    pub formulary_id: String,
    pub tier: u32,
    pub prior_auth: bool,
    pub step_therapy: bool,
}

impl JoinedPlan {
    /// Build the joined view row for a (formulary rule, plan) pair
    pub fn from_parts(rule: &FormularyRecord, plan: &PlanRecord) -> Self {
        Self {
            plan_key: plan.plan_key(),
            contract_id: plan.contract_id.clone(),
            plan_id: plan.plan_id.clone(),
            contract_name: plan.contract_name.clone(),
            plan_name: plan.plan_name.clone(),
            formulary_id: rule.formulary_id.clone(),
            tier: rule.tier,
            prior_auth: rule.prior_auth,
            step_therapy: rule.step_therapy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndc_zero_padding() {
        let short = Ndc::new("69197540").unwrap();
        let padded = Ndc::new("00069197540").unwrap();
        let numeric = Ndc::from_u64(69197540).unwrap();
        assert_eq!(short, padded);
        assert_eq!(short, numeric);
        assert_eq!(short.as_str(), "00069197540");
    }

    #[test]
    fn test_ndc_leading_zeros_beyond_width() {
        // extra leading zeros are insignificant even past the 11-char width
        let long = Ndc::new("000000000001").unwrap();
        assert_eq!(long.as_str(), "00000000001");
    }

    #[test]
    fn test_ndc_rejects_bad_input() {
        assert!(Ndc::new("").is_err());
        assert!(Ndc::new("69197-540").is_err());
        assert!(Ndc::new("123456789012").is_err());
    }

    #[test]
    fn test_plan_key_composition() {
        let plan = PlanRecord {
            contract_id: "H1234".to_string(),
            plan_id: "001".to_string(),
            contract_name: "Contract".to_string(),
            plan_name: "Plan".to_string(),
            formulary_id: "F1".to_string(),
        };
        assert_eq!(plan.plan_key().as_str(), "H1234_001");
    }
}
