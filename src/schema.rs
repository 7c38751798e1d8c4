/*!
 * Schema definitions for Part D data files
 *
 * The CMS monthly extracts carry more columns than this pipeline reads, so
 * headers are resolved by name rather than validated positionally: each
 * schema names its required columns and maps them to indices in the file at
 * hand.
 */

use std::path::Path;

use crate::PartdError;

/// Formulary snapshot file schema
///
/// Pipe-delimited, one row per (drug, formulary) coverage rule.
pub struct FormularySchema;

impl FormularySchema {
    pub const NDC: &'static str = "NDC";
    pub const FORMULARY_ID: &'static str = "FORMULARY_ID";
    pub const TIER_LEVEL_VALUE: &'static str = "TIER_LEVEL_VALUE";
    pub const PRIOR_AUTHORIZATION_YN: &'static str = "PRIOR_AUTHORIZATION_YN";
    pub const STEP_THERAPY_YN: &'static str = "STEP_THERAPY_YN";

    /// Columns this pipeline requires from a formulary file
    pub fn required_columns() -> Vec<&'static str> {
        vec![
            Self::NDC,
            Self::FORMULARY_ID,
            Self::TIER_LEVEL_VALUE,
            Self::PRIOR_AUTHORIZATION_YN,
            Self::STEP_THERAPY_YN,
        ]
    }

    /// Resolve required column names to indices in a header row
    pub fn resolve(headers: &[String], path: &Path) -> Result<FormularyColumns, PartdError> {
        Ok(FormularyColumns {
            ndc: find_column(headers, Self::NDC, path)?,
            formulary_id: find_column(headers, Self::FORMULARY_ID, path)?,
            tier: find_column(headers, Self::TIER_LEVEL_VALUE, path)?,
            prior_auth: find_column(headers, Self::PRIOR_AUTHORIZATION_YN, path)?,
            step_therapy: find_column(headers, Self::STEP_THERAPY_YN, path)?,
        })
    }
}

/// Resolved column indices for a formulary file
#[derive(Debug, Clone, Copy)]
pub struct FormularyColumns {
    pub ndc: usize,
    pub formulary_id: usize,
    pub tier: usize,
    pub prior_auth: usize,
    pub step_therapy: usize,
}

/// Plan information file schema
///
/// Pipe-delimited, one row per (contract, plan) offering.
pub struct PlanSchema;

impl PlanSchema {
    pub const CONTRACT_ID: &'static str = "CONTRACT_ID";
    pub const PLAN_ID: &'static str = "PLAN_ID";
    pub const CONTRACT_NAME: &'static str = "CONTRACT_NAME";
    pub const PLAN_NAME: &'static str = "PLAN_NAME";
    pub const FORMULARY_ID: &'static str = "FORMULARY_ID";

    /// Columns this pipeline requires from a plan information file
    pub fn required_columns() -> Vec<&'static str> {
        vec![
            Self::CONTRACT_ID,
            Self::PLAN_ID,
            Self::CONTRACT_NAME,
            Self::PLAN_NAME,
            Self::FORMULARY_ID,
        ]
    }

    /// Resolve required column names to indices in a header row
    pub fn resolve(headers: &[String], path: &Path) -> Result<PlanColumns, PartdError> {
        Ok(PlanColumns {
            contract_id: find_column(headers, Self::CONTRACT_ID, path)?,
            plan_id: find_column(headers, Self::PLAN_ID, path)?,
            contract_name: find_column(headers, Self::CONTRACT_NAME, path)?,
            plan_name: find_column(headers, Self::PLAN_NAME, path)?,
            formulary_id: find_column(headers, Self::FORMULARY_ID, path)?,
        })
    }
}

/// Resolved column indices for a plan information file
#[derive(Debug, Clone, Copy)]
pub struct PlanColumns {
    pub contract_id: usize,
    pub plan_id: usize,
    pub contract_name: usize,
    pub plan_name: usize,
    pub formulary_id: usize,
}

fn find_column(headers: &[String], name: &str, path: &Path) -> Result<usize, PartdError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| PartdError::missing_column(name, path, headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_ignores_extra_columns() {
        let hdrs = headers(&[
            "FORMULARY_VERSION",
            "NDC",
            "FORMULARY_ID",
            "TIER_LEVEL_VALUE",
            "QUANTITY_LIMIT_YN",
            "PRIOR_AUTHORIZATION_YN",
            "STEP_THERAPY_YN",
        ]);
        let cols = FormularySchema::resolve(&hdrs, &PathBuf::from("f.txt")).unwrap();
        assert_eq!(cols.ndc, 1);
        assert_eq!(cols.step_therapy, 6);
    }

    #[test]
    fn test_resolve_reports_missing_column() {
        let hdrs = headers(&["NDC", "FORMULARY_ID", "TIER_LEVEL_VALUE"]);
        let err = FormularySchema::resolve(&hdrs, &PathBuf::from("f.txt")).unwrap_err();
        match err {
            PartdError::MissingColumn { column, .. } => {
                assert_eq!(column, "PRIOR_AUTHORIZATION_YN");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
