//! Hard-constraint vocabulary: violation codes and reports.
//!
//! The checks themselves live in the engine crate; the codes live here so
//! error types and bundle results can reference them without a dependency
//! cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable violation codes for hard-constraint failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintCode {
    LayeringOrder,
    OnePieceExclusive,
    StrictCoordIncomplete,
    StrictCoordMixed,
    FormalityOutOfBounds,
    SeasonMismatch,
    CatalogLimit,
    BeltRequired,
    CoverageIncomplete,
}

impl ConstraintCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintCode::LayeringOrder => "LAYERING_ORDER",
            ConstraintCode::OnePieceExclusive => "ONE_PIECE_EXCLUSIVE",
            ConstraintCode::StrictCoordIncomplete => "STRICT_COORD_INCOMPLETE",
            ConstraintCode::StrictCoordMixed => "STRICT_COORD_MIXED",
            ConstraintCode::FormalityOutOfBounds => "FORMALITY_OUT_OF_BOUNDS",
            ConstraintCode::SeasonMismatch => "SEASON_MISMATCH",
            ConstraintCode::CatalogLimit => "CATALOG_LIMIT",
            ConstraintCode::BeltRequired => "BELT_REQUIRED",
            ConstraintCode::CoverageIncomplete => "COVERAGE_INCOMPLETE",
        }
    }

    /// Reporting priority when several codes were observed during a failed
    /// search: the most actionable, most specific code wins the NO_BUNDLE
    /// report. Lower is more dominant.
    pub fn priority(&self) -> u8 {
        match self {
            ConstraintCode::StrictCoordIncomplete => 0,
            ConstraintCode::StrictCoordMixed => 1,
            ConstraintCode::OnePieceExclusive => 2,
            ConstraintCode::LayeringOrder => 3,
            ConstraintCode::BeltRequired => 4,
            ConstraintCode::FormalityOutOfBounds => 5,
            ConstraintCode::SeasonMismatch => 6,
            ConstraintCode::CatalogLimit => 7,
            ConstraintCode::CoverageIncomplete => 8,
        }
    }
}

impl fmt::Display for ConstraintCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hard-constraint violation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub code: ConstraintCode,
    /// Item ids (or a group id) implicated in the violation.
    pub offending: Vec<String>,
    /// Short human-readable reason.
    pub reason: String,
}

impl ConstraintViolation {
    pub fn new(code: ConstraintCode, offending: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            code,
            offending,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ConstraintCode::StrictCoordIncomplete).unwrap();
        assert_eq!(json, "\"STRICT_COORD_INCOMPLETE\"");
    }

    #[test]
    fn test_strict_coord_dominates_coverage() {
        assert!(
            ConstraintCode::StrictCoordIncomplete.priority()
                < ConstraintCode::CoverageIncomplete.priority()
        );
    }
}
