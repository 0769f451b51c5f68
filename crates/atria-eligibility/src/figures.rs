use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use atria_core::Money;

/// Plan-configured cost-sharing figures, resolved once per procedure from
/// plan type, tier, and cost-sharing category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageFigures {
    pub individual_deductible: Money,
    pub individual_oop: Money,
    pub family_deductible: Money,
    pub family_oop: Money,
    pub is_deductible_embedded: bool,
    pub is_oop_embedded: bool,
    pub max_oop_per_covered_individual: Option<Money>,
    pub coinsurance: Decimal,
    pub copay: Money,
}

/// The running eligibility ledger the calculator consumes and updates.
///
/// Holds both year-to-date applied amounts and the remaining headroom
/// (remaining = limit - YTD, clamped at zero on every debit). Whether it
/// came from a live RTE call or an admin override is invisible downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityInfo {
    pub individual_deductible: Money,
    pub individual_oop: Money,
    pub family_deductible: Money,
    pub family_oop: Money,
    pub individual_deductible_remaining: Money,
    pub individual_oop_remaining: Money,
    pub family_deductible_remaining: Money,
    pub family_oop_remaining: Money,
    pub hra_remaining: Money,
    pub is_deductible_embedded: bool,
    pub is_oop_embedded: bool,
    pub max_oop_per_covered_individual: Option<Money>,
    pub rte_transaction_id: Option<String>,
}

impl EligibilityInfo {
    pub fn empty() -> Self {
        EligibilityInfo {
            individual_deductible: Money::ZERO,
            individual_oop: Money::ZERO,
            family_deductible: Money::ZERO,
            family_oop: Money::ZERO,
            individual_deductible_remaining: Money::ZERO,
            individual_oop_remaining: Money::ZERO,
            family_deductible_remaining: Money::ZERO,
            family_oop_remaining: Money::ZERO,
            hra_remaining: Money::ZERO,
            is_deductible_embedded: false,
            is_oop_embedded: false,
            max_oop_per_covered_individual: None,
            rte_transaction_id: None,
        }
    }
}
