use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AmountType;
use crate::money::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlanSize {
    Individual,
    EmployeePlusOne,
    Family,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tier {
    Premium,
    Secondary,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcedureType {
    Medical,
    Pharmacy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CostSharingCategory {
    Consultation,
    Medical,
    Diagnostic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CoverageKind {
    Medical,
    Pharmacy,
}

/// One configured coverage row on an employer plan. Figures apply to the
/// given plan size (and tier, when the plan is tiered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCoverage {
    pub plan_size: PlanSize,
    pub tier: Option<Tier>,
    pub coverage_kind: CoverageKind,
    pub cost_sharing_category: CostSharingCategory,
    pub individual_deductible: Money,
    pub individual_oop: Money,
    pub family_deductible: Money,
    pub family_oop: Money,
    pub max_oop_per_covered_individual: Option<Money>,
    pub is_deductible_embedded: bool,
    pub is_oop_embedded: bool,
    /// Member share of post-deductible cost, e.g. 0.2.
    pub coinsurance: Decimal,
    pub copay: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerHealthPlan {
    pub id: Uuid,
    pub name: String,
    pub is_hdhp: bool,
    /// Pharmacy claims accumulate against medical coverage when set.
    pub rx_integrated: bool,
    pub hra_enabled: bool,
    pub coverage: Vec<PlanCoverage>,
    /// Clinic locations billed at the premium tier. Empty for untiered plans.
    pub premium_location_ids: Vec<Uuid>,
}

impl EmployerHealthPlan {
    /// A plan is tiered when any coverage row is tier-scoped.
    pub fn is_plan_tiered(&self) -> bool {
        self.coverage.iter().any(|row| row.tier.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberHealthPlan {
    pub id: Uuid,
    pub member_id: Uuid,
    pub reimbursement_wallet_id: Uuid,
    pub employer_health_plan_id: Uuid,
    pub plan_size: PlanSize,
    pub plan_start_at: NaiveDate,
    pub plan_end_at: Option<NaiveDate>,
}

impl MemberHealthPlan {
    pub fn is_family_plan(&self) -> bool {
        self.plan_size != PlanSize::Individual
    }

    pub fn amount_type(&self) -> AmountType {
        if self.is_family_plan() {
            AmountType::Family
        } else {
            AmountType::Individual
        }
    }
}
