use uuid::Uuid;

use atria_core::{
    CostSharingCategory, CoverageKind, EmployerHealthPlan, MemberHealthPlan, PlanSize,
    ProcedureType, Tier,
};

use crate::error::EligibilityError;
use crate::figures::CoverageFigures;

/// Resolve the tier a procedure prices at. Untiered plans have no tier.
/// Pharmacy claims always price at the premium (network pharmacy) tier;
/// anything else needs a clinic location to place it in or out of the
/// premium network.
pub fn calculation_tier(
    employer_plan: &EmployerHealthPlan,
    procedure_type: ProcedureType,
    clinic_location_id: Option<Uuid>,
) -> Result<Option<Tier>, EligibilityError> {
    if !employer_plan.is_plan_tiered() {
        return Ok(None);
    }
    if procedure_type == ProcedureType::Pharmacy {
        return Ok(Some(Tier::Premium));
    }
    let location = clinic_location_id.ok_or(EligibilityError::MissingClinicLocation)?;
    if employer_plan.premium_location_ids.contains(&location) {
        Ok(Some(Tier::Premium))
    } else {
        Ok(Some(Tier::Secondary))
    }
}

/// Scan the plan's coverage rows for an embedded limit of each kind at the
/// member's plan size. Exactly one matching row means the embedded limit
/// exists; zero or several means it is not possible and reads as false.
pub fn embedding_flags(employer_plan: &EmployerHealthPlan, plan_size: PlanSize) -> (bool, bool) {
    let deductible_rows = employer_plan
        .coverage
        .iter()
        .filter(|row| row.is_deductible_embedded && row.plan_size == plan_size)
        .count();
    let oop_rows = employer_plan
        .coverage
        .iter()
        .filter(|row| row.is_oop_embedded && row.plan_size == plan_size)
        .count();
    (deductible_rows == 1, oop_rows == 1)
}

/// Resolve the cost-sharing figures for a procedure.
pub fn resolve_coverage(
    employer_plan: &EmployerHealthPlan,
    member_plan: &MemberHealthPlan,
    procedure_type: ProcedureType,
    cost_sharing_category: CostSharingCategory,
    tier: Option<Tier>,
) -> Result<CoverageFigures, EligibilityError> {
    let coverage_kind = if procedure_type == ProcedureType::Pharmacy && !employer_plan.rx_integrated
    {
        CoverageKind::Pharmacy
    } else {
        CoverageKind::Medical
    };

    let row = employer_plan
        .coverage
        .iter()
        .find(|row| {
            row.coverage_kind == coverage_kind
                && row.plan_size == member_plan.plan_size
                && row.tier == tier
                && row.cost_sharing_category == cost_sharing_category
        })
        .ok_or_else(|| EligibilityError::NoCoverageConfigured {
            plan_name: employer_plan.name.clone(),
            detail: format!(
                "{coverage_kind:?}/{:?}/{tier:?}/{cost_sharing_category:?}",
                member_plan.plan_size
            ),
        })?;

    let (is_deductible_embedded, is_oop_embedded) =
        embedding_flags(employer_plan, member_plan.plan_size);

    Ok(CoverageFigures {
        individual_deductible: row.individual_deductible,
        individual_oop: row.individual_oop,
        family_deductible: row.family_deductible,
        family_oop: row.family_oop,
        is_deductible_embedded,
        is_oop_embedded,
        max_oop_per_covered_individual: row.max_oop_per_covered_individual,
        coinsurance: row.coinsurance,
        copay: row.copay,
    })
}
