use serde::{Deserialize, Serialize};

use atria_core::{EmployerHealthPlan, MemberHealthPlan, Money};

use crate::error::EligibilityError;
use crate::figures::{CoverageFigures, EligibilityInfo};
use crate::shape::{PlanShape, YtdField, required_fields};

/// Admin-supplied real-time-eligibility override: year-to-date figures
/// entered as decimal dollar strings. Never persisted; only transformed
/// into an [`EligibilityInfo`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RteOverride {
    pub ytd_individual_deductible: Option<String>,
    pub ytd_individual_oop: Option<String>,
    pub ytd_family_deductible: Option<String>,
    pub ytd_family_oop: Option<String>,
    pub individual_oop_remaining: Option<String>,
    pub family_oop_remaining: Option<String>,
    pub hra_remaining: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

fn parse(value: &Option<String>) -> Result<Money, EligibilityError> {
    Ok(Money::from_dollars_str(value.as_deref().unwrap_or(""))?)
}

impl RteOverride {
    pub fn data_is_present(&self) -> bool {
        present(&self.ytd_individual_deductible)
            || present(&self.ytd_individual_oop)
            || present(&self.ytd_family_deductible)
            || present(&self.ytd_family_oop)
            || present(&self.individual_oop_remaining)
            || present(&self.family_oop_remaining)
            || present(&self.hra_remaining)
    }

    fn field(&self, field: YtdField) -> &Option<String> {
        match field {
            YtdField::YtdIndividualDeductible => &self.ytd_individual_deductible,
            YtdField::YtdIndividualOop => &self.ytd_individual_oop,
            YtdField::YtdFamilyDeductible => &self.ytd_family_deductible,
            YtdField::YtdFamilyOop => &self.ytd_family_oop,
            YtdField::IndividualOopRemaining => &self.individual_oop_remaining,
            YtdField::FamilyOopRemaining => &self.family_oop_remaining,
        }
    }
}

/// Decide whether the override should replace a live RTE call.
///
/// Empty data defers to the live path. Partially-filled data for the plan
/// shape is an error naming exactly the missing fields, so an admin never
/// silently calculates against half-entered figures.
pub fn should_override(
    shape: PlanShape,
    data: &RteOverride,
) -> Result<bool, EligibilityError> {
    if !data.data_is_present() {
        return Ok(false);
    }
    let missing: Vec<YtdField> = required_fields(shape)
        .iter()
        .copied()
        .filter(|field| !present(data.field(*field)))
        .collect();
    if missing.is_empty() {
        Ok(true)
    } else {
        Err(EligibilityError::MissingYtdFields { shape, missing })
    }
}

/// Entry-point validation: override data without any member plan context
/// cannot be honored at all.
pub fn validate_override(
    plans: Option<(&EmployerHealthPlan, &MemberHealthPlan)>,
    deductible_embedded: bool,
    oop_embedded: bool,
    data: &RteOverride,
) -> Result<bool, EligibilityError> {
    match plans {
        None if data.data_is_present() => Err(EligibilityError::OverrideWithoutPlan),
        None => Ok(false),
        Some((employer_plan, member_plan)) => {
            let shape =
                PlanShape::resolve(employer_plan, member_plan, deductible_embedded, oop_embedded);
            should_override(shape, data)
        }
    }
}

/// Build the eligibility ledger from override figures.
///
/// Produces exactly the shape a live RTE call would, so the calculator is
/// agnostic to its eligibility source. For non-HDHP plans the resolved
/// coverage figures supply the limits and remaining = limit - YTD, clamped;
/// HDHP plans carry only the OOP figures the admin entered. Call only after
/// [`should_override`] returned true.
pub fn eligibility_info_override(
    employer_plan: &EmployerHealthPlan,
    member_plan: &MemberHealthPlan,
    figures: Option<&CoverageFigures>,
    data: &RteOverride,
) -> Result<EligibilityInfo, EligibilityError> {
    let hra_remaining = if employer_plan.hra_enabled {
        parse(&data.hra_remaining)?
    } else {
        Money::ZERO
    };

    if employer_plan.is_hdhp {
        let mut info = EligibilityInfo::empty();
        info.individual_oop = parse(&data.ytd_individual_oop)?;
        info.individual_oop_remaining = parse(&data.individual_oop_remaining)?;
        if member_plan.is_family_plan() {
            info.family_oop = parse(&data.ytd_family_oop)?;
            info.family_oop_remaining = parse(&data.family_oop_remaining)?;
        }
        info.hra_remaining = hra_remaining;
        return Ok(info);
    }

    let figures = figures.ok_or_else(|| EligibilityError::NoCoverageConfigured {
        plan_name: employer_plan.name.clone(),
        detail: "coverage figures required for non-HDHP override".to_string(),
    })?;

    let ytd_individual_deductible = parse(&data.ytd_individual_deductible)?;
    let ytd_individual_oop = parse(&data.ytd_individual_oop)?;

    let mut info = EligibilityInfo {
        individual_deductible: ytd_individual_deductible,
        individual_oop: ytd_individual_oop,
        family_deductible: Money::ZERO,
        family_oop: Money::ZERO,
        individual_deductible_remaining: figures
            .individual_deductible
            .saturating_sub(ytd_individual_deductible),
        individual_oop_remaining: figures.individual_oop.saturating_sub(ytd_individual_oop),
        family_deductible_remaining: Money::ZERO,
        family_oop_remaining: Money::ZERO,
        hra_remaining,
        is_deductible_embedded: figures.is_deductible_embedded,
        is_oop_embedded: figures.is_oop_embedded,
        max_oop_per_covered_individual: figures.max_oop_per_covered_individual,
        rte_transaction_id: None,
    };

    if member_plan.is_family_plan() {
        let ytd_family_deductible = parse(&data.ytd_family_deductible)?;
        let ytd_family_oop = parse(&data.ytd_family_oop)?;
        info.family_deductible = ytd_family_deductible;
        info.family_oop = ytd_family_oop;
        info.family_deductible_remaining = figures
            .family_deductible
            .saturating_sub(ytd_family_deductible);
        info.family_oop_remaining = figures.family_oop.saturating_sub(ytd_family_oop);
    }

    Ok(info)
}
