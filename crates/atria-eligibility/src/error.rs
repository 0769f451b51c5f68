use thiserror::Error;

use atria_core::MoneyError;

use crate::shape::{PlanShape, YtdField};

#[derive(Debug, Error)]
pub enum EligibilityError {
    #[error("missing year-to-date figures for {shape}: {}", format_fields(.missing))]
    MissingYtdFields {
        shape: PlanShape,
        missing: Vec<YtdField>,
    },
    #[error("override data supplied without a member health plan")]
    OverrideWithoutPlan,
    #[error("tiered plan requires a clinic location to resolve the calculation tier")]
    MissingClinicLocation,
    #[error("no coverage configured for plan {plan_name} ({detail})")]
    NoCoverageConfigured { plan_name: String, detail: String },
    #[error(transparent)]
    Money(#[from] MoneyError),
}

fn format_fields(missing: &[YtdField]) -> String {
    missing
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}
