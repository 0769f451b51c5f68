use std::fmt;

use serde::{Deserialize, Serialize};

use atria_core::{EmployerHealthPlan, MemberHealthPlan};

/// The four booleans that decide which year-to-date figures an RTE override
/// must supply. Kept as an explicit table so every combination is visible
/// and testable rather than buried in control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanShape {
    pub is_hdhp: bool,
    pub is_family: bool,
    pub deductible_embedded: bool,
    pub oop_embedded: bool,
}

impl PlanShape {
    /// Derive the shape for a member on an employer plan. HDHP plans track
    /// OOP only, and individual plans have nothing to embed, so embedding
    /// flags are normalized away for both.
    pub fn resolve(
        employer_plan: &EmployerHealthPlan,
        member_plan: &MemberHealthPlan,
        deductible_embedded: bool,
        oop_embedded: bool,
    ) -> Self {
        let is_family = member_plan.is_family_plan();
        let embeddable = is_family && !employer_plan.is_hdhp;
        PlanShape {
            is_hdhp: employer_plan.is_hdhp,
            is_family,
            deductible_embedded: embeddable && deductible_embedded,
            oop_embedded: embeddable && oop_embedded,
        }
    }
}

impl fmt::Display for PlanShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match (self.is_hdhp, self.is_family) {
            (true, true) => "HDHP family plan",
            (true, false) => "HDHP individual plan",
            (false, true) => "family plan",
            (false, false) => "individual plan",
        };
        write!(f, "{base}")?;
        match (self.deductible_embedded, self.oop_embedded) {
            (true, true) => write!(f, " (deductible and OOP embedded)"),
            (true, false) => write!(f, " (deductible embedded)"),
            (false, true) => write!(f, " (OOP embedded)"),
            (false, false) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YtdField {
    YtdIndividualDeductible,
    YtdIndividualOop,
    YtdFamilyDeductible,
    YtdFamilyOop,
    IndividualOopRemaining,
    FamilyOopRemaining,
}

impl YtdField {
    pub fn label(self) -> &'static str {
        match self {
            YtdField::YtdIndividualDeductible => "ytd_individual_deductible",
            YtdField::YtdIndividualOop => "ytd_individual_oop",
            YtdField::YtdFamilyDeductible => "ytd_family_deductible",
            YtdField::YtdFamilyOop => "ytd_family_oop",
            YtdField::IndividualOopRemaining => "individual_oop_remaining",
            YtdField::FamilyOopRemaining => "family_oop_remaining",
        }
    }
}

struct ShapeRule {
    shape: PlanShape,
    required: &'static [YtdField],
}

const fn shape(is_hdhp: bool, is_family: bool, ded_embedded: bool, oop_embedded: bool) -> PlanShape {
    PlanShape {
        is_hdhp,
        is_family,
        deductible_embedded: ded_embedded,
        oop_embedded,
    }
}

/// Required override fields per plan shape. One row per reachable
/// combination after [`PlanShape::resolve`] normalization.
const SHAPE_RULES: [ShapeRule; 7] = [
    // HDHP plans track OOP only; no deductible figures are ever required.
    ShapeRule {
        shape: shape(true, false, false, false),
        required: &[YtdField::YtdIndividualOop, YtdField::IndividualOopRemaining],
    },
    ShapeRule {
        shape: shape(true, true, false, false),
        required: &[
            YtdField::YtdIndividualOop,
            YtdField::IndividualOopRemaining,
            YtdField::YtdFamilyOop,
            YtdField::FamilyOopRemaining,
        ],
    },
    // Non-HDHP family plans: embedded limits add the individual-side YTD
    // figure for whichever limit is embedded.
    ShapeRule {
        shape: shape(false, true, true, true),
        required: &[
            YtdField::YtdIndividualDeductible,
            YtdField::YtdIndividualOop,
            YtdField::YtdFamilyDeductible,
            YtdField::YtdFamilyOop,
        ],
    },
    ShapeRule {
        shape: shape(false, true, true, false),
        required: &[
            YtdField::YtdIndividualDeductible,
            YtdField::YtdFamilyDeductible,
            YtdField::YtdFamilyOop,
        ],
    },
    ShapeRule {
        shape: shape(false, true, false, true),
        required: &[
            YtdField::YtdIndividualOop,
            YtdField::YtdFamilyDeductible,
            YtdField::YtdFamilyOop,
        ],
    },
    ShapeRule {
        shape: shape(false, true, false, false),
        required: &[YtdField::YtdFamilyDeductible, YtdField::YtdFamilyOop],
    },
    ShapeRule {
        shape: shape(false, false, false, false),
        required: &[YtdField::YtdIndividualDeductible, YtdField::YtdIndividualOop],
    },
];

/// The override fields a given plan shape must supply.
pub fn required_fields(shape: PlanShape) -> &'static [YtdField] {
    SHAPE_RULES
        .iter()
        .find(|rule| rule.shape == shape)
        .map(|rule| rule.required)
        // Unreachable after PlanShape::resolve normalization, but a miss
        // must fail closed by demanding everything.
        .unwrap_or(&[
            YtdField::YtdIndividualDeductible,
            YtdField::YtdIndividualOop,
            YtdField::YtdFamilyDeductible,
            YtdField::YtdFamilyOop,
            YtdField::IndividualOopRemaining,
            YtdField::FamilyOopRemaining,
        ])
}
