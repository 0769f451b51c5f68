pub mod error;
pub mod figures;
pub mod resolver;
pub mod rte;
pub mod shape;

pub use error::EligibilityError;
pub use figures::{CoverageFigures, EligibilityInfo};
pub use resolver::{calculation_tier, embedding_flags, resolve_coverage};
pub use rte::{RteOverride, eligibility_info_override, should_override, validate_override};
pub use shape::{PlanShape, YtdField, required_fields};
