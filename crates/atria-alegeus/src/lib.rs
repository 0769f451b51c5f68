pub mod api;
pub mod fake;
pub mod wire;

pub use api::AlegeusApi;
pub use fake::InMemoryAlegeus;
pub use wire::{
    ActivityClaim, ApiOutcome, ConfigureAccountRequest, DTR_ACCOUNT_TYPE, EmployeeAccount,
};
