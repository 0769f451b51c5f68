use std::time::Duration;

use async_trait::async_trait;

use atria_core::Money;

use crate::wire::{ActivityClaim, ApiOutcome, ConfigureAccountRequest, EmployeeAccount};

/// The claims-system HTTP surface this core consumes. Calls are blocking
/// from the caller's perspective; only `get_employee_activity` honors a
/// timeout because it is the one call sitting inside batch loops.
#[async_trait]
pub trait AlegeusApi: Send + Sync {
    async fn get_employee_activity(
        &self,
        employee_id: &str,
        timeout: Duration,
    ) -> anyhow::Result<Vec<ActivityClaim>>;

    async fn get_employee_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
    ) -> anyhow::Result<Option<EmployeeAccount>>;

    async fn terminate_employee_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
    ) -> anyhow::Result<ApiOutcome>;

    async fn reactivate_employee_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
    ) -> anyhow::Result<ApiOutcome>;

    async fn configure_account(
        &self,
        employee_id: &str,
        request: ConfigureAccountRequest,
    ) -> anyhow::Result<ApiOutcome>;

    /// Post a signed deposit adjustment. Negative amounts draw the account
    /// down; positive amounts fund it.
    async fn post_add_prefunded_deposit(
        &self,
        employee_id: &str,
        flex_account_key: &str,
        amount: Money,
    ) -> anyhow::Result<ApiOutcome>;
}
