use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use atria_core::Money;

use crate::api::AlegeusApi;
use crate::wire::{ActivityClaim, ApiOutcome, ConfigureAccountRequest, EmployeeAccount};

/// Scriptable in-memory stand-in for the claims system, used by service
/// tests. Seed activity rows and accounts, optionally script failures per
/// employee or per account key.
#[derive(Default)]
pub struct InMemoryAlegeus {
    activity: RwLock<HashMap<String, Vec<ActivityClaim>>>,
    accounts: RwLock<HashMap<(String, String), EmployeeAccount>>,
    activity_errors: RwLock<HashSet<String>>,
    failing_accounts: RwLock<HashSet<String>>,
    deposits: RwLock<Vec<(String, String, Money)>>,
}

impl InMemoryAlegeus {
    pub async fn seed_activity(&self, employee_id: &str, claims: Vec<ActivityClaim>) {
        self.activity
            .write()
            .await
            .insert(employee_id.to_string(), claims);
    }

    pub async fn seed_account(&self, employee_id: &str, account: EmployeeAccount) {
        self.accounts.write().await.insert(
            (employee_id.to_string(), account.flex_account_key.clone()),
            account,
        );
    }

    /// Make `get_employee_activity` fail for this employee.
    pub async fn script_activity_error(&self, employee_id: &str) {
        self.activity_errors
            .write()
            .await
            .insert(employee_id.to_string());
    }

    /// Make account mutations fail for this flex account key.
    pub async fn script_account_failure(&self, flex_account_key: &str) {
        self.failing_accounts
            .write()
            .await
            .insert(flex_account_key.to_string());
    }

    pub async fn posted_deposits(&self) -> Vec<(String, String, Money)> {
        self.deposits.read().await.clone()
    }

    async fn account_outcome(&self, flex_account_key: &str) -> ApiOutcome {
        if self.failing_accounts.read().await.contains(flex_account_key) {
            ApiOutcome::failed()
        } else {
            ApiOutcome::ok()
        }
    }
}

#[async_trait]
impl AlegeusApi for InMemoryAlegeus {
    async fn get_employee_activity(
        &self,
        employee_id: &str,
        _timeout: Duration,
    ) -> anyhow::Result<Vec<ActivityClaim>> {
        if self.activity_errors.read().await.contains(employee_id) {
            anyhow::bail!("get_employee_activity failed for employee {employee_id}");
        }
        Ok(self
            .activity
            .read()
            .await
            .get(employee_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_employee_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
    ) -> anyhow::Result<Option<EmployeeAccount>> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&(employee_id.to_string(), flex_account_key.to_string()))
            .cloned())
    }

    async fn terminate_employee_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
    ) -> anyhow::Result<ApiOutcome> {
        let outcome = self.account_outcome(flex_account_key).await;
        if outcome.success {
            let mut accounts = self.accounts.write().await;
            if let Some(account) =
                accounts.get_mut(&(employee_id.to_string(), flex_account_key.to_string()))
            {
                account.is_active = false;
            }
        }
        Ok(outcome)
    }

    async fn reactivate_employee_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
    ) -> anyhow::Result<ApiOutcome> {
        let outcome = self.account_outcome(flex_account_key).await;
        if outcome.success {
            let mut accounts = self.accounts.write().await;
            match accounts.get_mut(&(employee_id.to_string(), flex_account_key.to_string())) {
                Some(account) => account.is_active = true,
                None => return Ok(ApiOutcome::failed()),
            }
        }
        Ok(outcome)
    }

    async fn configure_account(
        &self,
        employee_id: &str,
        request: ConfigureAccountRequest,
    ) -> anyhow::Result<ApiOutcome> {
        let key = format!("FLEX-{}", request.account_type_code);
        let outcome = self.account_outcome(&key).await;
        if outcome.success {
            self.accounts.write().await.insert(
                (employee_id.to_string(), key.clone()),
                EmployeeAccount {
                    flex_account_key: key,
                    account_type_code: request.account_type_code,
                    available_balance: request.annual_election,
                    is_active: true,
                },
            );
        }
        Ok(outcome)
    }

    async fn post_add_prefunded_deposit(
        &self,
        employee_id: &str,
        flex_account_key: &str,
        amount: Money,
    ) -> anyhow::Result<ApiOutcome> {
        let outcome = self.account_outcome(flex_account_key).await;
        if outcome.success {
            let mut accounts = self.accounts.write().await;
            if let Some(account) =
                accounts.get_mut(&(employee_id.to_string(), flex_account_key.to_string()))
            {
                account.available_balance += amount.to_dollars();
            }
            self.deposits.write().await.push((
                employee_id.to_string(),
                flex_account_key.to_string(),
                amount,
            ));
        }
        Ok(outcome)
    }
}

impl InMemoryAlegeus {
    /// Convenience for tests seeding a currency account with a dollar
    /// balance.
    pub async fn seed_currency_account(
        &self,
        employee_id: &str,
        flex_account_key: &str,
        balance: Decimal,
        is_active: bool,
    ) {
        self.seed_account(
            employee_id,
            EmployeeAccount {
                flex_account_key: flex_account_key.to_string(),
                account_type_code: "HRA".to_string(),
                available_balance: balance,
                is_active,
            },
        )
        .await;
    }
}
