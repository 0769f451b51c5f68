use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use atria_core::Money;

/// Account type code the claims system uses for deductible-tracking-only
/// adjudications. An approval on a DTR account is not a payable approval.
pub const DTR_ACCOUNT_TYPE: &str = "DTR";

/// One row of employee claim activity as the claims system returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivityClaim {
    pub tracking_number: String,
    pub status: String,
    pub claim_key: Option<String>,
    pub acct_type_code: Option<String>,
    pub flex_acct_key: Option<String>,
    /// Only populated post-adjudication.
    pub service_category_code: Option<String>,
    pub service_start_date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub accounts_paid_amount: Option<Decimal>,
}

impl ActivityClaim {
    /// External status vocabulary, normalized the way we store it.
    pub fn normalized_status(&self) -> String {
        self.status.trim().to_uppercase()
    }

    pub fn is_denied(&self) -> bool {
        self.normalized_status() == "DENIED"
    }

    pub fn is_dtr(&self) -> bool {
        self.acct_type_code.as_deref() == Some(DTR_ACCOUNT_TYPE)
    }

    /// Paid amount wins over the submitted amount once the claim settles.
    pub fn claim_amount(&self) -> Money {
        let dollars = self.accounts_paid_amount.or(self.amount).unwrap_or_default();
        Money::from_dollars(dollars).unwrap_or(Money::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmployeeAccount {
    pub flex_account_key: String,
    pub account_type_code: String,
    pub available_balance: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigureAccountRequest {
    pub account_type_code: String,
    pub coverage_tier_id: Option<String>,
    pub annual_election: Decimal,
}

/// Success/failure indicator plus whatever JSON the endpoint returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOutcome {
    pub success: bool,
    pub payload: Option<serde_json::Value>,
}

impl ApiOutcome {
    pub fn ok() -> Self {
        ApiOutcome { success: true, payload: None }
    }

    pub fn failed() -> Self {
        ApiOutcome { success: false, payload: None }
    }
}
