use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReimbursementRequestState {
    New,
    Pending,
    Approved,
    Denied,
    Reimbursed,
}

impl ReimbursementRequestState {
    /// Approved or Reimbursed: money (or credits) has been committed.
    pub fn is_terminal_success(self) -> bool {
        matches!(self, Self::Approved | Self::Reimbursed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReimbursementType {
    Manual,
    DirectBilling,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BenefitType {
    Currency,
    Cycle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExpenseType {
    Fertility,
    Preservation,
    Adoption,
    Surrogacy,
}

/// Fixed preference order used when an external service category code maps
/// to several candidate subtypes and none matches the request's current
/// expense type.
pub const EXPENSE_TYPE_PRIORITY: [ExpenseType; 2] =
    [ExpenseType::Fertility, ExpenseType::Preservation];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpenseSubtype {
    pub id: Uuid,
    pub code: String,
    pub expense_type: ExpenseType,
    /// External catalog procedure backing this subtype, when one exists.
    pub global_procedure_id: Option<Uuid>,
    /// The claims system's service category code for this subtype.
    pub service_category_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAssociation {
    pub category_id: Uuid,
    pub benefit_type: BenefitType,
    pub num_cycles: Option<i32>,
    pub usd_funding_amount: Option<Money>,
}

/// A benefit category as configured for an organization, including the
/// claims-system accounts that fund it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitCategory {
    pub id: Uuid,
    pub label: String,
    pub allowed_expense_types: Vec<ExpenseType>,
    pub subtypes: Vec<ExpenseSubtype>,
    pub plan_accounts: Vec<CategoryPlanAccount>,
}

impl BenefitCategory {
    pub fn allows_expense_type(&self, expense_type: ExpenseType) -> bool {
        self.allowed_expense_types.contains(&expense_type)
    }

    pub fn subtypes_for_service_category(&self, scc: &str) -> Vec<&ExpenseSubtype> {
        self.subtypes
            .iter()
            .filter(|s| s.service_category_code.as_deref() == Some(scc))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPlanAccount {
    pub plan_id: Uuid,
    pub flex_account_key: String,
    pub account_type_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub alegeus_employee_id: String,
    pub categories: Vec<CategoryAssociation>,
}

impl ReimbursementWallet {
    pub fn allows_category(&self, category_id: Uuid) -> bool {
        self.categories.iter().any(|c| c.category_id == category_id)
    }

    pub fn benefit_type(&self, category_id: Uuid) -> Option<BenefitType> {
        self.categories
            .iter()
            .find(|c| c.category_id == category_id)
            .map(|c| c.benefit_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementRequest {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub amount: Money,
    pub state: ReimbursementRequestState,
    pub expense_type: ExpenseType,
    pub expense_subtype_id: Option<Uuid>,
    /// Populated only under cycle accounting.
    pub cost_credit: Option<i32>,
    pub auto_processed: bool,
    pub reimbursement_type: ReimbursementType,
    pub service_start_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Wallet-side mirror of one claims-system row, matched by tracking number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementClaim {
    pub id: Uuid,
    pub reimbursement_request_id: Uuid,
    pub alegeus_claim_id: String,
    pub alegeus_claim_key: Option<String>,
    /// External status vocabulary, upper-cased on write.
    pub status: Option<String>,
    pub amount: Money,
    pub account_type_code: Option<String>,
}

/// Remaining credit balance for a wallet/category pair under cycle
/// accounting. Mutated only through appended transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReimbursementCycleCredits {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleCreditTransaction {
    pub id: Uuid,
    pub cycle_credit_id: Uuid,
    pub reimbursement_request_id: Option<Uuid>,
    /// Signed delta: negative debits credits, positive restores them.
    pub amount: i32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcedureStatus {
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentProcedure {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub category_id: Uuid,
    pub status: ProcedureStatus,
    pub global_procedure_id: Uuid,
    pub cost: Money,
    pub cost_credit: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AmountType {
    Individual,
    Family,
}

/// Persisted output record of one cost-breakdown calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub treatment_procedure_id: Option<Uuid>,
    pub reimbursement_request_id: Option<Uuid>,
    pub total_member_responsibility: Money,
    pub total_employer_responsibility: Money,
    pub deductible: Money,
    pub deductible_remaining: Money,
    pub family_deductible_remaining: Money,
    pub coinsurance: Money,
    pub copay: Money,
    pub oop_applied: Money,
    pub oop_remaining: Money,
    pub family_oop_remaining: Money,
    pub hra_applied: Money,
    pub overage_amount: Money,
    pub beginning_wallet_balance: Money,
    pub ending_wallet_balance: Money,
    pub is_unlimited: bool,
    pub amount_type: AmountType,
    pub cost_breakdown_type: String,
    pub rte_transaction_id: Option<String>,
    pub calc_config: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalProcedure {
    pub id: Uuid,
    pub name: String,
    pub credits: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_success_states() {
        assert!(ReimbursementRequestState::Approved.is_terminal_success());
        assert!(ReimbursementRequestState::Reimbursed.is_terminal_success());
        assert!(!ReimbursementRequestState::Pending.is_terminal_success());
        assert!(!ReimbursementRequestState::New.is_terminal_success());
        assert!(!ReimbursementRequestState::Denied.is_terminal_success());
    }

    #[test]
    fn category_filters_subtypes_by_service_category_code() {
        let subtype = |code: &str, scc: Option<&str>| ExpenseSubtype {
            id: Uuid::new_v4(),
            code: code.to_string(),
            expense_type: ExpenseType::Fertility,
            global_procedure_id: None,
            service_category_code: scc.map(str::to_string),
        };
        let category = BenefitCategory {
            id: Uuid::new_v4(),
            label: "fertility".to_string(),
            allowed_expense_types: vec![ExpenseType::Fertility],
            subtypes: vec![
                subtype("IVF", Some("FIVF")),
                subtype("IUI", Some("FIUI")),
                subtype("LEGACY", None),
            ],
            plan_accounts: vec![],
        };

        let hits = category.subtypes_for_service_category("FIVF");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "IVF");
        assert!(category.subtypes_for_service_category("XXXX").is_empty());
    }
}
