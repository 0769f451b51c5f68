use async_trait::async_trait;
use uuid::Uuid;

use crate::events::WalletEvent;
use crate::models::{
    BenefitCategory, CostBreakdown, CycleCreditTransaction, GlobalProcedure, ReimbursementClaim,
    ReimbursementCycleCredits, ReimbursementRequest, ReimbursementWallet, TreatmentProcedure,
};
use crate::money::Money;

/// A claim row and its parent request, persisted as one unit so a failed
/// sync leaves neither half-written.
#[derive(Debug, Clone)]
pub struct ClaimSyncUpdate {
    pub claim: ReimbursementClaim,
    pub request: ReimbursementRequest,
}

/// Transactional wallet state. Each `apply_*` method is an atomic unit of
/// work: it either fully persists or leaves the store untouched, which is
/// what lets batch callers commit once per successfully-processed claim.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn wallet(&self, wallet_id: Uuid) -> anyhow::Result<Option<ReimbursementWallet>>;
    async fn category(&self, category_id: Uuid) -> anyhow::Result<Option<BenefitCategory>>;
    /// Reverse lookup from a claims-system flex account key to the category
    /// funded by that account.
    async fn category_for_account_key(
        &self,
        flex_account_key: &str,
    ) -> anyhow::Result<Option<BenefitCategory>>;

    async fn request(&self, request_id: Uuid) -> anyhow::Result<Option<ReimbursementRequest>>;
    async fn requests_for_category(
        &self,
        wallet_id: Uuid,
        category_id: Uuid,
    ) -> anyhow::Result<Vec<ReimbursementRequest>>;
    async fn claims_for_wallet(&self, wallet_id: Uuid)
    -> anyhow::Result<Vec<ReimbursementClaim>>;

    async fn cycle_credits(
        &self,
        wallet_id: Uuid,
        category_id: Uuid,
    ) -> anyhow::Result<Option<ReimbursementCycleCredits>>;
    async fn credit_transactions(
        &self,
        cycle_credit_id: Uuid,
    ) -> anyhow::Result<Vec<CycleCreditTransaction>>;
    async fn treatment_procedures(
        &self,
        wallet_id: Uuid,
    ) -> anyhow::Result<Vec<TreatmentProcedure>>;
    async fn cost_breakdown_for_request(
        &self,
        request_id: Uuid,
    ) -> anyhow::Result<Option<CostBreakdown>>;

    async fn update_request(&self, request: ReimbursementRequest) -> anyhow::Result<()>;
    async fn update_procedure(&self, procedure: TreatmentProcedure) -> anyhow::Result<()>;
    async fn apply_claim_sync(&self, update: ClaimSyncUpdate) -> anyhow::Result<()>;
    /// Delete the claim and revert its request to New, atomically.
    async fn apply_claim_retraction(
        &self,
        claim_id: Uuid,
        request_id: Uuid,
    ) -> anyhow::Result<()>;
    /// Append a signed credit transaction and fold it into the credit
    /// balance (clamped at zero on debit). Returns the updated balance row.
    async fn append_credit_transaction(
        &self,
        txn: CycleCreditTransaction,
    ) -> anyhow::Result<ReimbursementCycleCredits>;
    async fn insert_cost_breakdown(&self, breakdown: CostBreakdown) -> anyhow::Result<()>;
}

/// Queued notification/ticketing sink. Publishing never blocks the caller's
/// primary transaction; failures are the publisher's to log.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &WalletEvent) -> anyhow::Result<()>;
}

/// External procedure catalog, used to resolve cycle-credit cost.
#[async_trait]
pub trait ProcedureCatalog: Send + Sync {
    async fn procedure_by_id(&self, id: Uuid) -> anyhow::Result<Option<GlobalProcedure>>;
}

/// Multi-currency ledger hook fired when a synced claim amount changes.
#[async_trait]
pub trait CurrencyAdjuster: Send + Sync {
    async fn process_adjustment(
        &self,
        request: &ReimbursementRequest,
        old_amount: Money,
        new_amount: Money,
    ) -> anyhow::Result<()>;
}

/// Feature-flag oracle, resolved once per operation and passed down
/// explicitly rather than read from ambient global state.
pub trait FlagProvider: Send + Sync {
    fn bool_flag(&self, name: &str, default: bool) -> bool;
}
