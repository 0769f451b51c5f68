use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use atria_core::{
    BenefitCategory, ClaimSyncUpdate, CostBreakdown, CurrencyAdjuster, CycleCreditTransaction,
    GlobalProcedure, Money, NotificationSink, ProcedureCatalog, ReimbursementClaim,
    ReimbursementCycleCredits, ReimbursementRequest, ReimbursementWallet, TreatmentProcedure,
    WalletEvent, WalletStore,
};

#[derive(Default)]
struct StoreState {
    wallets: HashMap<Uuid, ReimbursementWallet>,
    categories: HashMap<Uuid, BenefitCategory>,
    requests: HashMap<Uuid, ReimbursementRequest>,
    claims: HashMap<Uuid, ReimbursementClaim>,
    credits: HashMap<Uuid, ReimbursementCycleCredits>,
    transactions: Vec<CycleCreditTransaction>,
    procedures: HashMap<Uuid, TreatmentProcedure>,
    breakdowns: Vec<CostBreakdown>,
}

/// In-memory wallet store. Every trait method takes the write lock for its
/// whole unit of work, so each `apply_*` call is atomic with respect to
/// concurrent readers.
#[derive(Default)]
pub struct InMemoryWalletStore {
    state: RwLock<StoreState>,
}

impl InMemoryWalletStore {
    pub async fn insert_wallet(&self, wallet: ReimbursementWallet) {
        self.state.write().await.wallets.insert(wallet.id, wallet);
    }

    pub async fn insert_category(&self, category: BenefitCategory) {
        self.state
            .write()
            .await
            .categories
            .insert(category.id, category);
    }

    pub async fn insert_request(&self, request: ReimbursementRequest) {
        self.state.write().await.requests.insert(request.id, request);
    }

    pub async fn insert_claim(&self, claim: ReimbursementClaim) {
        self.state.write().await.claims.insert(claim.id, claim);
    }

    pub async fn insert_credits(&self, credits: ReimbursementCycleCredits) {
        self.state.write().await.credits.insert(credits.id, credits);
    }

    pub async fn insert_procedure(&self, procedure: TreatmentProcedure) {
        self.state
            .write()
            .await
            .procedures
            .insert(procedure.id, procedure);
    }

    pub async fn insert_breakdown(&self, breakdown: CostBreakdown) {
        self.state.write().await.breakdowns.push(breakdown);
    }

    pub async fn claim(&self, claim_id: Uuid) -> Option<ReimbursementClaim> {
        self.state.read().await.claims.get(&claim_id).cloned()
    }

    pub async fn transactions_for_request(
        &self,
        request_id: Uuid,
    ) -> Vec<CycleCreditTransaction> {
        self.state
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| t.reimbursement_request_id == Some(request_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn wallet(&self, wallet_id: Uuid) -> anyhow::Result<Option<ReimbursementWallet>> {
        Ok(self.state.read().await.wallets.get(&wallet_id).cloned())
    }

    async fn category(&self, category_id: Uuid) -> anyhow::Result<Option<BenefitCategory>> {
        Ok(self.state.read().await.categories.get(&category_id).cloned())
    }

    async fn category_for_account_key(
        &self,
        flex_account_key: &str,
    ) -> anyhow::Result<Option<BenefitCategory>> {
        Ok(self
            .state
            .read()
            .await
            .categories
            .values()
            .find(|c| {
                c.plan_accounts
                    .iter()
                    .any(|a| a.flex_account_key == flex_account_key)
            })
            .cloned())
    }

    async fn request(&self, request_id: Uuid) -> anyhow::Result<Option<ReimbursementRequest>> {
        Ok(self.state.read().await.requests.get(&request_id).cloned())
    }

    async fn requests_for_category(
        &self,
        wallet_id: Uuid,
        category_id: Uuid,
    ) -> anyhow::Result<Vec<ReimbursementRequest>> {
        let mut requests: Vec<ReimbursementRequest> = self
            .state
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.wallet_id == wallet_id && r.category_id == category_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn claims_for_wallet(
        &self,
        wallet_id: Uuid,
    ) -> anyhow::Result<Vec<ReimbursementClaim>> {
        let state = self.state.read().await;
        Ok(state
            .claims
            .values()
            .filter(|c| {
                state
                    .requests
                    .get(&c.reimbursement_request_id)
                    .is_some_and(|r| r.wallet_id == wallet_id)
            })
            .cloned()
            .collect())
    }

    async fn cycle_credits(
        &self,
        wallet_id: Uuid,
        category_id: Uuid,
    ) -> anyhow::Result<Option<ReimbursementCycleCredits>> {
        Ok(self
            .state
            .read()
            .await
            .credits
            .values()
            .find(|c| c.wallet_id == wallet_id && c.category_id == category_id)
            .cloned())
    }

    async fn credit_transactions(
        &self,
        cycle_credit_id: Uuid,
    ) -> anyhow::Result<Vec<CycleCreditTransaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| t.cycle_credit_id == cycle_credit_id)
            .cloned()
            .collect())
    }

    async fn treatment_procedures(
        &self,
        wallet_id: Uuid,
    ) -> anyhow::Result<Vec<TreatmentProcedure>> {
        Ok(self
            .state
            .read()
            .await
            .procedures
            .values()
            .filter(|p| p.wallet_id == wallet_id)
            .cloned()
            .collect())
    }

    async fn cost_breakdown_for_request(
        &self,
        request_id: Uuid,
    ) -> anyhow::Result<Option<CostBreakdown>> {
        Ok(self
            .state
            .read()
            .await
            .breakdowns
            .iter()
            .find(|b| b.reimbursement_request_id == Some(request_id))
            .cloned())
    }

    async fn update_request(&self, request: ReimbursementRequest) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        if !state.requests.contains_key(&request.id) {
            anyhow::bail!("reimbursement request {} does not exist", request.id);
        }
        state.requests.insert(request.id, request);
        Ok(())
    }

    async fn update_procedure(&self, procedure: TreatmentProcedure) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        if !state.procedures.contains_key(&procedure.id) {
            anyhow::bail!("treatment procedure {} does not exist", procedure.id);
        }
        state.procedures.insert(procedure.id, procedure);
        Ok(())
    }

    async fn apply_claim_sync(&self, update: ClaimSyncUpdate) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        if !state.requests.contains_key(&update.request.id) {
            anyhow::bail!("reimbursement request {} does not exist", update.request.id);
        }
        state.claims.insert(update.claim.id, update.claim);
        state.requests.insert(update.request.id, update.request);
        Ok(())
    }

    async fn apply_claim_retraction(
        &self,
        claim_id: Uuid,
        request_id: Uuid,
    ) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        let Some(request) = state.requests.get_mut(&request_id) else {
            anyhow::bail!("reimbursement request {request_id} does not exist");
        };
        request.state = atria_core::ReimbursementRequestState::New;
        state.claims.remove(&claim_id);
        Ok(())
    }

    async fn append_credit_transaction(
        &self,
        txn: CycleCreditTransaction,
    ) -> anyhow::Result<ReimbursementCycleCredits> {
        let mut state = self.state.write().await;
        let Some(credits) = state.credits.get_mut(&txn.cycle_credit_id) else {
            anyhow::bail!("cycle credit record {} does not exist", txn.cycle_credit_id);
        };
        // Balance folds every appended transaction, clamped at zero on
        // debit so over-spend never drives it negative.
        credits.amount = (credits.amount + txn.amount).max(0);
        let updated = credits.clone();
        state.transactions.push(txn);
        Ok(updated)
    }

    async fn insert_cost_breakdown(&self, breakdown: CostBreakdown) -> anyhow::Result<()> {
        self.state.write().await.breakdowns.push(breakdown);
        Ok(())
    }
}

/// Collects published events in memory. Stand-in for the queued
/// notification bus in tests.
#[derive(Default)]
pub struct RecordingSink {
    events: RwLock<Vec<WalletEvent>>,
}

impl RecordingSink {
    pub async fn events(&self) -> Vec<WalletEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, event: &WalletEvent) -> anyhow::Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Fixed procedure catalog keyed by id.
#[derive(Default)]
pub struct StaticCatalog {
    procedures: HashMap<Uuid, GlobalProcedure>,
}

impl StaticCatalog {
    pub fn with(procedures: Vec<GlobalProcedure>) -> Self {
        StaticCatalog {
            procedures: procedures.into_iter().map(|p| (p.id, p)).collect(),
        }
    }
}

#[async_trait]
impl ProcedureCatalog for StaticCatalog {
    async fn procedure_by_id(&self, id: Uuid) -> anyhow::Result<Option<GlobalProcedure>> {
        Ok(self.procedures.get(&id).cloned())
    }
}

/// Records amount adjustments without doing any ledger work.
#[derive(Default)]
pub struct RecordingAdjuster {
    adjustments: RwLock<Vec<(Uuid, Money, Money)>>,
}

impl RecordingAdjuster {
    pub async fn adjustments(&self) -> Vec<(Uuid, Money, Money)> {
        self.adjustments.read().await.clone()
    }
}

#[async_trait]
impl CurrencyAdjuster for RecordingAdjuster {
    async fn process_adjustment(
        &self,
        request: &ReimbursementRequest,
        old_amount: Money,
        new_amount: Money,
    ) -> anyhow::Result<()> {
        self.adjustments
            .write()
            .await
            .push((request.id, old_amount, new_amount));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atria_core::{ExpenseType, ReimbursementRequestState, ReimbursementType};
    use chrono::Utc;

    fn request(wallet_id: Uuid, category_id: Uuid) -> ReimbursementRequest {
        ReimbursementRequest {
            id: Uuid::new_v4(),
            wallet_id,
            category_id,
            amount: Money::from_cents(10_000),
            state: ReimbursementRequestState::Pending,
            expense_type: ExpenseType::Fertility,
            expense_subtype_id: None,
            cost_credit: None,
            auto_processed: false,
            reimbursement_type: ReimbursementType::Manual,
            service_start_date: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn credit_balance_folds_transactions_and_clamps() {
        let store = InMemoryWalletStore::default();
        let credits = ReimbursementCycleCredits {
            id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            amount: 10,
        };
        store.insert_credits(credits.clone()).await;

        let txn = |amount: i32| CycleCreditTransaction {
            id: Uuid::new_v4(),
            cycle_credit_id: credits.id,
            reimbursement_request_id: None,
            amount,
            notes: "test".to_string(),
            created_at: Utc::now(),
        };

        let updated = store.append_credit_transaction(txn(-4)).await.unwrap();
        assert_eq!(updated.amount, 6);
        let updated = store.append_credit_transaction(txn(-20)).await.unwrap();
        assert_eq!(updated.amount, 0);
        let updated = store.append_credit_transaction(txn(5)).await.unwrap();
        assert_eq!(updated.amount, 5);
        assert_eq!(store.credit_transactions(credits.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn retraction_deletes_claim_and_reverts_request() {
        let store = InMemoryWalletStore::default();
        let wallet_id = Uuid::new_v4();
        let mut req = request(wallet_id, Uuid::new_v4());
        req.state = ReimbursementRequestState::Approved;
        let claim = ReimbursementClaim {
            id: Uuid::new_v4(),
            reimbursement_request_id: req.id,
            alegeus_claim_id: "TN1".to_string(),
            alegeus_claim_key: None,
            status: Some("APPROVED".to_string()),
            amount: Money::from_cents(10_000),
            account_type_code: None,
        };
        store.insert_request(req.clone()).await;
        store.insert_claim(claim.clone()).await;

        store.apply_claim_retraction(claim.id, req.id).await.unwrap();
        assert!(store.claim(claim.id).await.is_none());
        assert_eq!(
            store.request(req.id).await.unwrap().unwrap().state,
            ReimbursementRequestState::New
        );
    }

    #[tokio::test]
    async fn category_lookup_by_flex_account_key() {
        let store = InMemoryWalletStore::default();
        let category = BenefitCategory {
            id: Uuid::new_v4(),
            label: "fertility".to_string(),
            allowed_expense_types: vec![ExpenseType::Fertility],
            subtypes: vec![],
            plan_accounts: vec![atria_core::CategoryPlanAccount {
                plan_id: Uuid::new_v4(),
                flex_account_key: "FLEX-123".to_string(),
                account_type_code: "HRA".to_string(),
            }],
        };
        store.insert_category(category.clone()).await;

        let found = store.category_for_account_key("FLEX-123").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(category.id));
        assert!(store.category_for_account_key("NOPE").await.unwrap().is_none());
    }
}
