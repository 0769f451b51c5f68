use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use atria_alegeus::{ActivityClaim, AlegeusApi};
use atria_core::{
    BenefitCategory, BenefitType, ClaimSyncUpdate, CurrencyAdjuster, CycleCreditTransaction,
    ExpenseSubtype, FlagProvider, NotificationSink, ReimbursementClaim, ReimbursementRequest,
    ReimbursementRequestState, ReimbursementWallet, WalletEvent, WalletEventKind, WalletStore,
    EXPENSE_TYPE_PRIORITY,
};

/// Flag gating the credit debit created when a manual claim newly reaches
/// APPROVED under cycle accounting.
pub const MANUAL_CLAIMS_CREDIT_DEDUCTION: &str = "manual-claims-credit-deduction";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("wallet {0} not found")]
    WalletNotFound(Uuid),
    #[error("claim activity fetch failed for wallet {wallet_id}")]
    Activity {
        wallet_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Batch totals across a reconciliation run. Failed wallets are counted,
/// not surfaced; their claims are retried on the next run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub wallets_processed: usize,
    pub wallets_failed: usize,
    pub claims_synced: usize,
    pub claims_retracted: usize,
}

/// Pulls claim activity from the claims system and folds it back onto the
/// internal claim/request pair, one wallet at a time.
///
/// Each claim is persisted through an atomic `apply_claim_sync` unit, so a
/// wallet that fails midway keeps the claims already committed. Secondary
/// effects (notification, credit deduction) run after the commit and never
/// unwind it.
pub struct ClaimsSyncReconciler {
    store: Arc<dyn WalletStore>,
    alegeus: Arc<dyn AlegeusApi>,
    sink: Arc<dyn NotificationSink>,
    adjuster: Arc<dyn CurrencyAdjuster>,
    flags: Arc<dyn FlagProvider>,
    activity_timeout: Duration,
}

impl ClaimsSyncReconciler {
    pub fn new(
        store: Arc<dyn WalletStore>,
        alegeus: Arc<dyn AlegeusApi>,
        sink: Arc<dyn NotificationSink>,
        adjuster: Arc<dyn CurrencyAdjuster>,
        flags: Arc<dyn FlagProvider>,
        activity_timeout: Duration,
    ) -> Self {
        ClaimsSyncReconciler {
            store,
            alegeus,
            sink,
            adjuster,
            flags,
            activity_timeout,
        }
    }

    /// Reconcile a batch of wallets. A wallet that errors (API or store) is
    /// logged and skipped; the batch always runs to the end.
    pub async fn reconcile_wallets(&self, wallet_ids: &[Uuid]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for &wallet_id in wallet_ids {
            match self.reconcile_wallet(wallet_id).await {
                Ok(stats) => {
                    summary.wallets_processed += 1;
                    summary.claims_synced += stats.claims_synced;
                    summary.claims_retracted += stats.claims_retracted;
                }
                Err(err) => {
                    summary.wallets_failed += 1;
                    error!(wallet_id = %wallet_id, "claims sync failed: {err:#}");
                }
            }
        }
        info!(
            processed = summary.wallets_processed,
            failed = summary.wallets_failed,
            synced = summary.claims_synced,
            retracted = summary.claims_retracted,
            "claims sync batch finished"
        );
        summary
    }

    pub async fn reconcile_wallet(&self, wallet_id: Uuid) -> Result<WalletStats, SyncError> {
        let wallet = self
            .store
            .wallet(wallet_id)
            .await?
            .ok_or(SyncError::WalletNotFound(wallet_id))?;

        let activity = self
            .alegeus
            .get_employee_activity(&wallet.alegeus_employee_id, self.activity_timeout)
            .await
            .map_err(|source| SyncError::Activity { wallet_id, source })?;
        let mut by_tracking_number: HashMap<&str, Vec<&ActivityClaim>> = HashMap::new();
        for row in &activity {
            by_tracking_number
                .entry(row.tracking_number.as_str())
                .or_default()
                .push(row);
        }

        let mut stats = WalletStats::default();
        for claim in self.store.claims_for_wallet(wallet.id).await? {
            match by_tracking_number.get(claim.alegeus_claim_id.as_str()) {
                Some(rows) => {
                    let row = preferred_row(rows);
                    self.sync_claim(&wallet, claim, row).await?;
                    stats.claims_synced += 1;
                }
                None => {
                    self.retract_claim(&wallet, claim).await?;
                    stats.claims_retracted += 1;
                }
            }
        }
        Ok(stats)
    }

    /// The external system no longer knows this claim: drop our mirror row
    /// and put the request back at the start of its lifecycle.
    async fn retract_claim(
        &self,
        wallet: &ReimbursementWallet,
        claim: ReimbursementClaim,
    ) -> Result<(), SyncError> {
        let old_state = self
            .store
            .request(claim.reimbursement_request_id)
            .await?
            .map(|r| r.state);
        self.store
            .apply_claim_retraction(claim.id, claim.reimbursement_request_id)
            .await?;
        info!(
            claim_id = %claim.id,
            request_id = %claim.reimbursement_request_id,
            "claim retracted by external system"
        );
        if old_state.is_some_and(|s| s != ReimbursementRequestState::New) {
            self.publish_state_change(wallet, claim.reimbursement_request_id)
                .await;
        }
        Ok(())
    }

    async fn sync_claim(
        &self,
        wallet: &ReimbursementWallet,
        mut claim: ReimbursementClaim,
        row: &ActivityClaim,
    ) -> Result<(), SyncError> {
        let Some(mut request) = self.store.request(claim.reimbursement_request_id).await? else {
            warn!(claim_id = %claim.id, "claim without a parent request, skipping");
            return Ok(());
        };
        let old_state = request.state;
        let old_amount = claim.amount;

        claim.status = Some(row.normalized_status());
        claim.alegeus_claim_key = row.claim_key.clone().or(claim.alegeus_claim_key);
        claim.account_type_code = row.acct_type_code.clone().or(claim.account_type_code);
        claim.amount = row.claim_amount();
        if request.service_start_date.is_none() {
            request.service_start_date = row.service_start_date;
        }

        if let Some(state) = map_status(row) {
            request.state = state;
        }

        self.reconcile_category(wallet, &mut request, row).await?;
        self.reconcile_subtype(wallet, &mut request, row).await?;

        self.store
            .apply_claim_sync(ClaimSyncUpdate {
                claim: claim.clone(),
                request: request.clone(),
            })
            .await?;

        if claim.amount != old_amount {
            self.adjuster
                .process_adjustment(&request, old_amount, claim.amount)
                .await?;
        }

        if request.state != old_state {
            self.publish_state_change(wallet, request.id).await;
            if request.state == ReimbursementRequestState::Approved {
                self.deduct_credits_on_approval(wallet, &request).await;
            }
        }
        Ok(())
    }

    /// The claims system moved the claim to a different funding account.
    /// Follow it only when the implied category is one the wallet allows
    /// and the expense type still fits; otherwise a human sorts it out.
    async fn reconcile_category(
        &self,
        wallet: &ReimbursementWallet,
        request: &mut ReimbursementRequest,
        row: &ActivityClaim,
    ) -> Result<(), SyncError> {
        let Some(flex_account_key) = row.flex_acct_key.as_deref() else {
            return Ok(());
        };
        let current = self.store.category(request.category_id).await?;
        if current.as_ref().is_some_and(|c| {
            c.plan_accounts
                .iter()
                .any(|a| a.flex_account_key == flex_account_key)
        }) {
            return Ok(());
        }

        let resolved = self.store.category_for_account_key(flex_account_key).await?;
        match resolved {
            Some(category)
                if wallet.allows_category(category.id)
                    && category.allows_expense_type(request.expense_type) =>
            {
                info!(
                    request_id = %request.id,
                    category_id = %category.id,
                    "claim moved to a different benefit category"
                );
                request.category_id = category.id;
            }
            _ => {
                self.escalate(
                    wallet,
                    request.id,
                    "external account key does not map to an allowed category",
                    serde_json::json!({ "flex_account_key": flex_account_key }),
                )
                .await;
            }
        }
        Ok(())
    }

    /// Post-adjudication the external row carries a service category code
    /// that may imply a different expense subtype than we recorded.
    async fn reconcile_subtype(
        &self,
        wallet: &ReimbursementWallet,
        request: &mut ReimbursementRequest,
        row: &ActivityClaim,
    ) -> Result<(), SyncError> {
        let Some(scc) = row.service_category_code.as_deref() else {
            return Ok(());
        };
        let Some(category) = self.store.category(request.category_id).await? else {
            return Ok(());
        };
        match resolve_subtype(&category, request, scc) {
            SubtypeResolution::Unambiguous(subtype_id) => {
                request.expense_subtype_id = Some(subtype_id);
            }
            SubtypeResolution::NoCandidates => {}
            SubtypeResolution::Ambiguous => {
                self.escalate(
                    wallet,
                    request.id,
                    "service category code matches multiple expense subtypes",
                    serde_json::json!({ "service_category_code": scc }),
                )
                .await;
            }
        }
        Ok(())
    }

    /// Second phase after a commit that newly approved a cycle-accounted
    /// request: spend its credits. A failure here only raises a ticket.
    async fn deduct_credits_on_approval(
        &self,
        wallet: &ReimbursementWallet,
        request: &ReimbursementRequest,
    ) {
        let cost_credit = request.cost_credit.unwrap_or(0);
        if cost_credit <= 0
            || wallet.benefit_type(request.category_id) != Some(BenefitType::Cycle)
            || !self.flags.bool_flag(MANUAL_CLAIMS_CREDIT_DEDUCTION, false)
        {
            return;
        }
        if let Err(err) = self.append_credit_debit(wallet, request, cost_credit).await {
            warn!(request_id = %request.id, "credit deduction failed after approval: {err:#}");
            let event = WalletEvent::new(
                wallet.id,
                WalletEventKind::CreditDeductionFailed,
                "credit deduction failed after claim approval",
                serde_json::json!({
                    "reimbursement_request_id": request.id,
                    "cost_credit": cost_credit,
                }),
            );
            if let Err(err) = self.sink.publish(&event).await {
                warn!(request_id = %request.id, "credit-deduction ticket failed: {err:#}");
            }
        }
    }

    async fn append_credit_debit(
        &self,
        wallet: &ReimbursementWallet,
        request: &ReimbursementRequest,
        cost_credit: i32,
    ) -> anyhow::Result<()> {
        let credits = self
            .store
            .cycle_credits(wallet.id, request.category_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no cycle credit record for wallet {} category {}",
                    wallet.id,
                    request.category_id
                )
            })?;
        self.store
            .append_credit_transaction(CycleCreditTransaction {
                id: Uuid::new_v4(),
                cycle_credit_id: credits.id,
                reimbursement_request_id: Some(request.id),
                amount: -cost_credit,
                notes: "claims sync: credit deduction on approval".to_string(),
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }

    async fn publish_state_change(&self, wallet: &ReimbursementWallet, request_id: Uuid) {
        let event = WalletEvent::new(
            wallet.id,
            WalletEventKind::RequestStateChanged,
            "reimbursement request state changed during claims sync",
            serde_json::json!({ "reimbursement_request_id": request_id }),
        );
        if let Err(err) = self.sink.publish(&event).await {
            warn!(request_id = %request_id, "state-change notification failed: {err:#}");
        }
    }

    async fn escalate(
        &self,
        wallet: &ReimbursementWallet,
        request_id: Uuid,
        reason: &str,
        context: serde_json::Value,
    ) {
        warn!(request_id = %request_id, "claims sync escalation: {reason}");
        let event = WalletEvent::new(wallet.id, WalletEventKind::ManualReviewNeeded, reason, context);
        if let Err(err) = self.sink.publish(&event).await {
            warn!(request_id = %request_id, "manual-review notification failed: {err:#}");
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WalletStats {
    pub claims_synced: usize,
    pub claims_retracted: usize,
}

/// Duplicate tracking numbers: preferring `false < true` on the key picks a
/// non-denied row first, then a non-DTR one.
fn preferred_row<'a>(rows: &[&'a ActivityClaim]) -> &'a ActivityClaim {
    rows.iter()
        .copied()
        .min_by_key(|row| (row.is_denied(), row.is_dtr()))
        .unwrap_or(rows[0])
}

/// External status vocabulary to internal request state. An unmapped status
/// keeps the internal state as-is.
fn map_status(row: &ActivityClaim) -> Option<ReimbursementRequestState> {
    let status = row.normalized_status().replace(' ', "_");
    match status.as_str() {
        "NEEDS_RECEIPT" | "SUBMITTED_UNDER_REVIEW" => Some(ReimbursementRequestState::Pending),
        "DENIED" => Some(ReimbursementRequestState::Denied),
        // A DTR adjudication only tracks the deductible, it pays nothing.
        "APPROVED" | "PARTIALLY_APPROVED" if row.is_dtr() => {
            Some(ReimbursementRequestState::Denied)
        }
        "APPROVED" | "PARTIALLY_APPROVED" => Some(ReimbursementRequestState::Approved),
        "PAID" | "PARTIALLY_PAID" | "CLAIM_ADJUSTED_OVERPAYMENT" => {
            Some(ReimbursementRequestState::Reimbursed)
        }
        _ => None,
    }
}

enum SubtypeResolution {
    Unambiguous(Uuid),
    NoCandidates,
    Ambiguous,
}

fn resolve_subtype(
    category: &BenefitCategory,
    request: &ReimbursementRequest,
    scc: &str,
) -> SubtypeResolution {
    let candidates = category.subtypes_for_service_category(scc);
    match candidates.as_slice() {
        [] => SubtypeResolution::NoCandidates,
        [only] => SubtypeResolution::Unambiguous(only.id),
        _ => {
            let by_current: Vec<&&ExpenseSubtype> = candidates
                .iter()
                .filter(|s| s.expense_type == request.expense_type)
                .collect();
            if let [only] = by_current.as_slice() {
                return SubtypeResolution::Unambiguous(only.id);
            }
            for expense_type in EXPENSE_TYPE_PRIORITY {
                let matching: Vec<&&ExpenseSubtype> = candidates
                    .iter()
                    .filter(|s| s.expense_type == expense_type)
                    .collect();
                match matching.as_slice() {
                    [] => continue,
                    [only] => return SubtypeResolution::Unambiguous(only.id),
                    _ => break,
                }
            }
            SubtypeResolution::Ambiguous
        }
    }
}
