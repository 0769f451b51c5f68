use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use atria_alegeus::{AlegeusApi, ConfigureAccountRequest};
use atria_core::{
    CycleCreditTransaction, Money, NotificationSink, ProcedureCatalog, ProcedureStatus,
    ReimbursementRequest, ReimbursementType, ReimbursementWallet, WalletEvent, WalletEventKind,
    WalletStore,
};

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("wallet {0} not found")]
    WalletNotFound(Uuid),
    #[error("no cycle credit record for wallet {wallet_id} category {category_id}")]
    MissingCycleCredits { wallet_id: Uuid, category_id: Uuid },
    #[error(
        "claims-system sync failed at {step}; internal conversion is committed and the external \
         account state needs manual follow-up"
    )]
    ExternalSync { step: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Target account description for the external side of a conversion.
#[derive(Debug, Clone)]
pub struct AccountTarget {
    pub flex_account_key: String,
    pub account_type_code: String,
    pub annual_election: Decimal,
    /// The balance the external account should end up reporting, computed
    /// from the internal ledger after conversion.
    pub balance_to_set: Money,
}

/// Migrates a wallet category between currency and cycle accounting.
///
/// The logical conversion is a metadata move: requests and scheduled
/// procedures are re-pointed to the target category and, for the cycle
/// direction, historical spend is retroactively turned into credit debits.
/// External account sync runs after the internal mutations and is
/// all-or-nothing from the caller's perspective.
pub struct BenefitTypeConverter {
    store: Arc<dyn WalletStore>,
    alegeus: Arc<dyn AlegeusApi>,
    catalog: Arc<dyn ProcedureCatalog>,
    sink: Arc<dyn NotificationSink>,
}

impl BenefitTypeConverter {
    pub fn new(
        store: Arc<dyn WalletStore>,
        alegeus: Arc<dyn AlegeusApi>,
        catalog: Arc<dyn ProcedureCatalog>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        BenefitTypeConverter {
            store,
            alegeus,
            catalog,
            sink,
        }
    }

    /// Re-point every request under the cycle category at the currency
    /// category and clear cycle bookkeeping from treatment procedures.
    /// Returns the prior spend (reimbursed/approved) for balance
    /// reconciliation. No money moves here.
    pub async fn convert_cycle_to_currency(
        &self,
        wallet_id: Uuid,
        cycle_category_id: Uuid,
        currency_category_id: Uuid,
    ) -> Result<Money, ConversionError> {
        let wallet = self.load_wallet(wallet_id).await?;
        let requests = self
            .store
            .requests_for_category(wallet.id, cycle_category_id)
            .await?;

        let mut total_reimbursed = Money::ZERO;
        for mut request in requests {
            if request.state.is_terminal_success() {
                total_reimbursed += request.amount;
            }
            request.category_id = currency_category_id;
            self.store.update_request(request).await?;
        }

        self.recategorize_procedures(&wallet, cycle_category_id, currency_category_id, false)
            .await?;

        info!(
            wallet_id = %wallet.id,
            total_reimbursed = %total_reimbursed,
            "converted cycle category to currency"
        );
        self.announce_conversion(&wallet, cycle_category_id, currency_category_id)
            .await;
        Ok(total_reimbursed)
    }

    /// The symmetric direction: beyond re-pointing, already-committed
    /// currency claims retroactively spend credits, one debit transaction
    /// per request per credit pool. Re-running the conversion never debits
    /// a request twice.
    pub async fn convert_currency_to_cycle(
        &self,
        wallet_id: Uuid,
        currency_category_id: Uuid,
        cycle_category_id: Uuid,
    ) -> Result<Money, ConversionError> {
        let wallet = self.load_wallet(wallet_id).await?;
        let credits = self
            .store
            .cycle_credits(wallet.id, cycle_category_id)
            .await?
            .ok_or(ConversionError::MissingCycleCredits {
                wallet_id: wallet.id,
                category_id: cycle_category_id,
            })?;
        let existing: Vec<Option<Uuid>> = self
            .store
            .credit_transactions(credits.id)
            .await?
            .into_iter()
            .map(|t| t.reimbursement_request_id)
            .collect();

        let requests = self
            .store
            .requests_for_category(wallet.id, currency_category_id)
            .await?;

        let mut total_reimbursed = Money::ZERO;
        for mut request in requests {
            // A manual claim that has not been finalized must not spend
            // credits yet; the sync path debits it on approval instead.
            if !request.state.is_terminal_success() {
                request.category_id = cycle_category_id;
                self.store.update_request(request).await?;
                continue;
            }
            total_reimbursed += request.amount;

            if existing.contains(&Some(request.id)) {
                request.category_id = cycle_category_id;
                self.store.update_request(request).await?;
                continue;
            }

            // Resolve against the source category before the re-point, the
            // subtype configuration lives there.
            let resolved = self.resolve_cost_credit(&request).await?;
            request.category_id = cycle_category_id;
            match resolved {
                Some(cost_credit) => {
                    request.cost_credit = Some(cost_credit);
                    self.store.update_request(request.clone()).await?;
                    self.store
                        .append_credit_transaction(CycleCreditTransaction {
                            id: Uuid::new_v4(),
                            cycle_credit_id: credits.id,
                            reimbursement_request_id: Some(request.id),
                            amount: -cost_credit,
                            notes: "benefit conversion: retroactive credit spend".to_string(),
                            created_at: Utc::now(),
                        })
                        .await?;
                }
                None => {
                    // No catalog mapping: never guess a credit cost.
                    self.store.update_request(request.clone()).await?;
                    self.escalate_unresolved_credit(&wallet, &request).await;
                }
            }
        }

        self.recategorize_procedures(&wallet, currency_category_id, cycle_category_id, true)
            .await?;

        info!(
            wallet_id = %wallet.id,
            total_reimbursed = %total_reimbursed,
            "converted currency category to cycle"
        );
        self.announce_conversion(&wallet, currency_category_id, cycle_category_id)
            .await;
        Ok(total_reimbursed)
    }

    /// Bring the claims system in line with a completed conversion:
    /// terminate the source account, reactivate or create the target, and
    /// post a signed deposit so the external remaining balance matches the
    /// internally computed one. Any failed step aborts the sync.
    pub async fn sync_alegeus_accounts(
        &self,
        wallet_id: Uuid,
        source_flex_account_key: &str,
        target: AccountTarget,
    ) -> Result<(), ConversionError> {
        let wallet = self.load_wallet(wallet_id).await?;
        let employee_id = wallet.alegeus_employee_id.as_str();

        let outcome = self
            .alegeus
            .terminate_employee_account(employee_id, source_flex_account_key)
            .await?;
        if !outcome.success {
            return Err(ConversionError::ExternalSync {
                step: "terminate source account".to_string(),
            });
        }

        let external_balance = match self
            .alegeus
            .get_employee_account(employee_id, &target.flex_account_key)
            .await?
        {
            Some(account) => {
                let outcome = self
                    .alegeus
                    .reactivate_employee_account(employee_id, &target.flex_account_key)
                    .await?;
                if !outcome.success {
                    return Err(ConversionError::ExternalSync {
                        step: "reactivate target account".to_string(),
                    });
                }
                Money::from_dollars(account.available_balance).unwrap_or(Money::ZERO)
            }
            None => {
                let outcome = self
                    .alegeus
                    .configure_account(
                        employee_id,
                        ConfigureAccountRequest {
                            account_type_code: target.account_type_code.clone(),
                            coverage_tier_id: None,
                            annual_election: target.annual_election,
                        },
                    )
                    .await?;
                if !outcome.success {
                    return Err(ConversionError::ExternalSync {
                        step: "configure target account".to_string(),
                    });
                }
                Money::from_dollars(target.annual_election).unwrap_or(Money::ZERO)
            }
        };

        let adjustment = target.balance_to_set - external_balance;
        if !adjustment.is_zero() {
            let outcome = self
                .alegeus
                .post_add_prefunded_deposit(employee_id, &target.flex_account_key, adjustment)
                .await?;
            if !outcome.success {
                return Err(ConversionError::ExternalSync {
                    step: "post balance adjustment deposit".to_string(),
                });
            }
        }

        info!(
            wallet_id = %wallet.id,
            adjustment = %adjustment,
            "claims-system accounts synced after conversion"
        );
        Ok(())
    }

    async fn load_wallet(&self, wallet_id: Uuid) -> Result<ReimbursementWallet, ConversionError> {
        self.store
            .wallet(wallet_id)
            .await?
            .ok_or(ConversionError::WalletNotFound(wallet_id))
    }

    /// Scheduled procedures follow the category move; every procedure gets
    /// its cost_credit populated (cycle-bound) or cleared (currency-bound)
    /// so future calculations stay consistent.
    async fn recategorize_procedures(
        &self,
        wallet: &ReimbursementWallet,
        from_category_id: Uuid,
        to_category_id: Uuid,
        cycle_bound: bool,
    ) -> Result<(), ConversionError> {
        for mut procedure in self.store.treatment_procedures(wallet.id).await? {
            if procedure.status == ProcedureStatus::Scheduled
                && procedure.category_id == from_category_id
            {
                procedure.category_id = to_category_id;
            }
            procedure.cost_credit = if cycle_bound {
                self.catalog
                    .procedure_by_id(procedure.global_procedure_id)
                    .await?
                    .map(|p| p.credits)
            } else {
                None
            };
            self.store.update_procedure(procedure).await?;
        }
        Ok(())
    }

    /// Credit cost of an already-committed request: direct-billing claims
    /// map through their cost breakdown's treatment procedure, manual
    /// claims through the expense subtype's catalog procedure.
    async fn resolve_cost_credit(
        &self,
        request: &ReimbursementRequest,
    ) -> Result<Option<i32>, ConversionError> {
        let global_procedure_id = match request.reimbursement_type {
            ReimbursementType::DirectBilling => {
                let breakdown = self.store.cost_breakdown_for_request(request.id).await?;
                match breakdown.and_then(|b| b.treatment_procedure_id) {
                    Some(procedure_id) => self
                        .store
                        .treatment_procedures(request.wallet_id)
                        .await?
                        .into_iter()
                        .find(|p| p.id == procedure_id)
                        .map(|p| p.global_procedure_id),
                    None => None,
                }
            }
            ReimbursementType::Manual => match request.expense_subtype_id {
                Some(subtype_id) => self
                    .store
                    .category(request.category_id)
                    .await?
                    .and_then(|category| {
                        category
                            .subtypes
                            .iter()
                            .find(|s| s.id == subtype_id)
                            .and_then(|s| s.global_procedure_id)
                    }),
                None => None,
            },
        };

        let Some(global_procedure_id) = global_procedure_id else {
            return Ok(None);
        };
        Ok(self
            .catalog
            .procedure_by_id(global_procedure_id)
            .await?
            .map(|p| p.credits))
    }

    async fn announce_conversion(
        &self,
        wallet: &ReimbursementWallet,
        from_category_id: Uuid,
        to_category_id: Uuid,
    ) {
        let event = WalletEvent::new(
            wallet.id,
            WalletEventKind::BenefitTypeConverted,
            "wallet category benefit type converted",
            serde_json::json!({
                "from_category_id": from_category_id,
                "to_category_id": to_category_id,
            }),
        );
        if let Err(err) = self.sink.publish(&event).await {
            tracing::warn!(wallet_id = %wallet.id, "conversion notification failed: {err:#}");
        }
    }

    async fn escalate_unresolved_credit(
        &self,
        wallet: &ReimbursementWallet,
        request: &ReimbursementRequest,
    ) {
        let event = WalletEvent::new(
            wallet.id,
            WalletEventKind::ManualReviewNeeded,
            "benefit conversion could not resolve a credit cost",
            serde_json::json!({
                "reimbursement_request_id": request.id,
                "reimbursement_type": request.reimbursement_type,
            }),
        );
        if let Err(err) = self.sink.publish(&event).await {
            tracing::warn!(request_id = %request.id, "manual-review notification failed: {err:#}");
        }
    }
}
