use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use atria_alegeus::{ActivityClaim, InMemoryAlegeus};
use atria_core::{
    BenefitCategory, BenefitType, CategoryAssociation, CategoryPlanAccount, ExpenseSubtype,
    ExpenseType, Money, ReimbursementClaim, ReimbursementCycleCredits, ReimbursementRequest,
    ReimbursementRequestState, ReimbursementType, ReimbursementWallet, WalletEventKind,
    WalletStore,
};
use atria_platform::StaticFlags;
use atria_store::{InMemoryWalletStore, RecordingAdjuster, RecordingSink};
use atria_sync::{ClaimsSyncReconciler, MANUAL_CLAIMS_CREDIT_DEDUCTION, SyncError};

const TIMEOUT: Duration = Duration::from_secs(2);

struct Fixture {
    store: Arc<InMemoryWalletStore>,
    alegeus: Arc<InMemoryAlegeus>,
    sink: Arc<RecordingSink>,
    adjuster: Arc<RecordingAdjuster>,
    wallet_id: Uuid,
    currency_category_id: Uuid,
    cycle_category_id: Uuid,
}

impl Fixture {
    fn reconciler(&self, flags: &[(&str, bool)]) -> ClaimsSyncReconciler {
        ClaimsSyncReconciler::new(
            self.store.clone(),
            self.alegeus.clone(),
            self.sink.clone(),
            self.adjuster.clone(),
            Arc::new(StaticFlags::with(flags)),
            TIMEOUT,
        )
    }

    async fn seed_request_and_claim(
        &self,
        category_id: Uuid,
        state: ReimbursementRequestState,
        tracking_number: &str,
        amount_cents: i64,
    ) -> (ReimbursementRequest, ReimbursementClaim) {
        let request = ReimbursementRequest {
            id: Uuid::new_v4(),
            wallet_id: self.wallet_id,
            category_id,
            amount: Money::from_cents(amount_cents),
            state,
            expense_type: ExpenseType::Fertility,
            expense_subtype_id: None,
            cost_credit: None,
            auto_processed: false,
            reimbursement_type: ReimbursementType::Manual,
            service_start_date: None,
            created_at: Utc::now(),
        };
        let claim = ReimbursementClaim {
            id: Uuid::new_v4(),
            reimbursement_request_id: request.id,
            alegeus_claim_id: tracking_number.to_string(),
            alegeus_claim_key: None,
            status: None,
            amount: Money::from_cents(amount_cents),
            account_type_code: None,
        };
        self.store.insert_request(request.clone()).await;
        self.store.insert_claim(claim.clone()).await;
        (request, claim)
    }
}

fn activity_row(tracking_number: &str, status: &str) -> ActivityClaim {
    ActivityClaim {
        tracking_number: tracking_number.to_string(),
        status: status.to_string(),
        claim_key: Some(format!("KEY-{tracking_number}")),
        acct_type_code: Some("HRA".to_string()),
        flex_acct_key: Some("FLEX-CURRENCY".to_string()),
        service_category_code: None,
        service_start_date: None,
        amount: Some(Decimal::new(50_000, 2)),
        accounts_paid_amount: None,
    }
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryWalletStore::default());
    let alegeus = Arc::new(InMemoryAlegeus::default());
    let sink = Arc::new(RecordingSink::default());
    let adjuster = Arc::new(RecordingAdjuster::default());

    let wallet_id = Uuid::new_v4();
    let currency_category_id = Uuid::new_v4();
    let cycle_category_id = Uuid::new_v4();

    store
        .insert_wallet(ReimbursementWallet {
            id: wallet_id,
            user_id: Uuid::new_v4(),
            alegeus_employee_id: "EMP-1".to_string(),
            categories: vec![
                CategoryAssociation {
                    category_id: currency_category_id,
                    benefit_type: BenefitType::Currency,
                    num_cycles: None,
                    usd_funding_amount: Some(Money::from_cents(2_000_000)),
                },
                CategoryAssociation {
                    category_id: cycle_category_id,
                    benefit_type: BenefitType::Cycle,
                    num_cycles: Some(3),
                    usd_funding_amount: None,
                },
            ],
        })
        .await;
    store
        .insert_category(BenefitCategory {
            id: currency_category_id,
            label: "fertility (currency)".to_string(),
            allowed_expense_types: vec![ExpenseType::Fertility],
            subtypes: vec![
                ExpenseSubtype {
                    id: Uuid::new_v4(),
                    code: "IVF".to_string(),
                    expense_type: ExpenseType::Fertility,
                    global_procedure_id: None,
                    service_category_code: Some("FIVF".to_string()),
                },
            ],
            plan_accounts: vec![CategoryPlanAccount {
                plan_id: Uuid::new_v4(),
                flex_account_key: "FLEX-CURRENCY".to_string(),
                account_type_code: "HRA".to_string(),
            }],
        })
        .await;
    store
        .insert_category(BenefitCategory {
            id: cycle_category_id,
            label: "fertility (cycle)".to_string(),
            allowed_expense_types: vec![ExpenseType::Fertility],
            subtypes: vec![],
            plan_accounts: vec![CategoryPlanAccount {
                plan_id: Uuid::new_v4(),
                flex_account_key: "FLEX-CYCLE".to_string(),
                account_type_code: "HRA".to_string(),
            }],
        })
        .await;

    store
        .insert_credits(ReimbursementCycleCredits {
            id: Uuid::new_v4(),
            wallet_id,
            category_id: cycle_category_id,
            amount: 9,
        })
        .await;

    Fixture {
        store,
        alegeus,
        sink,
        adjuster,
        wallet_id,
        currency_category_id,
        cycle_category_id,
    }
}

#[tokio::test]
async fn duplicate_tracking_numbers_prefer_the_non_denied_row() {
    let fx = fixture().await;
    let (request, _) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    fx.alegeus
        .seed_activity(
            "EMP-1",
            vec![activity_row("TN1", "DENIED"), activity_row("TN1", "APPROVED")],
        )
        .await;

    let stats = fx
        .reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();
    assert_eq!(stats.claims_synced, 1);

    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.state, ReimbursementRequestState::Approved);
}

#[tokio::test]
async fn missing_external_row_retracts_the_claim() {
    let fx = fixture().await;
    let (request, claim) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN-GONE",
            50_000,
        )
        .await;
    fx.alegeus.seed_activity("EMP-1", vec![]).await;

    let stats = fx
        .reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();
    assert_eq!(stats.claims_retracted, 1);

    assert!(fx.store.claim(claim.id).await.is_none());
    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.state, ReimbursementRequestState::New);
}

#[tokio::test]
async fn dtr_approval_lands_as_denied() {
    let fx = fixture().await;
    let (request, _) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    let mut row = activity_row("TN1", "APPROVED");
    row.acct_type_code = Some("DTR".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.state, ReimbursementRequestState::Denied);
}

#[tokio::test]
async fn amount_change_updates_the_claim_and_fires_the_adjuster() {
    let fx = fixture().await;
    let (request, claim) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    let mut row = activity_row("TN1", "PAID");
    row.accounts_paid_amount = Some(Decimal::new(42_000, 2));
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    let updated_claim = fx.store.claim(claim.id).await.unwrap();
    assert_eq!(updated_claim.amount, Money::from_cents(42_000));
    assert_eq!(updated_claim.status.as_deref(), Some("PAID"));

    let adjustments = fx.adjuster.adjustments().await;
    assert_eq!(
        adjustments,
        vec![(request.id, Money::from_cents(50_000), Money::from_cents(42_000))]
    );
}

#[tokio::test]
async fn category_follows_the_external_account_key_when_allowed() {
    let fx = fixture().await;
    let (request, _) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    let mut row = activity_row("TN1", "APPROVED");
    row.flex_acct_key = Some("FLEX-CYCLE".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.category_id, fx.cycle_category_id);
}

#[tokio::test]
async fn unknown_account_key_escalates_and_leaves_the_category() {
    let fx = fixture().await;
    let (request, _) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    let mut row = activity_row("TN1", "APPROVED");
    row.flex_acct_key = Some("FLEX-UNKNOWN".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.category_id, fx.currency_category_id);
    let kinds: Vec<WalletEventKind> = fx
        .sink
        .events()
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&WalletEventKind::ManualReviewNeeded));
}

#[tokio::test]
async fn service_category_code_fills_the_expense_subtype() {
    let fx = fixture().await;
    let (request, _) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    let mut row = activity_row("TN1", "APPROVED");
    row.service_category_code = Some("FIVF".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    let category = fx
        .store
        .category(fx.currency_category_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.expense_subtype_id, Some(category.subtypes[0].id));
}

#[tokio::test]
async fn newly_approved_cycle_request_spends_its_credits() {
    let fx = fixture().await;
    let (mut request, _) = fx
        .seed_request_and_claim(
            fx.cycle_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    request.cost_credit = Some(2);
    fx.store.insert_request(request.clone()).await;
    let mut row = activity_row("TN1", "APPROVED");
    row.flex_acct_key = Some("FLEX-CYCLE".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[(MANUAL_CLAIMS_CREDIT_DEDUCTION, true)])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    let credits = fx
        .store
        .cycle_credits(fx.wallet_id, fx.cycle_category_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credits.amount, 7);
    assert_eq!(fx.store.transactions_for_request(request.id).await.len(), 1);
}

#[tokio::test]
async fn credit_deduction_stays_off_without_the_flag() {
    let fx = fixture().await;
    let (mut request, _) = fx
        .seed_request_and_claim(
            fx.cycle_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    request.cost_credit = Some(2);
    fx.store.insert_request(request.clone()).await;
    let mut row = activity_row("TN1", "APPROVED");
    row.flex_acct_key = Some("FLEX-CYCLE".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    assert!(fx.store.transactions_for_request(request.id).await.is_empty());
    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.state, ReimbursementRequestState::Approved);
}

#[tokio::test]
async fn failed_credit_deduction_raises_a_ticket_not_an_error() {
    let fx = fixture().await;
    // A wallet category with no cycle credit record behind it.
    let orphan_category_id = Uuid::new_v4();
    fx.store
        .insert_category(BenefitCategory {
            id: orphan_category_id,
            label: "adoption (cycle)".to_string(),
            allowed_expense_types: vec![ExpenseType::Fertility],
            subtypes: vec![],
            plan_accounts: vec![CategoryPlanAccount {
                plan_id: Uuid::new_v4(),
                flex_account_key: "FLEX-ORPHAN".to_string(),
                account_type_code: "HRA".to_string(),
            }],
        })
        .await;
    let mut wallet = fx.store.wallet(fx.wallet_id).await.unwrap().unwrap();
    wallet.categories.push(CategoryAssociation {
        category_id: orphan_category_id,
        benefit_type: BenefitType::Cycle,
        num_cycles: Some(2),
        usd_funding_amount: None,
    });
    fx.store.insert_wallet(wallet).await;

    let (mut request, _) = fx
        .seed_request_and_claim(
            orphan_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    request.cost_credit = Some(2);
    fx.store.insert_request(request.clone()).await;
    let mut row = activity_row("TN1", "APPROVED");
    row.flex_acct_key = Some("FLEX-ORPHAN".to_string());
    fx.alegeus.seed_activity("EMP-1", vec![row]).await;

    fx.reconciler(&[(MANUAL_CLAIMS_CREDIT_DEDUCTION, true)])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap();

    // The primary state sync committed even though the deduction failed.
    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.state, ReimbursementRequestState::Approved);
    let kinds: Vec<WalletEventKind> = fx
        .sink
        .events()
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&WalletEventKind::CreditDeductionFailed));
}

#[tokio::test]
async fn one_failing_wallet_does_not_stop_the_batch() {
    let fx = fixture().await;
    let (request, _) = fx
        .seed_request_and_claim(
            fx.currency_category_id,
            ReimbursementRequestState::Pending,
            "TN1",
            50_000,
        )
        .await;
    fx.alegeus
        .seed_activity("EMP-1", vec![activity_row("TN1", "APPROVED")])
        .await;

    let broken_wallet_id = Uuid::new_v4();
    fx.store
        .insert_wallet(ReimbursementWallet {
            id: broken_wallet_id,
            user_id: Uuid::new_v4(),
            alegeus_employee_id: "EMP-BROKEN".to_string(),
            categories: vec![],
        })
        .await;
    fx.alegeus.script_activity_error("EMP-BROKEN").await;

    let summary = fx
        .reconciler(&[])
        .reconcile_wallets(&[broken_wallet_id, fx.wallet_id])
        .await;

    assert_eq!(summary.wallets_processed, 1);
    assert_eq!(summary.wallets_failed, 1);
    assert_eq!(summary.claims_synced, 1);
    let updated = fx.store.request(request.id).await.unwrap().unwrap();
    assert_eq!(updated.state, ReimbursementRequestState::Approved);
}

#[tokio::test]
async fn activity_failure_is_a_typed_error() {
    let fx = fixture().await;
    fx.alegeus.script_activity_error("EMP-1").await;

    let err = fx
        .reconciler(&[])
        .reconcile_wallet(fx.wallet_id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Activity { .. }));
}
