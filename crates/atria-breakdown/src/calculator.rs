use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use atria_core::{
    AmountType, CostBreakdown, Money, ReimbursementWallet, TreatmentProcedure,
};
use atria_eligibility::{CoverageFigures, EligibilityInfo};

#[derive(Debug, Error)]
pub enum BreakdownError {
    #[error("no treatment procedures given")]
    NoProcedures,
    #[error("treatment procedure {procedure_id} belongs to wallet {procedure_wallet_id}, not wallet {wallet_id}")]
    WalletMismatch {
        procedure_id: Uuid,
        procedure_wallet_id: Uuid,
        wallet_id: Uuid,
    },
}

/// What to do with cost that no bucket can absorb (benefit maximum reached).
/// An explicit policy because plan designs disagree: some bill the member,
/// some write the gap off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OveragePolicy {
    MemberResponsibility,
    WriteOff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcOptions {
    pub amount_type: AmountType,
    /// Pharmacy claim on a plan without Rx integration: cost sharing starts
    /// at the first dollar, no deductible phase.
    pub is_rx_non_integrated: bool,
    pub overage_policy: OveragePolicy,
    /// Remaining employer benefit for the category. None means the benefit
    /// is not dollar-capped (cycle accounting or unlimited design).
    pub wallet_balance: Option<Money>,
}

/// Member/employer split for a single cost, before persistence concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAmounts {
    pub total_member_responsibility: Money,
    pub total_employer_responsibility: Money,
    pub deductible: Money,
    pub coinsurance: Money,
    pub copay: Money,
    pub oop_applied: Money,
    pub hra_applied: Money,
    pub overage_amount: Money,
    pub beginning_wallet_balance: Money,
    pub ending_wallet_balance: Money,
    pub is_unlimited: bool,
}

pub struct CostBreakdownCalculator {
    pub figures: CoverageFigures,
    pub options: CalcOptions,
}

impl CostBreakdownCalculator {
    pub fn new(figures: CoverageFigures, options: CalcOptions) -> Self {
        CostBreakdownCalculator { figures, options }
    }

    /// Split one cost against the running balances, debiting them in place.
    ///
    /// Phases: deductible, then copay/coinsurance on the remainder, then
    /// OOP absorption of everything member-owed, then HRA offset. The same
    /// `balances` must be threaded through a whole batch so a shared HRA
    /// pool (and the deductible/OOP ledgers) decrement across calls.
    pub fn split(&self, cost: Money, balances: &mut EligibilityInfo) -> SplitAmounts {
        self.split_with_balance(cost, balances, self.options.wallet_balance)
            .0
    }

    fn split_with_balance(
        &self,
        cost: Money,
        balances: &mut EligibilityInfo,
        wallet_balance: Option<Money>,
    ) -> (SplitAmounts, Option<Money>) {
        let deductible = self.apply_deductible(cost, balances);
        let remaining = cost - deductible;

        // Copay plans charge the flat amount; coinsurance plans split by
        // rate. The employer picks up whatever the member share is not.
        let (coinsurance, copay) = if self.figures.copay.is_positive() {
            (Money::ZERO, self.figures.copay.min(remaining))
        } else {
            (remaining.apply_rate(self.figures.coinsurance), Money::ZERO)
        };
        let member_cost_share = coinsurance + copay;
        let employer_share = remaining - member_cost_share;

        let member_owed = deductible + member_cost_share;
        let oop_gate = self.oop_gate(balances);
        let oop_applied = member_owed.min(oop_gate);
        let over_oop = member_owed - oop_applied;
        self.debit_oop(oop_applied, balances);
        let is_unlimited = over_oop.is_positive();

        let hra_applied = oop_applied.min(balances.hra_remaining);
        balances.hra_remaining = balances.hra_remaining.saturating_sub(hra_applied);

        let mut member = oop_applied - hra_applied;
        let mut employer = employer_share + over_oop + hra_applied;

        let (overage, beginning, ending, next_balance) = match wallet_balance {
            Some(balance) => {
                let covered = employer.min(balance);
                let overage = employer - covered;
                employer = covered;
                (overage, balance, balance - covered, Some(balance - covered))
            }
            None => (Money::ZERO, Money::ZERO, Money::ZERO, None),
        };
        if overage.is_positive() && self.options.overage_policy == OveragePolicy::MemberResponsibility
        {
            member += overage;
        }

        (
            SplitAmounts {
                total_member_responsibility: member,
                total_employer_responsibility: employer,
                deductible,
                coinsurance,
                copay,
                oop_applied,
                hra_applied,
                overage_amount: overage,
                beginning_wallet_balance: beginning,
                ending_wallet_balance: ending,
                is_unlimited,
            },
            next_balance,
        )
    }

    fn apply_deductible(&self, cost: Money, balances: &mut EligibilityInfo) -> Money {
        if self.options.is_rx_non_integrated {
            return Money::ZERO;
        }
        match self.options.amount_type {
            AmountType::Individual => {
                let applied = cost.min(balances.individual_deductible_remaining);
                balances.individual_deductible_remaining =
                    balances.individual_deductible_remaining.saturating_sub(applied);
                applied
            }
            AmountType::Family => {
                // Non-embedded: the family aggregate is the only gate.
                // Embedded: the member's sub-limit must also be satisfied,
                // so the smaller remaining amount governs.
                let gate = if balances.is_deductible_embedded {
                    balances
                        .family_deductible_remaining
                        .min(balances.individual_deductible_remaining)
                } else {
                    balances.family_deductible_remaining
                };
                let applied = cost.min(gate);
                balances.family_deductible_remaining =
                    balances.family_deductible_remaining.saturating_sub(applied);
                if balances.is_deductible_embedded {
                    balances.individual_deductible_remaining =
                        balances.individual_deductible_remaining.saturating_sub(applied);
                }
                applied
            }
        }
    }

    fn oop_gate(&self, balances: &EligibilityInfo) -> Money {
        match self.options.amount_type {
            AmountType::Individual => balances.individual_oop_remaining,
            AmountType::Family => {
                let mut gate = balances.family_oop_remaining;
                if balances.is_oop_embedded {
                    gate = gate.min(balances.individual_oop_remaining);
                }
                if let Some(max_per_individual) = balances.max_oop_per_covered_individual {
                    gate = gate.min(max_per_individual);
                }
                gate
            }
        }
    }

    fn debit_oop(&self, applied: Money, balances: &mut EligibilityInfo) {
        match self.options.amount_type {
            AmountType::Individual => {
                balances.individual_oop_remaining =
                    balances.individual_oop_remaining.saturating_sub(applied);
            }
            AmountType::Family => {
                balances.family_oop_remaining =
                    balances.family_oop_remaining.saturating_sub(applied);
                if balances.is_oop_embedded {
                    balances.individual_oop_remaining =
                        balances.individual_oop_remaining.saturating_sub(applied);
                }
            }
        }
    }

    /// Run a batch of scheduled procedures through one shared ledger,
    /// producing a persistable record per procedure. The wallet balance and
    /// HRA pool carry across the loop.
    pub fn calculate_batch(
        &self,
        wallet: &ReimbursementWallet,
        procedures: &[TreatmentProcedure],
        balances: &mut EligibilityInfo,
    ) -> Result<Vec<CostBreakdown>, BreakdownError> {
        if procedures.is_empty() {
            return Err(BreakdownError::NoProcedures);
        }
        for procedure in procedures {
            if procedure.wallet_id != wallet.id {
                return Err(BreakdownError::WalletMismatch {
                    procedure_id: procedure.id,
                    procedure_wallet_id: procedure.wallet_id,
                    wallet_id: wallet.id,
                });
            }
        }

        let mut wallet_balance = self.options.wallet_balance;
        let mut breakdowns = Vec::with_capacity(procedures.len());
        for procedure in procedures {
            let (amounts, next_balance) =
                self.split_with_balance(procedure.cost, balances, wallet_balance);
            wallet_balance = next_balance;
            breakdowns.push(self.to_record(wallet, Some(procedure.id), amounts, balances));
        }
        Ok(breakdowns)
    }

    fn to_record(
        &self,
        wallet: &ReimbursementWallet,
        treatment_procedure_id: Option<Uuid>,
        amounts: SplitAmounts,
        balances: &EligibilityInfo,
    ) -> CostBreakdown {
        let cost_breakdown_type = if self.options.is_rx_non_integrated {
            "FIRST_DOLLAR"
        } else {
            "DEDUCTIBLE_ACCUMULATION"
        };
        CostBreakdown {
            id: Uuid::new_v4(),
            wallet_id: wallet.id,
            treatment_procedure_id,
            reimbursement_request_id: None,
            total_member_responsibility: amounts.total_member_responsibility,
            total_employer_responsibility: amounts.total_employer_responsibility,
            deductible: amounts.deductible,
            deductible_remaining: balances.individual_deductible_remaining,
            family_deductible_remaining: balances.family_deductible_remaining,
            coinsurance: amounts.coinsurance,
            copay: amounts.copay,
            oop_applied: amounts.oop_applied,
            oop_remaining: balances.individual_oop_remaining,
            family_oop_remaining: balances.family_oop_remaining,
            hra_applied: amounts.hra_applied,
            overage_amount: amounts.overage_amount,
            beginning_wallet_balance: amounts.beginning_wallet_balance,
            ending_wallet_balance: amounts.ending_wallet_balance,
            is_unlimited: amounts.is_unlimited,
            amount_type: self.options.amount_type,
            cost_breakdown_type: cost_breakdown_type.to_string(),
            rte_transaction_id: balances.rte_transaction_id.clone(),
            calc_config: json!({
                "coinsurance": self.figures.coinsurance.to_string(),
                "copay_cents": self.figures.copay.cents(),
                "overage_policy": self.options.overage_policy,
                "rx_non_integrated": self.options.is_rx_non_integrated,
            }),
            created_at: Utc::now(),
        }
    }
}
