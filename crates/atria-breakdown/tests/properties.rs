use proptest::prelude::*;
use rust_decimal::Decimal;

use atria_breakdown::{CalcOptions, CostBreakdownCalculator, OveragePolicy};
use atria_core::{AmountType, Money};
use atria_eligibility::{CoverageFigures, EligibilityInfo};

fn figures(coinsurance_tenths: i64, copay_cents: i64) -> CoverageFigures {
    CoverageFigures {
        individual_deductible: Money::from_cents(150_000),
        individual_oop: Money::from_cents(600_000),
        family_deductible: Money::from_cents(300_000),
        family_oop: Money::from_cents(1_200_000),
        is_deductible_embedded: false,
        is_oop_embedded: false,
        max_oop_per_covered_individual: None,
        coinsurance: Decimal::new(coinsurance_tenths, 1),
        copay: Money::from_cents(copay_cents),
    }
}

fn balances(
    amount_type: AmountType,
    deductible_embedded: bool,
    oop_embedded: bool,
    ind_ded: i64,
    ind_oop: i64,
    fam_ded: i64,
    fam_oop: i64,
    hra: i64,
) -> EligibilityInfo {
    let mut info = EligibilityInfo::empty();
    info.individual_deductible_remaining = Money::from_cents(ind_ded);
    info.individual_oop_remaining = Money::from_cents(ind_oop);
    if amount_type == AmountType::Family {
        info.family_deductible_remaining = Money::from_cents(fam_ded);
        info.family_oop_remaining = Money::from_cents(fam_oop);
        info.is_deductible_embedded = deductible_embedded;
        info.is_oop_embedded = oop_embedded;
    }
    info.hra_remaining = Money::from_cents(hra);
    info
}

fn amount_type_strategy() -> impl Strategy<Value = AmountType> {
    prop_oneof![Just(AmountType::Individual), Just(AmountType::Family)]
}

proptest! {
    // member + employer always reconstructs the input cost when overage is
    // billed to the member.
    #[test]
    fn conservation_holds_over_random_sequences(
        costs in prop::collection::vec(0i64..500_000, 1..20),
        amount_type in amount_type_strategy(),
        deductible_embedded: bool,
        oop_embedded: bool,
        coinsurance_tenths in 0i64..=5,
        ind_ded in 0i64..200_000,
        ind_oop in 0i64..800_000,
        fam_ded in 0i64..400_000,
        fam_oop in 0i64..1_500_000,
        hra in 0i64..100_000,
    ) {
        let calculator = CostBreakdownCalculator::new(
            figures(coinsurance_tenths, 0),
            CalcOptions {
                amount_type,
                is_rx_non_integrated: false,
                overage_policy: OveragePolicy::MemberResponsibility,
                wallet_balance: None,
            },
        );
        let mut ledger = balances(
            amount_type, deductible_embedded, oop_embedded,
            ind_ded, ind_oop, fam_ded, fam_oop, hra,
        );
        for cost in costs {
            let cost = Money::from_cents(cost);
            let amounts = calculator.split(cost, &mut ledger);
            prop_assert_eq!(
                amounts.total_member_responsibility + amounts.total_employer_responsibility,
                cost
            );
        }
    }

    // Under the write-off policy the overage is carved out of the
    // conservation law explicitly.
    #[test]
    fn write_off_overage_accounts_for_the_gap(
        costs in prop::collection::vec(0i64..500_000, 1..20),
        wallet_balance in 0i64..300_000,
        coinsurance_tenths in 0i64..=5,
    ) {
        let calculator = CostBreakdownCalculator::new(
            figures(coinsurance_tenths, 0),
            CalcOptions {
                amount_type: AmountType::Individual,
                is_rx_non_integrated: false,
                overage_policy: OveragePolicy::WriteOff,
                wallet_balance: Some(Money::from_cents(wallet_balance)),
            },
        );
        let mut ledger = balances(
            AmountType::Individual, false, false,
            100_000, 400_000, 0, 0, 0,
        );
        for cost in costs {
            let cost = Money::from_cents(cost);
            let amounts = calculator.split(cost, &mut ledger);
            prop_assert_eq!(
                amounts.total_member_responsibility
                    + amounts.total_employer_responsibility
                    + amounts.overage_amount,
                cost
            );
        }
    }

    // No remaining field ever goes negative, and no output amount is
    // negative, for any sequence of applied costs.
    #[test]
    fn balances_and_outputs_never_go_negative(
        costs in prop::collection::vec(0i64..500_000, 1..30),
        amount_type in amount_type_strategy(),
        deductible_embedded: bool,
        oop_embedded: bool,
        copay_cents in 0i64..10_000,
        ind_ded in 0i64..200_000,
        ind_oop in 0i64..800_000,
        fam_ded in 0i64..400_000,
        fam_oop in 0i64..1_500_000,
        hra in 0i64..100_000,
    ) {
        let calculator = CostBreakdownCalculator::new(
            figures(2, copay_cents),
            CalcOptions {
                amount_type,
                is_rx_non_integrated: false,
                overage_policy: OveragePolicy::MemberResponsibility,
                wallet_balance: None,
            },
        );
        let mut ledger = balances(
            amount_type, deductible_embedded, oop_embedded,
            ind_ded, ind_oop, fam_ded, fam_oop, hra,
        );
        for cost in costs {
            let amounts = calculator.split(Money::from_cents(cost), &mut ledger);
            for remaining in [
                ledger.individual_deductible_remaining,
                ledger.individual_oop_remaining,
                ledger.family_deductible_remaining,
                ledger.family_oop_remaining,
                ledger.hra_remaining,
            ] {
                prop_assert!(remaining >= Money::ZERO);
            }
            for amount in [
                amounts.total_member_responsibility,
                amounts.total_employer_responsibility,
                amounts.deductible,
                amounts.coinsurance,
                amounts.copay,
                amounts.oop_applied,
                amounts.hra_applied,
                amounts.overage_amount,
            ] {
                prop_assert!(amount >= Money::ZERO);
            }
        }
    }
}
