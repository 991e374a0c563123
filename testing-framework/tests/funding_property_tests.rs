//! Property-based tests for funding computation
//!
//! Properties tested:
//! - The funding amount always covers `amount × multiple`
//! - Per-shard shares add up to at least the total
//! - Nil, negative and zero inputs are rejected, never computed

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use staking_common::Amount;
use staking_testing_framework::funding::{calculate_funding_details, sum_amounts};
use staking_testing_framework::ParameterError;

proptest! {
    #[test]
    fn test_funding_covers_amount_times_multiple(
        units in 0i128..1_000_000_000_000_000_000_000_000i128,
        multiple in 1u64..100,
        shard_count in 1u32..16,
    ) {
        let amount = Amount::from_base_units(units);
        let details = calculate_funding_details(Some(amount), multiple, shard_count).unwrap();

        prop_assert!(details.funding_amount.base_units() >= units * multiple as i128);
        let shares = details.per_shard_amount.base_units() * shard_count as i128;
        prop_assert!(shares >= details.funding_amount.base_units());
        prop_assert!(shares - details.funding_amount.base_units() < shard_count as i128);
    }

    #[test]
    fn test_negative_amounts_are_rejected(units in i128::MIN / 2..0i128) {
        let result = calculate_funding_details(Some(Amount::from_base_units(units)), 1, 1);
        prop_assert!(matches!(result, Err(ParameterError::NegativeAmount(_))));
    }

    #[test]
    fn test_sum_propagates_missing_amounts(
        values in prop::collection::vec(0i64..1_000_000, 1..8),
        missing in any::<prop::sample::Index>(),
    ) {
        let mut amounts: Vec<Option<Amount>> =
            values.iter().map(|v| Some(Amount::from_coins(*v))).collect();
        let total: i64 = values.iter().sum();
        prop_assert_eq!(sum_amounts(&amounts), Some(Amount::from_coins(total)));

        let index = missing.index(amounts.len());
        amounts[index] = None;
        prop_assert_eq!(sum_amounts(&amounts), None);
    }
}

#[test]
fn test_degenerate_inputs() {
    let amount = Amount::from_coins(10);
    assert_eq!(
        calculate_funding_details(None, 1, 1),
        Err(ParameterError::NilAmount("funding".into()))
    );
    assert_eq!(
        calculate_funding_details(Some(amount), 0, 1),
        Err(ParameterError::ZeroFundingMultiple)
    );
    assert_eq!(
        calculate_funding_details(Some(amount), 1, 0),
        Err(ParameterError::ZeroShardCount)
    );
    assert_eq!(
        calculate_funding_details(Some(Amount::from_base_units(i128::MAX)), 2, 1),
        Err(ParameterError::FundingOverflow)
    );
}
