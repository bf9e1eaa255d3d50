//! End-to-end planning scenarios with the two-token shape used throughout
//! the faucet's own configuration: a 6-decimal token and an 18-decimal one.

use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use faucet_core::config::TokenDescriptor;
use faucet_core::planner;

fn token_a() -> TokenDescriptor {
    TokenDescriptor {
        symbol: "TKA".to_string(),
        name: "Token A".to_string(),
        denom: "utka".to_string(),
        decimals: 6,
        erc20_address: Address::repeat_byte(0x22),
        per_request: U256::from(1_000_000u64),
        target_balance: U256::from(1_000_000_000u64),
        ibc: None,
    }
}

fn token_b() -> TokenDescriptor {
    TokenDescriptor {
        symbol: "TKB".to_string(),
        name: "Token B".to_string(),
        denom: "atkb".to_string(),
        decimals: 18,
        erc20_address: Address::from_str("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE").unwrap(),
        per_request: U256::from(10u64).pow(U256::from(18u64)),
        target_balance: U256::from(10u64).pow(U256::from(21u64)),
        ibc: None,
    }
}

fn holdings(a: u64, b: U256) -> HashMap<String, Option<U256>> {
    HashMap::from([
        ("TKA".to_string(), Some(U256::from(a))),
        ("TKB".to_string(), Some(b)),
    ])
}

#[test]
fn fresh_recipient_gets_both_per_request_amounts() {
    let tokens = vec![token_a(), token_b()];
    let plan = planner::plan(&tokens, &holdings(0, U256::ZERO));

    assert_eq!(plan.items.len(), 2);
    assert_eq!(plan.items[0].token.symbol, "TKA");
    assert_eq!(plan.items[0].amount, U256::from(1_000_000u64));
    assert_eq!(plan.items[1].token.symbol, "TKB");
    assert_eq!(plan.items[1].amount, U256::from(10u64).pow(U256::from(18u64)));
}

#[test]
fn near_target_holder_gets_topped_up_exactly() {
    let tokens = vec![token_a(), token_b()];
    let plan = planner::plan(&tokens, &holdings(999_500_000, U256::ZERO));

    assert_eq!(plan.items.len(), 2);
    assert_eq!(plan.items[0].amount, U256::from(500_000u64));
    // 999_500_000 + 500_000 reaches the target, never exceeds it
    assert_eq!(
        U256::from(999_500_000u64) + plan.items[0].amount,
        token_a().target_balance
    );
}

#[test]
fn saturated_holder_yields_empty_plan() {
    let tokens = vec![token_a(), token_b()];
    let plan = planner::plan(
        &tokens,
        &holdings(1_000_000_000, U256::from(10u64).pow(U256::from(21u64))),
    );

    assert!(plan.is_empty());
    assert_eq!(plan.skipped.len(), 2);
}

#[test]
fn plan_never_exceeds_target_for_any_holding() {
    let tokens = vec![token_a()];
    for held in [0u64, 1, 999_999, 1_000_000, 500_000_000, 999_999_999, 1_000_000_000] {
        let plan = planner::plan(&tokens, &holdings(held, U256::ZERO));
        let sent = plan
            .items
            .iter()
            .find(|i| i.token.symbol == "TKA")
            .map(|i| i.amount)
            .unwrap_or(U256::ZERO);
        assert!(U256::from(held) + sent <= token_a().target_balance, "held {held}");
    }
}
