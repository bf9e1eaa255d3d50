//! Target-balance distribution planning.
//!
//! For each configured token the faucet sends `min(per_request, target −
//! current)`, never pushing a recipient above the target ceiling. Planning is
//! pure and deterministic: the same inputs always yield the same plan, in
//! configuration order.

use std::collections::HashMap;

use alloy_primitives::U256;

use crate::config::TokenDescriptor;
use crate::types::{SkipReason, SkippedItem};

/// One transfer the faucet intends to make
#[derive(Debug, Clone)]
pub struct TransferItem {
    pub token: TokenDescriptor,
    /// Amount in the token's smallest unit, always > 0
    pub amount: U256,
}

/// The set of transfers required to top a recipient up, plus the tokens left
/// out and why. Valid iff at least one item remains.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    pub items: Vec<TransferItem>,
    pub skipped: Vec<SkippedItem>,
}

impl TransferPlan {
    /// An empty plan means nothing to send; no transaction is issued and no
    /// rate-limit quota is consumed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Build the plan for a recipient given their current holdings.
///
/// `current` maps token symbol to the observed balance; `None` marks a token
/// whose balance probe failed, which excludes it from the plan rather than
/// risking an overshoot.
pub fn plan(tokens: &[TokenDescriptor], current: &HashMap<String, Option<U256>>) -> TransferPlan {
    let mut out = TransferPlan::default();

    for token in tokens {
        let balance = match current.get(&token.symbol) {
            Some(Some(balance)) => *balance,
            _ => {
                out.skipped.push(SkippedItem {
                    symbol: token.symbol.clone(),
                    reason: SkipReason::BalanceUnavailable,
                });
                continue;
            }
        };

        let need = token.target_balance.saturating_sub(balance);
        let amount = need.min(token.per_request);
        if amount.is_zero() {
            out.skipped.push(SkippedItem {
                symbol: token.symbol.clone(),
                reason: SkipReason::SufficientBalance,
            });
        } else {
            out.items.push(TransferItem {
                token: token.clone(),
                amount,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn token(symbol: &str, per_request: u128, target: u128) -> TokenDescriptor {
        TokenDescriptor {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            denom: format!("u{}", symbol.to_lowercase()),
            decimals: 6,
            erc20_address: Address::repeat_byte(0x22),
            per_request: U256::from(per_request),
            target_balance: U256::from(target),
            ibc: None,
        }
    }

    fn holdings(entries: &[(&str, Option<u128>)]) -> HashMap<String, Option<U256>> {
        entries
            .iter()
            .map(|(s, v)| (s.to_string(), v.map(U256::from)))
            .collect()
    }

    #[test]
    fn fresh_recipient_gets_full_per_request() {
        let tokens = vec![token("TKA", 1_000_000, 1_000_000_000)];
        let plan = plan(&tokens, &holdings(&[("TKA", Some(0))]));
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].amount, U256::from(1_000_000u64));
    }

    #[test]
    fn partial_need_is_clamped_to_remaining_headroom() {
        let tokens = vec![token("TKA", 1_000_000, 1_000_000_000)];
        let plan = plan(&tokens, &holdings(&[("TKA", Some(999_500_000))]));
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].amount, U256::from(500_000u64));
    }

    #[test]
    fn at_target_is_omitted() {
        let tokens = vec![token("TKA", 1_000_000, 1_000_000_000)];
        let plan = plan(&tokens, &holdings(&[("TKA", Some(1_000_000_000))]));
        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::SufficientBalance);
    }

    #[test]
    fn one_below_target_sends_exactly_one() {
        let tokens = vec![token("TKA", 1_000_000_000, 1_000_000_000)];
        let plan = plan(&tokens, &holdings(&[("TKA", Some(999_999_999))]));
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].amount, U256::from(1u64));
    }

    #[test]
    fn above_target_is_omitted_without_underflow() {
        let tokens = vec![token("TKA", 1_000_000, 1_000_000_000)];
        let plan = plan(&tokens, &holdings(&[("TKA", Some(2_000_000_000))]));
        assert!(plan.is_empty());
    }

    #[test]
    fn unknown_balance_skips_with_reason() {
        let tokens = vec![
            token("TKA", 1_000_000, 1_000_000_000),
            token("TKB", 5, 50),
        ];
        let plan = plan(&tokens, &holdings(&[("TKA", None), ("TKB", Some(0))]));
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].token.symbol, "TKB");
        assert_eq!(plan.skipped[0].reason, SkipReason::BalanceUnavailable);
    }

    #[test]
    fn order_follows_configuration_and_replanning_is_identical() {
        let tokens = vec![
            token("TKB", 5, 50),
            token("TKA", 1_000_000, 1_000_000_000),
        ];
        let balances = holdings(&[("TKA", Some(0)), ("TKB", Some(0))]);
        let first = plan(&tokens, &balances);
        let second = plan(&tokens, &balances);
        let symbols: Vec<_> = first.items.iter().map(|i| i.token.symbol.clone()).collect();
        assert_eq!(symbols, vec!["TKB", "TKA"]);
        assert_eq!(
            symbols,
            second
                .items
                .iter()
                .map(|i| i.token.symbol.clone())
                .collect::<Vec<_>>()
        );
        assert_eq!(first.items[0].amount, second.items[0].amount);
    }

    #[test]
    fn eighteen_decimal_amounts_do_not_overflow() {
        let per: u128 = 1_000_000_000_000_000_000;
        let target: u128 = 1_000_000_000_000_000_000_000;
        let tokens = vec![token("TKB", per, target)];
        let plan = plan(&tokens, &holdings(&[("TKB", Some(0))]));
        assert_eq!(plan.items[0].amount, U256::from(per));
    }
}
