//! Balance reads for every configured token, routed per interface.
//!
//! A Cosmos recipient costs one bank REST call for all denoms at once. An
//! EVM recipient costs one `eth_getBalance` plus one `balanceOf` per ERC-20
//! token, issued in parallel. Individual probe failures degrade that token
//! to "unknown" rather than failing the request; only a total failure is an
//! error.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use futures::future::join_all;
use tracing::warn;

use crate::address::{Recipient, RecipientKind};
use crate::config::FaucetConfig;
use crate::cosmos::CosmosRestClient;
use crate::error::Error;
use crate::evm::{Erc20, EvmClient};

/// Reads current holdings for every configured token
#[derive(Clone)]
pub struct BalanceOracle {
    evm: EvmClient,
    cosmos: CosmosRestClient,
    config: Arc<FaucetConfig>,
}

impl BalanceOracle {
    pub fn new(evm: EvmClient, cosmos: CosmosRestClient, config: Arc<FaucetConfig>) -> Self {
        Self {
            evm,
            cosmos,
            config,
        }
    }

    /// Current holding per configured token, keyed by symbol. Every token is
    /// present; `None` marks a failed probe.
    pub async fn read(&self, recipient: &Recipient) -> Result<HashMap<String, Option<U256>>, Error> {
        match recipient.kind() {
            RecipientKind::Cosmos => self.read_cosmos(recipient.cosmos_address()).await,
            RecipientKind::Evm => self.read_evm(recipient.evm_address()).await,
        }
    }

    /// One bank call returns every denom; configured tokens absent from the
    /// response hold zero.
    pub async fn read_cosmos(
        &self,
        address: &str,
    ) -> Result<HashMap<String, Option<U256>>, Error> {
        let by_denom = self
            .cosmos
            .balances(address)
            .await
            .map_err(|e| Error::BalanceQuery(format!("bank balances for {}: {}", address, e)))?;

        Ok(self
            .config
            .tokens
            .iter()
            .map(|token| {
                let amount = by_denom.get(&token.denom).copied().unwrap_or(U256::ZERO);
                (token.symbol.clone(), Some(amount))
            })
            .collect())
    }

    /// Native balance plus one `balanceOf` per ERC-20, in parallel.
    pub async fn read_evm(&self, address: Address) -> Result<HashMap<String, Option<U256>>, Error> {
        let probes = self.config.tokens.iter().map(|token| {
            let evm = self.evm.clone();
            async move {
                let result = if token.is_native() {
                    evm.get_balance(address).await
                } else {
                    Erc20::new(evm, token.erc20_address).balance_of(address).await
                };
                (token.symbol.clone(), result)
            }
        });

        let mut out = HashMap::with_capacity(self.config.tokens.len());
        let mut failures = 0usize;
        for (symbol, result) in join_all(probes).await {
            match result {
                Ok(amount) => {
                    out.insert(symbol, Some(amount));
                }
                Err(e) => {
                    warn!(token = %symbol, error = %e, "balance probe failed, token degraded");
                    failures += 1;
                    out.insert(symbol, None);
                }
            }
        }

        if failures == self.config.tokens.len() {
            return Err(Error::BalanceQuery(
                "every balance probe failed".to_string(),
            ));
        }
        Ok(out)
    }
}
