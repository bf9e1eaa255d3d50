//! Request orchestration: classify → rate-check → read → plan → submit →
//! verify → record.
//!
//! The dispatcher owns the composition root: every collaborator is built
//! here from the loaded configuration and injected explicitly. Requests of
//! either kind run concurrently; the only serialization point is the
//! per-interface submission lane inside the coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::address::{AddressClassifier, Recipient, RecipientKind};
use crate::balance::BalanceOracle;
use crate::config::FaucetConfig;
use crate::cosmos::{self, CosmosRestClient};
use crate::error::Error;
use crate::evm::{self, contracts::BatchTransfer, Erc20, EvmClient};
use crate::planner::{self, TransferPlan};
use crate::ratelimit::{Decision, RateLimiter};
use crate::submit::{EvmSubmission, NonceCoordinator, Submitted};
use crate::types::{BalanceView, SentItem, TransactionResult};
use crate::wallet::OperatorWallet;

/// The faucet core. One instance serves many concurrent requests.
pub struct Faucet {
    config: Arc<FaucetConfig>,
    wallet: Arc<OperatorWallet>,
    classifier: AddressClassifier,
    evm: EvmClient,
    cosmos: CosmosRestClient,
    oracle: BalanceOracle,
    limiter: RateLimiter,
    coordinator: NonceCoordinator,
}

impl Faucet {
    /// Build the faucet from loaded configuration: derive the operator key,
    /// connect both interfaces, open the rate-limit store, run the startup
    /// preflight (chain-id cross-check and funding report), and grant the
    /// batch contract any ERC-20 allowances it is short of.
    pub async fn new(config: FaucetConfig) -> Result<Self, Error> {
        let config = Arc::new(config);
        let wallet = Arc::new(OperatorWallet::from_mnemonic(
            config.mnemonic()?.expose_secret(),
            &config.hrp,
            &config.pubkey_type_url,
        )?);

        let request_timeout = Duration::from_millis(config.timeouts.request_ms);
        let evm = EvmClient::new(
            &config.endpoints.evm_json_rpc,
            config.evm_chain_id,
            request_timeout,
        )?;
        let cosmos = CosmosRestClient::new(&config.endpoints.cosmos_rest, request_timeout)?;

        let classifier = AddressClassifier::new(&config.hrp)?;
        let oracle = BalanceOracle::new(evm.clone(), cosmos.clone(), config.clone());
        let limiter = RateLimiter::open(&config.ratelimit_store_path, config.rate_limits.clone())?;
        let coordinator =
            NonceCoordinator::new(evm.clone(), cosmos.clone(), wallet.clone(), config.clone())?;

        let faucet = Self {
            config,
            wallet,
            classifier,
            evm,
            cosmos,
            oracle,
            limiter,
            coordinator,
        };
        faucet.preflight().await?;
        faucet.ensure_allowances().await?;
        Ok(faucet)
    }

    /// Serve one dispense request. Never panics and never escapes an error:
    /// every outcome is folded into a `TransactionResult`.
    pub async fn serve(&self, raw_address: &str, client_ip: &str) -> TransactionResult {
        match self.dispense(raw_address, client_ip).await {
            Ok(result) => result,
            Err(Error::RateLimited { retry_at }) => TransactionResult::rate_limited(retry_at),
            Err(e) => {
                warn!(recipient = raw_address, error = %e, "dispense failed");
                TransactionResult::failed(e.kind())
            }
        }
    }

    /// Current, target and decimals for every configured token.
    pub async fn inspect_balance(&self, raw_address: &str) -> Result<Vec<BalanceView>, Error> {
        let recipient = self.classifier.classify(raw_address)?;
        let current = self.oracle.read(&recipient).await?;
        Ok(self
            .config
            .tokens
            .iter()
            .map(|token| BalanceView {
                symbol: token.symbol.clone(),
                current: current
                    .get(&token.symbol)
                    .and_then(|v| v.map(|a| a.to_string())),
                target: token.target_balance.to_string(),
                decimals: token.decimals,
            })
            .collect())
    }

    /// Ensure the batch contract can pull each ERC-20 token from the
    /// operator, approving `U256::MAX` where the remaining allowance covers
    /// fewer than `approval_horizon` requests. Runs at startup; safe to call
    /// again at any time, tokens with enough allowance are left untouched.
    pub async fn ensure_allowances(&self) -> Result<(), Error> {
        let operator = self.wallet.evm_address();
        let spender = self.config.atomic_batch_contract;

        for token in self.config.tokens.iter().filter(|t| !t.is_native()) {
            let erc20 = Erc20::new(self.evm.clone(), token.erc20_address);
            let allowance = erc20.allowance(operator, spender).await?;
            let horizon = token
                .per_request
                .saturating_mul(U256::from(self.config.approval_horizon));
            if allowance >= horizon {
                continue;
            }

            info!(token = %token.symbol, %allowance, "allowance below horizon, approving batch contract");
            let submission = EvmSubmission {
                to: token.erc20_address,
                value: U256::ZERO,
                data: evm::encode_approve(spender, U256::MAX),
                gas_limit: 80_000,
            };
            let done = self.coordinator.submit_evm(submission).await?;
            info!(token = %token.symbol, tx_hash = %done.tx_hash, "allowance granted");
        }
        Ok(())
    }

    /// Flush persistent state and drop key material.
    pub async fn shutdown(self) -> Result<(), Error> {
        self.limiter.flush()?;
        let Self { wallet, .. } = self;
        drop(wallet);
        info!("faucet shut down");
        Ok(())
    }

    async fn dispense(&self, raw_address: &str, client_ip: &str) -> Result<TransactionResult, Error> {
        let recipient = match self.classifier.classify(raw_address) {
            Ok(recipient) => recipient,
            Err(e) => {
                info!(recipient = raw_address, error = %e, "rejected recipient");
                return Ok(TransactionResult::invalid_address());
            }
        };

        if let Decision::Blocked { retry_at } =
            self.limiter.check(&recipient.hex20(), client_ip)?
        {
            return Ok(TransactionResult::rate_limited(retry_at));
        }

        let current = self.oracle.read(&recipient).await?;
        let plan = planner::plan(&self.config.tokens, &current);
        if plan.is_empty() {
            // Nothing to send; quota is not consumed
            return Ok(TransactionResult::skipped(plan.skipped));
        }

        let submitted = match recipient.kind() {
            RecipientKind::Evm => self.submit_evm_plan(&recipient, &plan).await?,
            RecipientKind::Cosmos => self.submit_cosmos_plan(&recipient, &plan).await?,
        };

        self.verify_delivery(&recipient, &plan, &current).await;

        // Only an end-to-end success consumes quota; a store hiccup after
        // funds moved must not surface as a failed dispense
        if let Err(e) = self.limiter.record(&recipient.hex20(), client_ip).await {
            warn!(error = %e, "failed to record rate-limit hit");
        }

        let items_sent = plan
            .items
            .iter()
            .map(|item| SentItem {
                symbol: item.token.symbol.clone(),
                amount: item.amount.to_string(),
            })
            .collect();
        let explorer_url = self.explorer_url(recipient.kind(), &submitted.tx_hash);

        info!(
            recipient = raw_address,
            tx_hash = %submitted.tx_hash,
            items = plan.items.len(),
            "dispense succeeded"
        );
        Ok(TransactionResult::success(
            submitted.tx_hash,
            submitted.gas_used,
            items_sent,
            plan.skipped.clone(),
            explorer_url,
        ))
    }

    /// One call to the atomic batch contract delivers the whole plan or
    /// reverts; per-token EVM transfers are never issued.
    async fn submit_evm_plan(
        &self,
        recipient: &Recipient,
        plan: &TransferPlan,
    ) -> Result<Submitted, Error> {
        let mut transfers = Vec::with_capacity(plan.items.len());
        let mut native_value = U256::ZERO;
        for item in &plan.items {
            if item.token.is_native() {
                // The batch contract takes address(0) line items from msg.value
                transfers.push(BatchTransfer {
                    token: Address::ZERO,
                    amount: item.amount,
                });
                native_value += item.amount;
            } else {
                transfers.push(BatchTransfer {
                    token: item.token.erc20_address,
                    amount: item.amount,
                });
            }
        }

        let submission = EvmSubmission {
            to: self.config.atomic_batch_contract,
            value: native_value,
            data: evm::encode_multi_send(recipient.evm_address(), &transfers),
            gas_limit: self.config.fees.evm_gas_limit_batch,
        };
        self.coordinator.submit_evm(submission).await
    }

    /// One transaction carrying one `MsgSend` per token; atomicity comes
    /// from the transaction being single-signed.
    async fn submit_cosmos_plan(
        &self,
        recipient: &Recipient,
        plan: &TransferPlan,
    ) -> Result<Submitted, Error> {
        let from = self.coordinator.operator_cosmos_address().to_string();
        let messages = plan
            .items
            .iter()
            .map(|item| {
                cosmos::msg_send(
                    &from,
                    recipient.cosmos_address(),
                    &item.token.denom,
                    item.amount,
                )
            })
            .collect();
        self.coordinator.submit_cosmos(messages).await
    }

    /// Best-effort post-dispense check that balances moved as planned.
    async fn verify_delivery(
        &self,
        recipient: &Recipient,
        plan: &TransferPlan,
        before: &HashMap<String, Option<U256>>,
    ) {
        let after = match self.oracle.read(recipient).await {
            Ok(after) => after,
            Err(e) => {
                warn!(error = %e, "post-dispense verification read failed");
                return;
            }
        };

        for item in &plan.items {
            let expected = before
                .get(&item.token.symbol)
                .copied()
                .flatten()
                .unwrap_or(U256::ZERO)
                + item.amount;
            match after.get(&item.token.symbol).copied().flatten() {
                Some(observed) if observed < expected => {
                    warn!(
                        token = %item.token.symbol,
                        %expected,
                        %observed,
                        "post-dispense balance below expectation"
                    );
                }
                _ => {}
            }
        }
    }

    async fn preflight(&self) -> Result<(), Error> {
        let evm_chain = self.evm.node_chain_id().await?;
        if evm_chain != self.config.evm_chain_id {
            return Err(Error::Config(format!(
                "EVM endpoint reports chain id {} but configuration says {}",
                evm_chain, self.config.evm_chain_id
            )));
        }

        let cosmos_chain = self.cosmos.node_chain_id().await?;
        if cosmos_chain != self.config.cosmos_chain_id {
            return Err(Error::Config(format!(
                "Cosmos endpoint reports chain id {} but configuration says {}",
                cosmos_chain, self.config.cosmos_chain_id
            )));
        }

        info!(
            evm_address = %self.wallet.evm_address(),
            cosmos_address = %self.coordinator.operator_cosmos_address(),
            "operator addresses derived"
        );

        // Funding report; a degraded read is a warning, not a startup failure
        match self.oracle.read_evm(self.wallet.evm_address()).await {
            Ok(holdings) => {
                for token in &self.config.tokens {
                    let Some(balance) = holdings.get(&token.symbol).copied().flatten() else {
                        continue;
                    };
                    let requests_left = if token.per_request.is_zero() {
                        U256::ZERO
                    } else {
                        balance / token.per_request
                    };
                    info!(token = %token.symbol, %balance, %requests_left, "operator holding");
                    if requests_left < U256::from(self.config.low_water_requests) {
                        warn!(
                            token = %token.symbol,
                            %requests_left,
                            "operator balance below low-water mark"
                        );
                    }
                }
            }
            Err(e) => warn!(error = %e, "operator funding report unavailable"),
        }
        Ok(())
    }

    fn explorer_url(&self, kind: RecipientKind, tx_hash: &str) -> Option<String> {
        self.config.explorer.as_ref().map(|links| {
            let template = match kind {
                RecipientKind::Evm => &links.evm_tx,
                RecipientKind::Cosmos => &links.cosmos_tx,
            };
            template.replace("{hash}", tx_hash)
        })
    }
}
