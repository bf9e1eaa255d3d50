//! Serialized transaction submission for the operator account.
//!
//! One mutex per interface: a submission holds it from state fetch until the
//! transaction is confirmed or definitively rejected, so concurrent dispenses
//! on the same interface queue up and receive consecutive nonces/sequences.
//! An EVM dispense and a Cosmos dispense proceed independently; their nonce
//! spaces are disjoint.
//!
//! Drift ("nonce too low", "account sequence mismatch") is retried up to
//! three attempts, refetching state each time with a doubling backoff.
//! Signature rejection and operator underfunding are fatal and never retried.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use cosmrs::Any;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use crate::config::FaucetConfig;
use crate::cosmos::{self, CosmosRestClient};
use crate::error::Error;
use crate::evm::{Eip1559Transaction, EvmClient};
use crate::wallet::OperatorWallet;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(400);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Gas fallback when Cosmos simulation is unavailable: base cost plus a per
/// message allowance.
const COSMOS_GAS_FLOOR: u64 = 80_000;
const COSMOS_GAS_PER_MSG: u64 = 60_000;

/// An EVM call ready for nonce assignment and signing
#[derive(Debug, Clone)]
pub struct EvmSubmission {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_limit: u64,
}

/// A confirmed on-chain submission
#[derive(Debug, Clone)]
pub struct Submitted {
    pub tx_hash: String,
    pub gas_used: u64,
}

/// Hands each outbound transaction a correct nonce (EVM) or
/// account-number+sequence (Cosmos) and serializes broadcasts per interface.
pub struct NonceCoordinator {
    evm_gate: Mutex<()>,
    cosmos_gate: Mutex<()>,
    evm: EvmClient,
    cosmos: CosmosRestClient,
    wallet: Arc<OperatorWallet>,
    config: Arc<FaucetConfig>,
    operator_cosmos: String,
}

impl NonceCoordinator {
    pub fn new(
        evm: EvmClient,
        cosmos: CosmosRestClient,
        wallet: Arc<OperatorWallet>,
        config: Arc<FaucetConfig>,
    ) -> Result<Self, Error> {
        let operator_cosmos = wallet.cosmos_address()?.to_string();
        Ok(Self {
            evm_gate: Mutex::new(()),
            cosmos_gate: Mutex::new(()),
            evm,
            cosmos,
            wallet,
            config,
            operator_cosmos,
        })
    }

    /// Submit an EVM call and wait for its receipt.
    pub async fn submit_evm(&self, submission: EvmSubmission) -> Result<Submitted, Error> {
        let _lane = timeout(self.mutex_deadline(), self.evm_gate.lock())
            .await
            .map_err(|_| Error::Busy)?;

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.try_submit_evm(&submission).await {
                Ok(done) => return Ok(done),
                Err(e) if e.is_drift() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "evm nonce drift, refetching state");
                    sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(self.log_fatal(e)),
            }
        }
    }

    /// Submit a batch of Cosmos messages as one transaction and wait for it
    /// to be delivered.
    pub async fn submit_cosmos(&self, messages: Vec<Any>) -> Result<Submitted, Error> {
        let _lane = timeout(self.mutex_deadline(), self.cosmos_gate.lock())
            .await
            .map_err(|_| Error::Busy)?;

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.try_submit_cosmos(&messages).await {
                Ok(done) => return Ok(done),
                Err(e) if e.is_drift() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "cosmos sequence drift, refetching state");
                    sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(self.log_fatal(e)),
            }
        }
    }

    /// The operator's bech32 address used as the Cosmos sender.
    pub fn operator_cosmos_address(&self) -> &str {
        &self.operator_cosmos
    }

    async fn try_submit_evm(&self, submission: &EvmSubmission) -> Result<Submitted, Error> {
        let operator = self.wallet.evm_address();
        let nonce = self.evm.get_pending_nonce(operator).await?;
        let (max_fee, suggested_tip) = self.evm.fee_suggestion().await?;
        let tip = suggested_tip.min(self.config.fees.evm_priority_fee_cap as u128);

        let tx = Eip1559Transaction::new(self.config.evm_chain_id, nonce, submission.to)
            .value(submission.value)
            .data(submission.data.clone())
            .gas_limit(submission.gas_limit)
            .max_fee_per_gas(max_fee.max(tip))
            .max_priority_fee_per_gas(tip);

        let signed = self.wallet.sign_eip1559(&tx)?;
        let tx_hash = self
            .evm
            .send_raw_transaction(&signed)
            .await
            .map_err(classify_evm_error)?;

        let receipt = self
            .evm
            .wait_for_receipt(tx_hash, self.receipt_deadline())
            .await?;

        let tx_hash = format!("{tx_hash:#x}");
        if !receipt.status() {
            return Err(Error::ChainReverted {
                tx_hash,
                reason: None,
            });
        }

        let gas_used = receipt.gas_used as u64;
        info!(tx_hash = %tx_hash, nonce, gas_used, "evm submission confirmed");
        Ok(Submitted { tx_hash, gas_used })
    }

    async fn try_submit_cosmos(&self, messages: &[Any]) -> Result<Submitted, Error> {
        let account = self.cosmos.account(&self.operator_cosmos).await?;

        // Size gas by simulation, falling back to a per-message allowance
        let provisional_gas = COSMOS_GAS_FLOOR + COSMOS_GAS_PER_MSG * messages.len() as u64;
        let sim_raw = cosmos::build_and_sign(
            &self.wallet,
            &self.config.cosmos_chain_id,
            account.account_number,
            account.sequence,
            messages.to_vec(),
            0,
            &self.config.fees.fee_denom,
            provisional_gas,
            &self.config.memo,
        )?;
        let gas_limit = match self.cosmos.simulate(&sim_raw).await {
            Ok(gas_used) => (gas_used as f64 * self.config.fees.cosmos_gas_buffer) as u64,
            Err(e) => {
                let classified = classify_cosmos_message(&e.to_string());
                if classified.is_drift() {
                    return Err(classified);
                }
                warn!(error = %e, fallback = provisional_gas, "simulation failed, using fallback gas");
                provisional_gas
            }
        };
        let fee_amount = (gas_limit as f64 * self.config.fees.cosmos_gas_price).ceil() as u128;

        let raw = cosmos::build_and_sign(
            &self.wallet,
            &self.config.cosmos_chain_id,
            account.account_number,
            account.sequence,
            messages.to_vec(),
            fee_amount,
            &self.config.fees.fee_denom,
            gas_limit,
            &self.config.memo,
        )?;

        let outcome = self.cosmos.broadcast_sync(&raw).await?;
        if outcome.code != 0 {
            return Err(classify_cosmos_rejection(
                outcome.code,
                &outcome.raw_log,
                &outcome.tx_hash,
            ));
        }

        // SYNC broadcast only ran CheckTx; poll until the tx is delivered
        let deadline = Instant::now() + self.receipt_deadline();
        loop {
            if let Some(status) = self.cosmos.get_tx(&outcome.tx_hash).await? {
                if status.code != 0 {
                    return Err(Error::ChainReverted {
                        tx_hash: outcome.tx_hash,
                        reason: Some(status.raw_log),
                    });
                }
                info!(
                    tx_hash = %outcome.tx_hash,
                    sequence = account.sequence,
                    gas_used = status.gas_used,
                    "cosmos submission delivered"
                );
                return Ok(Submitted {
                    tx_hash: outcome.tx_hash,
                    gas_used: status.gas_used,
                });
            }
            if Instant::now() >= deadline {
                // The sequence is considered consumed; outcome unknown
                return Err(Error::BroadcastTimeout(outcome.tx_hash));
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    fn mutex_deadline(&self) -> Duration {
        Duration::from_millis(self.config.timeouts.mutex_ms)
    }

    fn receipt_deadline(&self) -> Duration {
        Duration::from_millis(self.config.timeouts.receipt_ms)
    }

    /// Alert-level logging for the kinds an operator must act on.
    fn log_fatal(&self, e: Error) -> Error {
        match &e {
            Error::SignatureRejected(detail) => {
                error!(detail = %detail, "chain rejected operator signature; check key and pubkey type URL");
            }
            Error::OperatorUnderfunded(detail) => {
                error!(detail = %detail, "operator account underfunded");
            }
            _ => {}
        }
        e
    }
}

/// Map an EVM broadcast failure onto the closed error sum.
fn classify_evm_error(e: Error) -> Error {
    let message = e.to_string().to_lowercase();
    if message.contains("nonce too low")
        || message.contains("invalid nonce")
        || message.contains("replacement transaction underpriced")
        || message.contains("already known")
    {
        Error::NonceDrift(message)
    } else if message.contains("insufficient funds") {
        Error::OperatorUnderfunded(message)
    } else if message.contains("invalid signature") {
        Error::SignatureRejected(message)
    } else {
        e
    }
}

/// Classify a CheckTx rejection from its ABCI code and log.
fn classify_cosmos_rejection(code: u32, raw_log: &str, tx_hash: &str) -> Error {
    let classified = classify_cosmos_message(raw_log);
    if !matches!(classified, Error::Rest(_)) {
        return classified;
    }
    match code {
        // sdk ErrWrongSequence
        32 => Error::NonceDrift(raw_log.to_string()),
        // sdk ErrUnauthorized covers failed signature verification
        4 => Error::SignatureRejected(raw_log.to_string()),
        // sdk ErrInsufficientFunds / ErrInsufficientFee
        5 | 13 => Error::OperatorUnderfunded(raw_log.to_string()),
        _ => Error::ChainReverted {
            tx_hash: tx_hash.to_string(),
            reason: Some(raw_log.to_string()),
        },
    }
}

fn classify_cosmos_message(message: &str) -> Error {
    let lower = message.to_lowercase();
    if lower.contains("account sequence mismatch") {
        Error::NonceDrift(message.to_string())
    } else if lower.contains("signature verification failed") {
        Error::SignatureRejected(message.to_string())
    } else if lower.contains("insufficient funds") || lower.contains("insufficient fee") {
        Error::OperatorUnderfunded(message.to_string())
    } else {
        Error::Rest(message.to_string())
    }
}
