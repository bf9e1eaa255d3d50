use std::time::Duration;

use alloy_primitives::{Address, TxKind, B256, U256};
use alloy_provider::{PendingTransactionBuilder, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types_eth::{BlockNumberOrTag, TransactionReceipt, TransactionRequest};
use alloy_sol_types::SolCall;
use alloy_transport_http::{Client, Http};

use crate::error::Error;
use crate::evm::tx::SignedEip1559Transaction;

/// JSON-RPC client for the EVM interface. Connection-pooled and safe for
/// concurrent use; every call observes the per-operation deadline.
#[derive(Clone)]
pub struct EvmClient {
    provider: RootProvider<Http<Client>>,
    chain_id: u64,
    request_timeout: Duration,
}

impl EvmClient {
    pub fn new(rpc_url: &str, chain_id: u64, request_timeout: Duration) -> Result<Self, Error> {
        let url = reqwest::Url::parse(rpc_url)
            .map_err(|e| Error::Config(format!("Invalid EVM RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider,
            chain_id,
            request_timeout,
        })
    }

    /// Configured chain id used for signing.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Chain id reported by the node via `eth_chainId`.
    pub async fn node_chain_id(&self) -> Result<u64, Error> {
        self.bounded(self.provider.get_chain_id()).await
    }

    /// Native balance of an address.
    pub async fn get_balance(&self, address: Address) -> Result<U256, Error> {
        self.bounded(self.provider.get_balance(address)).await
    }

    /// Pending-tag transaction count: the next nonce including mempool txs.
    pub async fn get_pending_nonce(&self, address: Address) -> Result<u64, Error> {
        self.bounded(
            self.provider
                .get_transaction_count(address)
                .block_id(BlockNumberOrTag::Pending.into()),
        )
        .await
    }

    /// EIP-1559 fee suggestion from provider heuristics:
    /// (max_fee_per_gas, max_priority_fee_per_gas), wei.
    pub async fn fee_suggestion(&self) -> Result<(u128, u128), Error> {
        let estimation = self
            .bounded(self.provider.estimate_eip1559_fees(None))
            .await?;
        Ok((
            estimation.max_fee_per_gas,
            estimation.max_priority_fee_per_gas,
        ))
    }

    /// Read-only contract call, decoded through the `sol!`-generated type.
    pub async fn call_contract<T: SolCall>(
        &self,
        contract: Address,
        call: T,
    ) -> Result<T::Return, Error> {
        let request = TransactionRequest {
            to: Some(TxKind::Call(contract)),
            input: call.abi_encode().into(),
            ..Default::default()
        };
        let result = self.bounded(self.provider.call(&request)).await?;
        T::abi_decode_returns(&result, false)
            .map_err(|e| Error::Encoding(format!("Failed to decode contract call result: {}", e)))
    }

    /// Broadcast a signed transaction, returning its hash.
    pub async fn send_raw_transaction(
        &self,
        signed: &SignedEip1559Transaction,
    ) -> Result<B256, Error> {
        let pending = self
            .bounded(self.provider.send_raw_transaction(signed.raw().as_ref()))
            .await?;
        Ok(*pending.tx_hash())
    }

    /// Wait for a receipt; `Error::BroadcastTimeout` when the deadline lapses.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<TransactionReceipt, Error> {
        PendingTransactionBuilder::new(&self.provider, tx_hash)
            .with_required_confirmations(1)
            .with_timeout(Some(timeout))
            .get_receipt()
            .await
            .map_err(|_| Error::BroadcastTimeout(format!("{tx_hash:#x}")))
    }

    /// Apply the per-operation deadline and normalize transport errors.
    async fn bounded<T, E, F>(&self, fut: F) -> Result<T, Error>
    where
        E: std::fmt::Display,
        F: std::future::IntoFuture<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.request_timeout, fut.into_future()).await {
            Ok(result) => result.map_err(|e| Error::Rpc(e.to_string())),
            Err(_) => Err(Error::Rpc(format!(
                "request exceeded {}ms deadline",
                self.request_timeout.as_millis()
            ))),
        }
    }
}
