//! REST client for the Cosmos interface.
//!
//! Covers the four endpoints the faucet needs: auth account lookup (which
//! must understand both the base-account and the eth-account response
//! shapes), bank balances, transaction simulation, and SYNC broadcast with
//! follow-up polling.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::U256;
use base64::Engine;
use serde::Deserialize;

use crate::error::Error;

/// Operator account coordinates required for signing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorAccount {
    pub account_number: u64,
    pub sequence: u64,
}

/// Immediate result of a SYNC broadcast (CheckTx only)
#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub code: u32,
    pub tx_hash: String,
    pub raw_log: String,
}

/// Result of a delivered (indexed) transaction
#[derive(Debug, Clone)]
pub struct TxStatus {
    pub code: u32,
    pub gas_used: u64,
    pub raw_log: String,
}

// Wire shapes. Account responses come in two flavors: a plain BaseAccount,
// or an eth-account wrapper nesting the same fields under `base_account`.
// The variant is explicit; fields are never optional.

#[derive(Debug, Deserialize)]
struct AccountEnvelope {
    account: AccountShape,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountShape {
    Eth { base_account: BaseAccountFields },
    Base(BaseAccountFields),
}

#[derive(Debug, Deserialize)]
struct BaseAccountFields {
    account_number: String,
    sequence: String,
}

#[derive(Debug, Deserialize)]
struct BalancesEnvelope {
    balances: Vec<CoinJson>,
}

#[derive(Debug, Deserialize)]
struct CoinJson {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct SimulateEnvelope {
    gas_info: GasInfoJson,
}

#[derive(Debug, Deserialize)]
struct GasInfoJson {
    gas_used: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastEnvelope {
    tx_response: BroadcastResponseJson,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponseJson {
    code: u32,
    txhash: String,
    #[serde(default)]
    raw_log: String,
}

#[derive(Debug, Deserialize)]
struct TxEnvelope {
    tx_response: TxResponseJson,
}

#[derive(Debug, Deserialize)]
struct TxResponseJson {
    code: u32,
    #[serde(default)]
    gas_used: String,
    #[serde(default)]
    raw_log: String,
}

#[derive(Debug, Deserialize)]
struct NodeInfoEnvelope {
    default_node_info: NodeInfoJson,
}

#[derive(Debug, Deserialize)]
struct NodeInfoJson {
    network: String,
}

/// Thin REST client; connection-pooled, safe for concurrent use.
#[derive(Clone)]
pub struct CosmosRestClient {
    http: reqwest::Client,
    base: String,
}

impl CosmosRestClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Rest(format!("Failed to build REST client: {}", e)))?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Chain id reported by the node.
    pub async fn node_chain_id(&self) -> Result<String, Error> {
        let url = format!("{}/cosmos/base/tendermint/v1beta1/node_info", self.base);
        let envelope: NodeInfoEnvelope = self.get_json(&url).await?;
        Ok(envelope.default_node_info.network)
    }

    /// Account number and sequence for an address, handling both the
    /// base-account and the eth-account response shapes.
    pub async fn account(&self, address: &str) -> Result<OperatorAccount, Error> {
        let url = format!("{}/cosmos/auth/v1beta1/accounts/{}", self.base, address);
        let envelope: AccountEnvelope = self.get_json(&url).await?;
        let fields = match envelope.account {
            AccountShape::Eth { base_account } => base_account,
            AccountShape::Base(fields) => fields,
        };
        Ok(OperatorAccount {
            account_number: parse_u64(&fields.account_number, "account_number")?,
            sequence: parse_u64(&fields.sequence, "sequence")?,
        })
    }

    /// All bank balances for an address, keyed by denom. One round trip
    /// covers every configured token; absent denoms mean zero.
    pub async fn balances(&self, address: &str) -> Result<HashMap<String, U256>, Error> {
        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{}?pagination.limit=500",
            self.base, address
        );
        let envelope: BalancesEnvelope = self.get_json(&url).await?;
        let mut out = HashMap::with_capacity(envelope.balances.len());
        for coin in envelope.balances {
            let amount = coin
                .amount
                .parse::<U256>()
                .map_err(|e| Error::Rest(format!("bad amount for {}: {}", coin.denom, e)))?;
            out.insert(coin.denom, amount);
        }
        Ok(out)
    }

    /// Simulate a signed transaction, returning the gas it consumed.
    pub async fn simulate(&self, tx_bytes: &[u8]) -> Result<u64, Error> {
        let url = format!("{}/cosmos/tx/v1beta1/simulate", self.base);
        let body = serde_json::json!({
            "tx_bytes": base64::engine::general_purpose::STANDARD.encode(tx_bytes),
        });
        let envelope: SimulateEnvelope = self.post_json(&url, &body).await?;
        parse_u64(&envelope.gas_info.gas_used, "gas_used")
    }

    /// Broadcast in SYNC mode: the node runs CheckTx and returns immediately.
    pub async fn broadcast_sync(&self, tx_bytes: &[u8]) -> Result<BroadcastOutcome, Error> {
        let url = format!("{}/cosmos/tx/v1beta1/txs", self.base);
        let body = serde_json::json!({
            "tx_bytes": base64::engine::general_purpose::STANDARD.encode(tx_bytes),
            "mode": "BROADCAST_MODE_SYNC",
        });
        let envelope: BroadcastEnvelope = self.post_json(&url, &body).await?;
        Ok(BroadcastOutcome {
            code: envelope.tx_response.code,
            tx_hash: envelope.tx_response.txhash,
            raw_log: envelope.tx_response.raw_log,
        })
    }

    /// Look up a broadcast transaction; `None` until it is indexed.
    pub async fn get_tx(&self, tx_hash: &str) -> Result<Option<TxStatus>, Error> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.base, tx_hash);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Rest(format!("GET {}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::BAD_REQUEST
        {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Rest(format!(
                "GET {}: status {}",
                url,
                response.status()
            )));
        }

        let envelope: TxEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Rest(format!("GET {}: bad response: {}", url, e)))?;
        Ok(Some(TxStatus {
            code: envelope.tx_response.code,
            gas_used: parse_u64(&envelope.tx_response.gas_used, "gas_used").unwrap_or(0),
            raw_log: envelope.tx_response.raw_log,
        }))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Rest(format!("GET {}: {}", url, e)))?;
        Self::decode(url, response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, Error> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Rest(format!("POST {}: {}", url, e)))?;
        Self::decode(url, response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Rest(format!("{}: status {}: {}", url, status, detail)));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Rest(format!("{}: bad response: {}", url, e)))
    }
}

fn parse_u64(raw: &str, field: &str) -> Result<u64, Error> {
    raw.parse::<u64>()
        .map_err(|e| Error::Rest(format!("bad {} '{}': {}", field, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_account_shape() {
        let raw = r#"{
            "account": {
                "@type": "/cosmos.auth.v1beta1.BaseAccount",
                "address": "cosmos1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnps2tkfr",
                "pub_key": null,
                "account_number": "7",
                "sequence": "42"
            }
        }"#;
        let envelope: AccountEnvelope = serde_json::from_str(raw).unwrap();
        let fields = match envelope.account {
            AccountShape::Base(f) => f,
            AccountShape::Eth { .. } => panic!("expected base shape"),
        };
        assert_eq!(fields.account_number, "7");
        assert_eq!(fields.sequence, "42");
    }

    #[test]
    fn parses_eth_account_shape() {
        let raw = r#"{
            "account": {
                "@type": "/cosmos.evm.types.v1.EthAccount",
                "base_account": {
                    "address": "cosmos1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnps2tkfr",
                    "pub_key": null,
                    "account_number": "11",
                    "sequence": "3"
                },
                "code_hash": "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
            }
        }"#;
        let envelope: AccountEnvelope = serde_json::from_str(raw).unwrap();
        let fields = match envelope.account {
            AccountShape::Eth { base_account } => base_account,
            AccountShape::Base(_) => panic!("expected eth shape"),
        };
        assert_eq!(fields.account_number, "11");
        assert_eq!(fields.sequence, "3");
    }

    #[test]
    fn parses_balances() {
        let raw = r#"{
            "balances": [
                {"denom": "uatom", "amount": "1000000"},
                {"denom": "utka", "amount": "999500000"}
            ],
            "pagination": {"next_key": null, "total": "2"}
        }"#;
        let envelope: BalancesEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.balances.len(), 2);
        assert_eq!(envelope.balances[1].amount, "999500000");
    }
}
