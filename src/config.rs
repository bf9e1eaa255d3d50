//! Configuration for the faucet core.
//!
//! Everything is loaded once at startup and shared read-only. The operator
//! mnemonic is read from the environment only, never from a file on disk.

use std::path::PathBuf;

use alloy_primitives::{Address, U256};
use config::{Config as ConfigLoader, File};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Environment variable holding the operator mnemonic
pub const MNEMONIC_ENV: &str = "FAUCET_MNEMONIC";

/// Pubkey type URL observed on the reference chain. Ethermint-family chains
/// disagree on the URL while sharing the wire format, so it is overridable.
pub const DEFAULT_PUBKEY_TYPE_URL: &str = "/cosmos.evm.crypto.v1.ethsecp256k1.PubKey";

/// Serde codec for amounts in the smallest unit: decimal strings in config,
/// `U256` in memory.
pub(crate) mod amount_serde {
    use alloy_primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(d)?;
        U256::from_str(&raw).map_err(|e| de::Error::custom(format!("invalid amount '{raw}': {e}")))
    }
}

/// Optional IBC provenance carried through for display purposes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IbcTrace {
    /// Port/channel trace path, e.g. `transfer/channel-0`
    pub path: String,
    pub base_denom: String,
}

/// One dispensable token. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub symbol: String,
    pub name: String,
    /// Bank-module denom on the Cosmos interface
    pub denom: String,
    pub decimals: u8,
    /// ERC-20 contract on the EVM interface; the all-`0xEE` sentinel denotes
    /// the native token's precompile view
    pub erc20_address: Address,
    /// Amount sent per request, smallest unit
    #[serde(with = "amount_serde")]
    pub per_request: U256,
    /// Holding ceiling above which nothing more is dispensed, smallest unit
    #[serde(with = "amount_serde")]
    pub target_balance: U256,
    #[serde(default)]
    pub ibc: Option<IbcTrace>,
}

impl TokenDescriptor {
    /// True when `erc20_address` is the native-view sentinel (every byte 0xEE)
    pub fn is_native(&self) -> bool {
        self.erc20_address.0 == [0xEE; 20]
    }
}

/// Network endpoints for both interfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub cosmos_rest: String,
    #[serde(default)]
    pub cosmos_grpc: Option<String>,
    #[serde(default)]
    pub cosmos_rpc: Option<String>,
    pub evm_json_rpc: String,
    #[serde(default)]
    pub evm_ws: Option<String>,
}

/// Sliding-window limits per key family. Windows are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub addr_window: u64,
    pub addr_limit: u32,
    pub ip_window: u64,
    pub ip_limit: u32,
}

/// Fee knobs for both interfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeePolicy {
    /// Cosmos gas price in `fee_denom` per gas unit
    pub cosmos_gas_price: f64,
    /// Denom the Cosmos fee is paid in
    pub fee_denom: String,
    /// Ceiling for the EIP-1559 priority fee, wei
    pub evm_priority_fee_cap: u64,
    /// Gas limit for the atomic batch call
    pub evm_gas_limit_batch: u64,
    /// Multiplier applied to simulated Cosmos gas
    pub cosmos_gas_buffer: f64,
}

/// Per-operation deadlines, milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    #[serde(default = "Timeouts::default_request")]
    pub request_ms: u64,
    #[serde(default = "Timeouts::default_receipt")]
    pub receipt_ms: u64,
    #[serde(default = "Timeouts::default_mutex")]
    pub mutex_ms: u64,
}

impl Timeouts {
    fn default_request() -> u64 {
        10_000
    }
    fn default_receipt() -> u64 {
        30_000
    }
    fn default_mutex() -> u64 {
        15_000
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_ms: Self::default_request(),
            receipt_ms: Self::default_receipt(),
            mutex_ms: Self::default_mutex(),
        }
    }
}

/// URL templates for result hints; `{hash}` is substituted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerLinks {
    pub evm_tx: String,
    pub cosmos_tx: String,
}

/// Complete faucet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetConfig {
    pub cosmos_chain_id: String,
    pub evm_chain_id: u64,
    /// Bech32 human-readable prefix for the Cosmos interface
    pub hrp: String,
    pub endpoints: Endpoints,
    /// Ordered list of dispensable tokens; plan order follows this order
    pub tokens: Vec<TokenDescriptor>,
    pub atomic_batch_contract: Address,
    pub rate_limits: RateLimitPolicy,
    pub fees: FeePolicy,
    pub ratelimit_store_path: PathBuf,
    #[serde(default = "default_pubkey_type_url")]
    pub pubkey_type_url: String,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub explorer: Option<ExplorerLinks>,
    /// Number of per-request amounts the startup allowance should cover
    #[serde(default = "default_approval_horizon")]
    pub approval_horizon: u64,
    /// Warn when an operator token balance covers fewer requests than this
    #[serde(default = "default_low_water")]
    pub low_water_requests: u64,
    #[serde(default)]
    pub memo: String,
    /// Operator mnemonic, injected from the environment by `load`
    #[serde(skip)]
    pub mnemonic: Option<Secret<String>>,
}

fn default_pubkey_type_url() -> String {
    DEFAULT_PUBKEY_TYPE_URL.to_string()
}

fn default_approval_horizon() -> u64 {
    1_000
}

fn default_low_water() -> u64 {
    100
}

impl FaucetConfig {
    /// Load configuration from a file plus `FAUCET_*` environment overrides.
    ///
    /// The mnemonic comes exclusively from the `FAUCET_MNEMONIC` environment
    /// variable (a `.env` file is honored for development).
    pub fn load(path: Option<&str>) -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let mut builder = ConfigLoader::builder();
        builder = match path {
            Some(p) => builder.add_source(File::with_name(p)),
            None => builder.add_source(File::with_name("faucet").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("FAUCET")
                .separator("__")
                .ignore_empty(true),
        );

        let loaded = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))?;
        let mut cfg: FaucetConfig = loaded
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {}", e)))?;

        if let Ok(mnemonic) = std::env::var(MNEMONIC_ENV) {
            cfg.mnemonic = Some(Secret::new(mnemonic));
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse configuration from a TOML string. The mnemonic is not populated.
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        let cfg: FaucetConfig = toml::from_str(raw)
            .map_err(|e| Error::Config(format!("Failed to parse configuration: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Enforce the load-time invariants of the token list and policies.
    pub fn validate(&self) -> Result<(), Error> {
        if self.hrp.is_empty() {
            return Err(Error::Config("hrp must not be empty".to_string()));
        }
        if self.tokens.is_empty() {
            return Err(Error::Config(
                "at least one token must be configured".to_string(),
            ));
        }
        for token in &self.tokens {
            if token.decimals > 18 {
                return Err(Error::Config(format!(
                    "token {}: decimals {} out of range [0,18]",
                    token.symbol, token.decimals
                )));
            }
            if token.per_request.is_zero() {
                return Err(Error::Config(format!(
                    "token {}: per-request amount must be positive",
                    token.symbol
                )));
            }
            if token.per_request > token.target_balance {
                return Err(Error::Config(format!(
                    "token {}: per-request amount exceeds target ceiling",
                    token.symbol
                )));
            }
        }
        let mut symbols: Vec<&str> = self.tokens.iter().map(|t| t.symbol.as_str()).collect();
        symbols.sort_unstable();
        symbols.dedup();
        if symbols.len() != self.tokens.len() {
            return Err(Error::Config(
                "duplicate token symbols in configuration".to_string(),
            ));
        }
        if self.rate_limits.addr_limit == 0 || self.rate_limits.ip_limit == 0 {
            return Err(Error::Config("rate limits must be positive".to_string()));
        }
        if self.fees.cosmos_gas_buffer < 1.0 {
            return Err(Error::Config("cosmosGasBuffer must be >= 1.0".to_string()));
        }
        Ok(())
    }

    /// The operator mnemonic; configuration error when absent.
    pub fn mnemonic(&self) -> Result<&Secret<String>, Error> {
        self.mnemonic.as_ref().ok_or_else(|| {
            Error::Config(format!("operator mnemonic missing; set {}", MNEMONIC_ENV))
        })
    }

    /// Look up a configured token by symbol.
    pub fn token(&self, symbol: &str) -> Option<&TokenDescriptor> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }
}
