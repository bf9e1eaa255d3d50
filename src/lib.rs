//! Dispensing core for a dual-environment testnet faucet.
//!
//! One operator key serves a chain that exposes both a Cosmos SDK interface
//! (bech32 addresses, bank module, REST) and an EVM interface (hex
//! addresses, JSON-RPC, ERC-20 contracts). Both operator addresses decode
//! to the same 20-byte payload. Per request the faucet tops each configured
//! token up to its target ceiling, delivered atomically: a single batch
//! contract call on the EVM path, a single multi-message bank transaction
//! on the Cosmos path.

pub mod address;
pub mod balance;
pub mod config;
pub mod cosmos;
pub mod dispatcher;
pub mod error;
pub mod evm;
pub mod planner;
pub mod ratelimit;
pub mod submit;
pub mod types;
pub mod wallet;

pub use address::{AddressClassifier, Recipient, RecipientKind};
pub use balance::BalanceOracle;
pub use config::{FaucetConfig, TokenDescriptor, DEFAULT_PUBKEY_TYPE_URL, MNEMONIC_ENV};
pub use dispatcher::Faucet;
pub use error::Error;
pub use planner::{TransferItem, TransferPlan};
pub use ratelimit::{Decision, RateLimiter};
pub use submit::{NonceCoordinator, Submitted};
pub use types::{BalanceView, DispenseStatus, ErrorKind, TransactionResult};
pub use wallet::OperatorWallet;
