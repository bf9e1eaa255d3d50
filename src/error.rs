use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::ErrorKind;

/// Errors produced by the faucet core.
///
/// Recoverable kinds (`NonceDrift`, transient transport failures) are retried
/// inside the submission path; everything else is reported to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Key derivation or signing setup failed
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Configuration is missing, unparsable, or violates an invariant
    #[error("configuration error: {0}")]
    Config(String),

    /// The supplied recipient string is neither a valid EVM nor Cosmos address
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    /// The client exceeded a rate-limit window
    #[error("rate limited, retry at {retry_at}")]
    RateLimited { retry_at: DateTime<Utc> },

    /// Every balance probe for a required token failed
    #[error("balance query failed: {0}")]
    BalanceQuery(String),

    /// The operator account lacks gas, token balance, or batch allowance
    #[error("operator underfunded: {0}")]
    OperatorUnderfunded(String),

    /// The chain reported signature verification failure; not retried
    #[error("chain rejected signature: {0}")]
    SignatureRejected(String),

    /// Nonce / sequence drift between fetch and broadcast
    #[error("nonce drift: {0}")]
    NonceDrift(String),

    /// Broadcast accepted but no receipt arrived within the deadline.
    /// The nonce is treated as consumed.
    #[error("no receipt within deadline for tx {0}")]
    BroadcastTimeout(String),

    /// The transaction was included but executed with a failure status
    #[error("transaction {tx_hash} reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    ChainReverted {
        tx_hash: String,
        reason: Option<String>,
    },

    /// The per-interface submission mutex could not be acquired in time
    #[error("submission lane busy")]
    Busy,

    /// EVM JSON-RPC transport or node error
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Cosmos REST transport or endpoint error
    #[error("rest error: {0}")]
    Rest(String),

    /// Rate-limit store I/O error
    #[error("store error: {0}")]
    Store(String),

    /// Protobuf / ABI / hex encoding error
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The caller-observable kind for this error, if it maps to one.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::BalanceQuery(_) => ErrorKind::BalanceQueryFailed,
            Error::OperatorUnderfunded(_) => ErrorKind::OperatorUnderfunded,
            Error::SignatureRejected(_) => ErrorKind::SignatureRejected,
            Error::NonceDrift(_) => ErrorKind::NonceDrift,
            Error::BroadcastTimeout(_) => ErrorKind::BroadcastTimeout,
            Error::ChainReverted { .. } => ErrorKind::ChainReverted,
            Error::Busy => ErrorKind::Busy,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether the submission path may retry after refetching chain state.
    pub fn is_drift(&self) -> bool {
        matches!(self, Error::NonceDrift(_))
    }
}
