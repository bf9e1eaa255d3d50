/// Result types returned by the dispatcher.
///
/// Everything here crosses the boundary to the wrapping surface, so amounts
/// are carried as decimal strings rather than machine integers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome classification for a dispense request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispenseStatus {
    /// Every planned item was delivered in one transaction
    Success,
    /// Reserved for future degradation; plans are currently all-or-nothing
    Partial,
    /// The plan was empty, nothing to send
    Skipped,
    /// The client exceeded a rate-limit window
    RateLimited,
    /// The request failed; see `error`
    Failed,
}

/// Caller-observable error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidAddress,
    RateLimited,
    SufficientBalance,
    BalanceQueryFailed,
    OperatorUnderfunded,
    SignatureRejected,
    NonceDrift,
    BroadcastTimeout,
    ChainReverted,
    Busy,
    /// Infrastructure failure with no more specific classification
    Internal,
}

/// Why a configured token was left out of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Recipient already holds the target ceiling
    SufficientBalance,
    /// Every probe for this token's balance failed
    BalanceUnavailable,
}

/// A transfer that was delivered on-chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentItem {
    pub symbol: String,
    /// Amount in the token's smallest unit, decimal string
    pub amount: String,
}

/// A configured token excluded from the plan, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedItem {
    pub symbol: String,
    pub reason: SkipReason,
}

/// Final report for one dispense request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub status: DispenseStatus,
    pub tx_hash: Option<String>,
    pub gas_used: Option<u64>,
    pub items_sent: Vec<SentItem>,
    pub items_skipped: Vec<SkippedItem>,
    pub error: Option<ErrorKind>,
    /// Earliest instant at which a rate-limited client may retry
    pub retry_at: Option<DateTime<Utc>>,
    pub explorer_url: Option<String>,
}

impl TransactionResult {
    pub fn invalid_address() -> Self {
        Self::failed(ErrorKind::InvalidAddress)
    }

    pub fn rate_limited(retry_at: DateTime<Utc>) -> Self {
        Self {
            status: DispenseStatus::RateLimited,
            tx_hash: None,
            gas_used: None,
            items_sent: Vec::new(),
            items_skipped: Vec::new(),
            error: Some(ErrorKind::RateLimited),
            retry_at: Some(retry_at),
            explorer_url: None,
        }
    }

    pub fn skipped(items_skipped: Vec<SkippedItem>) -> Self {
        Self {
            status: DispenseStatus::Skipped,
            tx_hash: None,
            gas_used: None,
            items_sent: Vec::new(),
            items_skipped,
            error: Some(ErrorKind::SufficientBalance),
            retry_at: None,
            explorer_url: None,
        }
    }

    pub fn success(
        tx_hash: String,
        gas_used: u64,
        items_sent: Vec<SentItem>,
        items_skipped: Vec<SkippedItem>,
        explorer_url: Option<String>,
    ) -> Self {
        Self {
            status: DispenseStatus::Success,
            tx_hash: Some(tx_hash),
            gas_used: Some(gas_used),
            items_sent,
            items_skipped,
            error: None,
            retry_at: None,
            explorer_url,
        }
    }

    pub fn failed(error: ErrorKind) -> Self {
        Self {
            status: DispenseStatus::Failed,
            tx_hash: None,
            gas_used: None,
            items_sent: Vec::new(),
            items_skipped: Vec::new(),
            error: Some(error),
            retry_at: None,
            explorer_url: None,
        }
    }
}

/// Per-token row returned by `Faucet::inspect_balance`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceView {
    pub symbol: String,
    /// Current holding in the smallest unit, decimal string; None when the
    /// probe for this token failed
    pub current: Option<String>,
    /// Target ceiling in the smallest unit, decimal string
    pub target: String,
    pub decimals: u8,
}
