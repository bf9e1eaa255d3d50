/// Cosmos interface: REST client for account/balance/broadcast plumbing and
/// SIGN_MODE_DIRECT transaction assembly with the ethermint-family pubkey.
pub mod rest;
pub mod tx;

pub use rest::{BroadcastOutcome, CosmosRestClient, OperatorAccount, TxStatus};
pub use tx::{build_and_sign, msg_send, MSG_SEND_TYPE_URL};
