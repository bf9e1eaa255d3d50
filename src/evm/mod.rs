/// EVM interface: JSON-RPC client, EIP-1559 transaction building, and the
/// contract surface (ERC-20 + atomic batch).
pub mod client;
pub mod contracts;
pub mod tx;

pub use client::EvmClient;
pub use contracts::{encode_approve, encode_multi_send, BatchTransfer, Erc20};
pub use tx::{Eip1559Transaction, SignedEip1559Transaction};
