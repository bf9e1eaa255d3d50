// Allow deprecated Signature for compatibility with alloy-consensus ecosystem
#![allow(deprecated)]

use alloy_consensus::{SignableTransaction, Signed, TxEip1559};
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, ChainId, Signature, TxKind, B256, U256};

/// Builder for the type-0x02 transactions the faucet submits: batch-contract
/// calls and ERC-20 approvals. Always a call, never a create.
#[derive(Clone, Debug)]
pub struct Eip1559Transaction {
    pub chain_id: ChainId,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Eip1559Transaction {
    pub fn new(chain_id: u64, nonce: u64, to: Address) -> Self {
        Self {
            chain_id,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
            to,
            value: U256::ZERO,
            data: Bytes::new(),
        }
    }

    /// Set the native value (wei) carried by the call.
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set the calldata payload.
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data.into();
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn max_fee_per_gas(mut self, max_fee: u128) -> Self {
        self.max_fee_per_gas = max_fee;
        self
    }

    pub fn max_priority_fee_per_gas(mut self, tip: u128) -> Self {
        self.max_priority_fee_per_gas = tip;
        self
    }

    fn to_alloy(&self) -> TxEip1559 {
        TxEip1559 {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            to: TxKind::Call(self.to),
            value: self.value,
            access_list: AccessList::default(),
            input: self.data.clone(),
        }
    }

    /// Bytes hashed (keccak-256) for signing.
    pub fn encoded_for_signing(&self) -> Vec<u8> {
        self.to_alloy().encoded_for_signing()
    }

    /// Encode with signature into raw bytes for `eth_sendRawTransaction`.
    /// The signature `v` carries the 0/1 parity convention.
    pub fn encode_signed(&self, signature: &Signature) -> Bytes {
        let tx = self.to_alloy();
        let mut buf = Vec::with_capacity(tx.encoded_len_with_signature(signature, false));
        tx.encode_with_signature(signature, &mut buf, false);
        Bytes::from(buf)
    }

    /// Combine with a signature into the hash-bearing signed form.
    pub fn into_signed(self, signature: Signature) -> Signed<TxEip1559> {
        self.to_alloy().into_signed(signature)
    }
}

/// A fully signed transaction plus its raw broadcast payload.
#[derive(Clone, Debug)]
pub struct SignedEip1559Transaction {
    signed: Signed<TxEip1559>,
    raw: Bytes,
}

impl SignedEip1559Transaction {
    pub fn new(signed: Signed<TxEip1559>, raw: Bytes) -> Self {
        Self { signed, raw }
    }

    /// Raw bytes ready for `eth_sendRawTransaction`.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// Transaction hash of the signed payload.
    pub fn hash(&self) -> B256 {
        *self.signed.hash()
    }
}
