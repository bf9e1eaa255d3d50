// Allow deprecated Signature for compatibility with alloy-consensus ecosystem
#![allow(deprecated)]

use std::str::FromStr;

use alloy_primitives::{Address, Signature, B256};
use bip32::{DerivationPath, Seed, XPrv};
use bip39::Mnemonic;
use cosmrs::{AccountId, Any};
use k256::ecdsa::SigningKey;
use prost::Message;
use sha3::{digest::FixedOutput, Digest, Keccak256};
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

use crate::error::Error;
use crate::evm::tx::{Eip1559Transaction, SignedEip1559Transaction};

/// BIP-44 path of the operator account. Coin type 60: both interfaces derive
/// their address from this one key over Ethereum's scheme.
const OPERATOR_HD_PATH: &str = "m/44'/60'/0'/0/0";

/// The operator key pair and both address projections, derived once at
/// startup and held for the process lifetime.
///
/// The EVM address is the low 20 bytes of the keccak-256 of the uncompressed
/// public key; the Cosmos address is the bech32 encoding of those same bytes.
pub struct OperatorWallet {
    signer: SigningKey,
    evm_address: Address,
    hrp: String,
    pubkey_type_url: String,
}

// Intentionally no Clone: the signing key lives in exactly one place.

impl std::fmt::Debug for OperatorWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorWallet")
            .field("evm_address", &self.evm_address)
            .field("hrp", &self.hrp)
            .finish()
    }
}

impl OperatorWallet {
    /// Derive the operator key from a mnemonic.
    ///
    /// Fails fatally on an invalid mnemonic; there is no recovery path
    /// without a correct operator secret.
    pub fn from_mnemonic(
        mnemonic: &str,
        hrp: &str,
        pubkey_type_url: &str,
    ) -> Result<Self, Error> {
        let mnemonic = Mnemonic::from_str(mnemonic)
            .map_err(|e| Error::Wallet(format!("Invalid mnemonic: {}", e)))?;

        let seed = Seed::new(mnemonic.to_seed(""));
        let path = DerivationPath::from_str(OPERATOR_HD_PATH)
            .map_err(|e| Error::Wallet(format!("Invalid derivation path: {}", e)))?;
        let node = XPrv::derive_from_path(seed.as_bytes(), &path)
            .map_err(|e| Error::Wallet(format!("Key derivation error: {}", e)))?;

        let scalar = Zeroizing::new(node.to_bytes());
        let signer = SigningKey::from_slice(scalar.as_ref())
            .map_err(|e| Error::Wallet(format!("Failed to create signing key: {}", e)))?;
        let evm_address = Self::derive_evm_address(&signer)?;

        Ok(Self {
            signer,
            evm_address,
            hrp: hrp.to_string(),
            pubkey_type_url: pubkey_type_url.to_string(),
        })
    }

    /// The operator's EVM address
    pub fn evm_address(&self) -> Address {
        self.evm_address
    }

    /// The operator's Cosmos address: the same 20 bytes under the configured
    /// HRP
    pub fn cosmos_address(&self) -> Result<AccountId, Error> {
        AccountId::new(&self.hrp, self.evm_address.as_slice())
            .map_err(|e| Error::Wallet(format!("Failed to encode cosmos address: {}", e)))
    }

    /// 33-byte compressed secp256k1 public key
    pub fn compressed_pubkey(&self) -> [u8; 33] {
        let point = self.signer.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// The signer public key wrapped as a protobuf `Any` under the configured
    /// ethermint-family type URL. The payload is the standard single-field
    /// secp256k1 wire format; only the URL differs from the stock cosmos key.
    pub fn pubkey_any(&self) -> Result<Any, Error> {
        let proto = cosmos_sdk_proto::cosmos::crypto::secp256k1::PubKey {
            key: self.compressed_pubkey().to_vec(),
        };
        Ok(Any {
            type_url: self.pubkey_type_url.clone(),
            value: proto.encode_to_vec(),
        })
    }

    /// Sign an EIP-1559 transaction and return the broadcastable payload.
    pub fn sign_eip1559(&self, tx: &Eip1559Transaction) -> Result<SignedEip1559Transaction, Error> {
        let encoded = tx.encoded_for_signing();
        let (signature, _) = self.sign_with_keccak(|d| d.update(&encoded))?;
        let raw = tx.encode_signed(&signature);
        Ok(SignedEip1559Transaction::new(
            tx.clone().into_signed(signature),
            raw,
        ))
    }

    /// Sign Cosmos SIGN_MODE_DIRECT bytes: keccak-256 digest, 64-byte `r||s`.
    pub fn sign_cosmos(&self, sign_doc_bytes: &[u8]) -> Result<[u8; 64], Error> {
        let mut digest = Keccak256::new();
        digest.update(sign_doc_bytes);
        let (sig, _recid) = self
            .signer
            .sign_digest_recoverable(digest)
            .map_err(|e| Error::Wallet(format!("Cosmos signing error: {}", e)))?;
        let mut out = [0u8; 64];
        out.copy_from_slice(&sig.to_bytes());
        Ok(out)
    }

    /// Drop key material. The scalar inside the signing key is zeroized when
    /// the wallet is dropped; this makes the lifecycle explicit.
    pub fn shutdown(self) {
        drop(self);
    }

    fn sign_with_keccak<F>(&self, builder: F) -> Result<(Signature, B256), Error>
    where
        F: FnOnce(&mut Keccak256),
    {
        let mut digest = Keccak256::new();
        builder(&mut digest);
        let hash_bytes: [u8; 32] = digest.clone().finalize_fixed().into();

        let (sig, recid) = self
            .signer
            .sign_digest_recoverable(digest)
            .map_err(|e| Error::Wallet(format!("Failed to sign digest: {}", e)))?;

        Ok((Signature::from((sig, recid)), B256::from(hash_bytes)))
    }

    fn derive_evm_address(signer: &SigningKey) -> Result<Address, Error> {
        let point = signer.verifying_key().to_encoded_point(false);
        let pubkey_bytes = point.as_bytes();
        if pubkey_bytes.len() != 65 || pubkey_bytes[0] != 0x04 {
            return Err(Error::Wallet(
                "Invalid public key format for address derivation".to_string(),
            ));
        }

        let mut hasher = Keccak::v256();
        hasher.update(&pubkey_bytes[1..]);
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Ok(Address::from(address))
    }
}
