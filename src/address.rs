//! Recipient classification and cross-format address projection.
//!
//! Both interfaces address the same 20-byte account payload: the EVM form is
//! the hex encoding, the Cosmos form is the bech32 encoding of the identical
//! bytes (no extra hashing). Every conversion in the crate goes through this
//! module so that identity holds in one place.

use std::str::FromStr;

use alloy_primitives::Address;
use cosmrs::AccountId;
use regex::Regex;

use crate::error::Error;

const EVM_ADDRESS_PATTERN: &str = "^0x[0-9a-fA-F]{40}$";

/// Which interface a recipient string addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    Cosmos,
    Evm,
}

/// A classified recipient with both projections precomputed.
/// Created per request, discarded at request end.
#[derive(Debug, Clone)]
pub struct Recipient {
    raw: String,
    kind: RecipientKind,
    evm: Address,
    bech32: String,
}

impl Recipient {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> RecipientKind {
        self.kind
    }

    /// Canonical 20-byte payload
    pub fn hex20(&self) -> [u8; 20] {
        self.evm.0 .0
    }

    /// EVM projection
    pub fn evm_address(&self) -> Address {
        self.evm
    }

    /// Cosmos projection (bech32 with the configured HRP)
    pub fn cosmos_address(&self) -> &str {
        &self.bech32
    }
}

/// Parses recipient strings and converts between the two address formats
pub struct AddressClassifier {
    hrp: String,
    evm_pattern: Regex,
}

impl AddressClassifier {
    pub fn new(hrp: &str) -> Result<Self, Error> {
        let evm_pattern = Regex::new(EVM_ADDRESS_PATTERN)
            .map_err(|e| Error::Config(format!("address pattern: {}", e)))?;
        Ok(Self {
            hrp: hrp.to_string(),
            evm_pattern,
        })
    }

    /// Classify a supplied recipient string.
    ///
    /// Hex inputs that present an EIP-55 checksum (mixed case) must carry a
    /// valid one; all-lower and all-upper inputs pass without a checksum.
    /// Bech32 inputs must use the configured HRP and a 20-byte payload.
    pub fn classify(&self, raw: &str) -> Result<Recipient, Error> {
        let raw = raw.trim();
        if self.evm_pattern.is_match(raw) {
            let address = self.parse_hex(raw)?;
            return Ok(Recipient {
                raw: raw.to_string(),
                kind: RecipientKind::Evm,
                evm: address,
                bech32: self.to_bech32(&address.0 .0)?,
            });
        }

        if let Ok(account) = AccountId::from_str(raw) {
            if account.prefix() != self.hrp {
                return Err(Error::InvalidAddress(format!(
                    "bech32 prefix '{}' does not match configured '{}'",
                    account.prefix(),
                    self.hrp
                )));
            }
            let bytes = account.to_bytes();
            let payload: [u8; 20] = bytes.as_slice().try_into().map_err(|_| {
                Error::InvalidAddress(format!(
                    "bech32 payload is {} bytes, expected 20",
                    bytes.len()
                ))
            })?;
            return Ok(Recipient {
                raw: raw.to_string(),
                kind: RecipientKind::Cosmos,
                evm: Address::from(payload),
                bech32: account.to_string(),
            });
        }

        Err(Error::InvalidAddress(format!(
            "'{}' is neither a hex nor a bech32 address",
            raw
        )))
    }

    /// Canonical 20-byte form of a classified recipient
    pub fn to_hex20(recipient: &Recipient) -> [u8; 20] {
        recipient.hex20()
    }

    /// Bech32 encoding of a raw 20-byte payload under the configured HRP
    pub fn to_bech32(&self, payload: &[u8; 20]) -> Result<String, Error> {
        let account = AccountId::new(&self.hrp, payload)
            .map_err(|e| Error::InvalidAddress(format!("bech32 encoding: {}", e)))?;
        Ok(account.to_string())
    }

    fn parse_hex(&self, raw: &str) -> Result<Address, Error> {
        let body = &raw[2..];
        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            // Mixed case presents a checksum; enforce it
            Address::parse_checksummed(raw, None)
                .map_err(|_| Error::InvalidAddress(format!("'{}' fails EIP-55 checksum", raw)))
        } else {
            Address::from_str(raw)
                .map_err(|e| Error::InvalidAddress(format!("'{}': {}", raw, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> AddressClassifier {
        AddressClassifier::new("cosmos").unwrap()
    }

    #[test]
    fn classifies_lowercase_hex() {
        let r = classifier()
            .classify("0x000000000000000000000000000000000000dead")
            .unwrap();
        assert_eq!(r.kind(), RecipientKind::Evm);
        assert_eq!(r.hex20()[18], 0xde);
    }

    #[test]
    fn accepts_valid_checksum_rejects_broken_one() {
        let c = classifier();
        // EIP-55 reference vector
        let checksummed = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(c.classify(checksummed).is_ok());

        // Same payload, one letter's case flipped: still mixed case, bad checksum
        let broken = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD";
        assert!(matches!(c.classify(broken), Err(Error::InvalidAddress(_))));

        // All-upper presents no checksum and passes
        let upper = format!("0x{}", checksummed[2..].to_ascii_uppercase());
        assert!(c.classify(&upper).is_ok());
    }

    #[test]
    fn hex_and_bech32_share_payload() {
        let c = classifier();
        let hex = c
            .classify("0x1111111111111111111111111111111111111111")
            .unwrap();
        let bech = c.classify(hex.cosmos_address()).unwrap();
        assert_eq!(bech.kind(), RecipientKind::Cosmos);
        assert_eq!(hex.hex20(), bech.hex20());
        assert_eq!(hex.cosmos_address(), bech.cosmos_address());
    }

    #[test]
    fn bech32_round_trip_is_identity() {
        let c = classifier();
        let payload = [7u8; 20];
        let encoded = c.to_bech32(&payload).unwrap();
        let decoded = c.classify(&encoded).unwrap();
        assert_eq!(decoded.hex20(), payload);
    }

    #[test]
    fn rejects_wrong_hrp() {
        let c = classifier();
        let foreign = AddressClassifier::new("osmo")
            .unwrap()
            .to_bech32(&[9u8; 20])
            .unwrap();
        assert!(matches!(c.classify(&foreign), Err(Error::InvalidAddress(_))));
    }

    #[test]
    fn rejects_garbage() {
        let c = classifier();
        assert!(c.classify("not-an-address").is_err());
        assert!(c.classify("0x1234").is_err());
        assert!(c.classify("").is_err());
    }
}
