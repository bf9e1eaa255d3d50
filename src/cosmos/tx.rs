//! SIGN_MODE_DIRECT transaction assembly.
//!
//! Built directly over the protobuf types rather than the cosmrs signing
//! path: the operator pubkey must be emitted under an ethermint-family type
//! URL and the sign-doc digest is keccak-256, neither of which the stock
//! secp256k1 path produces.

use alloy_primitives::U256;
use cosmos_sdk_proto::cosmos::bank::v1beta1::MsgSend;
use cosmos_sdk_proto::cosmos::base::v1beta1::Coin;
use cosmos_sdk_proto::cosmos::tx::signing::v1beta1::SignMode;
use cosmos_sdk_proto::cosmos::tx::v1beta1::{
    mode_info, AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw,
};
use cosmrs::Any;
use prost::Message;

use crate::error::Error;
use crate::wallet::OperatorWallet;

pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";

/// A single-coin bank transfer wrapped as `Any`, ready for a TxBody.
pub fn msg_send(from: &str, to: &str, denom: &str, amount: U256) -> Any {
    let msg = MsgSend {
        from_address: from.to_string(),
        to_address: to.to_string(),
        amount: vec![Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }],
    };
    Any {
        type_url: MSG_SEND_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
}

/// Assemble and sign a transaction, returning broadcastable TxRaw bytes.
///
/// The signer info carries the wallet's pubkey `Any` (ethermint-family type
/// URL) and SIGN_MODE_DIRECT; the signature is the wallet's 64-byte `r||s`
/// over the keccak-256 digest of the SignDoc bytes.
#[allow(clippy::too_many_arguments)]
pub fn build_and_sign(
    wallet: &OperatorWallet,
    chain_id: &str,
    account_number: u64,
    sequence: u64,
    messages: Vec<Any>,
    fee_amount: u128,
    fee_denom: &str,
    gas_limit: u64,
    memo: &str,
) -> Result<Vec<u8>, Error> {
    let body = TxBody {
        messages,
        memo: memo.to_string(),
        timeout_height: 0,
        extension_options: Vec::new(),
        non_critical_extension_options: Vec::new(),
    };
    let body_bytes = body.encode_to_vec();

    let signer_info = SignerInfo {
        public_key: Some(wallet.pubkey_any()?),
        mode_info: Some(ModeInfo {
            sum: Some(mode_info::Sum::Single(mode_info::Single {
                mode: SignMode::Direct as i32,
            })),
        }),
        sequence,
    };
    let auth_info = AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(Fee {
            amount: vec![Coin {
                denom: fee_denom.to_string(),
                amount: fee_amount.to_string(),
            }],
            gas_limit,
            payer: String::new(),
            granter: String::new(),
        }),
        tip: None,
    };
    let auth_info_bytes = auth_info.encode_to_vec();

    let sign_doc = SignDoc {
        body_bytes: body_bytes.clone(),
        auth_info_bytes: auth_info_bytes.clone(),
        chain_id: chain_id.to_string(),
        account_number,
    };
    let signature = wallet.sign_cosmos(&sign_doc.encode_to_vec())?;

    let raw = TxRaw {
        body_bytes,
        auth_info_bytes,
        signatures: vec![signature.to_vec()],
    };
    Ok(raw.encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PUBKEY_TYPE_URL;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn msg_send_encodes_and_decodes() {
        let any = msg_send(
            "cosmos1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnps2tkfr",
            "cosmos1qgpsyqcyq5rqwzqfpg9scrgwpugpzysn4l5cw8",
            "utka",
            U256::from(500_000u64),
        );
        assert_eq!(any.type_url, MSG_SEND_TYPE_URL);
        let decoded = MsgSend::decode(any.value.as_slice()).unwrap();
        assert_eq!(decoded.amount.len(), 1);
        assert_eq!(decoded.amount[0].denom, "utka");
        assert_eq!(decoded.amount[0].amount, "500000");
    }

    #[test]
    fn signed_tx_carries_pubkey_url_and_signature() {
        let wallet =
            OperatorWallet::from_mnemonic(MNEMONIC, "cosmos", DEFAULT_PUBKEY_TYPE_URL).unwrap();
        let from = wallet.cosmos_address().unwrap().to_string();
        let msgs = vec![msg_send(
            &from,
            "cosmos1qgpsyqcyq5rqwzqfpg9scrgwpugpzysn4l5cw8",
            "utka",
            U256::from(1u64),
        )];

        let raw = build_and_sign(
            &wallet,
            "cosmos_4221-1",
            7,
            0,
            msgs,
            5_000,
            "uatom",
            200_000,
            "",
        )
        .unwrap();

        let tx = TxRaw::decode(raw.as_slice()).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.signatures[0].len(), 64);

        let auth = AuthInfo::decode(tx.auth_info_bytes.as_slice()).unwrap();
        let pubkey = auth.signer_infos[0].public_key.as_ref().unwrap();
        assert_eq!(pubkey.type_url, DEFAULT_PUBKEY_TYPE_URL);

        let body = TxBody::decode(tx.body_bytes.as_slice()).unwrap();
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn same_inputs_sign_deterministically() {
        let wallet =
            OperatorWallet::from_mnemonic(MNEMONIC, "cosmos", DEFAULT_PUBKEY_TYPE_URL).unwrap();
        let from = wallet.cosmos_address().unwrap().to_string();
        let build = || {
            build_and_sign(
                &wallet,
                "cosmos_4221-1",
                7,
                3,
                vec![msg_send(
                    &from,
                    "cosmos1qgpsyqcyq5rqwzqfpg9scrgwpugpzysn4l5cw8",
                    "utka",
                    U256::from(9u64),
                )],
                5_000,
                "uatom",
                200_000,
                "faucet",
            )
            .unwrap()
        };
        assert_eq!(build(), build());
    }
}
