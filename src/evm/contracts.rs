/// Contract surface of the faucet: the standard ERC-20 interface and the
/// operator-owned atomic batch contract.
///
/// The batch contract pulls ERC-20 funds from the operator through
/// pre-granted allowances and forwards native value from `msg.value`;
/// `address(0)` line items denote native transfers. It reverts on any item
/// failure, which is what makes a dispense all-or-nothing.
use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

use crate::error::Error;
use crate::evm::client::EvmClient;

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }
}

sol! {
    #[derive(Debug)]
    interface IAtomicMultiSend {
        struct Transfer {
            address token;
            uint256 amount;
        }

        function multiSend(address recipient, Transfer[] calldata transfers) external payable;
    }
}

/// One line item of a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTransfer {
    /// ERC-20 contract, or `Address::ZERO` for the native line item
    pub token: Address,
    pub amount: U256,
}

/// Calldata for `multiSend(recipient, transfers)`.
pub fn encode_multi_send(recipient: Address, transfers: &[BatchTransfer]) -> Vec<u8> {
    let transfers = transfers
        .iter()
        .map(|t| IAtomicMultiSend::Transfer {
            token: t.token,
            amount: t.amount,
        })
        .collect();
    IAtomicMultiSend::multiSendCall {
        recipient,
        transfers,
    }
    .abi_encode()
}

/// Calldata for `approve(spender, amount)`.
pub fn encode_approve(spender: Address, amount: U256) -> Vec<u8> {
    IERC20::approveCall { spender, amount }.abi_encode()
}

/// Read-side ERC-20 helper bound to one contract address
#[derive(Clone)]
pub struct Erc20 {
    client: EvmClient,
    address: Address,
}

impl Erc20 {
    pub fn new(client: EvmClient, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Current balance of `owner`
    pub async fn balance_of(&self, owner: Address) -> Result<U256, Error> {
        let result = self
            .client
            .call_contract(self.address, IERC20::balanceOfCall { account: owner })
            .await?;
        Ok(result._0)
    }

    /// Remaining allowance granted by `owner` to `spender`
    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, Error> {
        let result = self
            .client
            .call_contract(self.address, IERC20::allowanceCall { owner, spender })
            .await?;
        Ok(result._0)
    }

    /// On-chain decimals, used to cross-check configuration
    pub async fn decimals(&self) -> Result<u8, Error> {
        let result = self
            .client
            .call_contract(self.address, IERC20::decimalsCall {})
            .await?;
        Ok(result._0)
    }

    pub async fn symbol(&self) -> Result<String, Error> {
        let result = self
            .client
            .call_contract(self.address, IERC20::symbolCall {})
            .await?;
        Ok(result._0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;

    #[test]
    fn multi_send_selector_matches_signature() {
        let data = encode_multi_send(
            Address::ZERO,
            &[BatchTransfer {
                token: Address::ZERO,
                amount: U256::from(1u64),
            }],
        );
        let expected = &keccak256(b"multiSend(address,(address,uint256)[])")[..4];
        assert_eq!(&data[..4], expected);
    }

    #[test]
    fn approve_selector_matches_signature() {
        let data = encode_approve(Address::ZERO, U256::MAX);
        let expected = &keccak256(b"approve(address,uint256)")[..4];
        assert_eq!(&data[..4], expected);
    }

    #[test]
    fn batch_encoding_round_trips() {
        let transfers = vec![
            BatchTransfer {
                token: Address::repeat_byte(0x22),
                amount: U256::from(1_000_000u64),
            },
            BatchTransfer {
                token: Address::ZERO,
                amount: U256::from(10u64).pow(U256::from(18u64)),
            },
        ];
        let data = encode_multi_send(Address::repeat_byte(0x01), &transfers);
        let decoded = IAtomicMultiSend::multiSendCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.recipient, Address::repeat_byte(0x01));
        assert_eq!(decoded.transfers.len(), 2);
        assert_eq!(decoded.transfers[1].token, Address::ZERO);
    }
}
