//! Contract bindings
//!
//! `ILettuceTrees` is the session contract's published interface and
//! `IERC20Metadata` the stablecoin it settles in. Both are generated with
//! `#[sol(rpc)]`, so each has a provider-backed instance type.

use alloy::primitives::Address;
use alloy::sol;
use std::str::FromStr;

sol! {
    #[sol(rpc)]
    interface ILettuceTrees {
        struct Session {
            string sessionId;
            address payer;
            uint8 sessionType;
            uint256 treeCount;
            uint256 donationAmount;
            uint256 timestamp;
            bool verified;
        }

        event SessionRecorded(
            bytes32 indexed sessionKey,
            string sessionId,
            address indexed payer,
            uint8 sessionType,
            uint256 treeCount,
            uint256 donationAmount
        );
        event SessionVerified(bytes32 indexed sessionKey, string sessionId, address verifier);
        event DonationPayout(uint256 amount, address indexed recipient);
        event FundsDeposited(address indexed from, uint256 amount);

        function getSession(string sessionId) external view returns (Session memory);
        function totalSessions() external view returns (uint256);
        function totalTreesPlanted() external view returns (uint256);
        function donationPerTree() external view returns (uint256);
        function payoutThreshold() external view returns (uint256);
        function totalOwedAmount() external view returns (uint256);
        function treesOrg() external view returns (address);
        function stableCoin() external view returns (address);
    }

    #[sol(rpc)]
    interface IERC20Metadata {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// EIP-55 form of a `0x`-prefixed 20-byte hex address
pub fn checksum_address(value: &str) -> Option<String> {
    if !(value.starts_with("0x") || value.starts_with("0X")) || value.len() != 42 {
        return None;
    }
    Address::from_str(&format!("0x{}", &value[2..]))
        .ok()
        .map(|address| address.to_checksum(None))
}
