//! The wallet capability the session and dispatcher are written against.
//! Key custody, signing and session persistence live behind this trait.

use crate::contract::ContractCall;
use color_eyre::eyre::Result;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Addresses {
    #[serde(default)]
    pub stx: Vec<AddressEntry>,
    #[serde(default)]
    pub btc: Vec<AddressEntry>,
}

/// Account data as the wallet persists it between runs.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub addresses: Addresses,
}

impl UserData {
    pub fn with_stx_address(address: impl Into<String>) -> Self {
        UserData {
            addresses: Addresses {
                stx: vec![AddressEntry {
                    address: address.into(),
                }],
                btc: Vec::new(),
            },
        }
    }

    pub fn primary_stx_address(&self) -> Option<&str> {
        self.addresses
            .stx
            .first()
            .map(|entry| entry.address.as_str())
            .filter(|address| !address.is_empty())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectOptions {
    pub wallet_connect_project_id: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PostConditionMode {
    Allow,
    Deny,
}

impl PostConditionMode {
    pub fn to_byte(self) -> u8 {
        match self {
            PostConditionMode::Allow => 0x01,
            PostConditionMode::Deny => 0x02,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractCallRequest {
    pub call: ContractCall,
    pub post_condition_mode: PostConditionMode,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TxId(pub String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ids are reported with a `0x` prefix regardless of how the node sent them.
    pub fn normalized(raw: &str) -> Self {
        let trimmed = raw.trim().trim_matches('"');
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        TxId(format!("0x{}", digits.to_ascii_lowercase()))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallOutcome {
    Finished { tx_id: TxId },
    Cancelled,
}

pub trait WalletProvider {
    fn connect(&mut self, options: &ConnectOptions) -> impl Future<Output = Result<()>>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Last account data the wallet persisted, if any.
    fn local_storage(&self) -> Option<UserData>;

    /// Shows the approval prompt and, once approved, signs and broadcasts.
    fn open_contract_call(
        &mut self,
        request: ContractCallRequest,
    ) -> impl Future<Output = Result<CallOutcome>>;
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn user_data__parses_wallet_storage_shape() {
        // given
        let raw = r#"{"addresses":{"stx":[{"address":"SP2AB"}],"btc":[{"address":"bc1q"}]}}"#;

        // when
        let data: UserData = serde_json::from_str(raw).unwrap();

        // then
        assert_eq!(data.primary_stx_address(), Some("SP2AB"));
        assert_eq!(data.addresses.btc.len(), 1);
    }

    #[test]
    fn user_data__missing_or_empty_address_has_no_primary() {
        let empty: UserData = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.primary_stx_address(), None);
        assert_eq!(UserData::with_stx_address("").primary_stx_address(), None);
    }

    #[test]
    fn tx_id__normalizes_prefix_quotes_and_case() {
        assert_eq!(TxId::normalized("\"ABCD\"").as_str(), "0xabcd");
        assert_eq!(TxId::normalized("0xabcd").as_str(), "0xabcd");
    }
}
