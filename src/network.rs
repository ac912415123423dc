use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    fmt,
    str::FromStr,
};

pub const MAINNET_ADDRESS_PREFIX: &str = "SP";
pub const DEFAULT_MAINNET_API_URL: &str = "https://api.hiro.so";
pub const DEFAULT_TESTNET_API_URL: &str = "https://api.testnet.hiro.so";

/// c32 version byte of single-signature mainnet addresses (`SP...`).
pub const MAINNET_SINGLE_SIG_VERSION: u8 = 22;
/// c32 version byte of single-signature testnet addresses (`ST...`).
pub const TESTNET_SINGLE_SIG_VERSION: u8 = 26;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Anything that is not a mainnet single-sig address is treated as testnet,
    /// matching what browser wallets report.
    pub fn from_address(address: &str) -> Self {
        if address.starts_with(MAINNET_ADDRESS_PREFIX) {
            Network::Mainnet
        } else {
            Network::Testnet
        }
    }

    pub fn address_version(self) -> u8 {
        match self {
            Network::Mainnet => MAINNET_SINGLE_SIG_VERSION,
            Network::Testnet => TESTNET_SINGLE_SIG_VERSION,
        }
    }

    pub fn transaction_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x80,
        }
    }

    pub fn chain_id(self) -> u32 {
        match self {
            Network::Mainnet => 0x0000_0001,
            Network::Testnet => 0x8000_0000,
        }
    }

    pub fn default_api_url(self) -> &'static str {
        match self {
            Network::Mainnet => DEFAULT_MAINNET_API_URL,
            Network::Testnet => DEFAULT_TESTNET_API_URL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(eyre!("unknown network '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_address__sp_prefix_is_mainnet() {
        // given
        let address = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

        // when
        let network = Network::from_address(address);

        // then
        assert_eq!(network, Network::Mainnet);
    }

    #[test]
    fn from_address__st_prefix_is_testnet() {
        // given
        let address = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

        // when
        let network = Network::from_address(address);

        // then
        assert_eq!(network, Network::Testnet);
    }

    #[test]
    fn from_address__multisig_mainnet_prefix_is_testnet() {
        // `SM` is a mainnet multisig prefix, but only `SP` selects mainnet
        assert_eq!(
            Network::from_address("SM2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQVX8X0G"),
            Network::Testnet
        );
    }

    #[test]
    fn from_str__round_trips_display() {
        for network in [Network::Mainnet, Network::Testnet] {
            assert_eq!(network.to_string().parse::<Network>().unwrap(), network);
        }
        assert!("devnet".parse::<Network>().is_err());
    }

    proptest! {
        #[test]
        fn from_address__follows_prefix(rest in "[0-9A-Z]{0,40}") {
            let mainnet = format!("SP{rest}");
            prop_assert_eq!(Network::from_address(&mainnet), Network::Mainnet);

            let other = format!("ST{rest}");
            prop_assert_eq!(Network::from_address(&other), Network::Testnet);
        }
    }
}
