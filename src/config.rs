use crate::{
    contract::{
        ContractId,
        Contracts,
    },
    network::Network,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};

pub const DEFAULT_CONTRACT_ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
pub const DEFAULT_ACTIVITY_CONTRACT_NAME: &str = "activity";
pub const DEFAULT_REFLEX_CONTRACT_NAME: &str = "reflex";
pub const DEFAULT_TX_FEE: u64 = 10_000;

pub const ENV_WALLET_CONNECT_PROJECT_ID: &str = "STACKS_WALLET_CONNECT_PROJECT_ID";
pub const ENV_ACTIVITY_CONTRACT_ADDRESS: &str = "STACKS_ACTIVITY_CONTRACT_ADDRESS";
pub const ENV_ACTIVITY_CONTRACT_NAME: &str = "STACKS_ACTIVITY_CONTRACT_NAME";
pub const ENV_REFLEX_CONTRACT_ADDRESS: &str = "STACKS_REFLEX_CONTRACT_ADDRESS";
pub const ENV_REFLEX_CONTRACT_NAME: &str = "STACKS_REFLEX_CONTRACT_NAME";
pub const ENV_MAINNET_API_URL: &str = "STACKS_MAINNET_API_URL";
pub const ENV_TESTNET_API_URL: &str = "STACKS_TESTNET_API_URL";
pub const ENV_TX_FEE: &str = "STACKS_TX_FEE";

/// Runtime settings. Every value is optional in the environment and falls
/// back to a hard-coded default.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub wallet_connect_project_id: Option<String>,
    pub contracts: Contracts,
    pub mainnet_api_url: String,
    pub testnet_api_url: String,
    /// Flat fee in micro-STX attached to every signed transaction.
    pub tx_fee: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let activity_address = get(ENV_ACTIVITY_CONTRACT_ADDRESS)
            .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string());
        let activity = ContractId::new(
            activity_address.clone(),
            get(ENV_ACTIVITY_CONTRACT_NAME)
                .unwrap_or_else(|| DEFAULT_ACTIVITY_CONTRACT_NAME.to_string()),
        );
        let reflex = ContractId::new(
            get(ENV_REFLEX_CONTRACT_ADDRESS).unwrap_or(activity_address),
            get(ENV_REFLEX_CONTRACT_NAME)
                .unwrap_or_else(|| DEFAULT_REFLEX_CONTRACT_NAME.to_string()),
        );
        let tx_fee = match get(ENV_TX_FEE) {
            Some(raw) => raw
                .parse()
                .wrap_err_with(|| format!("{ENV_TX_FEE} must be an integer, got '{raw}'"))?,
            None => DEFAULT_TX_FEE,
        };

        Ok(Config {
            wallet_connect_project_id: get(ENV_WALLET_CONNECT_PROJECT_ID),
            contracts: Contracts::new(activity, reflex),
            mainnet_api_url: get(ENV_MAINNET_API_URL)
                .unwrap_or_else(|| Network::Mainnet.default_api_url().to_string()),
            testnet_api_url: get(ENV_TESTNET_API_URL)
                .unwrap_or_else(|| Network::Testnet.default_api_url().to_string()),
            tx_fee,
        })
    }

    pub fn api_url(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mainnet_api_url,
            Network::Testnet => &self.testnet_api_url,
        }
    }
}
