use crate::{
    network::Network,
    provider::{
        ConnectOptions,
        UserData,
        WalletProvider,
    },
};
use tracing::{
    error,
    info,
};

/// The connected wallet identity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Account {
    user_data: UserData,
    address: String,
}

impl Account {
    fn from_user_data(user_data: UserData) -> Option<Self> {
        let address = user_data.primary_stx_address()?.to_string();
        Some(Self { user_data, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }
}

/// Wallet connection state. The network is derived from the account and is
/// present exactly when an account is.
pub struct Session<W> {
    wallet: W,
    options: ConnectOptions,
    active: Option<(Account, Network)>,
}

impl<W: WalletProvider> Session<W> {
    pub fn new(wallet: W, options: ConnectOptions) -> Self {
        Self {
            wallet,
            options,
            active: None,
        }
    }

    /// Picks up a session the wallet already holds, without prompting.
    pub fn restore(wallet: W, options: ConnectOptions) -> Self {
        let mut session = Self::new(wallet, options);
        if session.wallet.is_connected() {
            let stored = session.wallet.local_storage();
            session.apply_user_data(stored);
            if let Some(address) = session.address() {
                info!(%address, "restored wallet session");
            }
        }
        session
    }

    /// Failures are logged and leave the current state untouched.
    pub async fn connect(&mut self) {
        match self.wallet.connect(&self.options).await {
            Ok(()) => {
                let stored = self.wallet.local_storage();
                self.apply_user_data(stored);
                match self.address() {
                    Some(address) => info!(%address, "wallet connected"),
                    None => info!("wallet connected without a stacks address"),
                }
            }
            Err(err) => {
                error!(error = %err, "wallet connection failed");
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.wallet.disconnect();
        self.active = None;
        info!("wallet disconnected");
    }

    pub fn account(&self) -> Option<&Account> {
        self.active.as_ref().map(|(account, _)| account)
    }

    pub fn address(&self) -> Option<&str> {
        self.account().map(Account::address)
    }

    pub fn network(&self) -> Option<Network> {
        self.active.as_ref().map(|(_, network)| *network)
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub(crate) fn wallet_mut(&mut self) -> &mut W {
        &mut self.wallet
    }

    fn apply_user_data(&mut self, user_data: Option<UserData>) {
        self.active = user_data.and_then(Account::from_user_data).map(|account| {
            let network = Network::from_address(account.address());
            (account, network)
        });
    }
}
