use crate::{
    api::TxBroadcaster,
    network::Network,
    provider::{
        CallOutcome,
        ConnectOptions,
        ContractCallRequest,
        UserData,
        WalletProvider,
    },
    storage::SessionStore,
    tx::{
        self,
        TxParams,
    },
};
use bip32::{
    DerivationPath,
    Language,
    Mnemonic,
    XPrv,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use k256::ecdsa::SigningKey;
use std::{
    collections::HashMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

const WALLET_EXTENSION: &str = "wallet";
pub const STACKS_DERIVATION_PATH: &str = "m/44'/5757'/0'/0/0";

/// User interaction the wallet needs: approving a call and unlocking a key.
pub trait Prompter {
    fn confirm(&self, summary: &str) -> Result<bool>;

    fn password(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some(WALLET_EXTENSION) {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_wallet(descriptor: &WalletDescriptor, password: &str) -> Result<SigningKey> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(key) = tx::signing_key_from_bytes(&secret) {
        return Ok(key);
    }

    if let Ok(phrase) = std::str::from_utf8(&secret) {
        if phrase.split_whitespace().count() >= 12 {
            return key_from_mnemonic(phrase).wrap_err_with(|| {
                format!("Wallet '{}' holds an unusable mnemonic", descriptor.name)
            });
        }
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

/// Derives the first account key on the Stacks BIP44 path.
pub fn key_from_mnemonic(phrase: &str) -> Result<SigningKey> {
    let mnemonic = Mnemonic::new(phrase.trim(), Language::English)
        .map_err(|err| eyre!("invalid mnemonic phrase: {err}"))?;
    let path: DerivationPath = STACKS_DERIVATION_PATH
        .parse()
        .map_err(|err| eyre!("invalid derivation path: {err}"))?;
    let xprv = XPrv::derive_from_path(mnemonic.to_seed("").as_bytes(), &path)
        .map_err(|err| eyre!("key derivation failed: {err}"))?;
    Ok(xprv.private_key().clone())
}

/// A wallet backed by an encrypted keystore on disk. The session file plays
/// the part of the provider's local storage.
pub struct KeystoreWallet<P, B> {
    descriptor: WalletDescriptor,
    network: Network,
    store: SessionStore,
    node: B,
    fee: u64,
    prompter: P,
    key: Option<SigningKey>,
    /// Nonce to use next per signer address. The node only reports the
    /// confirmed nonce, so transactions still in the mempool are counted here.
    next_nonce: HashMap<String, u64>,
}

impl<P: Prompter, B: TxBroadcaster> KeystoreWallet<P, B> {
    pub fn new(
        descriptor: WalletDescriptor,
        network: Network,
        store: SessionStore,
        node: B,
        fee: u64,
        prompter: P,
    ) -> Self {
        Self {
            descriptor,
            network,
            store,
            node,
            fee,
            prompter,
            key: None,
            next_nonce: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn is_unlocked(&self) -> bool {
        self.key.is_some()
    }

    fn unlock(&mut self) -> Result<SigningKey> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }
        let prompt = format!("Enter password for wallet '{}': ", self.descriptor.name);
        let password = self
            .prompter
            .password(&prompt)
            .wrap_err("Failed to read wallet password")?;
        let key = unlock_wallet(&self.descriptor, &password)?;
        self.key = Some(key.clone());
        Ok(key)
    }
}

impl<P: Prompter, B: TxBroadcaster> WalletProvider for KeystoreWallet<P, B> {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<()> {
        if let Some(project_id) = &options.wallet_connect_project_id {
            debug!(%project_id, "project id ignored by keystore wallet");
        }
        self.key = None;
        let key = self.unlock()?;
        let address = tx::address_of(&key, self.network)?;
        self.store
            .save(&UserData::with_stx_address(address.as_str()))
            .wrap_err("Failed to persist wallet session")?;
        info!(wallet = %self.descriptor.name, %address, "keystore unlocked");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.key = None;
        self.next_nonce.clear();
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear wallet session");
        }
    }

    fn is_connected(&self) -> bool {
        self.local_storage()
            .is_some_and(|data| data.primary_stx_address().is_some())
    }

    fn local_storage(&self) -> Option<UserData> {
        match self.store.load() {
            Ok(data) => data,
            Err(err) => {
                warn!(error = %err, path = %self.store.path().display(), "unreadable wallet session");
                None
            }
        }
    }

    async fn open_contract_call(
        &mut self,
        request: ContractCallRequest,
    ) -> Result<CallOutcome> {
        let summary = request.call.summary();
        if !self.prompter.confirm(&summary)? {
            info!(%summary, "contract call declined");
            return Ok(CallOutcome::Cancelled);
        }

        let network = request.call.network;
        let key = self.unlock()?;
        let address = tx::address_of(&key, network)?;
        let confirmed = self
            .node
            .account_nonce(network, &address)
            .await
            .wrap_err("Failed to fetch account nonce")?;
        let nonce = match self.next_nonce.get(&address) {
            Some(&pending) if pending > confirmed => {
                debug!(confirmed, pending, "using nonce past pending transactions");
                pending
            }
            _ => confirmed,
        };
        let signed = tx::sign_contract_call(
            &key,
            &request.call,
            TxParams {
                nonce,
                fee: self.fee,
                post_condition_mode: request.post_condition_mode,
            },
        )?;
        let tx_id = self.node.broadcast(network, &signed.bytes).await?;
        self.next_nonce.insert(address, nonce.saturating_add(1));
        if tx_id != signed.tx_id {
            warn!(node = %tx_id, local = %signed.tx_id, "node reported a different txid");
        }
        info!(%tx_id, nonce, %summary, "transaction broadcast");
        Ok(CallOutcome::Finished { tx_id })
    }
}
