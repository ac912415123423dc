//! In-memory stand-ins for the wallet and the node, shared by unit and
//! integration tests.

use crate::{
    api::{
        ReadOnlyCaller,
        TxBroadcaster,
    },
    clarity::ClarityValue,
    contract::ReadOnlyCall,
    network::Network,
    provider::{
        CallOutcome,
        ConnectOptions,
        ContractCallRequest,
        TxId,
        UserData,
        WalletProvider,
    },
    tx,
    wallets::Prompter,
};
use color_eyre::eyre::{
    Report,
    Result,
    eyre,
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
};

#[derive(Default)]
pub struct FakeWallet {
    stored: Option<UserData>,
    connect_address: Option<String>,
    connect_error: Option<Report>,
    outcomes: VecDeque<Result<CallOutcome>>,
    requests: Vec<ContractCallRequest>,
    connect_calls: Vec<ConnectOptions>,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A wallet that already holds a persisted session for `address`.
    pub fn connected_as(address: &str) -> Self {
        Self {
            stored: Some(UserData::with_stx_address(address)),
            ..Self::default()
        }
    }

    pub fn with_connect_address(mut self, address: &str) -> Self {
        self.connect_address = Some(address.to_string());
        self
    }

    /// The next `connect` fails with `err`.
    pub fn with_connect_error(mut self, err: Report) -> Self {
        self.connect_error = Some(err);
        self
    }

    pub fn approving(mut self, tx_id: &str) -> Self {
        self.push_outcome(Ok(CallOutcome::Finished {
            tx_id: TxId::normalized(tx_id),
        }));
        self
    }

    pub fn cancelling(mut self) -> Self {
        self.push_outcome(Ok(CallOutcome::Cancelled));
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.push_outcome(Err(eyre!("{reason}")));
        self
    }

    pub fn push_outcome(&mut self, outcome: Result<CallOutcome>) {
        self.outcomes.push_back(outcome);
    }

    pub fn requests(&self) -> &[ContractCallRequest] {
        &self.requests
    }

    pub fn connect_calls(&self) -> Vec<ConnectOptions> {
        self.connect_calls.clone()
    }
}

impl WalletProvider for FakeWallet {
    async fn connect(&mut self, options: &ConnectOptions) -> Result<()> {
        self.connect_calls.push(options.clone());
        if let Some(err) = self.connect_error.take() {
            return Err(err);
        }
        if let Some(address) = &self.connect_address {
            self.stored = Some(UserData::with_stx_address(address.as_str()));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stored = None;
    }

    fn is_connected(&self) -> bool {
        self.stored.is_some()
    }

    fn local_storage(&self) -> Option<UserData> {
        self.stored.clone()
    }

    async fn open_contract_call(
        &mut self,
        request: ContractCallRequest,
    ) -> Result<CallOutcome> {
        self.requests.push(request);
        self.outcomes
            .pop_front()
            .unwrap_or(Ok(CallOutcome::Cancelled))
    }
}

/// Answers read-only calls by function name and records what was asked.
#[derive(Clone, Default)]
pub struct FakeReader {
    responses: HashMap<&'static str, Result<ClarityValue, String>>,
    calls: Arc<Mutex<Vec<ReadOnlyCall>>>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, function_name: &'static str, value: ClarityValue) -> Self {
        self.responses.insert(function_name, Ok(value));
        self
    }

    pub fn fail(mut self, function_name: &'static str, reason: &str) -> Self {
        self.responses.insert(function_name, Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<ReadOnlyCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ReadOnlyCaller for FakeReader {
    async fn call_read_only(&self, call: &ReadOnlyCall) -> Result<ClarityValue> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        match self.responses.get(call.function_name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(reason)) => Err(eyre!("{reason}")),
            None => Err(eyre!("no response scripted for {}", call.function_name)),
        }
    }
}

/// A node that hands out increasing nonces and accepts every transaction.
/// Node double that reports a confirmed nonce. Broadcasts land in the
/// mempool only, so the nonce stays put until `confirm_through`.
#[derive(Clone, Default)]
pub struct FakeNode {
    next_nonce: Arc<Mutex<u64>>,
    broadcasts: Arc<Mutex<Vec<(Network, Vec<u8>)>>>,
    reject_with: Option<String>,
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nonce(self, nonce: u64) -> Self {
        if let Ok(mut next) = self.next_nonce.lock() {
            *next = nonce;
        }
        self
    }

    /// Moves the confirmed nonce, as a newly mined block would.
    pub fn confirm_through(&self, nonce: u64) {
        if let Ok(mut next) = self.next_nonce.lock() {
            *next = nonce;
        }
    }

    pub fn rejecting(mut self, reason: &str) -> Self {
        self.reject_with = Some(reason.to_string());
        self
    }

    pub fn broadcasts(&self) -> Vec<(Network, Vec<u8>)> {
        self.broadcasts.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl TxBroadcaster for FakeNode {
    async fn account_nonce(&self, _network: Network, _address: &str) -> Result<u64> {
        self.next_nonce
            .lock()
            .map(|n| *n)
            .map_err(|_| eyre!("nonce lock poisoned"))
    }

    async fn broadcast(&self, network: Network, bytes: &[u8]) -> Result<TxId> {
        if let Some(reason) = &self.reject_with {
            return Err(eyre!("broadcast rejected: {reason}"));
        }
        if let Ok(mut broadcasts) = self.broadcasts.lock() {
            broadcasts.push((network, bytes.to_vec()));
        }
        Ok(tx::tx_id(bytes))
    }
}

/// Answers every approval with `approve` and every password prompt with
/// `password`, recording the summaries it was shown.
#[derive(Clone, Default)]
pub struct ScriptedPrompter {
    approve: bool,
    password: String,
    shown: Arc<Mutex<Vec<String>>>,
    password_prompts: Arc<Mutex<usize>>,
}

impl ScriptedPrompter {
    pub fn new(approve: bool, password: &str) -> Self {
        Self {
            approve,
            password: password.to_string(),
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn password_prompts(&self) -> usize {
        self.password_prompts.lock().map(|n| *n).unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, summary: &str) -> Result<bool> {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(summary.to_string());
        }
        Ok(self.approve)
    }

    fn password(&self, _prompt: &str) -> Result<String> {
        if let Ok(mut count) = self.password_prompts.lock() {
            *count += 1;
        }
        Ok(self.password.clone())
    }
}
