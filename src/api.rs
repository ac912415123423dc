use crate::{
    clarity::ClarityValue,
    config::Config,
    contract::ReadOnlyCall,
    network::Network,
    provider::TxId,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;
use tracing::debug;

/// Transport for read-only contract calls.
pub trait ReadOnlyCaller {
    fn call_read_only(
        &self,
        call: &ReadOnlyCall,
    ) -> impl Future<Output = Result<ClarityValue>>;
}

/// Nonce lookup and transaction submission, the node calls a signing
/// wallet needs.
pub trait TxBroadcaster {
    fn account_nonce(
        &self,
        network: Network,
        address: &str,
    ) -> impl Future<Output = Result<u64>>;

    fn broadcast(&self, network: Network, tx: &[u8]) -> impl Future<Output = Result<TxId>>;
}

/// Client for a Stacks node's RPC endpoints.
#[derive(Clone)]
pub struct StacksApi {
    mainnet_url: String,
    testnet_url: String,
    http: reqwest::Client,
}

impl StacksApi {
    pub fn new(mainnet_url: impl Into<String>, testnet_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for stacks node")?;
        Ok(Self {
            mainnet_url: mainnet_url.into().trim_end_matches('/').to_string(),
            testnet_url: testnet_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_url(Network::Mainnet),
            config.api_url(Network::Testnet),
        )
    }

    pub fn base_url(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mainnet_url,
            Network::Testnet => &self.testnet_url,
        }
    }
}

impl ReadOnlyCaller for StacksApi {
    async fn call_read_only(&self, call: &ReadOnlyCall) -> Result<ClarityValue> {
        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/{}",
            self.base_url(call.network),
            call.contract.address,
            call.contract.name,
            call.function_name
        );
        let body = ReadOnlyRequestDto {
            sender: &call.sender_address,
            arguments: call
                .function_args
                .iter()
                .map(ClarityValue::to_hex)
                .collect::<Result<_>>()
                .wrap_err("failed to encode read-only call arguments")?,
        };
        debug!(contract = %call.contract, function = call.function_name, "read-only call");
        let res = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .wrap_err("read-only call request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read read-only call response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!(
                "node responded with {status} to {}::{}: {body}",
                call.contract,
                call.function_name
            ));
        }
        parse_read_only_response(&bytes)
    }
}

impl TxBroadcaster for StacksApi {
    async fn account_nonce(&self, network: Network, address: &str) -> Result<u64> {
        let url = format!("{}/v2/accounts/{}?proof=0", self.base_url(network), address);
        let res = self
            .http
            .get(url)
            .send()
            .await
            .wrap_err("account request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(eyre!(
                "node responded with {status} when fetching account {address}: {body}"
            ));
        }
        let dto: AccountDto = res.json().await.wrap_err("invalid account payload")?;
        Ok(dto.nonce)
    }

    async fn broadcast(&self, network: Network, tx: &[u8]) -> Result<TxId> {
        let url = format!("{}/v2/transactions", self.base_url(network));
        let res = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(tx.to_vec())
            .send()
            .await
            .wrap_err("broadcast request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read broadcast response body")?;
        parse_broadcast_response(status, &bytes)
    }
}

impl fmt::Display for StacksApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mainnet={} testnet={}", self.mainnet_url, self.testnet_url)
    }
}

#[derive(Serialize)]
struct ReadOnlyRequestDto<'a> {
    sender: &'a str,
    arguments: Vec<String>,
}

#[derive(Deserialize)]
struct ReadOnlyResponseDto {
    okay: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

#[derive(Deserialize)]
struct AccountDto {
    nonce: u64,
}

#[derive(Deserialize)]
struct BroadcastErrorDto {
    error: String,
    #[serde(default)]
    reason: Option<String>,
}

pub(crate) fn parse_read_only_response(bytes: &[u8]) -> Result<ClarityValue> {
    let dto: ReadOnlyResponseDto =
        serde_json::from_slice(bytes).wrap_err("invalid read-only call payload")?;
    if !dto.okay {
        return Err(eyre!(
            "read-only call rejected: {}",
            dto.cause.unwrap_or_else(|| "no cause given".to_string())
        ));
    }
    let result = dto
        .result
        .ok_or_else(|| eyre!("read-only call succeeded without a result"))?;
    ClarityValue::from_hex(&result).wrap_err("undecodable read-only call result")
}

pub(crate) fn parse_broadcast_response(status: StatusCode, bytes: &[u8]) -> Result<TxId> {
    if status.is_success() {
        let raw: String =
            serde_json::from_slice(bytes).wrap_err("invalid broadcast response payload")?;
        return Ok(TxId::normalized(&raw));
    }
    match serde_json::from_slice::<BroadcastErrorDto>(bytes) {
        Ok(dto) => Err(eyre!(
            "broadcast rejected ({status}): {}{}",
            dto.error,
            dto.reason.map(|r| format!(" ({r})")).unwrap_or_default()
        )),
        Err(_) => Err(eyre!(
            "broadcast rejected ({status}): {}",
            String::from_utf8_lossy(bytes)
        )),
    }
}
