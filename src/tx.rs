//! Single-signature contract-call transactions: wire encoding, sighash and
//! recoverable secp256k1 signing.

use crate::{
    c32::{
        self,
        HASH160_LEN,
    },
    contract::ContractCall,
    network::Network,
    provider::{
        PostConditionMode,
        TxId,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use k256::ecdsa::SigningKey;
use ripemd::Ripemd160;
use sha2::{
    Digest,
    Sha256,
    Sha512_256,
};

const AUTH_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;
const ANCHOR_MODE_ANY: u8 = 0x03;
const PAYLOAD_CONTRACT_CALL: u8 = 0x02;
const SIGNATURE_LEN: usize = 65;
const MAX_NAME_LEN: usize = 128;
const SECRET_KEY_LEN: usize = 32;
const COMPRESSED_KEY_SUFFIX: u8 = 0x01;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxParams {
    pub nonce: u64,
    pub fee: u64,
    pub post_condition_mode: PostConditionMode,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedTransaction {
    pub bytes: Vec<u8>,
    pub tx_id: TxId,
}

/// Accepts a raw 32-byte secret, or 33 bytes ending in the compressed-key
/// marker.
pub fn signing_key_from_bytes(secret: &[u8]) -> Result<SigningKey> {
    let raw = match secret.len() {
        SECRET_KEY_LEN => secret,
        33 if secret[SECRET_KEY_LEN] == COMPRESSED_KEY_SUFFIX => &secret[..SECRET_KEY_LEN],
        len => return Err(eyre!("unsupported private key length {len}")),
    };
    SigningKey::from_slice(raw).map_err(|e| eyre!("invalid secp256k1 private key: {e}"))
}

pub fn public_key_bytes(key: &SigningKey) -> Vec<u8> {
    key.verifying_key().to_encoded_point(true).as_bytes().to_vec()
}

pub fn hash160(data: &[u8]) -> [u8; HASH160_LEN] {
    let sha = Sha256::digest(data);
    let mut out = [0u8; HASH160_LEN];
    out.copy_from_slice(&Ripemd160::digest(sha));
    out
}

/// Single-sig address of `key` on `network`.
pub fn address_of(key: &SigningKey, network: Network) -> Result<String> {
    c32::encode_address(network.address_version(), &hash160(&public_key_bytes(key)))
}

pub fn tx_id(bytes: &[u8]) -> TxId {
    TxId(format!("0x{}", hex::encode(Sha512_256::digest(bytes))))
}

pub fn sign_contract_call(
    key: &SigningKey,
    call: &ContractCall,
    params: TxParams,
) -> Result<SignedTransaction> {
    let signer = hash160(&public_key_bytes(key));
    let mut tx = ContractCallTx::new(call, signer, params)?;

    let presign = presign_hash(&tx.initial_sighash(), params.fee, params.nonce);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&presign)
        .map_err(|e| eyre!("signing failed: {e}"))?;
    tx.signature[0] = recovery_id.to_byte();
    tx.signature[1..].copy_from_slice(&signature.to_bytes());

    let bytes = tx.serialize();
    let tx_id = tx_id(&bytes);
    Ok(SignedTransaction { bytes, tx_id })
}

pub(crate) fn presign_hash(sighash: &[u8; 32], fee: u64, nonce: u64) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(sighash);
    hasher.update([AUTH_STANDARD]);
    hasher.update(fee.to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    hasher.finalize().into()
}

#[derive(Clone, Debug)]
pub(crate) struct ContractCallTx {
    version: u8,
    chain_id: u32,
    signer: [u8; HASH160_LEN],
    nonce: u64,
    fee: u64,
    signature: [u8; SIGNATURE_LEN],
    post_condition_mode: PostConditionMode,
    contract_version: u8,
    contract_hash: [u8; HASH160_LEN],
    contract_name: String,
    contract_name_len: u8,
    function_name: String,
    function_name_len: u8,
    function_args: Vec<u8>,
    arg_count: u32,
}

impl ContractCallTx {
    pub(crate) fn new(
        call: &ContractCall,
        signer: [u8; HASH160_LEN],
        params: TxParams,
    ) -> Result<Self> {
        let (contract_version, contract_hash) = c32::decode_address(&call.contract.address)
            .wrap_err_with(|| format!("invalid contract address '{}'", call.contract.address))?;
        let contract_name_len = check_name("contract name", &call.contract.name)?;
        let function_name_len = check_name("function name", call.function_name)?;

        let mut function_args = Vec::new();
        for arg in &call.function_args {
            arg.serialize_into(&mut function_args)
                .wrap_err_with(|| format!("failed to encode argument of {}", call.function_name))?;
        }
        let arg_count = u32::try_from(call.function_args.len())
            .map_err(|_| eyre!("too many arguments for {}", call.function_name))?;

        Ok(Self {
            version: call.network.transaction_version(),
            chain_id: call.network.chain_id(),
            signer,
            nonce: params.nonce,
            fee: params.fee,
            signature: [0u8; SIGNATURE_LEN],
            post_condition_mode: params.post_condition_mode,
            contract_version,
            contract_hash,
            contract_name: call.contract.name.clone(),
            contract_name_len,
            function_name: call.function_name.to_string(),
            function_name_len,
            function_args,
            arg_count,
        })
    }

    /// Txid of the transaction with the spending condition cleared.
    pub(crate) fn initial_sighash(&self) -> [u8; 32] {
        let cleared = Self {
            nonce: 0,
            fee: 0,
            signature: [0u8; SIGNATURE_LEN],
            ..self.clone()
        };
        Sha512_256::digest(cleared.serialize()).into()
    }

    pub(crate) fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(180 + self.function_args.len());
        out.push(self.version);
        out.extend_from_slice(&self.chain_id.to_be_bytes());

        out.push(AUTH_STANDARD);
        out.push(HASH_MODE_P2PKH);
        out.extend_from_slice(&self.signer);
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&self.fee.to_be_bytes());
        out.push(KEY_ENCODING_COMPRESSED);
        out.extend_from_slice(&self.signature);

        out.push(ANCHOR_MODE_ANY);
        out.push(self.post_condition_mode.to_byte());
        out.extend_from_slice(&0u32.to_be_bytes());

        out.push(PAYLOAD_CONTRACT_CALL);
        out.push(self.contract_version);
        out.extend_from_slice(&self.contract_hash);
        out.push(self.contract_name_len);
        out.extend_from_slice(self.contract_name.as_bytes());
        out.push(self.function_name_len);
        out.extend_from_slice(self.function_name.as_bytes());
        out.extend_from_slice(&self.arg_count.to_be_bytes());
        out.extend_from_slice(&self.function_args);
        out
    }
}

/// Validates a contract or function name and returns its length prefix.
fn check_name(kind: &str, name: &str) -> Result<u8> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || !name.is_ascii() {
        return Err(eyre!("invalid {kind} '{name}'"));
    }
    u8::try_from(name.len()).map_err(|_| eyre!("{kind} '{name}' is too long"))
}
