//! Blocking JSON-RPC client for the node

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::{Hash256, TransactionOutput, SYSTEM_ASSET_ID, UTXO};
use crate::crypto::ProgramHash;
use crate::rpc::types::{BlockInfo, BlockRef, TransactionInfo, UnspentInfo};
use crate::wallet::{BuildError, UtxoSource};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// RPC errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Node returned error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<Value>,
}

/// JSON-RPC 2.0 request body
fn request_body(method: &str, params: Vec<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    })
}

/// Extract `result`, or turn `error` into [`RpcError::Server`]
///
/// A missing or null `result` comes back as `Value::Null`; the caller's
/// target type decides whether that is acceptable.
fn parse_response(body: Value) -> Result<Value, RpcError> {
    let response: Response = serde_json::from_value(body)?;

    match response.error {
        Some(Value::Null) | None => {}
        Some(Value::String(message)) => return Err(RpcError::Server { code: 0, message }),
        Some(error) => {
            let error: ErrorObject = serde_json::from_value(error)
                .map_err(|e| RpcError::InvalidResponse(format!("error object: {}", e)))?;
            return Err(RpcError::Server {
                code: error.code,
                message: error.message,
            });
        }
    }

    Ok(response.result)
}

/// Convert a `listunspent` entry into a spendable UTXO
pub fn unspent_to_utxo(entry: &UnspentInfo) -> Result<UTXO, RpcError> {
    let invalid = |what: String| RpcError::InvalidResponse(what);

    let tx_id = entry.tx_hash().map_err(|e| invalid(e.to_string()))?;
    let value = entry
        .value()
        .map_err(|e| invalid(format!("amount {:?}: {}", entry.amount, e)))?;
    let program_hash =
        ProgramHash::from_address(&entry.address).map_err(|e| invalid(e.to_string()))?;

    let mut output = TransactionOutput::new(program_hash, value);
    output.output_lock = entry.output_lock;
    if let Some(asset) = &entry.asset_id {
        output.asset_id = Hash256::from_reversed_hex(asset)
            .map_err(|e| invalid(format!("asset id {:?}: {}", asset, e)))?;
    }
    Ok(UTXO {
        tx_id,
        output_index: entry.output_index,
        output,
    })
}

/// Spendable by `owner` and denominated in the native asset
fn is_native_output(utxo: &UTXO, owner: &ProgramHash) -> bool {
    utxo.output.is_owned_by(owner) && utxo.output.asset_id == SYSTEM_ASSET_ID
}

/// Node RPC client
pub struct RpcClient {
    url: String,
    client: Client,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Call `method` and return the raw `result` value
    pub fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        debug!("RPC {} -> {}", method, self.url);

        let body: Value = self
            .client
            .post(&self.url)
            .json(&request_body(method, params))
            .send()?
            .error_for_status()?
            .json()?;

        parse_response(body)
    }

    /// Call `method` and deserialize the result
    pub fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        Ok(serde_json::from_value(self.call(method, params)?)?)
    }

    /// Broadcast a serialized transaction, returning its hash
    pub fn send_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        self.call_as("sendrawtransaction", vec![json!(tx_hex)])
    }

    /// Number of blocks in the node's chain
    pub fn block_count(&self) -> Result<u32, RpcError> {
        self.call_as("getblockcount", vec![])
    }

    pub fn list_unspent(&self, address: &str) -> Result<Vec<UnspentInfo>, RpcError> {
        let entries: Option<Vec<UnspentInfo>> =
            self.call_as("listunspent", vec![json!([address])])?;
        Ok(entries.unwrap_or_default())
    }

    pub fn block_hash(&self, height: u32) -> Result<String, RpcError> {
        self.call_as("getblockhash", vec![json!(height)])
    }

    pub fn best_block_hash(&self) -> Result<String, RpcError> {
        self.call_as("getbestblockhash", vec![])
    }

    pub fn block(&self, block: &BlockRef) -> Result<BlockInfo, RpcError> {
        let param = match block {
            BlockRef::Height(height) => json!(height),
            BlockRef::Hash(hash) => json!(hash),
        };
        self.call_as("getblock", vec![param])
    }

    pub fn raw_transaction(&self, hash: &str) -> Result<TransactionInfo, RpcError> {
        self.call_as("getrawtransaction", vec![json!(hash)])
    }

    pub fn connection_count(&self) -> Result<u32, RpcError> {
        self.call_as("getconnectioncount", vec![])
    }

    pub fn neighbors(&self) -> Result<Value, RpcError> {
        self.call("getneighbor", vec![])
    }

    pub fn node_state(&self) -> Result<Value, RpcError> {
        self.call("getnodestate", vec![])
    }

    pub fn raw_mempool(&self) -> Result<Value, RpcError> {
        self.call("getrawmempool", vec![])
    }
}

impl UtxoSource for RpcClient {
    fn best_height(&self) -> Result<u32, BuildError> {
        let count = self
            .block_count()
            .map_err(|e| BuildError::Source(e.to_string()))?;
        Ok(count.saturating_sub(1))
    }

    fn unspent_outputs(&self, owner: &ProgramHash) -> Result<Vec<UTXO>, BuildError> {
        let entries = self
            .list_unspent(&owner.to_address())
            .map_err(|e| BuildError::Source(e.to_string()))?;

        let mut utxos = Vec::with_capacity(entries.len());
        for entry in &entries {
            let utxo = unspent_to_utxo(entry).map_err(|e| BuildError::Source(e.to_string()))?;
            if is_native_output(&utxo, owner) {
                utxos.push(utxo);
            }
        }

        debug!(
            "{} unspent output(s) for {}",
            utxos.len(),
            owner.to_address()
        );
        Ok(utxos)
    }
}
