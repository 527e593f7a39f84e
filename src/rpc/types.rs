//! Node response types
//!
//! Field names follow the node's JSON, which is PascalCase for chain data and
//! lowercase for `listunspent` entries.

use serde::{Deserialize, Serialize};

use crate::core::{Amount, AmountError, Hash256, TransactionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxAttributeInfo {
    pub usage: u8,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UtxoTxInputInfo {
    #[serde(rename = "ReferTxID")]
    pub refer_tx_id: String,
    pub refer_tx_output_index: u16,
    pub sequence: u32,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxOutputInfo {
    #[serde(rename = "AssetID")]
    pub asset_id: String,
    pub value: String,
    pub address: String,
    pub output_lock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProgramInfo {
    pub code: String,
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionInfo {
    pub tx_type: u8,
    pub payload_version: u8,
    #[serde(default)]
    pub attributes: Vec<TxAttributeInfo>,
    #[serde(rename = "UTXOInputs", default)]
    pub utxo_inputs: Vec<UtxoTxInputInfo>,
    #[serde(default)]
    pub outputs: Vec<TxOutputInfo>,
    pub lock_time: u32,
    #[serde(default)]
    pub programs: Vec<ProgramInfo>,
    #[serde(default)]
    pub timestamp: Option<u32>,
    #[serde(rename = "Confirminations", default)]
    pub confirmations: Option<u32>,
    #[serde(default)]
    pub tx_size: Option<u32>,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockHead {
    pub version: u32,
    pub prev_block_hash: String,
    pub transactions_root: String,
    pub timestamp: u32,
    pub bits: u32,
    pub height: u32,
    pub nonce: u32,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockInfo {
    pub hash: String,
    pub block_data: Option<BlockHead>,
    #[serde(default)]
    pub transactions: Vec<TransactionInfo>,
    #[serde(rename = "Confirminations", default)]
    pub confirmations: u32,
    #[serde(default)]
    pub miner_info: String,
}

/// One entry of `listunspent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentInfo {
    #[serde(rename = "txid")]
    pub tx_id: String,
    #[serde(rename = "vout")]
    pub output_index: u16,
    #[serde(rename = "assetid", default)]
    pub asset_id: Option<String>,
    pub address: String,
    pub amount: String,
    #[serde(rename = "outputlock", default)]
    pub output_lock: u32,
    #[serde(default)]
    pub confirmations: u32,
}

impl UnspentInfo {
    pub fn tx_hash(&self) -> Result<Hash256, TransactionError> {
        Hash256::from_reversed_hex(&self.tx_id)
    }

    pub fn value(&self) -> Result<Amount, AmountError> {
        self.amount.parse()
    }
}

/// Block selector for `getblock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
    Height(u32),
    Hash(String),
}

impl BlockRef {
    /// A decimal argument is a height, anything else a hash
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<u32>() {
            Ok(height) => BlockRef::Height(height),
            Err(_) => BlockRef::Hash(text.trim().to_string()),
        }
    }
}
