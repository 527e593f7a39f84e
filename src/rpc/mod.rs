//! Node RPC
//!
//! A blocking JSON-RPC client used to look up unspent outputs, broadcast
//! finished transactions and query node state.

pub mod client;
pub mod types;

pub use client::{unspent_to_utxo, RpcClient, RpcError};
pub use types::{
    BlockHead, BlockInfo, BlockRef, ProgramInfo, TransactionInfo, TxAttributeInfo, TxOutputInfo,
    UnspentInfo, UtxoTxInputInfo,
};
