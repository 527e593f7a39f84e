//! Reading and writing exchanged transactions

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::core::Transaction;
use crate::exchange::codec::{choose_file_name, from_hex, to_hex, CodecError};

/// Where a serialized transaction comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxSource {
    FilePath(PathBuf),
    HexText(String),
}

/// Raw hex content of a source, trimmed
pub fn read_content(source: &TxSource) -> Result<String, CodecError> {
    let content = match source {
        TxSource::FilePath(path) => fs::read_to_string(path)?,
        TxSource::HexText(text) => text.clone(),
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CodecError::EmptyContent);
    }
    Ok(trimmed.to_string())
}

/// Read and decode a transaction
pub fn read_transaction(source: &TxSource) -> Result<Transaction, CodecError> {
    from_hex(&read_content(source)?)
}

/// Write `tx` into `dir` under the name matching its signing progress
///
/// The hex goes to a temporary file first and is renamed into place, so a
/// reader never observes a partial transaction.
pub fn write_transaction(dir: &Path, tx: &Transaction) -> Result<PathBuf, CodecError> {
    let status = tx.sign_status().map_err(|e| CodecError::MalformedTransaction(e.into()))?;

    fs::create_dir_all(dir)?;
    let path = dir.join(choose_file_name(status));
    let temp_path = path.with_extension("txn.tmp");

    fs::write(&temp_path, to_hex(tx))?;
    fs::rename(&temp_path, &path)?;

    info!("Transaction {} written to {}", status, path.display());
    Ok(path)
}
