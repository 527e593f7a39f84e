//! CLI commands for the wallet
//!
//! Implements all command handlers for the CLI interface.

use std::path::{Path, PathBuf};

use crate::cli::input::{get_passphrase, request_new_passphrase};
use crate::config::WalletConfig;
use crate::core::{Amount, ProgramKind, Transaction};
use crate::crypto::genesis_address;
use crate::exchange::{read_transaction, to_hex, write_transaction, TxSource};
use crate::rpc::{unspent_to_utxo, BlockRef, RpcClient};
use crate::wallet::{
    load_batch_file, parse_lock_height, verify_signatures, AccountRecord, Keystore, SignError,
    SigningCoordinator, SpendBuilder, UtxoSource,
};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// What `tx create` pays
pub enum Payment {
    Single { to: String, amount: String },
    Batch(PathBuf),
}

/// Node queries served by `info`
pub enum InfoQuery {
    Connections,
    Neighbors,
    State,
    Height,
    Block(String),
    BlockHash(u32),
    Transaction(String),
    BestBlockHash,
    TxPool,
}

fn open_keystore(config: &WalletConfig) -> CliResult<Keystore> {
    Ok(Keystore::open(&config.keystore_path())?)
}

fn print_transaction_file(config: &WalletConfig, tx: &Transaction) -> CliResult<()> {
    println!("{}", to_hex(tx));
    let path = write_transaction(&config.output_dir, tx)?;
    println!("\n   📄 File: {}", path.display());
    Ok(())
}

// =============================================================================
// Accounts
// =============================================================================

/// Create a new standard account
pub fn cmd_account_new(config: &WalletConfig, label: Option<String>) -> CliResult<()> {
    let mut keystore = Keystore::open_or_create(&config.keystore_path())?;
    let passphrase = request_new_passphrase()?;
    let account = keystore.add_standard(label, &passphrase)?;
    keystore.save()?;

    println!("🔐 New account created!");
    println!("   📍 Address: {}", account.address);
    if let Some(label) = &account.label {
        println!("   🏷️  Label: {}", label);
    }
    if let Some(AccountRecord::Standard { public_key, .. }) = keystore.find(&account.address) {
        println!("   🔑 Public Key: {}", public_key);
    }
    println!("\n   ⚠️  IMPORTANT: Your encrypted key is stored in {}", keystore.path().display());
    println!("   Back up this file and remember the passphrase!");

    Ok(())
}

/// Import a private key as a standard account
pub fn cmd_account_import(
    config: &WalletConfig,
    private_key_hex: &str,
    label: Option<String>,
) -> CliResult<()> {
    let mut keystore = Keystore::open_or_create(&config.keystore_path())?;
    let passphrase = request_new_passphrase()?;
    let account = keystore.import_standard(label, private_key_hex, &passphrase)?;
    keystore.save()?;

    println!("📥 Account imported!");
    println!("   📍 Address: {}", account.address);
    Ok(())
}

/// Register a multisig account
pub fn cmd_account_multisig(
    config: &WalletConfig,
    threshold: usize,
    public_keys: &[String],
    label: Option<String>,
) -> CliResult<()> {
    let mut keystore = Keystore::open_or_create(&config.keystore_path())?;
    let account = keystore.add_multisig(label, threshold, public_keys)?;
    keystore.save()?;

    println!("🔐 Multisig account created!");
    println!("   📍 Address: {}", account.address);
    println!("   🔧 Type: {}", account.kind);
    println!("   📜 Redeem script: {}", hex::encode(&account.redeem_script));
    Ok(())
}

/// List all accounts
pub fn cmd_account_list(config: &WalletConfig) -> CliResult<()> {
    let keystore = Keystore::open_or_create(&config.keystore_path())?;
    let accounts = keystore.accounts()?;

    if accounts.is_empty() {
        println!("📭 No accounts found. Create one with: ela-wallet account new");
        return Ok(());
    }

    println!("📋 Accounts:");
    for account in &accounts {
        let label = account.label.as_deref().unwrap_or("-");
        println!("   {} ({}) - {}", account.address, label, account.kind);
    }
    Ok(())
}

/// Show the balance of one account or all of them
pub fn cmd_account_balance(config: &WalletConfig, address: Option<&str>) -> CliResult<()> {
    let keystore = open_keystore(config)?;
    let rpc = RpcClient::new(config.rpc_url.clone())?;

    let addresses: Vec<String> = match address {
        Some(identity) => vec![keystore
            .find(identity)
            .map(|record| record.address().to_string())
            .unwrap_or_else(|| identity.to_string())],
        None => keystore
            .records()
            .iter()
            .map(|record| record.address().to_string())
            .collect(),
    };

    let height = rpc.best_height()?;
    for address in &addresses {
        let mut available = Amount::ZERO;
        let mut locked = Amount::ZERO;
        let entries = rpc.list_unspent(address)?;

        for entry in &entries {
            let utxo = unspent_to_utxo(entry)?;
            let bucket = if utxo.output.is_spendable_at(height) {
                &mut available
            } else {
                &mut locked
            };
            *bucket = bucket
                .checked_add(utxo.output.value)
                .ok_or("balance overflow")?;
        }

        println!("💰 Balance for {}", address);
        println!("   ├─ Available: {}", available);
        println!("   ├─ Locked: {}", locked);
        println!("   └─ UTXOs: {}", entries.len());
    }
    Ok(())
}

// =============================================================================
// Transactions
// =============================================================================

/// Build an unsigned transaction and write it out for signing
pub fn cmd_tx_create(
    config: &WalletConfig,
    from: Option<&str>,
    fee: &str,
    lock: Option<&str>,
    payment: Payment,
) -> CliResult<()> {
    let fee = fee
        .parse::<Amount>()
        .map_err(|e| format!("invalid transaction fee: {}", e))?;
    let lock_height = lock.map(parse_lock_height).transpose()?;

    let keystore = open_keystore(config)?;
    let rpc = RpcClient::new(config.rpc_url.clone())?;
    let builder = SpendBuilder::new(&keystore, &rpc);

    let tx = match payment {
        Payment::Single { to, amount } => {
            let amount = amount
                .parse::<Amount>()
                .map_err(|e| format!("invalid transaction amount: {}", e))?;
            builder.build_single(from, &to, amount, fee, lock_height)?
        }
        Payment::Batch(path) => {
            let outputs = load_batch_file(&path)?;
            builder.build_multi_output(from, fee, &outputs, lock_height)?
        }
    };

    println!("📤 Transaction created:");
    println!("   ID: {}", tx.hash());
    println!("   Inputs: {}", tx.inputs.len());
    println!("   Outputs: {}", tx.outputs.len());
    println!();
    print_transaction_file(config, &tx)
}

/// Add one signature to a transaction
pub fn cmd_tx_sign(config: &WalletConfig, identity: &str, source: &TxSource) -> CliResult<()> {
    let tx = read_transaction(source)?;
    let status = tx.sign_status()?;
    if status.is_complete() {
        return Err(SignError::AlreadyFullySigned(status).into());
    }

    let keystore = open_keystore(config)?;
    let passphrase = get_passphrase(&format!("Passphrase for {}: ", identity))?;
    let outcome = SigningCoordinator::new(&keystore).sign(identity, passphrase, &tx)?;

    println!("{} Transaction successfully signed", outcome.status);
    print_transaction_file(config, &outcome.transaction)
}

/// Broadcast a fully signed transaction
pub fn cmd_tx_send(config: &WalletConfig, source: &TxSource) -> CliResult<()> {
    let tx = read_transaction(source)?;
    let status = verify_signatures(&tx)?;
    if !status.is_complete() {
        return Err(format!(
            "Transaction is not fully signed {}, {} more signature(s) needed",
            status,
            status.remaining()
        )
        .into());
    }

    let rpc = RpcClient::new(config.rpc_url.clone())?;
    let tx_id = rpc.send_raw_transaction(&to_hex(&tx))?;

    println!("✅ Transaction sent");
    println!("   ID: {}", tx_id);
    Ok(())
}

/// Print the structure and signing progress of a transaction
pub fn cmd_tx_decode(source: &TxSource) -> CliResult<()> {
    let tx = read_transaction(source)?;
    let status = tx.sign_status()?;

    println!("🧾 Transaction {}", tx.hash());
    println!("   ├─ Type: {:#04x}", tx.tx_type);
    println!("   ├─ Attributes: {}", tx.attributes.len());
    println!("   ├─ Lock time: {}", tx.lock_time);
    println!("   ├─ Signatures: {}", status);

    println!("   ├─ Inputs:");
    for input in &tx.inputs {
        println!("   │    {}:{}", input.prev_tx, input.prev_index);
    }

    println!("   ├─ Outputs:");
    for output in &tx.outputs {
        if output.output_lock > 0 {
            println!(
                "   │    {} {} (locked until {})",
                output.address(),
                output.value,
                output.output_lock
            );
        } else {
            println!("   │    {} {}", output.address(), output.value);
        }
    }

    println!("   └─ Programs:");
    for program in &tx.programs {
        let kind = match program.kind()? {
            ProgramKind::Standard { .. } => "standard".to_string(),
            ProgramKind::Multisig {
                threshold,
                public_keys,
            } => format!("{}-of-{} multisig", threshold, public_keys.len()),
        };
        println!(
            "        {} {} {}",
            program.program_hash()?.to_address(),
            kind,
            program.sign_status()?
        );
    }
    Ok(())
}

// =============================================================================
// Node info
// =============================================================================

/// Query the node
pub fn cmd_info(config: &WalletConfig, query: InfoQuery) -> CliResult<()> {
    let rpc = RpcClient::new(config.rpc_url.clone())?;

    match query {
        InfoQuery::Connections => println!("{}", rpc.connection_count()?),
        InfoQuery::Neighbors => println!("{}", serde_json::to_string_pretty(&rpc.neighbors()?)?),
        InfoQuery::State => println!("{}", serde_json::to_string_pretty(&rpc.node_state()?)?),
        InfoQuery::Height => println!("{}", rpc.block_count()?),
        InfoQuery::Block(param) => {
            let block = rpc.block(&BlockRef::parse(&param))?;
            println!("{}", serde_json::to_string_pretty(&block)?);
        }
        InfoQuery::BlockHash(height) => println!("{}", rpc.block_hash(height)?),
        InfoQuery::Transaction(hash) => {
            let tx = rpc.raw_transaction(&hash)?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
        }
        InfoQuery::BestBlockHash => println!("{}", rpc.best_block_hash()?),
        InfoQuery::TxPool => println!("{}", serde_json::to_string_pretty(&rpc.raw_mempool()?)?),
    }
    Ok(())
}

/// Derive the cross-chain address of a side chain genesis block
pub fn cmd_genesis(hash_hex: &str) -> CliResult<()> {
    let hash = hex::decode(hash_hex.trim()).map_err(|e| format!("invalid genesis hash: {}", e))?;
    println!("genesis address: {}", genesis_address(&hash)?);
    Ok(())
}

/// Resolve `--file`/`--hex` into a transaction source
pub fn tx_source(file: Option<&Path>, hex: Option<&str>) -> CliResult<TxSource> {
    match (file, hex) {
        (Some(path), _) => Ok(TxSource::FilePath(path.to_path_buf())),
        (None, Some(text)) => Ok(TxSource::HexText(text.to_string())),
        (None, None) => Err("use --file or --hex to specify the transaction".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_source() {
        let source = tx_source(Some(Path::new("a.txn")), None).unwrap();
        assert_eq!(source, TxSource::FilePath(PathBuf::from("a.txn")));

        let source = tx_source(None, Some("00ff")).unwrap();
        assert_eq!(source, TxSource::HexText("00ff".to_string()));

        assert!(tx_source(None, None).is_err());
    }

    #[test]
    fn test_genesis_rejects_bad_hex() {
        assert!(cmd_genesis("xyz").is_err());
        assert!(cmd_genesis(&"ab".repeat(32)).is_ok());
    }
}
