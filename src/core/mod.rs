//! Core transaction components
//!
//! This module contains the fundamental building blocks:
//! - Fixed-point amounts
//! - Binary wire primitives
//! - Programs (redeem scripts + signatures) and signature-threshold tracking
//! - Transactions (UTXO model with per-output lock heights)

pub mod amount;
pub mod encoding;
pub mod program;
pub mod transaction;

pub use amount::{Amount, AmountError, DECIMALS, SELA_PER_COIN};
pub use encoding::DecodeError;
pub use program::{
    combined_status, multisig_redeem_script, standard_redeem_script, Program, ProgramError,
    ProgramKind, SignStatus, MAX_MULTISIG_KEYS, SIGNATURE_SCRIPT_LENGTH,
};
pub use transaction::{
    Attribute, Hash256, Transaction, TransactionBuilder, TransactionError, TransactionInput,
    TransactionOutput, SEQUENCE_FINAL, SYSTEM_ASSET_ID, TX_TYPE_TRANSFER_ASSET, UTXO,
};
