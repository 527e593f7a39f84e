//! ELA Wallet: an offline multi-signature wallet client
//!
//! This crate provides:
//! - Fixed-point amounts and the binary transaction wire format
//! - Standard and M-of-N multisig programs with signing progress tracking
//! - Spend construction with largest-first coin selection and change
//! - Multi-output batch files
//! - A signing coordinator backed by an encrypted keystore
//! - Hex/file exchange of partially signed transactions
//! - A blocking JSON-RPC client for the node
//!
//! # Example
//!
//! ```rust
//! use ela_wallet::core::{multisig_redeem_script, SignStatus};
//! use ela_wallet::crypto::{KeyPair, ProgramHash};
//! use ela_wallet::exchange::choose_file_name;
//!
//! // A 2-of-3 multisig address
//! let keys: Vec<_> = (0..3).map(|_| KeyPair::generate().public_key).collect();
//! let script = multisig_redeem_script(2, &keys).unwrap();
//! let address = ProgramHash::from_code(&script).unwrap().to_address();
//! assert!(address.starts_with('8'));
//!
//! // Partially signed transactions are named after their progress
//! assert_eq!(choose_file_name(SignStatus::new(1, 2)), "to_be_signed_1_of_2.txn");
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod exchange;
pub mod rpc;
pub mod wallet;

// Re-export commonly used types
pub use config::WalletConfig;
pub use core::{Amount, Program, SignStatus, Transaction};
pub use crypto::{KeyPair, ProgramHash};
pub use exchange::TxSource;
pub use rpc::RpcClient;
pub use wallet::{Keystore, SigningCoordinator, SpendBuilder};
