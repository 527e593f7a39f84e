//! Wallet module
//!
//! Accounts, the encrypted keystore, transaction construction and the
//! signing coordinator.

pub mod account;
pub mod batch;
pub mod builder;
pub mod keystore;
pub mod signer;

pub use account::{Account, AccountKind};
pub use batch::{load_batch, load_batch_file, BatchError};
pub use builder::{
    parse_lock_height, AddressResolver, BuildError, OutputSpec, SpendBuilder, UtxoSource,
};
pub use keystore::{AccountRecord, Keystore, KeystoreError};
pub use signer::{verify_signatures, KeyProvider, SignError, SignOutcome, SigningCoordinator};
