//! Cryptographic utilities for the wallet
//!
//! This module provides:
//! - SHA-256 / RIPEMD-160 hashing
//! - ECDSA key management (secp256k1)
//! - Program hashes and Base58Check addresses

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{
    genesis_address, AddressError, ProgramHash, OP_CHECKMULTISIG, OP_CHECKSIG,
    OP_CROSSCHAIN, PREFIX_CROSSCHAIN, PREFIX_MULTISIG, PREFIX_STANDARD, PROGRAM_HASH_LENGTH,
};
pub use hash::{double_sha256, hash160, sha256};
pub use keys::{
    public_key_from_hex, public_key_from_slice, sign_message, verify_signature, KeyError,
    KeyPair, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};
