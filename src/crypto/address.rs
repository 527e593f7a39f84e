//! Program hashes and Base58Check addresses
//!
//! A program hash is `prefix || RIPEMD160(SHA256(code))`, where `code` is the
//! redeem script guarding an output. The prefix is chosen from the script's
//! final opcode, so standard, multisig and cross-chain addresses are
//! distinguishable from the address string alone.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::hash::{double_sha256, hash160};

/// Length of a program hash (prefix + 20-byte digest)
pub const PROGRAM_HASH_LENGTH: usize = 21;

/// Length of a decoded address (program hash + checksum)
const ADDRESS_BYTES_LENGTH: usize = PROGRAM_HASH_LENGTH + 4;

/// Prefix for single-key (CHECKSIG) programs
pub const PREFIX_STANDARD: u8 = 0x21;
/// Prefix for threshold (CHECKMULTISIG) programs
pub const PREFIX_MULTISIG: u8 = 0x12;
/// Prefix for side-chain genesis (CROSSCHAIN) programs
pub const PREFIX_CROSSCHAIN: u8 = 0x4B;

/// Terminal opcodes that select the prefix
pub const OP_CHECKSIG: u8 = 0xAC;
pub const OP_CHECKMULTISIG: u8 = 0xAE;
pub const OP_CROSSCHAIN: u8 = 0xAF;

/// Address and program hash errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address encoding: {0}")]
    InvalidEncoding(String),
    #[error("Invalid address length: {0} bytes")]
    InvalidLength(usize),
    #[error("Address checksum mismatch: {0}")]
    ChecksumMismatch(String),
    #[error("Unknown address prefix: 0x{0:02x}")]
    UnknownPrefix(u8),
    #[error("Unsupported program code")]
    UnsupportedCode,
}

/// 21-byte hash identifying a spending condition
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHash([u8; PROGRAM_HASH_LENGTH]);

impl ProgramHash {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; PROGRAM_HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derive the program hash of a redeem script
    pub fn from_code(code: &[u8]) -> Result<Self, AddressError> {
        let prefix = match code.last() {
            Some(&OP_CHECKSIG) => PREFIX_STANDARD,
            Some(&OP_CHECKMULTISIG) => PREFIX_MULTISIG,
            Some(&OP_CROSSCHAIN) => PREFIX_CROSSCHAIN,
            _ => return Err(AddressError::UnsupportedCode),
        };

        let mut bytes = [0u8; PROGRAM_HASH_LENGTH];
        bytes[0] = prefix;
        bytes[1..].copy_from_slice(&hash160(code));
        Ok(Self(bytes))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; PROGRAM_HASH_LENGTH] {
        &self.0
    }

    /// Prefix byte
    pub fn prefix(&self) -> u8 {
        self.0[0]
    }

    /// Encode as a Base58Check address
    pub fn to_address(&self) -> String {
        let mut address_bytes = self.0.to_vec();
        let checksum = double_sha256(&address_bytes);
        address_bytes.extend_from_slice(&checksum[..4]);
        bs58::encode(address_bytes).into_string()
    }

    /// Decode and validate a Base58Check address
    pub fn from_address(address: &str) -> Result<Self, AddressError> {
        let decoded = bs58::decode(address.trim())
            .into_vec()
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

        if decoded.len() != ADDRESS_BYTES_LENGTH {
            return Err(AddressError::InvalidLength(decoded.len()));
        }

        let (body, checksum) = decoded.split_at(PROGRAM_HASH_LENGTH);
        if double_sha256(body)[..4] != *checksum {
            return Err(AddressError::ChecksumMismatch(address.to_string()));
        }

        match body[0] {
            PREFIX_STANDARD | PREFIX_MULTISIG | PREFIX_CROSSCHAIN => {}
            other => return Err(AddressError::UnknownPrefix(other)),
        }

        let mut bytes = [0u8; PROGRAM_HASH_LENGTH];
        bytes.copy_from_slice(body);
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ProgramHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for ProgramHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_address())
    }
}

impl FromStr for ProgramHash {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_address(s)
    }
}

/// Derive the cross-chain address for a side chain's genesis block hash
///
/// The program is `len(hash) || hash || CROSSCHAIN`.
pub fn genesis_address(genesis_hash: &[u8]) -> Result<String, AddressError> {
    let length = u8::try_from(genesis_hash.len())
        .map_err(|_| AddressError::InvalidLength(genesis_hash.len()))?;

    let mut code = Vec::with_capacity(genesis_hash.len() + 2);
    code.push(length);
    code.extend_from_slice(genesis_hash);
    code.push(OP_CROSSCHAIN);

    Ok(ProgramHash::from_code(&code)?.to_address())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_code() -> Vec<u8> {
        let mut code = vec![0x21];
        code.extend_from_slice(&[0x02; 33]);
        code.push(OP_CHECKSIG);
        code
    }

    #[test]
    fn test_prefix_follows_final_opcode() {
        let standard = ProgramHash::from_code(&standard_code()).unwrap();
        assert_eq!(standard.prefix(), PREFIX_STANDARD);

        let multisig = ProgramHash::from_code(&[0x51, OP_CHECKMULTISIG]).unwrap();
        assert_eq!(multisig.prefix(), PREFIX_MULTISIG);

        assert_eq!(
            ProgramHash::from_code(&[0x00]),
            Err(AddressError::UnsupportedCode)
        );
    }

    #[test]
    fn test_address_round_trip() {
        let hash = ProgramHash::from_code(&standard_code()).unwrap();
        let address = hash.to_address();

        // Standard addresses start with 'E'
        assert!(address.starts_with('E'));
        assert_eq!(ProgramHash::from_address(&address).unwrap(), hash);
    }

    #[test]
    fn test_rejects_corrupted_address() {
        let address = ProgramHash::from_code(&standard_code())
            .unwrap()
            .to_address();

        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'a' { 'b' } else { 'a' };
        let corrupted: String = chars.into_iter().collect();

        assert!(matches!(
            ProgramHash::from_address(&corrupted),
            Err(AddressError::ChecksumMismatch(_))
        ));
        assert!(matches!(
            ProgramHash::from_address("not-base58-0OIl"),
            Err(AddressError::InvalidEncoding(_))
        ));
        assert!(matches!(
            ProgramHash::from_address("abc"),
            Err(AddressError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_genesis_address_is_cross_chain() {
        let genesis = [0x11u8; 32];
        let address = genesis_address(&genesis).unwrap();
        let hash = ProgramHash::from_address(&address).unwrap();
        assert_eq!(hash.prefix(), PREFIX_CROSSCHAIN);
    }
}
