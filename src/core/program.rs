//! Programs (signature scripts) and signature-threshold tracking
//!
//! A program pairs a redeem script (`code`) with the signatures collected so
//! far (`parameter`). Two script shapes are recognised:
//!
//! - Standard: `PUSH33 <pubkey> CHECKSIG`, needs one signature
//! - Multisig: `OP_M (PUSH33 <pubkey>)*N OP_N CHECKMULTISIG`, needs M
//!
//! Signatures are stored as `PUSH64 <compact sig>`, 65 bytes each, so the
//! number present is always `parameter.len() / 65`.

use std::fmt;

use secp256k1::PublicKey;
use thiserror::Error;

use crate::crypto::{
    AddressError, ProgramHash, OP_CHECKMULTISIG, OP_CHECKSIG, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH,
};

// =============================================================================
// Script Constants
// =============================================================================

/// Push opcode preceding a compressed public key
pub const OP_PUSH_PUBKEY: u8 = 0x21;

/// Push opcode preceding a compact signature
pub const OP_PUSH_SIGNATURE: u8 = 0x40;

/// `OP_1`; `OP_k` is `OP_1 + k - 1`
pub const OP_1: u8 = 0x51;

/// Bytes occupied by one signature inside a parameter
pub const SIGNATURE_SCRIPT_LENGTH: usize = SIGNATURE_LENGTH + 1;

/// Largest N supported in an M-of-N script
pub const MAX_MULTISIG_KEYS: usize = 16;

const STANDARD_CODE_LENGTH: usize = PUBLIC_KEY_LENGTH + 2;

// =============================================================================
// Errors
// =============================================================================

/// Program parsing and signature-slot errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("Unsupported program code")]
    UnsupportedCode,
    #[error("Invalid threshold: {threshold}-of-{total}")]
    InvalidThreshold { threshold: usize, total: usize },
    #[error("Duplicate public key in multisig script")]
    DuplicatePublicKey,
    #[error("Malformed signature parameter ({0} bytes)")]
    MalformedParameter(usize),
    #[error("Program carries {present} signatures but only {required} are required")]
    TooManySignatures { present: usize, required: usize },
    #[error("Program already has all {0} required signatures")]
    AlreadyComplete(usize),
    #[error("Transaction carries no programs and cannot be signed")]
    MissingPrograms,
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

// =============================================================================
// Sign Status
// =============================================================================

/// Signing progress: signatures present versus required
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignStatus {
    pub present: usize,
    pub required: usize,
}

impl SignStatus {
    pub fn new(present: usize, required: usize) -> Self {
        Self { present, required }
    }

    /// Every required signature is present; the transaction may be broadcast
    pub fn is_complete(&self) -> bool {
        self.present == self.required
    }

    /// Signatures still missing
    pub fn remaining(&self) -> usize {
        self.required.saturating_sub(self.present)
    }

    fn combine(self, other: SignStatus) -> SignStatus {
        SignStatus {
            present: self.present + other.present,
            required: self.required + other.required,
        }
    }
}

impl fmt::Display for SignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.present, self.required)
    }
}

/// Sum the signing progress of several programs
pub fn combined_status<'a, I>(programs: I) -> Result<SignStatus, ProgramError>
where
    I: IntoIterator<Item = &'a Program>,
{
    programs
        .into_iter()
        .try_fold(SignStatus::default(), |acc, program| {
            Ok(acc.combine(program.sign_status()?))
        })
}

// =============================================================================
// Redeem Scripts
// =============================================================================

/// Spending condition encoded by a program's code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramKind {
    Standard {
        public_key: [u8; PUBLIC_KEY_LENGTH],
    },
    Multisig {
        threshold: usize,
        public_keys: Vec<[u8; PUBLIC_KEY_LENGTH]>,
    },
}

impl ProgramKind {
    /// Recognise a redeem script
    pub fn parse(code: &[u8]) -> Result<Self, ProgramError> {
        match code.last() {
            Some(&OP_CHECKSIG) => Self::parse_standard(code),
            Some(&OP_CHECKMULTISIG) => Self::parse_multisig(code),
            _ => Err(ProgramError::UnsupportedCode),
        }
    }

    fn parse_standard(code: &[u8]) -> Result<Self, ProgramError> {
        if code.len() != STANDARD_CODE_LENGTH || code[0] != OP_PUSH_PUBKEY {
            return Err(ProgramError::UnsupportedCode);
        }
        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(&code[1..=PUBLIC_KEY_LENGTH]);
        Ok(ProgramKind::Standard { public_key })
    }

    fn parse_multisig(code: &[u8]) -> Result<Self, ProgramError> {
        // OP_M + N * (PUSH33 + key) + OP_N + CHECKMULTISIG
        if code.len() < 3 {
            return Err(ProgramError::UnsupportedCode);
        }
        let threshold = small_int(code[0])?;
        let total = small_int(code[code.len() - 2])?;

        let keys_section = &code[1..code.len() - 2];
        let key_chunk = PUBLIC_KEY_LENGTH + 1;
        if keys_section.len() != total * key_chunk {
            return Err(ProgramError::UnsupportedCode);
        }

        let mut public_keys = Vec::with_capacity(total);
        for chunk in keys_section.chunks_exact(key_chunk) {
            if chunk[0] != OP_PUSH_PUBKEY {
                return Err(ProgramError::UnsupportedCode);
            }
            let mut key = [0u8; PUBLIC_KEY_LENGTH];
            key.copy_from_slice(&chunk[1..]);
            public_keys.push(key);
        }

        if threshold > total {
            return Err(ProgramError::InvalidThreshold { threshold, total });
        }

        Ok(ProgramKind::Multisig {
            threshold,
            public_keys,
        })
    }

    /// Signatures needed to satisfy the script
    pub fn required_signatures(&self) -> usize {
        match self {
            ProgramKind::Standard { .. } => 1,
            ProgramKind::Multisig { threshold, .. } => *threshold,
        }
    }

    /// Public keys allowed to sign
    pub fn public_keys(&self) -> &[[u8; PUBLIC_KEY_LENGTH]] {
        match self {
            ProgramKind::Standard { public_key } => std::slice::from_ref(public_key),
            ProgramKind::Multisig { public_keys, .. } => public_keys,
        }
    }

    /// Whether the given compressed key participates in this script
    pub fn has_participant(&self, public_key: &[u8; PUBLIC_KEY_LENGTH]) -> bool {
        self.public_keys().iter().any(|k| k == public_key)
    }
}

fn small_int(opcode: u8) -> Result<usize, ProgramError> {
    if (OP_1..OP_1 + MAX_MULTISIG_KEYS as u8).contains(&opcode) {
        Ok((opcode - OP_1) as usize + 1)
    } else {
        Err(ProgramError::UnsupportedCode)
    }
}

/// `PUSH33 <pubkey> CHECKSIG`
pub fn standard_redeem_script(public_key: &PublicKey) -> Vec<u8> {
    let mut code = Vec::with_capacity(STANDARD_CODE_LENGTH);
    code.push(OP_PUSH_PUBKEY);
    code.extend_from_slice(&public_key.serialize());
    code.push(OP_CHECKSIG);
    code
}

/// `OP_M <sorted pubkeys> OP_N CHECKMULTISIG`
///
/// Keys are sorted by their compressed encoding so that every participant
/// derives the same script, and therefore the same address, regardless of
/// the order the keys were supplied in.
pub fn multisig_redeem_script(
    threshold: usize,
    public_keys: &[PublicKey],
) -> Result<Vec<u8>, ProgramError> {
    let total = public_keys.len();
    if threshold == 0 || threshold > total || total > MAX_MULTISIG_KEYS {
        return Err(ProgramError::InvalidThreshold { threshold, total });
    }

    let mut sorted: Vec<[u8; PUBLIC_KEY_LENGTH]> =
        public_keys.iter().map(|k| k.serialize()).collect();
    sorted.sort();
    if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
        return Err(ProgramError::DuplicatePublicKey);
    }

    let mut code = Vec::with_capacity(3 + total * (PUBLIC_KEY_LENGTH + 1));
    code.push(OP_1 + threshold as u8 - 1);
    for key in &sorted {
        code.push(OP_PUSH_PUBKEY);
        code.extend_from_slice(key);
    }
    code.push(OP_1 + total as u8 - 1);
    code.push(OP_CHECKMULTISIG);
    Ok(code)
}

// =============================================================================
// Program
// =============================================================================

/// A redeem script together with the signatures collected for it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub code: Vec<u8>,
    pub parameter: Vec<u8>,
}

impl Program {
    /// An unsigned program for the given redeem script
    pub fn new(code: Vec<u8>) -> Self {
        Self {
            code,
            parameter: Vec::new(),
        }
    }

    pub fn kind(&self) -> Result<ProgramKind, ProgramError> {
        ProgramKind::parse(&self.code)
    }

    pub fn program_hash(&self) -> Result<ProgramHash, ProgramError> {
        Ok(ProgramHash::from_code(&self.code)?)
    }

    /// Signatures present, without their push opcodes
    pub fn signatures(&self) -> impl Iterator<Item = &[u8]> {
        self.parameter
            .chunks_exact(SIGNATURE_SCRIPT_LENGTH)
            .map(|chunk| &chunk[1..])
    }

    /// Read-only view of the signing progress for this program
    pub fn sign_status(&self) -> Result<SignStatus, ProgramError> {
        let required = self.kind()?.required_signatures();

        if self.parameter.len() % SIGNATURE_SCRIPT_LENGTH != 0
            || self
                .parameter
                .chunks_exact(SIGNATURE_SCRIPT_LENGTH)
                .any(|chunk| chunk[0] != OP_PUSH_SIGNATURE)
        {
            return Err(ProgramError::MalformedParameter(self.parameter.len()));
        }

        let present = self.parameter.len() / SIGNATURE_SCRIPT_LENGTH;
        if present > required {
            return Err(ProgramError::TooManySignatures { present, required });
        }

        Ok(SignStatus::new(present, required))
    }

    /// Append one signature, refusing once the threshold is met
    pub fn append_signature(
        &mut self,
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> Result<SignStatus, ProgramError> {
        let status = self.sign_status()?;
        if status.is_complete() {
            return Err(ProgramError::AlreadyComplete(status.required));
        }

        self.parameter.push(OP_PUSH_SIGNATURE);
        self.parameter.extend_from_slice(signature);
        Ok(SignStatus::new(status.present + 1, status.required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, PREFIX_MULTISIG, PREFIX_STANDARD};

    fn keys(count: usize) -> Vec<PublicKey> {
        (0..count).map(|_| KeyPair::generate().public_key).collect()
    }

    #[test]
    fn test_standard_program_needs_one_signature() {
        let key = KeyPair::generate();
        let program = Program::new(standard_redeem_script(&key.public_key));

        assert_eq!(program.sign_status().unwrap(), SignStatus::new(0, 1));
        assert_eq!(
            program.program_hash().unwrap().prefix(),
            PREFIX_STANDARD
        );
        assert!(program.kind().unwrap().has_participant(&key.public_key_bytes()));
    }

    #[test]
    fn test_multisig_script_parses_back() {
        let pubkeys = keys(3);
        let code = multisig_redeem_script(2, &pubkeys).unwrap();

        match ProgramKind::parse(&code).unwrap() {
            ProgramKind::Multisig {
                threshold,
                public_keys,
            } => {
                assert_eq!(threshold, 2);
                assert_eq!(public_keys.len(), 3);
                for key in &pubkeys {
                    assert!(public_keys.contains(&key.serialize()));
                }
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(
            ProgramHash::from_code(&code).unwrap().prefix(),
            PREFIX_MULTISIG
        );
    }

    #[test]
    fn test_multisig_script_is_order_independent() {
        let mut pubkeys = keys(3);
        let first = multisig_redeem_script(2, &pubkeys).unwrap();
        pubkeys.reverse();
        let second = multisig_redeem_script(2, &pubkeys).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_multisig_script_validation() {
        let pubkeys = keys(3);
        assert!(matches!(
            multisig_redeem_script(0, &pubkeys),
            Err(ProgramError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            multisig_redeem_script(4, &pubkeys),
            Err(ProgramError::InvalidThreshold { .. })
        ));

        let duplicated = vec![pubkeys[0], pubkeys[0]];
        assert_eq!(
            multisig_redeem_script(1, &duplicated),
            Err(ProgramError::DuplicatePublicKey)
        );
    }

    #[test]
    fn test_append_until_complete() {
        let code = multisig_redeem_script(2, &keys(3)).unwrap();
        let mut program = Program::new(code);

        assert_eq!(
            program.append_signature(&[1u8; 64]).unwrap(),
            SignStatus::new(1, 2)
        );
        assert_eq!(
            program.append_signature(&[2u8; 64]).unwrap(),
            SignStatus::new(2, 2)
        );
        assert_eq!(
            program.append_signature(&[3u8; 64]),
            Err(ProgramError::AlreadyComplete(2))
        );
        assert_eq!(program.sign_status().unwrap(), SignStatus::new(2, 2));
        assert_eq!(program.signatures().count(), 2);
    }

    #[test]
    fn test_malformed_parameters_are_rejected() {
        let key = KeyPair::generate();
        let mut program = Program::new(standard_redeem_script(&key.public_key));

        program.parameter = vec![OP_PUSH_SIGNATURE; 10];
        assert!(matches!(
            program.sign_status(),
            Err(ProgramError::MalformedParameter(10))
        ));

        program.parameter = [[OP_PUSH_SIGNATURE; SIGNATURE_SCRIPT_LENGTH]; 2].concat();
        assert_eq!(
            program.sign_status(),
            Err(ProgramError::TooManySignatures {
                present: 2,
                required: 1
            })
        );
    }

    #[test]
    fn test_combined_status_sums_programs() {
        let standard = Program::new(standard_redeem_script(&keys(1)[0]));
        let mut multisig = Program::new(multisig_redeem_script(2, &keys(3)).unwrap());
        multisig.append_signature(&[9u8; 64]).unwrap();

        let status = combined_status(&[standard, multisig]).unwrap();
        assert_eq!(status, SignStatus::new(1, 3));
        assert_eq!(status.remaining(), 2);
        assert!(!status.is_complete());
        assert_eq!(status.to_string(), "[1/3]");
    }
}
