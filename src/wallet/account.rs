//! Spendable accounts
//!
//! An account is an address together with the redeem script that guards it.
//! The builder needs the script to attach an unsigned program to every
//! transaction it produces.

use std::fmt;

use crate::core::{ProgramError, ProgramKind};
use crate::crypto::ProgramHash;

/// Shape of an account's spending condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Standard,
    Multisig { threshold: usize, total: usize },
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::Standard => f.write_str("standard"),
            AccountKind::Multisig { threshold, total } => {
                write!(f, "{}-of-{} multisig", threshold, total)
            }
        }
    }
}

/// An address the wallet can build transactions from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub label: Option<String>,
    pub address: String,
    pub program_hash: ProgramHash,
    pub redeem_script: Vec<u8>,
    pub kind: AccountKind,
}

impl Account {
    /// Derive address and kind from a redeem script
    pub fn from_redeem_script(
        label: Option<String>,
        redeem_script: Vec<u8>,
    ) -> Result<Self, ProgramError> {
        let kind = match ProgramKind::parse(&redeem_script)? {
            ProgramKind::Standard { .. } => AccountKind::Standard,
            ProgramKind::Multisig {
                threshold,
                public_keys,
            } => AccountKind::Multisig {
                threshold,
                total: public_keys.len(),
            },
        };
        let program_hash = ProgramHash::from_code(&redeem_script)?;

        Ok(Self {
            label,
            address: program_hash.to_address(),
            program_hash,
            redeem_script,
            kind,
        })
    }
}
