//! Signing coordinator
//!
//! Applies one signer's signature to a transaction handed over by another
//! party. Only the signatures encoded in the transaction itself are trusted;
//! nothing is cached between invocations.

use log::debug;
use secp256k1::PublicKey;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::{ProgramError, SignStatus, Transaction};
use crate::crypto::{public_key_from_slice, verify_signature, KeyError, KeyPair};

/// Signing errors
#[derive(Error, Debug)]
pub enum SignError {
    #[error("Transaction was fully signed {0}, no more signatures needed")]
    AlreadyFullySigned(SignStatus),
    #[error("Unknown signer: {0}")]
    UnknownSigner(String),
    #[error("Invalid passphrase")]
    InvalidPassphrase,
    #[error("{0} is not a signer of any unfinished program in this transaction")]
    NotAParticipant(String),
    #[error("Transaction already carries a signature from {0}")]
    AlreadySignedBy(String),
    #[error("Invalid signature in program {0}")]
    InvalidSignature(usize),
    #[error("Keystore error: {0}")]
    Keystore(String),
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
}

/// Source of unlocked signing keys
pub trait KeyProvider {
    /// Decrypt the key behind `identity`; the passphrase is only borrowed
    fn unlock(&self, identity: &str, passphrase: &str) -> Result<KeyPair, SignError>;
}

/// A freshly signed transaction and its new progress
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub transaction: Transaction,
    pub status: SignStatus,
}

/// Adds signatures on behalf of keys held by a [`KeyProvider`]
pub struct SigningCoordinator<'a, K: KeyProvider> {
    keys: &'a K,
}

impl<'a, K: KeyProvider> SigningCoordinator<'a, K> {
    pub fn new(keys: &'a K) -> Self {
        Self { keys }
    }

    /// Sign `tx` as `identity`, returning a new transaction with exactly one
    /// more signature. `tx` itself is never modified, and the passphrase is
    /// scrubbed as soon as the key is unlocked (or on any early return).
    pub fn sign(
        &self,
        identity: &str,
        passphrase: Zeroizing<String>,
        tx: &Transaction,
    ) -> Result<SignOutcome, SignError> {
        let status = tx.sign_status()?;
        if status.is_complete() {
            return Err(SignError::AlreadyFullySigned(status));
        }

        let key = self.keys.unlock(identity, &passphrase)?;
        drop(passphrase);

        let signing_data = tx.signing_data();
        let public_key = key.public_key_bytes();

        let mut target = None;
        let mut signed_before = false;
        for (index, program) in tx.programs.iter().enumerate() {
            if !program.kind()?.has_participant(&public_key) {
                continue;
            }
            if program
                .signatures()
                .any(|sig| matches!(key.verify(&signing_data, sig), Ok(true)))
            {
                signed_before = true;
                continue;
            }
            if !program.sign_status()?.is_complete() {
                target = Some(index);
                break;
            }
        }

        let index = match target {
            Some(index) => index,
            None if signed_before => {
                return Err(SignError::AlreadySignedBy(key.public_key_hex()))
            }
            None => return Err(SignError::NotAParticipant(identity.to_string())),
        };

        let signature = key.sign(&signing_data)?;
        let mut signed = tx.clone();
        signed.programs[index].append_signature(&signature)?;
        let status = signed.sign_status()?;

        debug!("Signed program {} as {} {}", index, identity, status);

        Ok(SignOutcome {
            transaction: signed,
            status,
        })
    }
}

/// Check every signature present against the program's public keys
///
/// Each signature must verify under a distinct participant key. Returns the
/// signing progress on success.
pub fn verify_signatures(tx: &Transaction) -> Result<SignStatus, SignError> {
    let signing_data = tx.signing_data();

    for (index, program) in tx.programs.iter().enumerate() {
        let keys: Vec<PublicKey> = program
            .kind()?
            .public_keys()
            .iter()
            .map(|k| public_key_from_slice(k))
            .collect::<Result<_, _>>()?;
        let mut used = vec![false; keys.len()];

        for signature in program.signatures() {
            let signer = keys.iter().enumerate().position(|(i, key)| {
                !used[i] && matches!(verify_signature(key, &signing_data, signature), Ok(true))
            });
            match signer {
                Some(i) => used[i] = true,
                None => return Err(SignError::InvalidSignature(index)),
            }
        }
    }

    Ok(tx.sign_status()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        multisig_redeem_script, standard_redeem_script, Amount, Attribute, Hash256,
        TransactionOutput, UTXO,
    };
    use crate::crypto::ProgramHash;
    use std::collections::HashMap;

    struct TestKeys {
        keys: HashMap<String, KeyPair>,
    }

    impl TestKeys {
        fn new(names: &[&str]) -> Self {
            let keys = names
                .iter()
                .map(|name| (name.to_string(), KeyPair::generate()))
                .collect();
            Self { keys }
        }

        fn public_keys(&self, names: &[&str]) -> Vec<PublicKey> {
            names.iter().map(|n| self.keys[*n].public_key).collect()
        }
    }

    impl KeyProvider for TestKeys {
        fn unlock(&self, identity: &str, passphrase: &str) -> Result<KeyPair, SignError> {
            let key = self
                .keys
                .get(identity)
                .ok_or_else(|| SignError::UnknownSigner(identity.to_string()))?;
            if passphrase != "secret" {
                return Err(SignError::InvalidPassphrase);
            }
            Ok(key.clone())
        }
    }

    fn unsigned_tx(code: Vec<u8>) -> Transaction {
        let owner = ProgramHash::from_code(&code).unwrap();
        let utxo = UTXO {
            tx_id: Hash256([5u8; 32]),
            output_index: 0,
            output: TransactionOutput::new(owner, Amount::ONE_COIN),
        };
        Transaction::builder()
            .attribute(Attribute::nonce())
            .add_input(&utxo)
            .add_output(owner, Amount::from_sela(90_000_000).unwrap())
            .program(code)
            .build()
    }

    fn pass() -> Zeroizing<String> {
        Zeroizing::new("secret".to_string())
    }

    #[test]
    fn test_multisig_signing_progress() {
        let keys = TestKeys::new(&["alice", "bob", "carol"]);
        let code =
            multisig_redeem_script(2, &keys.public_keys(&["alice", "bob", "carol"])).unwrap();
        let tx = unsigned_tx(code);
        let coordinator = SigningCoordinator::new(&keys);

        let first = coordinator.sign("alice", pass(), &tx).unwrap();
        assert_eq!(first.status, SignStatus::new(1, 2));
        // Input transaction untouched
        assert_eq!(tx.sign_status().unwrap(), SignStatus::new(0, 2));

        let second = coordinator.sign("carol", pass(), &first.transaction).unwrap();
        assert_eq!(second.status, SignStatus::new(2, 2));
        assert!(second.status.is_complete());
        assert_eq!(verify_signatures(&second.transaction).unwrap(), second.status);
    }

    #[test]
    fn test_fully_signed_guard() {
        let keys = TestKeys::new(&["alice", "bob"]);
        let code = standard_redeem_script(&keys.keys["alice"].public_key);
        let coordinator = SigningCoordinator::new(&keys);

        let signed = coordinator
            .sign("alice", pass(), &unsigned_tx(code))
            .unwrap()
            .transaction;

        let result = coordinator.sign("bob", pass(), &signed);
        assert!(matches!(result, Err(SignError::AlreadyFullySigned(_))));
        assert_eq!(signed.sign_status().unwrap(), SignStatus::new(1, 1));
    }

    #[test]
    fn test_same_signer_twice_is_rejected() {
        let keys = TestKeys::new(&["alice", "bob", "carol"]);
        let code =
            multisig_redeem_script(2, &keys.public_keys(&["alice", "bob", "carol"])).unwrap();
        let coordinator = SigningCoordinator::new(&keys);

        let once = coordinator
            .sign("alice", pass(), &unsigned_tx(code))
            .unwrap()
            .transaction;
        let result = coordinator.sign("alice", pass(), &once);
        assert!(matches!(result, Err(SignError::AlreadySignedBy(_))));
    }

    #[test]
    fn test_signer_errors() {
        let keys = TestKeys::new(&["alice", "mallory"]);
        let code = standard_redeem_script(&keys.keys["alice"].public_key);
        let tx = unsigned_tx(code);
        let coordinator = SigningCoordinator::new(&keys);

        assert!(matches!(
            coordinator.sign("nobody", pass(), &tx),
            Err(SignError::UnknownSigner(_))
        ));
        assert!(matches!(
            coordinator.sign("alice", Zeroizing::new("wrong".to_string()), &tx),
            Err(SignError::InvalidPassphrase)
        ));
        assert!(matches!(
            coordinator.sign("mallory", pass(), &tx),
            Err(SignError::NotAParticipant(_))
        ));
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let keys = TestKeys::new(&["alice"]);
        let code = standard_redeem_script(&keys.keys["alice"].public_key);
        let tx = unsigned_tx(code);
        let coordinator = SigningCoordinator::new(&keys);

        let a = coordinator.sign("alice", pass(), &tx).unwrap();
        let b = coordinator.sign("alice", pass(), &tx).unwrap();
        assert_eq!(a.transaction, b.transaction);
    }

    #[test]
    fn test_transaction_without_programs_is_never_complete() {
        let keys = TestKeys::new(&["alice"]);
        let code = standard_redeem_script(&keys.keys["alice"].public_key);
        let mut tx = unsigned_tx(code);
        tx.programs.clear();

        assert!(matches!(
            verify_signatures(&tx),
            Err(SignError::Program(ProgramError::MissingPrograms))
        ));
        assert!(matches!(
            SigningCoordinator::new(&keys).sign("alice", pass(), &tx),
            Err(SignError::Program(ProgramError::MissingPrograms))
        ));
    }

    #[test]
    fn test_verify_detects_forged_signature() {
        let keys = TestKeys::new(&["alice"]);
        let code = standard_redeem_script(&keys.keys["alice"].public_key);
        let mut tx = unsigned_tx(code);
        tx.programs[0].append_signature(&[7u8; 64]).unwrap();

        assert!(matches!(
            verify_signatures(&tx),
            Err(SignError::InvalidSignature(0))
        ));
    }
}
