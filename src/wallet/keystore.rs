//! Encrypted account keystore
//!
//! A single JSON file holding every account the wallet can spend from.
//! Standard accounts carry their private key encrypted under a passphrase
//! (Argon2 key derivation, AES-256-GCM, fresh salt and nonce per account).
//! Multisig accounts only record their redeem script; signing is done by the
//! participants' own standard accounts.

use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use log::{debug, info};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::{multisig_redeem_script, standard_redeem_script, ProgramError};
use crate::crypto::{public_key_from_hex, KeyError, KeyPair};
use crate::wallet::account::Account;
use crate::wallet::builder::{AddressResolver, BuildError};
use crate::wallet::signer::{KeyProvider, SignError};

const KEYSTORE_VERSION: u32 = 1;
const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;

/// Keystore errors
#[derive(Error, Debug)]
pub enum KeystoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Keystore not found at {0}; create an account first")]
    NotFound(PathBuf),
    #[error("Unsupported keystore version {0}")]
    UnsupportedVersion(u32),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),
    #[error("{0} is a multisig account and holds no private key")]
    NoPrivateKey(String),
    #[error("Passphrase must not be empty")]
    EmptyPassphrase,
    #[error("Wrong passphrase")]
    WrongPassphrase,
    #[error("Corrupted keystore entry: {0}")]
    Corrupted(String),
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
}

/// Passphrase-encrypted private key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedKey {
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// One stored account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountRecord {
    Standard {
        label: Option<String>,
        address: String,
        public_key: String,
        encrypted_key: EncryptedKey,
        created_at: DateTime<Utc>,
    },
    Multisig {
        label: Option<String>,
        address: String,
        redeem_script: String,
        threshold: usize,
        public_keys: Vec<String>,
        created_at: DateTime<Utc>,
    },
}

impl AccountRecord {
    pub fn label(&self) -> Option<&str> {
        match self {
            AccountRecord::Standard { label, .. } | AccountRecord::Multisig { label, .. } => {
                label.as_deref()
            }
        }
    }

    pub fn address(&self) -> &str {
        match self {
            AccountRecord::Standard { address, .. } | AccountRecord::Multisig { address, .. } => {
                address
            }
        }
    }

    /// True if `identity` is this record's label or address
    pub fn matches(&self, identity: &str) -> bool {
        self.address() == identity || self.label() == Some(identity)
    }

    /// Rebuild the spendable account from the stored data
    pub fn to_account(&self) -> Result<Account, KeystoreError> {
        let (label, code) = match self {
            AccountRecord::Standard {
                label, public_key, ..
            } => (
                label.clone(),
                standard_redeem_script(&public_key_from_hex(public_key)?),
            ),
            AccountRecord::Multisig {
                label,
                redeem_script,
                ..
            } => (
                label.clone(),
                hex::decode(redeem_script)
                    .map_err(|e| KeystoreError::Corrupted(format!("redeem script: {}", e)))?,
            ),
        };

        let account = Account::from_redeem_script(label, code)?;
        if account.address != self.address() {
            return Err(KeystoreError::Corrupted(format!(
                "address {} does not match its script",
                self.address()
            )));
        }
        Ok(account)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct KeystoreFile {
    version: u32,
    accounts: Vec<AccountRecord>,
}

/// The wallet's account store, bound to one file on disk
pub struct Keystore {
    path: PathBuf,
    accounts: Vec<AccountRecord>,
}

impl Keystore {
    /// Open an existing keystore
    pub fn open(path: &Path) -> Result<Self, KeystoreError> {
        if !path.exists() {
            return Err(KeystoreError::NotFound(path.to_path_buf()));
        }

        let reader = BufReader::new(fs::File::open(path)?);
        let file: KeystoreFile = serde_json::from_reader(reader)?;
        if file.version != KEYSTORE_VERSION {
            return Err(KeystoreError::UnsupportedVersion(file.version));
        }

        debug!(
            "Opened keystore {} with {} account(s)",
            path.display(),
            file.accounts.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            accounts: file.accounts,
        })
    }

    /// Open the keystore at `path`, or start an empty one there
    pub fn open_or_create(path: &Path) -> Result<Self, KeystoreError> {
        if path.exists() {
            Self::open(path)
        } else {
            Ok(Self {
                path: path.to_path_buf(),
                accounts: Vec::new(),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.accounts
    }

    /// All accounts, in creation order
    pub fn accounts(&self) -> Result<Vec<Account>, KeystoreError> {
        self.accounts.iter().map(AccountRecord::to_account).collect()
    }

    /// Find an account by label or address
    pub fn find(&self, identity: &str) -> Option<&AccountRecord> {
        self.accounts.iter().find(|record| record.matches(identity))
    }

    /// Generate a new standard account
    pub fn add_standard(
        &mut self,
        label: Option<String>,
        passphrase: &str,
    ) -> Result<Account, KeystoreError> {
        self.insert_standard(label, KeyPair::generate(), passphrase)
    }

    /// Import an existing private key as a standard account
    pub fn import_standard(
        &mut self,
        label: Option<String>,
        private_key_hex: &str,
        passphrase: &str,
    ) -> Result<Account, KeystoreError> {
        let key = KeyPair::from_private_key_hex(private_key_hex.trim())?;
        self.insert_standard(label, key, passphrase)
    }

    /// Register an M-of-N multisig account from participant public keys
    pub fn add_multisig(
        &mut self,
        label: Option<String>,
        threshold: usize,
        public_keys: &[String],
    ) -> Result<Account, KeystoreError> {
        let keys: Vec<PublicKey> = public_keys
            .iter()
            .map(|k| public_key_from_hex(k.trim()))
            .collect::<Result<_, _>>()?;
        let code = multisig_redeem_script(threshold, &keys)?;
        let account = Account::from_redeem_script(label.clone(), code.clone())?;
        self.ensure_unique(label.as_deref(), &account.address)?;

        let mut sorted: Vec<String> = keys.iter().map(|k| hex::encode(k.serialize())).collect();
        sorted.sort();

        self.accounts.push(AccountRecord::Multisig {
            label,
            address: account.address.clone(),
            redeem_script: hex::encode(&code),
            threshold,
            public_keys: sorted,
            created_at: Utc::now(),
        });

        info!("Added {} account {}", account.kind, account.address);
        Ok(account)
    }

    /// Decrypt the private key of a standard account
    pub fn unlock_key(&self, identity: &str, passphrase: &str) -> Result<KeyPair, KeystoreError> {
        let record = self
            .find(identity)
            .ok_or_else(|| KeystoreError::AccountNotFound(identity.to_string()))?;

        match record {
            AccountRecord::Standard {
                public_key,
                encrypted_key,
                ..
            } => {
                let secret = decrypt_secret(encrypted_key, passphrase)?;
                let key = KeyPair::from_secret_bytes(secret.as_slice())?;
                if key.public_key_hex() != *public_key {
                    return Err(KeystoreError::Corrupted(format!(
                        "key for {} does not match its public key",
                        record.address()
                    )));
                }
                Ok(key)
            }
            AccountRecord::Multisig { address, .. } => {
                Err(KeystoreError::NoPrivateKey(address.clone()))
            }
        }
    }

    /// Write the keystore to disk
    pub fn save(&self) -> Result<(), KeystoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let writer = BufWriter::new(fs::File::create(&temp_path)?);
            let file = KeystoreFile {
                version: KEYSTORE_VERSION,
                accounts: self.accounts.clone(),
            };
            serde_json::to_writer_pretty(writer, &file)?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved keystore to {}", self.path.display());
        Ok(())
    }

    fn insert_standard(
        &mut self,
        label: Option<String>,
        key: KeyPair,
        passphrase: &str,
    ) -> Result<Account, KeystoreError> {
        if passphrase.is_empty() {
            return Err(KeystoreError::EmptyPassphrase);
        }

        let account =
            Account::from_redeem_script(label.clone(), standard_redeem_script(&key.public_key))?;
        self.ensure_unique(label.as_deref(), &account.address)?;

        let encrypted_key = encrypt_secret(&key.secret_bytes()[..], passphrase)?;
        self.accounts.push(AccountRecord::Standard {
            label,
            address: account.address.clone(),
            public_key: key.public_key_hex(),
            encrypted_key,
            created_at: Utc::now(),
        });

        info!("Added standard account {}", account.address);
        Ok(account)
    }

    fn ensure_unique(&self, label: Option<&str>, address: &str) -> Result<(), KeystoreError> {
        if let Some(existing) = self.find(address) {
            return Err(KeystoreError::DuplicateAccount(existing.address().to_string()));
        }
        if let Some(label) = label {
            if self.find(label).is_some() {
                return Err(KeystoreError::DuplicateAccount(label.to_string()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Key encryption
// =============================================================================

fn derive_key(passphrase: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let mut key_bytes = Zeroizing::new([0u8; 32]);
    argon2::Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes[..])
        .map_err(|e| KeystoreError::Encryption(format!("Key derivation failed: {}", e)))?;
    Ok(key_bytes)
}

fn encrypt_secret(secret: &[u8], passphrase: &str) -> Result<EncryptedKey, KeystoreError> {
    let salt: [u8; SALT_LENGTH] = rand::random();
    let nonce_bytes: [u8; NONCE_LENGTH] = rand::random();

    let key_bytes = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key_bytes[..])
        .map_err(|e| KeystoreError::Encryption(format!("Cipher init failed: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), secret)
        .map_err(|e| KeystoreError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedKey {
        salt: BASE64.encode(salt),
        nonce: BASE64.encode(nonce_bytes),
        ciphertext: BASE64.encode(ciphertext),
    })
}

fn decrypt_secret(
    encrypted: &EncryptedKey,
    passphrase: &str,
) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
    let salt = BASE64
        .decode(&encrypted.salt)
        .map_err(|e| KeystoreError::Corrupted(format!("salt: {}", e)))?;
    let nonce_bytes = BASE64
        .decode(&encrypted.nonce)
        .map_err(|e| KeystoreError::Corrupted(format!("nonce: {}", e)))?;
    let ciphertext = BASE64
        .decode(&encrypted.ciphertext)
        .map_err(|e| KeystoreError::Corrupted(format!("ciphertext: {}", e)))?;
    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(KeystoreError::Corrupted("nonce length".to_string()));
    }

    let key_bytes = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key_bytes[..])
        .map_err(|e| KeystoreError::Encryption(format!("Cipher init failed: {}", e)))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| KeystoreError::WrongPassphrase)?;

    Ok(Zeroizing::new(plaintext))
}

// =============================================================================
// Wallet seams
// =============================================================================

impl KeyProvider for Keystore {
    fn unlock(&self, identity: &str, passphrase: &str) -> Result<KeyPair, SignError> {
        self.unlock_key(identity, passphrase).map_err(|e| match e {
            KeystoreError::AccountNotFound(id) => SignError::UnknownSigner(id),
            KeystoreError::NoPrivateKey(id) => SignError::UnknownSigner(id),
            KeystoreError::WrongPassphrase => SignError::InvalidPassphrase,
            other => SignError::Keystore(other.to_string()),
        })
    }
}

impl AddressResolver for Keystore {
    fn resolve(&self, explicit: Option<&str>) -> Result<Account, BuildError> {
        match explicit {
            Some(identity) => {
                let record = self
                    .find(identity)
                    .ok_or_else(|| BuildError::UnknownAccount(identity.to_string()))?;
                record
                    .to_account()
                    .map_err(|e| BuildError::Wallet(e.to_string()))
            }
            None => match self.accounts.as_slice() {
                [only] => only
                    .to_account()
                    .map_err(|e| BuildError::Wallet(e.to_string())),
                _ => Err(BuildError::NoAddressAvailable),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::account::AccountKind;

    const PASS: &str = "correct horse";

    fn temp_store() -> (tempfile::TempDir, Keystore) {
        let dir = tempfile::tempdir().unwrap();
        let store = Keystore::open_or_create(&dir.path().join("keystore.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_and_reopen() {
        let (_dir, mut store) = temp_store();
        let account = store.add_standard(Some("alice".to_string()), PASS).unwrap();
        store.save().unwrap();

        let reopened = Keystore::open(store.path()).unwrap();
        let accounts = reopened.accounts().unwrap();
        assert_eq!(accounts, vec![account.clone()]);
        assert_eq!(reopened.find("alice").unwrap().address(), account.address);

        let key = reopened.unlock_key(&account.address, PASS).unwrap();
        assert_eq!(
            standard_redeem_script(&key.public_key),
            account.redeem_script
        );
    }

    #[test]
    fn test_private_key_is_not_stored_in_clear() {
        let (_dir, mut store) = temp_store();
        let key = KeyPair::generate();
        let secret_hex = hex::encode(&key.secret_bytes()[..]);
        store.import_standard(None, &secret_hex, PASS).unwrap();
        store.save().unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert!(!contents.contains(&secret_hex));
        assert!(contents.contains(&key.public_key_hex()));
    }

    #[test]
    fn test_wrong_passphrase() {
        let (_dir, mut store) = temp_store();
        store.add_standard(Some("alice".to_string()), PASS).unwrap();

        assert!(matches!(
            store.unlock_key("alice", "nope"),
            Err(KeystoreError::WrongPassphrase)
        ));
        assert!(matches!(
            store.unlock("alice", "nope"),
            Err(SignError::InvalidPassphrase)
        ));
        assert!(matches!(
            store.unlock("bob", PASS),
            Err(SignError::UnknownSigner(_))
        ));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let (_dir, mut store) = temp_store();
        assert!(matches!(
            store.add_standard(None, ""),
            Err(KeystoreError::EmptyPassphrase)
        ));
    }

    #[test]
    fn test_duplicates_rejected() {
        let (_dir, mut store) = temp_store();
        let key = KeyPair::generate();
        let secret_hex = hex::encode(&key.secret_bytes()[..]);

        store
            .import_standard(Some("alice".to_string()), &secret_hex, PASS)
            .unwrap();
        assert!(matches!(
            store.import_standard(None, &secret_hex, PASS),
            Err(KeystoreError::DuplicateAccount(_))
        ));
        assert!(matches!(
            store.add_standard(Some("alice".to_string()), PASS),
            Err(KeystoreError::DuplicateAccount(_))
        ));
    }

    #[test]
    fn test_multisig_account() {
        let (_dir, mut store) = temp_store();
        let keys: Vec<String> = (0..3)
            .map(|_| KeyPair::generate().public_key_hex())
            .collect();

        let account = store
            .add_multisig(Some("vault".to_string()), 2, &keys)
            .unwrap();
        assert_eq!(
            account.kind,
            AccountKind::Multisig {
                threshold: 2,
                total: 3
            }
        );

        // Multisig records hold no private key
        assert!(matches!(
            store.unlock_key("vault", PASS),
            Err(KeystoreError::NoPrivateKey(_))
        ));

        // Key order does not change the address
        let mut reversed = keys.clone();
        reversed.reverse();
        assert!(matches!(
            store.add_multisig(None, 2, &reversed),
            Err(KeystoreError::DuplicateAccount(_))
        ));

        assert!(matches!(
            store.add_multisig(None, 4, &keys),
            Err(KeystoreError::Program(ProgramError::InvalidThreshold { .. }))
        ));
    }

    #[test]
    fn test_resolver_default_account() {
        let (_dir, mut store) = temp_store();
        assert!(matches!(
            store.resolve(None),
            Err(BuildError::NoAddressAvailable)
        ));

        let alice = store.add_standard(Some("alice".to_string()), PASS).unwrap();
        assert_eq!(store.resolve(None).unwrap(), alice);

        let bob = store.add_standard(Some("bob".to_string()), PASS).unwrap();
        assert!(matches!(
            store.resolve(None),
            Err(BuildError::NoAddressAvailable)
        ));
        assert_eq!(store.resolve(Some(bob.address.as_str())).unwrap(), bob);
        assert_eq!(store.resolve(Some("alice")).unwrap(), alice);
        assert!(matches!(
            store.resolve(Some("carol")),
            Err(BuildError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_open_missing_keystore() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Keystore::open(&dir.path().join("missing.json")),
            Err(KeystoreError::NotFound(_))
        ));
    }
}
