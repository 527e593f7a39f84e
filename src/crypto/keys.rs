//! ECDSA key management
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve. Signatures are RFC6979 deterministic,
//! so the same key over the same digest always yields the same bytes.
//! Callers hash their data first; only 32-byte digests are signed.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of a compact ECDSA signature
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of a compressed public key
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
///
/// The secret is overwritten when the pair is dropped.
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from raw secret bytes
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes =
            Zeroizing::new(hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?);
        Self::from_secret_bytes(&bytes)
    }

    /// Raw secret bytes, wrapped so the copy is scrubbed on drop
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret_key.secret_bytes())
    }

    /// Compressed public key bytes
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.public_key.serialize()
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a 32-byte digest with the private key
    pub fn sign(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_LENGTH], KeyError> {
        sign_message(&self.secret_key, digest)
    }

    /// Verify a signature over `digest` against this key pair's public key
    pub fn verify(&self, digest: &[u8; 32], signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(&self.public_key, digest, signature)
    }

    fn erase(&mut self) {
        self.secret_key.non_secure_erase();
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.erase();
    }
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPublicKey)?;
    public_key_from_slice(&bytes)
}

/// Parse a compressed or uncompressed public key
pub fn public_key_from_slice(bytes: &[u8]) -> Result<PublicKey, KeyError> {
    PublicKey::from_slice(bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a digest with a secret key, returning the compact signature
pub fn sign_message(
    secret_key: &SecretKey,
    digest: &[u8; 32],
) -> Result<[u8; SIGNATURE_LENGTH], KeyError> {
    let secp = Secp256k1::signing_only();
    let digest = Message::from_digest_slice(digest)?;
    let signature = secp.sign_ecdsa(&digest, secret_key);
    Ok(signature.serialize_compact())
}

/// Verify a compact signature over `digest` against a public key
pub fn verify_signature(
    public_key: &PublicKey,
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::verification_only();
    let digest = Message::from_digest_slice(digest)?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    Ok(secp.verify_ecdsa(&digest, &sig, public_key).is_ok())
}
