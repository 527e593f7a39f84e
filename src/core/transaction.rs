//! Transaction model and binary codec
//!
//! Implements a UTXO-based transfer transaction:
//! - Inputs referencing previous outputs
//! - Outputs with a per-output lock height (time-lock)
//! - Attributes (a random nonce keeps identical builds distinct)
//! - Programs carrying the redeem script and collected signatures
//!
//! The unsigned serialization (everything but the programs) is what signers
//! commit to, so adding a signature never changes the transaction hash.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::encoding::{put_var_bytes, put_var_uint, DecodeError, WireReader};
use crate::core::program::{combined_status, Program, ProgramError, SignStatus};
use crate::crypto::{double_sha256, sha256, ProgramHash, PROGRAM_HASH_LENGTH};

// =============================================================================
// Constants
// =============================================================================

/// Transaction type for plain value transfers
pub const TX_TYPE_TRANSFER_ASSET: u8 = 0x02;

/// Current payload version
pub const PAYLOAD_VERSION: u8 = 0;

/// Attribute usage for the random nonce
pub const ATTRIBUTE_NONCE: u8 = 0x00;

/// Default input sequence
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// The chain's native asset, stored in wire (little-endian) order
pub const SYSTEM_ASSET_ID: Hash256 = Hash256([
    0xb0, 0x37, 0xdb, 0x96, 0x4a, 0x23, 0x14, 0x58, 0xd2, 0xd6, 0xff, 0xd5, 0xea, 0x18, 0x94,
    0x4c, 0x4f, 0x90, 0xe6, 0x3d, 0x54, 0x7c, 0x5d, 0x3b, 0x98, 0x74, 0xdf, 0x66, 0xa4, 0xea,
    0xd0, 0xa3,
]);

// Smallest wire size of each repeated element, used to bound counts
const MIN_ATTRIBUTE_SIZE: usize = 2;
const INPUT_SIZE: usize = 32 + 2 + 4;
const OUTPUT_SIZE: usize = 32 + 8 + 4 + PROGRAM_HASH_LENGTH;
const MIN_PROGRAM_SIZE: usize = 2;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Malformed transaction data: {0}")]
    Decode(#[from] DecodeError),
    #[error("Unsupported transaction type: 0x{0:02x}")]
    UnsupportedType(u8),
    #[error("Negative output value: {0}")]
    NegativeValue(i64),
    #[error("Invalid program: {0}")]
    Program(#[from] ProgramError),
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
}

// =============================================================================
// Hash256
// =============================================================================

/// 32-byte hash, displayed byte-reversed like the node does
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Parse the reversed-hex form returned by the node
    pub fn from_reversed_hex(text: &str) -> Result<Self, TransactionError> {
        let invalid = || TransactionError::InvalidHash(text.to_string());
        let mut bytes: [u8; 32] = hex::decode(text.trim())
            .map_err(|_| invalid())?
            .try_into()
            .map_err(|_| invalid())?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    pub fn to_reversed_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_reversed_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_reversed_hex())
    }
}

impl FromStr for Hash256 {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_reversed_hex(s)
    }
}

// =============================================================================
// Attributes, Inputs and Outputs
// =============================================================================

/// Free-form transaction attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub usage: u8,
    pub data: Vec<u8>,
}

impl Attribute {
    /// Random nonce attribute
    pub fn nonce() -> Self {
        Self {
            usage: ATTRIBUTE_NONCE,
            data: rand::random::<[u8; 8]>().to_vec(),
        }
    }
}

/// Transaction input (reference to previous output)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    /// Hash of the transaction holding the spent output
    pub prev_tx: Hash256,
    /// Index of the output in that transaction
    pub prev_index: u16,
    pub sequence: u32,
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub asset_id: Hash256,
    pub value: Amount,
    /// Block height below which the output cannot be spent (0 = unlocked)
    pub output_lock: u32,
    /// Recipient program hash
    pub program_hash: ProgramHash,
}

impl TransactionOutput {
    pub fn new(program_hash: ProgramHash, value: Amount) -> Self {
        Self {
            asset_id: SYSTEM_ASSET_ID,
            value,
            output_lock: 0,
            program_hash,
        }
    }

    /// Recipient address
    pub fn address(&self) -> String {
        self.program_hash.to_address()
    }

    /// Check if this output belongs to the given program hash
    pub fn is_owned_by(&self, program_hash: &ProgramHash) -> bool {
        self.program_hash == *program_hash
    }

    /// Spendable at the given best height
    pub fn is_spendable_at(&self, height: u32) -> bool {
        self.output_lock <= height
    }
}

// =============================================================================
// UTXO
// =============================================================================

/// Unspent Transaction Output (UTXO)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UTXO {
    pub tx_id: Hash256,
    pub output_index: u16,
    pub output: TransactionOutput,
}

// =============================================================================
// Transaction
// =============================================================================

/// A transfer transaction, unsigned or partially signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx_type: u8,
    pub payload_version: u8,
    pub attributes: Vec<Attribute>,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Transaction-level lock time (unused by the builder, kept for the wire format)
    pub lock_time: u32,
    pub programs: Vec<Program>,
}

impl Transaction {
    /// Start a fluent builder
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::new()
    }

    /// Serialize everything signers commit to (no programs)
    pub fn serialize_unsigned(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tx_type);
        buf.put_u8(self.payload_version);

        put_var_uint(buf, self.attributes.len() as u64);
        for attribute in &self.attributes {
            buf.put_u8(attribute.usage);
            put_var_bytes(buf, &attribute.data);
        }

        put_var_uint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.put_slice(&input.prev_tx.0);
            buf.put_u16_le(input.prev_index);
            buf.put_u32_le(input.sequence);
        }

        put_var_uint(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.put_slice(&output.asset_id.0);
            buf.put_i64_le(output.value.sela());
            buf.put_u32_le(output.output_lock);
            buf.put_slice(output.program_hash.as_bytes());
        }

        buf.put_u32_le(self.lock_time);
    }

    /// Full serialization including programs
    pub fn serialize(&self, buf: &mut BytesMut) {
        self.serialize_unsigned(buf);

        put_var_uint(buf, self.programs.len() as u64);
        for program in &self.programs {
            put_var_bytes(buf, &program.parameter);
            put_var_bytes(buf, &program.code);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.serialize(&mut buf);
        buf.to_vec()
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.serialize_unsigned(&mut buf);
        buf.to_vec()
    }

    /// Decode a full serialization, validating every program
    pub fn from_bytes(data: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = WireReader::new(data);

        let tx_type = reader.u8()?;
        if tx_type != TX_TYPE_TRANSFER_ASSET {
            return Err(TransactionError::UnsupportedType(tx_type));
        }
        let payload_version = reader.u8()?;

        let attribute_count = reader.count(MIN_ATTRIBUTE_SIZE)?;
        let mut attributes = Vec::with_capacity(attribute_count);
        for _ in 0..attribute_count {
            let usage = reader.u8()?;
            let data = reader.var_bytes()?;
            attributes.push(Attribute { usage, data });
        }

        let input_count = reader.count(INPUT_SIZE)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TransactionInput {
                prev_tx: Hash256(reader.array()?),
                prev_index: reader.u16_le()?,
                sequence: reader.u32_le()?,
            });
        }

        let output_count = reader.count(OUTPUT_SIZE)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let asset_id = Hash256(reader.array()?);
            let raw_value = reader.i64_le()?;
            let value =
                Amount::from_sela(raw_value).ok_or(TransactionError::NegativeValue(raw_value))?;
            let output_lock = reader.u32_le()?;
            let program_hash = ProgramHash::from_bytes(reader.array()?);
            outputs.push(TransactionOutput {
                asset_id,
                value,
                output_lock,
                program_hash,
            });
        }

        let lock_time = reader.u32_le()?;

        let program_count = reader.count(MIN_PROGRAM_SIZE)?;
        let mut programs = Vec::with_capacity(program_count);
        for _ in 0..program_count {
            let parameter = reader.var_bytes()?;
            let code = reader.var_bytes()?;
            programs.push(Program { code, parameter });
        }

        reader.finish()?;

        let tx = Self {
            tx_type,
            payload_version,
            attributes,
            inputs,
            outputs,
            lock_time,
            programs,
        };
        tx.sign_status()?;
        Ok(tx)
    }

    /// Transaction hash over the unsigned serialization
    pub fn hash(&self) -> Hash256 {
        let digest = double_sha256(&self.unsigned_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Hash256(bytes)
    }

    /// The 32-byte digest every signature commits to
    pub fn signing_data(&self) -> [u8; 32] {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&sha256(&self.unsigned_bytes()));
        digest
    }

    /// Signatures present versus required, summed over all programs
    ///
    /// A transaction without programs has nothing to sign and is never
    /// complete, so it is rejected here rather than reported as `[0/0]`.
    pub fn sign_status(&self) -> Result<SignStatus, ProgramError> {
        if self.programs.is_empty() {
            return Err(ProgramError::MissingPrograms);
        }
        combined_status(&self.programs)
    }

    /// Get total output amount, `None` on overflow
    pub fn total_output(&self) -> Option<Amount> {
        Amount::checked_sum(self.outputs.iter().map(|o| o.value))
    }
}

// =============================================================================
// Transaction Builder
// =============================================================================

/// Fluent builder for assembling a transaction from chosen UTXOs
pub struct TransactionBuilder {
    attributes: Vec<Attribute>,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    output_lock: u32,
    programs: Vec<Program>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_lock: 0,
            programs: Vec::new(),
        }
    }

    /// Add an input from a UTXO
    pub fn add_input(mut self, utxo: &UTXO) -> Self {
        self.inputs.push(TransactionInput {
            prev_tx: utxo.tx_id,
            prev_index: utxo.output_index,
            sequence: SEQUENCE_FINAL,
        });
        self
    }

    /// Add an output paying the native asset
    pub fn add_output(mut self, program_hash: ProgramHash, value: Amount) -> Self {
        self.outputs.push(TransactionOutput::new(program_hash, value));
        self
    }

    /// Lock every output until the given block height
    pub fn output_lock(mut self, height: u32) -> Self {
        self.output_lock = height;
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attach an unsigned program for the given redeem script
    pub fn program(mut self, code: Vec<u8>) -> Self {
        self.programs.push(Program::new(code));
        self
    }

    pub fn build(self) -> Transaction {
        let output_lock = self.output_lock;
        let outputs = self
            .outputs
            .into_iter()
            .map(|output| TransactionOutput {
                output_lock,
                ..output
            })
            .collect();

        Transaction {
            tx_type: TX_TYPE_TRANSFER_ASSET,
            payload_version: PAYLOAD_VERSION,
            attributes: self.attributes,
            inputs: self.inputs,
            outputs,
            lock_time: 0,
            programs: self.programs,
        }
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
