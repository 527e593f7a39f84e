//! Transaction exchange
//!
//! Partially-signed transactions travel between signers as lowercase hex,
//! either pasted on the command line or stored in a `.txn` file whose name
//! records the signing progress.

pub mod codec;
pub mod file;

pub use codec::{choose_file_name, from_hex, to_hex, CodecError};
pub use file::{read_content, read_transaction, write_transaction, TxSource};
