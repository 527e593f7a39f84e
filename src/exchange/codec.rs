//! Hex codec for transactions

use std::io;

use thiserror::Error;

use crate::core::{SignStatus, Transaction, TransactionError};

/// File name for a transaction no one has signed yet
pub const UNSIGNED_FILE_NAME: &str = "to_be_signed.txn";

/// File name for a transaction carrying every required signature
pub const READY_FILE_NAME: &str = "ready_to_send.txn";

/// Exchange errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid hex transaction: {0}")]
    MalformedHex(#[from] hex::FromHexError),
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(#[from] TransactionError),
    #[error("Transaction content is empty")]
    EmptyContent,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Encode the full transaction as lowercase hex
pub fn to_hex(tx: &Transaction) -> String {
    hex::encode(tx.to_bytes())
}

/// Decode a hex transaction, validating its structure and programs
pub fn from_hex(text: &str) -> Result<Transaction, CodecError> {
    let bytes = hex::decode(text.trim())?;
    Ok(Transaction::from_bytes(&bytes)?)
}

/// Name of the file a transaction with this progress is written to
pub fn choose_file_name(status: SignStatus) -> String {
    if status.present == 0 {
        UNSIGNED_FILE_NAME.to_string()
    } else if status.is_complete() {
        READY_FILE_NAME.to_string()
    } else {
        format!("to_be_signed_{}_of_{}.txn", status.present, status.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        multisig_redeem_script, Amount, Attribute, Hash256, TransactionOutput, UTXO,
    };
    use crate::crypto::{KeyPair, ProgramHash};

    fn sample_tx() -> (Transaction, Vec<KeyPair>) {
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let public_keys: Vec<_> = keys.iter().map(|k| k.public_key).collect();
        let code = multisig_redeem_script(2, &public_keys).unwrap();
        let owner = ProgramHash::from_code(&code).unwrap();
        let utxo = UTXO {
            tx_id: Hash256([9u8; 32]),
            output_index: 1,
            output: TransactionOutput::new(owner, Amount::ONE_COIN),
        };
        let tx = Transaction::builder()
            .attribute(Attribute::nonce())
            .add_input(&utxo)
            .add_output(owner, Amount::from_sela(99_990_000).unwrap())
            .output_lock(1200)
            .program(code)
            .build();
        (tx, keys)
    }

    #[test]
    fn test_hex_round_trip_preserves_signatures() {
        let (mut tx, keys) = sample_tx();
        let signature = keys[0].sign(&tx.signing_data()).unwrap();
        tx.programs[0].append_signature(&signature).unwrap();

        let text = to_hex(&tx);
        assert_eq!(text, text.to_lowercase());

        let decoded = from_hex(&text).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.sign_status().unwrap(), SignStatus::new(1, 2));
        assert_eq!(to_hex(&decoded), text);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(from_hex("zz"), Err(CodecError::MalformedHex(_))));
        assert!(matches!(from_hex("abc"), Err(CodecError::MalformedHex(_))));

        let (tx, _) = sample_tx();
        let text = to_hex(&tx);
        let truncated = &text[..text.len() - 4];
        assert!(matches!(
            from_hex(truncated),
            Err(CodecError::MalformedTransaction(_))
        ));

        let padded = format!("{}00", text);
        assert!(matches!(
            from_hex(&padded),
            Err(CodecError::MalformedTransaction(_))
        ));

        let mut unprotected = tx;
        unprotected.programs.clear();
        assert!(matches!(
            from_hex(&to_hex(&unprotected)),
            Err(CodecError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(choose_file_name(SignStatus::new(0, 3)), "to_be_signed.txn");
        assert_eq!(
            choose_file_name(SignStatus::new(1, 3)),
            "to_be_signed_1_of_3.txn"
        );
        assert_eq!(
            choose_file_name(SignStatus::new(2, 3)),
            "to_be_signed_2_of_3.txn"
        );
        assert_eq!(choose_file_name(SignStatus::new(3, 3)), "ready_to_send.txn");
        assert_eq!(choose_file_name(SignStatus::new(1, 1)), "ready_to_send.txn");
    }
}
