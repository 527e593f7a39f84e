//! Multi-output batch files
//!
//! One payment per line, `address,amount`, surrounding whitespace allowed,
//! blank lines ignored. The parsed outputs keep file order.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::trace;
use thiserror::Error;

use crate::core::{Amount, AmountError};
use crate::wallet::builder::OutputSpec;

/// Batch file errors
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Invalid multi output line {line}: {content:?}")]
    MalformedLine { line: usize, content: String },
    #[error("Invalid multi output amount on line {line}: {value:?} ({source})")]
    InvalidAmount {
        line: usize,
        value: String,
        source: AmountError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Parse `address,amount` lines into output specs
pub fn load_batch<R: BufRead>(reader: R) -> Result<Vec<OutputSpec>, BatchError> {
    let mut outputs = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut columns = line.split(',');
        let (address, amount) = match (columns.next(), columns.next()) {
            (Some(address), Some(amount)) if !address.trim().is_empty() => {
                (address.trim(), amount.trim())
            }
            _ => {
                return Err(BatchError::MalformedLine {
                    line: number,
                    content: line.clone(),
                })
            }
        };

        let amount: Amount = amount.parse().map_err(|source| BatchError::InvalidAmount {
            line: number,
            value: amount.to_string(),
            source,
        })?;

        trace!("Multi output address: {}, amount: {}", address, amount);
        outputs.push(OutputSpec::new(address, amount));
    }

    Ok(outputs)
}

/// Open and parse a batch file
pub fn load_batch_file(path: &Path) -> Result<Vec<OutputSpec>, BatchError> {
    let file = File::open(path)?;
    load_batch(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn amount(text: &str) -> Amount {
        text.parse().unwrap()
    }

    #[test]
    fn test_parses_in_order_and_skips_blank_lines() {
        let input = "addrA, 1.5\naddrB,2.25\n\n";
        let outputs = load_batch(Cursor::new(input)).unwrap();

        assert_eq!(
            outputs,
            vec![
                OutputSpec::new("addrA", amount("1.5")),
                OutputSpec::new("addrB", amount("2.25")),
            ]
        );
    }

    #[test]
    fn test_whitespace_and_crlf_are_tolerated() {
        let input = "  addrA ,  3  \r\n   \r\naddrB,0.00000001\r\n";
        let outputs = load_batch(Cursor::new(input)).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0], OutputSpec::new("addrA", amount("3")));
        assert_eq!(outputs[1].amount.sela(), 1);
    }

    #[test]
    fn test_malformed_line_reports_content() {
        let result = load_batch(Cursor::new("addrA,1\naddrOnly\n"));
        match result {
            Err(BatchError::MalformedLine { line, content }) => {
                assert_eq!(line, 2);
                assert_eq!(content, "addrOnly");
            }
            other => panic!("expected MalformedLine, got {:?}", other),
        }

        assert!(matches!(
            load_batch(Cursor::new(" ,1.5")),
            Err(BatchError::MalformedLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_amount() {
        let result = load_batch(Cursor::new("addrA,1.5\naddrB,abc\n"));
        match result {
            Err(BatchError::InvalidAmount { line, value, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(value, "abc");
            }
            other => panic!("expected InvalidAmount, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "addrA,1\naddrB,2\n").unwrap();

        let outputs = load_batch_file(file.path()).unwrap();
        assert_eq!(outputs.len(), 2);

        let missing = file.path().with_extension("missing");
        assert!(matches!(load_batch_file(&missing), Err(BatchError::Io(_))));
    }
}
