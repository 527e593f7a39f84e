//! Spend transaction construction
//!
//! Turns a sender, a set of (address, amount) outputs and a fee into an
//! unsigned transaction. Coins are selected largest-first from the sender's
//! spendable UTXOs, and whatever exceeds outputs + fee returns to the sender
//! as a change output, so `sum(inputs) == sum(outputs) + fee` always holds.
//!
//! The builder owns no wallet state: the sender is resolved through an
//! [`AddressResolver`] and coins come from a [`UtxoSource`].

use std::cmp::Reverse;

use log::debug;
use thiserror::Error;

use crate::core::{Amount, Attribute, ProgramError, Transaction, UTXO};
use crate::crypto::{AddressError, ProgramHash};
use crate::wallet::account::Account;

/// Transaction construction errors
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{0} must be greater than zero")]
    NonPositiveAmount(String),
    #[error("No outputs to pay")]
    EmptyOutputSet,
    #[error("No sender address available; use --from to choose one")]
    NoAddressAvailable,
    #[error("Address is not in this wallet: {0}")]
    UnknownAccount(String),
    #[error("Invalid address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: AddressError,
    },
    #[error("Invalid lock height: {0:?}")]
    InvalidLockHeight(String),
    #[error("Insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: Amount, required: Amount },
    #[error("Amount overflow while totalling outputs")]
    AmountOverflow,
    #[error("UTXO source error: {0}")]
    Source(String),
    #[error("Wallet error: {0}")]
    Wallet(String),
    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
}

/// One payment: destination address and amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub address: String,
    pub amount: Amount,
}

impl OutputSpec {
    pub fn new(address: impl Into<String>, amount: Amount) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Resolves the sending account
pub trait AddressResolver {
    /// Look up `explicit` when given, otherwise return the default account
    /// or fail with [`BuildError::NoAddressAvailable`]
    fn resolve(&self, explicit: Option<&str>) -> Result<Account, BuildError>;
}

/// Supplies unspent outputs and the chain height they are judged against
pub trait UtxoSource {
    fn best_height(&self) -> Result<u32, BuildError>;

    fn unspent_outputs(&self, owner: &ProgramHash) -> Result<Vec<UTXO>, BuildError>;
}

/// Parse a lock height given on the command line
pub fn parse_lock_height(text: &str) -> Result<u32, BuildError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BuildError::InvalidLockHeight(text.to_string()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| BuildError::InvalidLockHeight(text.to_string()))
}

/// Builds unsigned spend transactions
pub struct SpendBuilder<'a, R: AddressResolver, U: UtxoSource> {
    resolver: &'a R,
    utxos: &'a U,
}

impl<'a, R: AddressResolver, U: UtxoSource> SpendBuilder<'a, R, U> {
    pub fn new(resolver: &'a R, utxos: &'a U) -> Self {
        Self { resolver, utxos }
    }

    /// Pay a single recipient
    pub fn build_single(
        &self,
        from: Option<&str>,
        to: &str,
        amount: Amount,
        fee: Amount,
        lock_height: Option<u32>,
    ) -> Result<Transaction, BuildError> {
        if !amount.is_positive() {
            return Err(BuildError::NonPositiveAmount("amount".to_string()));
        }
        self.build_multi_output(from, fee, &[OutputSpec::new(to, amount)], lock_height)
    }

    /// Pay several recipients in one transaction, in the given order
    pub fn build_multi_output(
        &self,
        from: Option<&str>,
        fee: Amount,
        outputs: &[OutputSpec],
        lock_height: Option<u32>,
    ) -> Result<Transaction, BuildError> {
        if !fee.is_positive() {
            return Err(BuildError::NonPositiveAmount("fee".to_string()));
        }
        if outputs.is_empty() {
            return Err(BuildError::EmptyOutputSet);
        }

        let mut payees = Vec::with_capacity(outputs.len());
        for spec in outputs {
            if !spec.amount.is_positive() {
                return Err(BuildError::NonPositiveAmount(format!(
                    "amount for {}",
                    spec.address
                )));
            }
            let program_hash = ProgramHash::from_address(&spec.address).map_err(|source| {
                BuildError::InvalidAddress {
                    address: spec.address.clone(),
                    source,
                }
            })?;
            payees.push((program_hash, spec.amount));
        }

        let target = Amount::checked_sum(outputs.iter().map(|o| o.amount))
            .and_then(|total| total.checked_add(fee))
            .ok_or(BuildError::AmountOverflow)?;

        let account = self.resolver.resolve(from)?;
        let height = self.utxos.best_height()?;
        let spendable: Vec<UTXO> = self
            .utxos
            .unspent_outputs(&account.program_hash)?
            .into_iter()
            .filter(|utxo| utxo.output.is_spendable_at(height))
            .collect();

        let (selected, selected_total) = select_coins(spendable, target)?;
        let change = selected_total
            .checked_sub(target)
            .ok_or(BuildError::AmountOverflow)?;

        debug!(
            "Selected {} input(s) worth {} from {} for target {} (change {})",
            selected.len(),
            selected_total,
            account.address,
            target,
            change
        );

        let mut builder = Transaction::builder().attribute(Attribute::nonce());
        for utxo in &selected {
            builder = builder.add_input(utxo);
        }
        for (program_hash, amount) in payees {
            builder = builder.add_output(program_hash, amount);
        }
        if change.is_positive() {
            builder = builder.add_output(account.program_hash, change);
        }

        Ok(builder
            .output_lock(lock_height.unwrap_or(0))
            .program(account.redeem_script)
            .build())
    }
}

/// Largest-first coin selection
///
/// Ties are broken by transaction hash and output index so the same UTXO set
/// always yields the same inputs.
fn select_coins(mut utxos: Vec<UTXO>, target: Amount) -> Result<(Vec<UTXO>, Amount), BuildError> {
    utxos.sort_by_key(|u| (Reverse(u.output.value), u.tx_id, u.output_index));

    let mut selected = Vec::new();
    let mut total = Amount::ZERO;

    for utxo in utxos.iter() {
        if total >= target {
            break;
        }
        total = total
            .checked_add(utxo.output.value)
            .ok_or(BuildError::AmountOverflow)?;
        selected.push(utxo.clone());
    }

    if total < target {
        return Err(BuildError::InsufficientFunds {
            available: total,
            required: target,
        });
    }

    Ok((selected, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{standard_redeem_script, Hash256, TransactionOutput};
    use crate::crypto::KeyPair;

    struct SingleAccount(Account);

    impl AddressResolver for SingleAccount {
        fn resolve(&self, explicit: Option<&str>) -> Result<Account, BuildError> {
            match explicit {
                Some(address) if address != self.0.address => {
                    Err(BuildError::UnknownAccount(address.to_string()))
                }
                _ => Ok(self.0.clone()),
            }
        }
    }

    struct EmptyWallet;

    impl AddressResolver for EmptyWallet {
        fn resolve(&self, _explicit: Option<&str>) -> Result<Account, BuildError> {
            Err(BuildError::NoAddressAvailable)
        }
    }

    struct MemoryUtxos {
        height: u32,
        utxos: Vec<UTXO>,
    }

    impl UtxoSource for MemoryUtxos {
        fn best_height(&self) -> Result<u32, BuildError> {
            Ok(self.height)
        }

        fn unspent_outputs(&self, owner: &ProgramHash) -> Result<Vec<UTXO>, BuildError> {
            Ok(self
                .utxos
                .iter()
                .filter(|u| u.output.is_owned_by(owner))
                .cloned()
                .collect())
        }
    }

    fn amount(text: &str) -> Amount {
        text.parse().unwrap()
    }

    fn new_account() -> Account {
        let key = KeyPair::generate();
        Account::from_redeem_script(None, standard_redeem_script(&key.public_key)).unwrap()
    }

    fn funded(account: &Account, values: &[&str]) -> MemoryUtxos {
        let utxos = values
            .iter()
            .enumerate()
            .map(|(i, value)| UTXO {
                tx_id: Hash256([i as u8 + 1; 32]),
                output_index: 0,
                output: TransactionOutput::new(account.program_hash, amount(value)),
            })
            .collect();
        MemoryUtxos { height: 10, utxos }
    }

    fn input_total(tx: &Transaction, source: &MemoryUtxos) -> Amount {
        Amount::checked_sum(tx.inputs.iter().map(|input| {
            source
                .utxos
                .iter()
                .find(|u| u.tx_id == input.prev_tx && u.output_index == input.prev_index)
                .unwrap()
                .output
                .value
        }))
        .unwrap()
    }

    #[test]
    fn test_single_output_conserves_funds() {
        let sender = new_account();
        let recipient = new_account();
        let source = funded(&sender, &["3", "5", "1"]);
        let resolver = SingleAccount(sender.clone());
        let builder = SpendBuilder::new(&resolver, &source);

        let fee = amount("0.001");
        let tx = builder
            .build_single(None, &recipient.address, amount("6"), fee, None)
            .unwrap();

        // Largest-first: 5 then 3
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].program_hash, recipient.program_hash);
        assert_eq!(tx.outputs[1].program_hash, sender.program_hash);
        assert_eq!(tx.outputs[1].value, amount("1.999"));

        let outputs_plus_fee = tx.total_output().unwrap().checked_add(fee).unwrap();
        assert_eq!(input_total(&tx, &source), outputs_plus_fee);
        assert_eq!(tx.programs.len(), 1);
        assert_eq!(tx.programs[0].code, sender.redeem_script);
        assert_eq!(tx.sign_status().unwrap().present, 0);
    }

    #[test]
    fn test_exact_spend_has_no_change() {
        let sender = new_account();
        let recipient = new_account();
        let source = funded(&sender, &["2"]);
        let resolver = SingleAccount(sender);
        let builder = SpendBuilder::new(&resolver, &source);

        let tx = builder
            .build_single(None, &recipient.address, amount("1.9"), amount("0.1"), None)
            .unwrap();
        assert_eq!(tx.outputs.len(), 1);
    }

    #[test]
    fn test_multi_output_preserves_order() {
        let sender = new_account();
        let (a, b) = (new_account(), new_account());
        let source = funded(&sender, &["10"]);
        let resolver = SingleAccount(sender);
        let builder = SpendBuilder::new(&resolver, &source);

        let outputs = vec![
            OutputSpec::new(a.address.clone(), amount("1.5")),
            OutputSpec::new(b.address.clone(), amount("2.25")),
        ];
        let fee = amount("0.01");
        let tx = builder
            .build_multi_output(None, fee, &outputs, None)
            .unwrap();

        assert_eq!(tx.outputs[0].program_hash, a.program_hash);
        assert_eq!(tx.outputs[1].program_hash, b.program_hash);
        assert_eq!(
            input_total(&tx, &source),
            tx.total_output().unwrap().checked_add(fee).unwrap()
        );
    }

    #[test]
    fn test_insufficient_funds() {
        let sender = new_account();
        let recipient = new_account();
        let source = funded(&sender, &["1", "1"]);
        let resolver = SingleAccount(sender);
        let builder = SpendBuilder::new(&resolver, &source);

        let result = builder.build_single(None, &recipient.address, amount("2"), amount("0.1"), None);
        match result {
            Err(BuildError::InsufficientFunds {
                available,
                required,
            }) => {
                assert_eq!(available, amount("2"));
                assert_eq!(required, amount("2.1"));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
    }

    #[test]
    fn test_locked_utxos_are_not_spendable() {
        let sender = new_account();
        let recipient = new_account();
        let mut source = funded(&sender, &["5", "1"]);
        source.utxos[0].output.output_lock = 500;
        let resolver = SingleAccount(sender);
        let builder = SpendBuilder::new(&resolver, &source);

        let result = builder.build_single(None, &recipient.address, amount("2"), amount("0.1"), None);
        assert!(matches!(result, Err(BuildError::InsufficientFunds { .. })));
    }

    #[test]
    fn test_lock_height_on_every_output() {
        let sender = new_account();
        let recipient = new_account();
        let source = funded(&sender, &["5"]);
        let resolver = SingleAccount(sender);
        let builder = SpendBuilder::new(&resolver, &source);

        let locked = builder
            .build_single(None, &recipient.address, amount("1"), amount("0.1"), Some(100))
            .unwrap();
        assert_eq!(locked.outputs.len(), 2);
        assert!(locked.outputs.iter().all(|o| o.output_lock == 100));

        let unlocked = builder
            .build_single(None, &recipient.address, amount("1"), amount("0.1"), None)
            .unwrap();
        assert!(unlocked.outputs.iter().all(|o| o.output_lock == 0));
    }

    #[test]
    fn test_input_validation() {
        let sender = new_account();
        let recipient = new_account();
        let source = funded(&sender, &["5"]);
        let resolver = SingleAccount(sender);
        let builder = SpendBuilder::new(&resolver, &source);

        assert!(matches!(
            builder.build_single(None, &recipient.address, Amount::ZERO, amount("0.1"), None),
            Err(BuildError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            builder.build_single(None, &recipient.address, amount("1"), Amount::ZERO, None),
            Err(BuildError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            builder.build_multi_output(None, amount("0.1"), &[], None),
            Err(BuildError::EmptyOutputSet)
        ));
        assert!(matches!(
            builder.build_single(None, "addrA", amount("1"), amount("0.1"), None),
            Err(BuildError::InvalidAddress { .. })
        ));
        assert!(matches!(
            builder.build_single(Some("Eunknown"), &recipient.address, amount("1"), amount("0.1"), None),
            Err(BuildError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_no_address_available() {
        let recipient = new_account();
        let source = MemoryUtxos {
            height: 0,
            utxos: vec![],
        };
        let builder = SpendBuilder::new(&EmptyWallet, &source);

        assert!(matches!(
            builder.build_single(None, &recipient.address, amount("1"), amount("0.1"), None),
            Err(BuildError::NoAddressAvailable)
        ));
    }

    #[test]
    fn test_parse_lock_height() {
        assert_eq!(parse_lock_height("100").unwrap(), 100);
        assert_eq!(parse_lock_height("4294967295").unwrap(), u32::MAX);
        for text in ["", "abc", "-1", "+5", "4294967296", "1.5"] {
            assert!(matches!(
                parse_lock_height(text),
                Err(BuildError::InvalidLockHeight(_))
            ));
        }
    }
}
