use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::REWARD_INPUT_ADDRESS;
use crate::blockchain::MINING_REWARD;
use crate::error::{TransactionError, WalletError};
use crate::wallet::{Wallet, verify_signature};

/// Recipient address -> amount. Ordered so the signed payload is canonical.
pub type OutputMap = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub timestamp: i64,
    /// Sender balance at signing time; equals the total of the outputs.
    pub amount: u64,
    pub address: String,
    /// Hex-encoded DER ECDSA signature over the output map hash
    pub signature: String,
}

impl TxInput {
    /// The constant, unsigned input of every reward transaction.
    pub fn reward() -> Self {
        Self {
            timestamp: 0,
            amount: 0,
            address: REWARD_INPUT_ADDRESS.to_string(),
            signature: String::new(),
        }
    }
}

/// A signed transfer from one sender to one or more recipients, or an
/// unsigned mining reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub input: TxInput,
    pub output_map: OutputMap,
}

impl Transaction {
    /// Build and sign a transfer of `amount` from the wallet's current balance.
    pub fn new(sender: &Wallet, recipient: &str, amount: u64) -> Result<Self, WalletError> {
        let balance = sender.balance;
        if amount > balance {
            return Err(WalletError::InsufficientFunds { amount, balance });
        }

        let mut output_map = OutputMap::new();
        output_map.insert(recipient.to_string(), amount);
        output_map.insert(sender.public_key.clone(), balance - amount);

        let input = Self::create_input(sender, balance, &output_map)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            input,
            output_map,
        })
    }

    fn create_input(
        sender: &Wallet,
        amount: u64,
        output_map: &OutputMap,
    ) -> Result<TxInput, WalletError> {
        Ok(TxInput {
            timestamp: Utc::now().timestamp_millis(),
            amount,
            address: sender.public_key.clone(),
            signature: sender.sign(output_map)?,
        })
    }

    /// Amend this pending transaction with one more transfer.
    ///
    /// The spendable amount is the sender's own remainder in the output map,
    /// not the chain balance. The input amount is left as is; the outputs are
    /// re-signed.
    pub fn update(&mut self, sender: &Wallet, recipient: &str, amount: u64) -> Result<(), WalletError> {
        let remainder = self
            .output_map
            .get(&sender.public_key)
            .copied()
            .unwrap_or(0);
        if amount > remainder {
            return Err(WalletError::InsufficientFunds {
                amount,
                balance: remainder,
            });
        }

        let mut output_map = self.output_map.clone();
        *output_map.entry(recipient.to_string()).or_insert(0) += amount;
        *output_map.entry(sender.public_key.clone()).or_insert(0) -= amount;

        let input = Self::create_input(sender, self.input.amount, &output_map)?;
        self.output_map = output_map;
        self.input = input;
        Ok(())
    }

    /// Mining reward for `miner`.
    pub fn reward(miner: &Wallet) -> Self {
        Self::reward_to(&miner.public_key)
    }

    pub fn reward_to(address: &str) -> Self {
        let mut output_map = OutputMap::new();
        output_map.insert(address.to_string(), MINING_REWARD);
        Self {
            id: Uuid::new_v4().to_string(),
            input: TxInput::reward(),
            output_map,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.input.address == REWARD_INPUT_ADDRESS
    }

    pub fn total_output_amount(&self) -> u128 {
        self.output_map.values().map(|a| *a as u128).sum()
    }

    /// Outputs must add up to the input amount and the signature must verify
    /// over the output map under the input address.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let outputs = self.total_output_amount();
        if outputs != self.input.amount as u128 {
            return Err(TransactionError::OutputTotalMismatch {
                id: self.id.clone(),
                input: self.input.amount,
                outputs,
            });
        }

        if !verify_signature(&self.input.address, &self.output_map, &self.input.signature) {
            return Err(TransactionError::InvalidSignature {
                id: self.id.clone(),
                address: self.input.address.clone(),
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Wallet, Transaction) {
        let sender = Wallet::new();
        let tx = Transaction::new(&sender, "recipient-public-key", 50).unwrap();
        (sender, tx)
    }

    #[test]
    fn outputs_amount_to_recipient_and_remainder_to_sender() {
        let (sender, tx) = setup();
        assert!(!tx.id.is_empty());
        assert_eq!(tx.output_map["recipient-public-key"], 50);
        assert_eq!(tx.output_map[&sender.public_key], sender.balance - 50);
    }

    #[test]
    fn input_carries_balance_address_and_signature() {
        let (sender, tx) = setup();
        assert!(tx.input.timestamp > 0);
        assert_eq!(tx.input.amount, sender.balance);
        assert_eq!(tx.input.address, sender.public_key);
        assert!(verify_signature(
            &sender.public_key,
            &tx.output_map,
            &tx.input.signature
        ));
    }

    #[test]
    fn valid_transaction_passes() {
        let (_, tx) = setup();
        assert_eq!(tx.validate(), Ok(()));
        assert!(tx.is_valid());
    }

    #[test]
    fn tampered_output_fails_validation() {
        let (sender, mut tx) = setup();
        tx.output_map.insert(sender.public_key.clone(), 999_999);
        assert!(matches!(
            tx.validate(),
            Err(TransactionError::OutputTotalMismatch { .. })
        ));
    }

    #[test]
    fn foreign_signature_fails_validation() {
        let (_, mut tx) = setup();
        tx.input.signature = Wallet::new().sign("fake data").unwrap();
        assert!(matches!(
            tx.validate(),
            Err(TransactionError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn update_rejects_amount_over_remainder() {
        let (sender, mut tx) = setup();
        let err = tx.update(&sender, "foo-recipient", 999_999).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    }

    #[test]
    fn update_adds_recipient_and_resigns() {
        let (sender, mut tx) = setup();
        let original_signature = tx.input.signature.clone();
        let original_remainder = tx.output_map[&sender.public_key];

        tx.update(&sender, "next-recipient", 50).unwrap();

        assert_eq!(tx.output_map["next-recipient"], 50);
        assert_eq!(tx.output_map[&sender.public_key], original_remainder - 50);
        assert_eq!(tx.total_output_amount(), tx.input.amount as u128);
        assert_ne!(tx.input.signature, original_signature);
        assert!(tx.is_valid());
    }

    #[test]
    fn update_accumulates_for_the_same_recipient() {
        let (sender, mut tx) = setup();
        let original_remainder = tx.output_map[&sender.public_key];

        tx.update(&sender, "same-recipient", 80).unwrap();
        tx.update(&sender, "same-recipient", 80).unwrap();

        assert_eq!(tx.output_map["same-recipient"], 160);
        assert_eq!(tx.output_map[&sender.public_key], original_remainder - 160);
        assert!(tx.is_valid());
    }

    #[test]
    fn reward_uses_the_reward_input_and_mining_reward() {
        let miner = Wallet::new();
        let reward = Transaction::reward(&miner);
        assert_eq!(reward.input, TxInput::reward());
        assert!(reward.is_reward());
        assert_eq!(reward.output_map[&miner.public_key], MINING_REWARD);
        assert_eq!(reward.output_map.len(), 1);
    }

    #[test]
    fn serializes_with_camel_case_output_map() {
        let (_, tx) = setup();
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("outputMap").is_some());
        assert!(json["input"].get("signature").is_some());
    }
}
