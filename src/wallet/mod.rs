use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde::Serialize;

use crate::blockchain::Block;
use crate::crypto::digest_bytes;
use crate::error::WalletError;
use crate::transaction::Transaction;

/// Balance of an address that has never appeared in the chain.
pub const STARTING_BALANCE: u64 = 1000;

/// A secp256k1 keypair. The address is the hex of the compressed public key.
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    pub public_key: String,
    /// Last balance computed for this wallet; refreshed from the chain when
    /// a transaction is created.
    pub balance: u64,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key: hex::encode(public_key.serialize()),
            balance: STARTING_BALANCE,
        }
    }

    /// Sign the hash of `data`; returns a hex-encoded DER signature.
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<String, WalletError> {
        let digest = digest_bytes(&crate::crypto_hash!(data))
            .ok_or_else(|| WalletError::Signing("digest is not 32 bytes".into()))?;
        let msg = Message::from_digest_slice(&digest)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        let secp = Secp256k1::signing_only();
        let sig = secp.sign_ecdsa(&msg, &self.secret_key);
        Ok(hex::encode(sig.serialize_der().to_vec()))
    }

    /// Build a transaction to `recipient`. With a chain, the balance is
    /// recomputed from it first.
    pub fn create_transaction(
        &mut self,
        recipient: &str,
        amount: u64,
        chain: Option<&[Block]>,
    ) -> Result<Transaction, WalletError> {
        if let Some(chain) = chain {
            self.balance = Self::calculate_balance(chain, &self.public_key);
        }
        if amount > self.balance {
            return Err(WalletError::InsufficientFunds {
                amount,
                balance: self.balance,
            });
        }
        Transaction::new(self, recipient, amount)
    }

    /// Balance of `address` derived from chain history.
    ///
    /// Walks blocks newest to oldest (genesis excluded) summing outputs to
    /// `address`. The walk stops after the newest block in which `address`
    /// authored a transaction: that transaction's change output already
    /// accounts for everything older. If no such block exists the starting
    /// balance is added.
    pub fn calculate_balance(chain: &[Block], address: &str) -> u64 {
        let mut has_conducted_transaction = false;
        let mut total: u64 = 0;

        for block in chain.iter().skip(1).rev() {
            for tx in &block.data {
                if tx.input.address == address {
                    has_conducted_transaction = true;
                }
                if let Some(amount) = tx.output_map.get(address) {
                    total = total.saturating_add(*amount);
                }
            }
            if has_conducted_transaction {
                break;
            }
        }

        if has_conducted_transaction {
            total
        } else {
            STARTING_BALANCE.saturating_add(total)
        }
    }
}

/// Verify a hex DER signature over the hash of `data` under a hex public key.
/// Malformed keys or signatures count as a failed verification.
pub fn verify_signature<T: Serialize + ?Sized>(public_key_hex: &str, data: &T, sig_hex: &str) -> bool {
    let Some(digest) = digest_bytes(&crate::crypto_hash!(data)) else {
        return false;
    };
    let Ok(msg) = Message::from_digest_slice(&digest) else {
        return false;
    };
    let Ok(pk_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(public_key) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&msg, &sig, &public_key).is_ok()
}
