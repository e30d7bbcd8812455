//! Withdrawal claims and replay protection

use std::collections::HashSet;

use rollup_smt::{FieldElement, MerkleProof};
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher as _, Keccak};
use tracing::debug;

use crate::error::{Result, RollupError};
use crate::signature::Signature;
use crate::tx::Transaction;
use crate::types::{Amount, TokenType};

/// Key under which a claim is voided: `keccak256(tx_hash || positions || siblings)`.
///
/// Field elements are hashed as 32-byte big-endian words and each position
/// bit as one byte, so a different proof for the same leaf is a different key.
pub fn void_key(tx_hash: &FieldElement, proof: &MerkleProof) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(&tx_hash.to_be_bytes());
    hasher.update(&proof.positions);
    for sibling in &proof.siblings {
        hasher.update(&sibling.to_be_bytes());
    }
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Set of consumed withdrawal claims. Entries are never removed.
#[derive(Clone, Debug, Default)]
pub struct WithdrawalVoidTracker {
    voided: HashSet<[u8; 32]>,
}

impl WithdrawalVoidTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the claim `(tx_hash, proof)` was already consumed
    pub fn is_voided(&self, tx_hash: &FieldElement, proof: &MerkleProof) -> bool {
        self.voided.contains(&void_key(tx_hash, proof))
    }

    /// Consume the claim. Fails with [`RollupError::AlreadyVoided`] on replay.
    pub fn mark_voided(&mut self, tx_hash: &FieldElement, proof: &MerkleProof) -> Result<[u8; 32]> {
        let key = void_key(tx_hash, proof);
        if !self.voided.insert(key) {
            return Err(RollupError::AlreadyVoided(hex::encode(key)));
        }
        debug!(key = %hex::encode(key), "withdrawal voided");
        Ok(key)
    }

    /// Number of consumed claims
    pub fn len(&self) -> usize {
        self.voided.len()
    }

    /// Whether nothing has been voided yet
    pub fn is_empty(&self) -> bool {
        self.voided.is_empty()
    }
}

/// A claim to release funds sent to the zero account by a committed batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// The withdrawal transaction as included in the batch
    pub tx: Transaction,
    /// Root of the batch's transaction tree
    pub tx_root: FieldElement,
    /// Membership proof of `tx` under `tx_root`
    pub proof: MerkleProof,
    /// On-chain recipient, usually a 20-byte address as a field element
    pub recipient: FieldElement,
    /// Sender's signature over [`crate::withdrawal_message`]
    pub signature: Signature,
}

/// Outcome of an accepted withdrawal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// Hash of the withdrawn transaction
    pub tx_hash: FieldElement,
    /// Hex-encoded void key
    pub void_key: String,
    /// Recipient of the released funds
    pub recipient: FieldElement,
    /// Released amount
    #[serde(with = "crate::types::decimal_amount")]
    pub amount: Amount,
    /// Released token
    pub token_type: TokenType,
}
