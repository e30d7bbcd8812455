//! Transaction structure

use rollup_smt::{FieldElement, FieldHasher};
use serde::{Deserialize, Serialize};

use crate::signature::{PrivateKey, PublicKey, Signature, SignatureScheme};
use crate::types::{AccountIndex, Amount, Hasher, Nonce, TokenType};

/// Signed transfer between two accounts.
///
/// A transfer to the `(0, 0)` key is a withdrawal: the funds leave the
/// rollup and can later be claimed on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender key
    pub from: PublicKey,
    /// Sender leaf index
    pub from_index: AccountIndex,
    /// Receiver key
    pub to: PublicKey,
    /// Receiver leaf index
    pub to_index: AccountIndex,
    /// Sender's nonce at signing time
    pub nonce: Nonce,
    /// Amount to transfer
    #[serde(with = "crate::types::decimal_amount")]
    pub amount: Amount,
    /// Token being moved
    pub token_type: TokenType,
    /// Sender's signature over [`Transaction::hash`]
    #[serde(default)]
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Create an unsigned transfer
    pub fn transfer(
        from: PublicKey,
        from_index: AccountIndex,
        to: PublicKey,
        to_index: AccountIndex,
        nonce: Nonce,
        amount: Amount,
        token_type: TokenType,
    ) -> Self {
        Self {
            from,
            from_index,
            to,
            to_index,
            nonce,
            amount,
            token_type,
            signature: None,
        }
    }

    /// Create an unsigned withdrawal towards the zero-address account at `zero_index`
    pub fn withdrawal(
        from: PublicKey,
        from_index: AccountIndex,
        zero_index: AccountIndex,
        nonce: Nonce,
        amount: Amount,
        token_type: TokenType,
    ) -> Self {
        Self::transfer(from, from_index, PublicKey::zero(), zero_index, nonce, amount, token_type)
    }

    /// Compute transaction hash.
    ///
    /// Two-phase sub-leaf hashing:
    /// `H2(H4(from_x, from_y, to_x, to_y), H4(from_index, nonce, amount, token_type))`.
    /// `to_index` is not committed.
    pub fn hash(&self) -> FieldElement {
        let left = Hasher::hash4(&[self.from.x, self.from.y, self.to.x, self.to.y]);
        let right = Hasher::hash4(&[
            FieldElement::from(self.from_index),
            FieldElement::from(self.nonce),
            FieldElement::from(self.amount),
            FieldElement::from(self.token_type),
        ]);
        Hasher::hash2(&left, &right)
    }

    /// Whether this moves funds out of the rollup
    pub fn is_withdrawal(&self) -> bool {
        self.to.is_zero()
    }

    /// Sign the transaction hash with the sender's key
    pub fn sign<S: SignatureScheme + ?Sized>(&mut self, scheme: &S, key: &PrivateKey) {
        self.signature = Some(scheme.sign(key, &self.hash()));
    }

    /// Builder-style [`Transaction::sign`]
    pub fn signed<S: SignatureScheme + ?Sized>(mut self, scheme: &S, key: &PrivateKey) -> Self {
        self.sign(scheme, key);
        self
    }

    /// Whether the attached signature verifies against `from`
    pub fn check_signature<S: SignatureScheme + ?Sized>(&self, scheme: &S) -> bool {
        self.signature
            .as_ref()
            .is_some_and(|signature| scheme.verify(&self.hash(), signature, &self.from))
    }
}

/// Message a withdrawer signs to name the on-chain recipient: `H2(nonce, recipient)`
pub fn withdrawal_message(nonce: Nonce, recipient: &FieldElement) -> FieldElement {
    Hasher::hash2(&FieldElement::from(nonce), recipient)
}
