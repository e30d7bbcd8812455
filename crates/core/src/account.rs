//! Account leaves

use rollup_smt::{FieldElement, FieldHasher};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RollupError};
use crate::signature::PublicKey;
use crate::types::{AccountIndex, Amount, Hasher, Nonce, TokenType};

/// Canonical account state stored at one leaf of the account tree
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLeaf {
    /// Leaf position, fixed once assigned
    pub index: AccountIndex,
    /// Owner key
    pub pubkey: PublicKey,
    /// Token balance
    #[serde(with = "crate::types::decimal_amount")]
    pub balance: Amount,
    /// Number of transactions sent
    pub nonce: Nonce,
    /// Token held by the account, 0 while unset
    pub token_type: TokenType,
}

impl AccountLeaf {
    /// Fresh account with nonce 0
    pub fn new(index: AccountIndex, pubkey: PublicKey, balance: Amount, token_type: TokenType) -> Self {
        Self {
            index,
            pubkey,
            balance,
            nonce: 0,
            token_type,
        }
    }

    /// Leaf hash `H5(pubkey_x, pubkey_y, balance, nonce, token_type)`, the
    /// same preimage the deposit contract hashes.
    pub fn hash(&self) -> FieldElement {
        Hasher::hash5(&[
            self.pubkey.x,
            self.pubkey.y,
            FieldElement::from(self.balance),
            FieldElement::from(self.nonce),
            FieldElement::from(self.token_type),
        ])
    }

    /// Hash of the all-zero account, `Z[0]` of the account tree
    pub fn zero_hash() -> FieldElement {
        Self::default().hash()
    }

    /// Debit `amount` and bump the nonce
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(RollupError::InsufficientBalance {
                index: self.index,
                required: amount,
                available: self.balance,
            })?;
        self.nonce = self
            .nonce
            .checked_add(1)
            .ok_or_else(|| RollupError::MalformedInput(format!("nonce overflow in account {}", self.index)))?;
        Ok(())
    }

    /// Credit `amount`
    pub fn credit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| RollupError::MalformedInput(format!("balance overflow in account {}", self.index)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_h5_of_fields() {
        let pubkey = PublicKey::new(FieldElement::from(1u64), FieldElement::from(2u64));
        let account = AccountLeaf {
            index: 3,
            pubkey,
            balance: 1000,
            nonce: 4,
            token_type: 2,
        };
        let expected = Hasher::hash5(&[
            FieldElement::from(1u64),
            FieldElement::from(2u64),
            FieldElement::from(1000u64),
            FieldElement::from(4u64),
            FieldElement::from(2u64),
        ]);
        assert_eq!(account.hash(), expected);
    }

    #[test]
    fn test_index_is_not_committed() {
        let a = AccountLeaf::new(1, PublicKey::zero(), 0, 0);
        let b = AccountLeaf::new(9, PublicKey::zero(), 0, 0);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash(), AccountLeaf::zero_hash());
    }

    #[test]
    fn test_debit_and_credit_are_checked() {
        let mut account = AccountLeaf::new(0, PublicKey::zero(), 10, 1);
        assert_eq!(
            account.debit(11),
            Err(RollupError::InsufficientBalance {
                index: 0,
                required: 11,
                available: 10
            })
        );
        assert_eq!(account.nonce, 0);

        account.debit(10).unwrap();
        assert_eq!((account.balance, account.nonce), (0, 1));

        account.balance = Amount::MAX;
        assert!(matches!(account.credit(1), Err(RollupError::MalformedInput(_))));
    }
}
