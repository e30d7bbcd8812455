//! State management

use std::collections::BTreeMap;

use rollup_smt::{FieldElement, MerkleProof};

use crate::account::AccountLeaf;
use crate::error::Result;
use crate::types::{AccountIndex, AccountTree};

/// Account preimages together with the tree that commits to them
#[derive(Clone, Debug)]
pub struct State {
    /// Registered accounts by index
    accounts: BTreeMap<AccountIndex, AccountLeaf>,
    /// Accumulator over account leaf hashes
    tree: AccountTree,
}

impl State {
    /// Create an empty state of the given depth
    pub fn new(depth: usize) -> Result<Self> {
        Ok(Self {
            accounts: BTreeMap::new(),
            tree: AccountTree::new(depth, AccountLeaf::zero_hash())?,
        })
    }

    /// Registered account at `index`
    pub fn account(&self, index: AccountIndex) -> Option<&AccountLeaf> {
        self.accounts.get(&index)
    }

    /// Write an account and its leaf hash. Returns the new root.
    pub fn set_account(&mut self, account: AccountLeaf) -> Result<FieldElement> {
        let root = self.tree.update(account.index, account.hash())?;
        self.accounts.insert(account.index, account);
        Ok(root)
    }

    /// All registered accounts in index order
    pub fn accounts(&self) -> impl Iterator<Item = &AccountLeaf> {
        self.accounts.values()
    }

    /// Get tree root
    pub fn root(&self) -> FieldElement {
        self.tree.root()
    }

    /// Inclusion path for the leaf at `index`
    pub fn proof(&self, index: AccountIndex) -> Result<MerkleProof> {
        Ok(self.tree.proof_path(index)?)
    }

    /// Underlying accumulator
    pub const fn tree(&self) -> &AccountTree {
        &self.tree
    }

    /// Depth of the account tree
    pub const fn depth(&self) -> usize {
        self.tree.depth()
    }
}

#[cfg(test)]
mod tests {
    use rollup_smt::FieldElement;

    use super::*;
    use crate::signature::PublicKey;

    #[test]
    fn test_set_account_updates_tree_and_map() {
        let mut state = State::new(4).unwrap();
        let empty_root = state.root();

        let account = AccountLeaf::new(
            3,
            PublicKey::new(FieldElement::from(1u64), FieldElement::from(2u64)),
            50,
            1,
        );
        let root = state.set_account(account.clone()).unwrap();

        assert_ne!(root, empty_root);
        assert_eq!(state.account(3), Some(&account));
        assert_eq!(state.tree().get_leaf(3).unwrap(), account.hash());

        let proof = state.proof(3).unwrap();
        assert!(proof.verify::<crate::types::Hasher>(&account.hash(), &root));
    }

    #[test]
    fn test_out_of_range_account_is_malformed() {
        let mut state = State::new(2).unwrap();
        let account = AccountLeaf::new(4, PublicKey::zero(), 0, 0);
        assert!(matches!(
            state.set_account(account),
            Err(crate::RollupError::MalformedInput(_))
        ));
        assert_eq!(state.accounts().count(), 0);
    }
}
