//! Pending deposits and the batched subtree merge

use std::collections::VecDeque;

use rollup_smt::{fold_path, FieldElement, MerkleProof};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::AccountLeaf;
use crate::error::{Result, RollupError};
use crate::signature::PublicKey;
use crate::state::State;
use crate::types::{AccountIndex, Amount, BatchTree, Hasher, TokenType};

/// Deposit accepted on chain and waiting to be merged into the tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Owner key
    pub pubkey: PublicKey,
    /// Deposited amount
    #[serde(with = "crate::types::decimal_amount")]
    pub amount: Amount,
    /// Deposited token
    pub token_type: TokenType,
}

impl Deposit {
    /// Account leaf this deposit becomes at `index`
    pub fn to_account(&self, index: AccountIndex) -> AccountLeaf {
        AccountLeaf::new(index, self.pubkey, self.amount, self.token_type)
    }
}

/// FIFO of deposits not yet merged
#[derive(Clone, Debug, Default)]
pub struct DepositQueue {
    pending: VecDeque<Deposit>,
}

impl DepositQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a deposit. Returns the queue length.
    pub fn deposit(&mut self, pubkey: PublicKey, amount: Amount, token_type: TokenType) -> usize {
        self.pending.push_back(Deposit {
            pubkey,
            amount,
            token_type,
        });
        self.pending.len()
    }

    /// Number of pending deposits
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The next `2^subtree_depth` deposits, without removing them
    pub fn peek_batch(&self, subtree_depth: usize) -> Result<Vec<Deposit>> {
        let size = batch_size(subtree_depth)?;
        if self.pending.len() < size {
            return Err(RollupError::MalformedInput(format!(
                "{} pending deposits, batch needs {size}",
                self.pending.len()
            )));
        }
        Ok(self.pending.iter().take(size).cloned().collect())
    }

    /// Remove the next `2^subtree_depth` deposits
    pub fn take_batch(&mut self, subtree_depth: usize) -> Result<Vec<Deposit>> {
        let batch = self.peek_batch(subtree_depth)?;
        self.pending.drain(..batch.len());
        Ok(batch)
    }

    /// Root of the subtree the next `2^subtree_depth` deposits form, as the
    /// deposit contract tracks it
    pub fn pending_root(&self, subtree_depth: usize) -> Result<FieldElement> {
        let batch = self.peek_batch(subtree_depth)?;
        let hashes = batch.iter().map(|d| d.to_account(0).hash()).collect();
        Ok(BatchTree::new(hashes)?.root())
    }
}

/// Result of a committed deposit merge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Root of the merged batch subtree
    pub batch_root: FieldElement,
    /// Global root before the merge
    pub prev_root: FieldElement,
    /// Global root after the merge
    pub new_root: FieldElement,
    /// Index of the first merged account
    pub first_index: AccountIndex,
    /// Number of merged accounts
    pub count: u64,
}

/// Merges a power-of-two batch of deposits into the account tree at an
/// operator-chosen empty subtree.
///
/// The fold over the supplied proof is the on-chain computation; the merge
/// only commits if writing every leaf individually yields the same root.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchDepositMerger;

impl BatchDepositMerger {
    /// Validate and apply the merge. `state` is replaced only on success.
    pub fn merge(
        state: &mut State,
        deposits: &[Deposit],
        position: &[u8],
        proof: &[FieldElement],
    ) -> Result<MergeOutcome> {
        if deposits.is_empty() || !deposits.len().is_power_of_two() {
            return Err(RollupError::MalformedInput(format!(
                "deposit batch of {} is not a power of two",
                deposits.len()
            )));
        }
        let subtree_depth = deposits.len().trailing_zeros() as usize;
        let depth = state.depth();
        if subtree_depth > depth {
            return Err(RollupError::MalformedInput(format!(
                "deposit subtree depth {subtree_depth} exceeds tree depth {depth}"
            )));
        }
        if proof.len() != position.len() {
            return Err(RollupError::MalformedInput(format!(
                "proof has {} siblings but {} position bits",
                proof.len(),
                position.len()
            )));
        }
        if position.len() != depth - subtree_depth {
            return Err(RollupError::MalformedInput(format!(
                "position of length {} for a depth-{subtree_depth} subtree in a depth-{depth} tree",
                position.len()
            )));
        }

        let path = MerkleProof::new(proof.to_vec(), position.to_vec())?;
        let subtree_index = path.index();
        let first_index = subtree_index << subtree_depth;
        let prev_root = state.root();

        // The slot must be an empty subtree under the current root.
        let empty_root = fold_path::<Hasher>(state.tree().zeros().at(subtree_depth), proof, position)?;
        if empty_root != prev_root || state.tree().is_populated(subtree_depth, subtree_index) {
            return Err(RollupError::SubtreeOccupied {
                level: subtree_depth,
                index: subtree_index,
            });
        }

        let accounts: Vec<AccountLeaf> = deposits
            .iter()
            .zip(first_index..)
            .map(|(deposit, index)| deposit.to_account(index))
            .collect();
        let batch_root = BatchTree::new(accounts.iter().map(AccountLeaf::hash).collect())?.root();
        let folded_root = fold_path::<Hasher>(batch_root, proof, position)?;

        let mut shadow = state.clone();
        for account in accounts {
            debug!(index = account.index, "merging deposit");
            shadow.set_account(account)?;
        }
        if shadow.root() != folded_root {
            return Err(RollupError::RootMismatch {
                expected: folded_root,
                actual: shadow.root(),
            });
        }

        *state = shadow;
        info!(
            first_index,
            count = deposits.len(),
            root = %folded_root,
            "deposit batch merged"
        );

        Ok(MergeOutcome {
            batch_root,
            prev_root,
            new_root: folded_root,
            first_index,
            count: deposits.len() as u64,
        })
    }
}

fn batch_size(subtree_depth: usize) -> Result<usize> {
    u32::try_from(subtree_depth)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .ok_or_else(|| RollupError::MalformedInput(format!("deposit subtree depth {subtree_depth} too large")))
}
