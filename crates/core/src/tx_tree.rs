//! Transaction batch tree

use rollup_smt::{FieldElement, MerkleProof};

use crate::error::Result;
use crate::tx::Transaction;
use crate::types::{BatchTree, Hasher};

/// Binary Merkle tree over one batch of transaction hashes.
///
/// The batch size is fixed at construction: exactly `2^depth`
/// transactions, no padding.
#[derive(Clone, Debug)]
pub struct TransactionTree {
    txs: Vec<Transaction>,
    tree: BatchTree,
}

impl TransactionTree {
    /// Build the tree over `txs`, which must hold exactly `2^depth` entries
    pub fn new(txs: Vec<Transaction>, depth: usize) -> Result<Self> {
        let hashes = txs.iter().map(Transaction::hash).collect();
        let tree = BatchTree::with_depth(hashes, depth)?;
        Ok(Self { txs, tree })
    }

    /// Get tree root
    pub fn root(&self) -> FieldElement {
        self.tree.root()
    }

    /// Leaf-existence proof for the transaction at `index`
    pub fn proof(&self, index: usize) -> Result<MerkleProof> {
        Ok(self.tree.proof(index)?)
    }

    /// Transactions in batch order
    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    /// Transaction hashes in batch order
    pub fn hashes(&self) -> &[FieldElement] {
        self.tree.leaves()
    }

    /// Batch size
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Always false; an empty batch cannot be built
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Number of levels above the leaves
    pub fn depth(&self) -> usize {
        self.tree.depth()
    }
}

/// Whether `tx_hash` is a leaf of the tree committed as `tx_root`
pub fn verify_membership(tx_hash: &FieldElement, proof: &MerkleProof, tx_root: &FieldElement) -> bool {
    proof.verify::<Hasher>(tx_hash, tx_root)
}
