//! Sparse Merkle Tree implementation

use std::{collections::HashMap, marker::PhantomData};

use tracing::trace;

use crate::{
    proof::{fold_path, positions_for_index},
    CircomPoseidon, FieldElement, FieldHasher, MerkleProof, SmtError, ZeroCache,
};

/// Fixed-depth, position-addressed sparse Merkle tree.
///
/// Only nodes on the path of a written leaf are stored; every other node
/// reads as the empty-subtree hash of its level.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree<H: FieldHasher = CircomPoseidon> {
    depth: usize,
    zeros: ZeroCache,
    /// Written nodes: (level, index) -> hash, level 0 holds leaves
    nodes: HashMap<(usize, u64), FieldElement>,
    _hasher: PhantomData<H>,
}

impl<H: FieldHasher> SparseMerkleTree<H> {
    /// Create an empty tree whose unwritten leaves hash to `zero_leaf`
    pub fn new(depth: usize, zero_leaf: FieldElement) -> Result<Self, SmtError> {
        let zeros = ZeroCache::build::<H>(depth, zero_leaf)?;
        Ok(Self {
            depth,
            zeros,
            nodes: HashMap::new(),
            _hasher: PhantomData,
        })
    }

    /// Tree depth (number of levels above the leaves)
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Number of leaf slots
    pub const fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Empty-subtree hashes this tree was built with
    pub const fn zeros(&self) -> &ZeroCache {
        &self.zeros
    }

    /// Get the root hash
    pub fn root(&self) -> FieldElement {
        self.node(self.depth, 0)
    }

    /// Node hash at `level`, the empty-subtree hash if nothing below it was written
    pub fn node(&self, level: usize, index: u64) -> FieldElement {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or_else(|| self.zeros.at(level))
    }

    /// Whether the node at (`level`, `index`) differs from the empty-subtree
    /// hash. Leaves rewritten with `Z[0]` keep their subtree empty.
    pub fn is_populated(&self, level: usize, index: u64) -> bool {
        self.node(level, index) != self.zeros.at(level)
    }

    /// Stored leaf hash, `Z[0]` if the slot was never written
    pub fn get_leaf(&self, index: u64) -> Result<FieldElement, SmtError> {
        self.check_index(0, index)?;
        Ok(self.node(0, index))
    }

    /// Rewrite one leaf and every ancestor on its path. Returns the new root.
    pub fn update(&mut self, index: u64, leaf: FieldElement) -> Result<FieldElement, SmtError> {
        self.check_index(0, index)?;

        let mut current = leaf;
        let mut idx = index;
        self.nodes.insert((0, idx), current);

        for level in 0..self.depth {
            let sibling = self.node(level, idx ^ 1);
            current = if idx & 1 == 0 {
                H::hash2(&current, &sibling)
            } else {
                H::hash2(&sibling, &current)
            };
            idx >>= 1;
            self.nodes.insert((level + 1, idx), current);
        }

        trace!(index, root = %current, "leaf updated");
        Ok(current)
    }

    /// Sibling path and position bits from leaf `index` to the root
    pub fn proof_path(&self, index: u64) -> Result<MerkleProof, SmtError> {
        self.subtree_proof(0, index)
    }

    /// Path from the node at (`level`, `index`) to the root; its length is
    /// `depth - level`.
    pub fn subtree_proof(&self, level: usize, index: u64) -> Result<MerkleProof, SmtError> {
        self.check_index(level, index)?;

        let len = self.depth - level;
        let mut siblings = Vec::with_capacity(len);
        let mut idx = index;
        for l in level..self.depth {
            siblings.push(self.node(l, idx ^ 1));
            idx >>= 1;
        }

        Ok(MerkleProof {
            siblings,
            positions: positions_for_index(index, len),
        })
    }

    /// Fold `leaf` along a full-depth path and compare with `root`. Paths
    /// of any other length never verify.
    pub fn verify_path(
        &self,
        leaf: &FieldElement,
        siblings: &[FieldElement],
        positions: &[u8],
        root: &FieldElement,
    ) -> bool {
        if siblings.len() != self.depth || positions.len() != self.depth {
            return false;
        }
        fold_path::<H>(*leaf, siblings, positions)
            .map(|computed| computed == *root)
            .unwrap_or(false)
    }

    /// Lowest aligned subtree at `level` whose root is `Z[level]`, if any
    pub fn first_empty_subtree(&self, level: usize) -> Option<u64> {
        if level > self.depth {
            return None;
        }
        self.search_empty(level, self.depth, 0)
    }

    fn search_empty(&self, target: usize, level: usize, index: u64) -> Option<u64> {
        if !self.is_populated(level, index) {
            return Some(index << (level - target));
        }
        if level == target {
            return None;
        }
        self.search_empty(target, level - 1, index << 1)
            .or_else(|| self.search_empty(target, level - 1, (index << 1) | 1))
    }

    /// Written leaves in index order
    pub fn populated_leaves(&self) -> Vec<(u64, FieldElement)> {
        let mut leaves: Vec<_> = self
            .nodes
            .iter()
            .filter(|((level, _), _)| *level == 0)
            .map(|((_, index), hash)| (*index, *hash))
            .collect();
        leaves.sort_unstable_by_key(|(index, _)| *index);
        leaves
    }

    fn check_index(&self, level: usize, index: u64) -> Result<(), SmtError> {
        if level > self.depth || index >= (1u64 << (self.depth - level)) {
            return Err(SmtError::IndexOutOfRange {
                index,
                level,
                depth: self.depth,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    type Tree = SparseMerkleTree<CircomPoseidon>;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from(v)
    }

    #[test]
    fn test_unwritten_leaves_read_as_zero() {
        let tree = Tree::new(3, fe(9)).unwrap();
        assert_eq!(tree.get_leaf(5).unwrap(), fe(9));
        assert_eq!(tree.node(2, 1), tree.zeros().at(2));
        assert!(!tree.is_populated(0, 5));
    }

    #[test]
    fn test_root_matches_manual_fold() {
        let mut tree = Tree::new(2, FieldElement::zero()).unwrap();
        let z0 = tree.zeros().at(0);
        tree.update(0, fe(1)).unwrap();
        let root = tree.update(3, fe(4)).unwrap();

        let left = CircomPoseidon::hash2(&fe(1), &z0);
        let right = CircomPoseidon::hash2(&z0, &fe(4));
        assert_eq!(root, CircomPoseidon::hash2(&left, &right));
        assert_eq!(tree.root(), root);
    }

    #[test]
    fn test_update_overwrites_in_place() {
        let mut tree = Tree::new(4, FieldElement::zero()).unwrap();
        tree.update(7, fe(1)).unwrap();
        let once = tree.update(7, fe(2)).unwrap();

        let mut fresh = Tree::new(4, FieldElement::zero()).unwrap();
        assert_eq!(fresh.update(7, fe(2)).unwrap(), once);
    }

    #[test]
    fn test_out_of_range_index() {
        let mut tree = Tree::new(3, FieldElement::zero()).unwrap();
        assert!(matches!(
            tree.update(8, fe(1)),
            Err(SmtError::IndexOutOfRange { index: 8, .. })
        ));
        assert!(tree.proof_path(8).is_err());
        assert!(tree.get_leaf(8).is_err());
    }

    #[test]
    fn test_short_paths_never_verify() {
        let mut tree = Tree::new(4, FieldElement::zero()).unwrap();
        tree.update(2, fe(5)).unwrap();
        let proof = tree.proof_path(2).unwrap();
        let root = tree.root();
        assert!(tree.verify_path(&fe(5), &proof.siblings, &proof.positions, &root));
        assert!(!tree.verify_path(&fe(5), &proof.siblings[..3], &proof.positions[..3], &root));
    }

    #[test]
    fn test_subtree_proof_folds_subtree_root() {
        let mut tree = Tree::new(4, FieldElement::zero()).unwrap();
        for i in 4..8 {
            tree.update(i, fe(i + 100)).unwrap();
        }
        let proof = tree.subtree_proof(2, 1).unwrap();
        assert_eq!(proof.len(), 2);
        assert_eq!(proof.positions, vec![1, 0]);
        assert!(proof.verify::<CircomPoseidon>(&tree.node(2, 1), &tree.root()));
    }

    #[test]
    fn test_first_empty_subtree() {
        let mut tree = Tree::new(4, FieldElement::zero()).unwrap();
        assert_eq!(tree.first_empty_subtree(2), Some(0));

        for i in 0..4 {
            tree.update(i, fe(i + 1)).unwrap();
        }
        assert_eq!(tree.first_empty_subtree(2), Some(1));

        tree.update(9, fe(3)).unwrap();
        assert_eq!(tree.first_empty_subtree(2), Some(1));

        tree.update(5, fe(6)).unwrap();
        assert_eq!(tree.first_empty_subtree(2), Some(3));
        assert_eq!(tree.first_empty_subtree(0), Some(4));
        assert_eq!(tree.first_empty_subtree(4), None);
    }

    #[test]
    fn test_zero_leaf_write_keeps_subtree_empty() {
        let mut tree = Tree::new(2, fe(9)).unwrap();
        tree.update(0, fe(1)).unwrap();
        tree.update(3, fe(9)).unwrap();
        assert!(!tree.is_populated(0, 3));
        assert!(!tree.is_populated(1, 1));
        assert_eq!(tree.node(1, 1), tree.zeros().at(1));
        assert_eq!(tree.first_empty_subtree(1), Some(1));

        tree.update(2, fe(4)).unwrap();
        assert!(tree.is_populated(1, 1));
        assert_eq!(tree.first_empty_subtree(1), None);
    }

    #[test]
    fn test_populated_leaves_sorted() {
        let mut tree = Tree::new(3, FieldElement::zero()).unwrap();
        tree.update(6, fe(60)).unwrap();
        tree.update(1, fe(10)).unwrap();
        assert_eq!(tree.populated_leaves(), vec![(1, fe(10)), (6, fe(60))]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_every_written_leaf_verifies(
            depth in 1usize..=8,
            writes in proptest::collection::vec((any::<u64>(), any::<u64>()), 1..6),
        ) {
            let mut tree = Tree::new(depth, FieldElement::zero()).unwrap();
            let mask = (1u64 << depth) - 1;
            for (index, value) in &writes {
                tree.update(index & mask, fe(*value)).unwrap();
            }

            let root = tree.root();
            for (index, _) in &writes {
                let index = index & mask;
                let leaf = tree.get_leaf(index).unwrap();
                let proof = tree.proof_path(index).unwrap();
                prop_assert_eq!(proof.len(), depth);
                prop_assert_eq!(proof.index(), index);
                prop_assert!(tree.verify_path(&leaf, &proof.siblings, &proof.positions, &root));
            }
        }
    }
}
