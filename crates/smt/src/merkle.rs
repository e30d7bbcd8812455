//! Dense binary Merkle tree over a power-of-two batch

use std::marker::PhantomData;

use crate::{proof::positions_for_index, CircomPoseidon, FieldElement, FieldHasher, MerkleProof, SmtError};

/// Fully materialised tree over a fixed batch of leaves.
///
/// The batch is never padded: its length must already be a power of two.
#[derive(Clone, Debug)]
pub struct MerkleTree<H: FieldHasher = CircomPoseidon> {
    /// `layers[0]` are the leaves, the last layer is `[root]`
    layers: Vec<Vec<FieldElement>>,
    _hasher: PhantomData<H>,
}

impl<H: FieldHasher> MerkleTree<H> {
    /// Build the tree over `leaves`
    pub fn new(leaves: Vec<FieldElement>) -> Result<Self, SmtError> {
        if leaves.is_empty() || !leaves.len().is_power_of_two() {
            return Err(SmtError::BatchSize(leaves.len()));
        }

        let mut layers = vec![leaves];
        while layers[layers.len() - 1].len() > 1 {
            let next = layers[layers.len() - 1]
                .chunks_exact(2)
                .map(|pair| H::hash2(&pair[0], &pair[1]))
                .collect();
            layers.push(next);
        }

        Ok(Self {
            layers,
            _hasher: PhantomData,
        })
    }

    /// Build the tree and require exactly `2^depth` leaves
    pub fn with_depth(leaves: Vec<FieldElement>, depth: usize) -> Result<Self, SmtError> {
        let tree = Self::new(leaves)?;
        if tree.depth() != depth {
            return Err(SmtError::BatchDepth {
                expected: depth,
                actual: tree.depth(),
            });
        }
        Ok(tree)
    }

    /// Root hash
    pub fn root(&self) -> FieldElement {
        self.layers[self.layers.len() - 1][0]
    }

    /// Number of levels above the leaves
    pub fn depth(&self) -> usize {
        self.layers.len() - 1
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    /// Always false; an empty batch cannot be built
    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Leaf hashes in order
    pub fn leaves(&self) -> &[FieldElement] {
        &self.layers[0]
    }

    /// Leaf-existence proof for the leaf at `index`
    pub fn proof(&self, index: usize) -> Result<MerkleProof, SmtError> {
        if index >= self.len() {
            return Err(SmtError::IndexOutOfRange {
                index: index as u64,
                level: 0,
                depth: self.depth(),
            });
        }

        let siblings = self.layers[..self.depth()]
            .iter()
            .enumerate()
            .map(|(level, layer)| layer[(index >> level) ^ 1])
            .collect();

        Ok(MerkleProof {
            siblings,
            positions: positions_for_index(index as u64, self.depth()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tree = MerkleTree<CircomPoseidon>;

    fn leaves(n: u64) -> Vec<FieldElement> {
        (1..=n).map(FieldElement::from).collect()
    }

    #[test]
    fn test_root_of_four_leaves() {
        let l = leaves(4);
        let tree = Tree::new(l.clone()).unwrap();
        let left = CircomPoseidon::hash2(&l[0], &l[1]);
        let right = CircomPoseidon::hash2(&l[2], &l[3]);
        assert_eq!(tree.root(), CircomPoseidon::hash2(&left, &right));
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_every_leaf_proof_verifies() {
        let tree = Tree::new(leaves(8)).unwrap();
        for (i, leaf) in tree.leaves().iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert_eq!(proof.index(), i as u64);
            assert!(proof.verify::<CircomPoseidon>(leaf, &tree.root()));
        }
        assert!(tree.proof(8).is_err());
    }

    #[test]
    fn test_single_leaf_batch() {
        let tree = Tree::new(leaves(1)).unwrap();
        assert_eq!(tree.root(), FieldElement::from(1u64));
        assert!(tree.proof(0).unwrap().is_empty());
    }

    #[test]
    fn test_batch_size_errors() {
        assert_eq!(Tree::new(vec![]).unwrap_err(), SmtError::BatchSize(0));
        assert_eq!(Tree::new(leaves(3)).unwrap_err(), SmtError::BatchSize(3));
        assert_eq!(
            Tree::with_depth(leaves(4), 3).unwrap_err(),
            SmtError::BatchDepth {
                expected: 3,
                actual: 2
            }
        );
    }
}
