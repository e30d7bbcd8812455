//! Merkle path generation helpers and verification

use serde::{Deserialize, Serialize};

use crate::{FieldElement, FieldHasher, SmtError};

/// Inclusion proof: sibling hashes from the leaf level upwards and one
/// position bit per level.
///
/// Bit `i` is bit `i` of the leaf index (least significant first). A `0`
/// means the running node is the left operand, `H2(node, sibling)`; a `1`
/// means it is the right operand, `H2(sibling, node)`. This is the folding
/// order of the on-chain `getRootFromProof`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root
    pub siblings: Vec<FieldElement>,
    /// Position bits from leaf to root
    pub positions: Vec<u8>,
}

impl MerkleProof {
    /// Build a proof, checking that both vectors line up and the bits are bits
    pub fn new(siblings: Vec<FieldElement>, positions: Vec<u8>) -> Result<Self, SmtError> {
        check_path(&siblings, &positions)?;
        Ok(Self {
            siblings,
            positions,
        })
    }

    /// Number of levels covered
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    /// Whether the proof covers no level at all
    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }

    /// Index the position bits encode
    pub fn index(&self) -> u64 {
        self.positions
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, bit)| acc | (u64::from(*bit & 1) << i))
    }

    /// Fold `leaf` up the path
    pub fn compute_root<H: FieldHasher>(&self, leaf: &FieldElement) -> Result<FieldElement, SmtError> {
        fold_path::<H>(*leaf, &self.siblings, &self.positions)
    }

    /// Whether `leaf` folds to `root` along this path
    pub fn verify<H: FieldHasher>(&self, leaf: &FieldElement, root: &FieldElement) -> bool {
        self.compute_root::<H>(leaf)
            .map(|computed| computed == *root)
            .unwrap_or(false)
    }
}

/// Fold a node up a sibling path, choosing operand order from each position bit
pub fn fold_path<H: FieldHasher>(
    node: FieldElement,
    siblings: &[FieldElement],
    positions: &[u8],
) -> Result<FieldElement, SmtError> {
    check_path(siblings, positions)?;

    let mut current = node;
    for (sibling, bit) in siblings.iter().zip(positions) {
        current = if *bit == 0 {
            H::hash2(&current, sibling)
        } else {
            H::hash2(sibling, &current)
        };
    }
    Ok(current)
}

/// Position bits of `index` over `len` levels, least significant first
pub fn positions_for_index(index: u64, len: usize) -> Vec<u8> {
    (0..len).map(|i| ((index >> i) & 1) as u8).collect()
}

fn check_path(siblings: &[FieldElement], positions: &[u8]) -> Result<(), SmtError> {
    if siblings.len() != positions.len() {
        return Err(SmtError::PathLengthMismatch {
            siblings: siblings.len(),
            positions: positions.len(),
        });
    }
    if let Some(bad) = positions.iter().find(|bit| **bit > 1) {
        return Err(SmtError::InvalidPositionBit(*bad));
    }
    Ok(())
}
