//! Empty-subtree hashes

use serde::{Deserialize, Serialize};

use crate::{FieldElement, FieldHasher, SmtError, MAX_DEPTH};

/// Hash of an all-empty subtree at every level `0..=depth`.
///
/// `Z[0]` is the hash of the empty leaf and `Z[i] = H2(Z[i-1], Z[i-1])`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroCache {
    hashes: Vec<FieldElement>,
}

impl ZeroCache {
    /// Compute the cache bottom-up from the empty leaf hash
    pub fn build<H: FieldHasher>(depth: usize, zero_leaf: FieldElement) -> Result<Self, SmtError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(SmtError::InvalidDepth(depth));
        }

        let mut hashes = Vec::with_capacity(depth + 1);
        let mut current = zero_leaf;
        hashes.push(current);
        for _ in 0..depth {
            current = H::hash2(&current, &current);
            hashes.push(current);
        }

        Ok(Self { hashes })
    }

    /// Empty-subtree hash at `level`.
    ///
    /// # Panics
    /// If `level` exceeds the depth the cache was built for.
    pub fn at(&self, level: usize) -> FieldElement {
        self.hashes[level]
    }

    /// Depth the cache was built for
    pub fn depth(&self) -> usize {
        self.hashes.len() - 1
    }

    /// Root of an empty tree of full depth
    pub fn empty_root(&self) -> FieldElement {
        self.hashes[self.hashes.len() - 1]
    }

    /// All levels, leaf first
    pub fn as_slice(&self) -> &[FieldElement] {
        &self.hashes
    }
}
