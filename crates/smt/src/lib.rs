//! Fixed-depth Merkle trees over BN254 field elements for the rollup state.
//!
//! This crate provides the hashing and tree primitives shared by the engine:
//! - [`FieldElement`]: scalar-field element with a decimal wire format
//! - [`FieldHasher`]: the hash oracle (arities 2, 4 and 5), implemented by
//!   [`CircomPoseidon`]
//! - [`ZeroCache`]: empty-subtree hashes per level
//! - [`SparseMerkleTree`]: position-addressed account accumulator
//! - [`MerkleTree`]: dense power-of-two tree for batches
//! - [`MerkleProof`]: sibling path plus LSB-first position bits
//!
//! Levels count from the leaves: level 0 holds leaves and level `depth`
//! holds the root.

mod error;
mod field;
mod hasher;
mod merkle;
mod proof;
mod tree;
mod zero;

pub use error::SmtError;
pub use field::{FieldElement, ParseFieldError};
pub use hasher::{CircomPoseidon, FieldHasher};
pub use merkle::MerkleTree;
pub use proof::{fold_path, positions_for_index, MerkleProof};
pub use tree::SparseMerkleTree;
pub use zero::ZeroCache;

/// Deepest tree supported; leaf indices must fit in a `u64` with room to shift.
pub const MAX_DEPTH: usize = 32;
