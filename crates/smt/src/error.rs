//! Tree and hashing errors

use crate::MAX_DEPTH;

/// Errors raised by the tree primitives. All of them describe malformed
/// input; none is transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmtError {
    /// The hash oracle only accepts 2, 4 or 5 inputs
    #[error("unsupported hash arity {0}, expected 2, 4 or 5")]
    UnsupportedArity(usize),
    /// Tree depth outside the supported range
    #[error("tree depth {0} outside 1..={}", MAX_DEPTH)]
    InvalidDepth(usize),
    /// Leaf or subtree index does not fit the tree
    #[error("index {index} out of range at level {level} of a depth-{depth} tree")]
    IndexOutOfRange {
        /// Offending index
        index: u64,
        /// Level the index addresses
        level: usize,
        /// Depth of the tree
        depth: usize,
    },
    /// Batch length is zero or not a power of two
    #[error("batch of {0} leaves is not a non-empty power of two")]
    BatchSize(usize),
    /// Batch length does not match the depth the caller declared
    #[error("batch depth {actual} does not match expected depth {expected}")]
    BatchDepth {
        /// Declared depth
        expected: usize,
        /// Depth implied by the batch length
        actual: usize,
    },
    /// Sibling and position vectors differ in length
    #[error("proof has {siblings} siblings but {positions} position bits")]
    PathLengthMismatch {
        /// Number of siblings
        siblings: usize,
        /// Number of position bits
        positions: usize,
    },
    /// Path length does not match the number of levels it must cover
    #[error("path of length {actual} where {expected} levels are required")]
    PathLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },
    /// Position vector contains something other than 0 or 1
    #[error("position bit {0} is not 0 or 1")]
    InvalidPositionBit(u8),
}
