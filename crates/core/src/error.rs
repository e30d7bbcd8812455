//! Engine errors

use rollup_smt::{FieldElement, SmtError};

use crate::types::{AccountIndex, Amount, Nonce, TokenType};

/// Application errors surfaced by the engine.
///
/// Every variant is a logic or data error detected locally; none is
/// retryable and none leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollupError {
    /// Wrong arity, wrong batch size, mismatched proof/position lengths,
    /// out-of-range indices or arithmetic overflow
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// Signature does not verify against the sender's key
    #[error("invalid signature for transaction from account {index}")]
    SignatureInvalid {
        /// Sender account index
        index: AccountIndex,
    },
    /// Transaction nonce differs from the sender's stored nonce
    #[error("nonce mismatch for account {index}: expected {expected}, got {actual}")]
    NonceMismatch {
        /// Sender account index
        index: AccountIndex,
        /// Stored nonce
        expected: Nonce,
        /// Nonce carried by the transaction
        actual: Nonce,
    },
    /// Sender balance below the transfer amount
    #[error("insufficient balance in account {index}: required {required}, available {available}")]
    InsufficientBalance {
        /// Sender account index
        index: AccountIndex,
        /// Transfer amount
        required: Amount,
        /// Stored balance
        available: Amount,
    },
    /// Token type of the transaction and account disagree
    #[error("token mismatch for account {index}: account holds {account}, transaction moves {tx}")]
    TokenMismatch {
        /// Account whose token type disagrees
        index: AccountIndex,
        /// Token type held by the account
        account: TokenType,
        /// Token type of the transaction
        tx: TokenType,
    },
    /// Deposit merge target is not an empty subtree under the current root
    #[error("subtree at level {level}, index {index} is not empty")]
    SubtreeOccupied {
        /// Subtree level
        level: usize,
        /// Subtree index at that level
        index: u64,
    },
    /// Withdrawal with this (leaf, position, proof) was already released
    #[error("withdrawal {0} already voided")]
    AlreadyVoided(String),
    /// A recomputed root disagrees with an asserted one
    #[error("root mismatch: expected {expected}, computed {actual}")]
    RootMismatch {
        /// Asserted root
        expected: FieldElement,
        /// Root the engine computed
        actual: FieldElement,
    },
    /// The public key carried by a transaction does not own the addressed account
    #[error("public key does not match account {index}")]
    AccountMismatch {
        /// Addressed account index
        index: AccountIndex,
    },
    /// Sender, or receiver under the strict registration policy, is not registered
    #[error("account {index} is not registered")]
    UnknownAccount {
        /// Addressed account index
        index: AccountIndex,
    },
    /// Withdrawal references a transaction root no batch committed
    #[error("transaction root {0} was never committed")]
    UnknownTxRoot(FieldElement),
    /// Withdrawal request built from a transaction that is not a withdrawal
    #[error("transaction is not a withdrawal")]
    NotAWithdrawal,
}

impl From<SmtError> for RollupError {
    fn from(err: SmtError) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

/// Result alias used across the engine
pub type Result<T, E = RollupError> = std::result::Result<T, E>;
