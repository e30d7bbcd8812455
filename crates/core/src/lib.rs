//! Off-chain state-transition engine of the token rollup
//!
//! This crate holds everything the operator computes before the contract
//! and the circuit check it:
//! - Account leaves and the sparse account tree ([`State`])
//! - Batched deposit merges into empty subtrees ([`BatchDepositMerger`])
//! - Signed transfer batches and their per-transaction deltas
//!   ([`StateTransitionBuilder`]) and the prover input ([`WitnessBundle`])
//! - Withdrawal release with replay protection ([`WithdrawalVoidTracker`])
//!
//! [`Rollup`] ties these together behind the operator's entry points.

pub mod account;
pub mod deposit;
pub mod error;
pub mod rollup;
pub mod signature;
pub mod state;
pub mod transition;
pub mod tx;
pub mod tx_tree;
pub mod types;
pub mod withdraw;
pub mod witness;

pub use account::AccountLeaf;
pub use deposit::{BatchDepositMerger, Deposit, DepositQueue, MergeOutcome};
pub use error::{Result, RollupError};
pub use rollup::Rollup;
pub use signature::{EddsaPoseidon, PrivateKey, PublicKey, Signature, SignatureScheme};
pub use state::State;
pub use transition::{Delta, StateTransition, StateTransitionBuilder};
pub use tx::{withdrawal_message, Transaction};
pub use tx_tree::{verify_membership, TransactionTree};
pub use types::*;
pub use withdraw::{void_key, WithdrawalReceipt, WithdrawalRequest, WithdrawalVoidTracker};
pub use witness::WitnessBundle;

pub use rollup_smt::{FieldElement, MerkleProof};
