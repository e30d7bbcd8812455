//! Batch state transitions

use rollup_smt::{FieldElement, MerkleProof};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::AccountLeaf;
use crate::error::{Result, RollupError};
use crate::signature::SignatureScheme;
use crate::state::State;
use crate::tx::Transaction;
use crate::tx_tree::{verify_membership, TransactionTree};
use crate::types::{Amount, Hasher, Nonce, ReceiverPolicy, TokenType};
use crate::witness::WitnessBundle;

/// Effect of one transaction: both leaf paths, the roots after each write
/// and the pre-state values the circuit rebuilds the leaves from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Sender path (siblings do not change when the sender leaf is rewritten)
    pub sender_proof: MerkleProof,
    /// Receiver path, taken after the sender write
    pub receiver_proof: MerkleProof,
    /// Root after the sender debit
    pub root_from_new_sender: FieldElement,
    /// Root after the receiver credit
    pub root_from_new_receiver: FieldElement,
    /// Sender balance before the debit
    #[serde(with = "crate::types::decimal_amount")]
    pub balance_from: Amount,
    /// Receiver balance before the credit
    #[serde(with = "crate::types::decimal_amount")]
    pub balance_to: Amount,
    /// Receiver nonce
    pub nonce_to: Nonce,
    /// Receiver token type before the credit
    pub token_type_to: TokenType,
    /// Sender leaf hash before the debit
    pub sender_leaf_before: FieldElement,
    /// Receiver leaf hash before the credit
    pub receiver_leaf_before: FieldElement,
    /// Sender account after the debit
    pub sender: AccountLeaf,
    /// Receiver account after the credit
    pub receiver: AccountLeaf,
}

/// A fully applied batch: everything the prover and the verifier need
#[derive(Clone, Debug)]
pub struct StateTransition {
    /// Root before the batch
    pub prev_root: FieldElement,
    /// Root after the batch
    pub new_root: FieldElement,
    /// Tree over the batch's transactions
    pub tx_tree: TransactionTree,
    /// Leaf-existence proof of each transaction in `tx_tree`
    pub tx_proofs: Vec<MerkleProof>,
    /// `2n + 1` roots: pre-state, then post-sender and post-receiver per transaction
    pub intermediate_roots: Vec<FieldElement>,
    /// One delta per transaction, in batch order
    pub deltas: Vec<Delta>,
}

impl StateTransition {
    /// Root of the batch's transaction tree
    pub fn tx_root(&self) -> FieldElement {
        self.tx_tree.root()
    }

    /// Prover input for this batch
    pub fn witness(&self) -> WitnessBundle {
        WitnessBundle::from_transition(self)
    }

    /// Re-derive every intermediate root from the recorded leaves and paths
    pub fn verify(&self) -> Result<()> {
        let n = self.deltas.len();
        if self.intermediate_roots.len() != 2 * n + 1 || self.tx_proofs.len() != n {
            return Err(RollupError::MalformedInput(format!(
                "{} intermediate roots and {} transaction proofs for {n} deltas",
                self.intermediate_roots.len(),
                self.tx_proofs.len()
            )));
        }
        expect_root(self.intermediate_roots[0], self.prev_root)?;

        let tx_root = self.tx_root();
        for (i, delta) in self.deltas.iter().enumerate() {
            let tx_hash = self.tx_tree.hashes()[i];
            if !verify_membership(&tx_hash, &self.tx_proofs[i], &tx_root) {
                let actual = self.tx_proofs[i].compute_root::<Hasher>(&tx_hash)?;
                return Err(RollupError::RootMismatch {
                    expected: tx_root,
                    actual,
                });
            }

            let before = self.intermediate_roots[2 * i];
            let after_sender = self.intermediate_roots[2 * i + 1];
            let after_receiver = self.intermediate_roots[2 * i + 2];

            expect_root(before, delta.sender_proof.compute_root::<Hasher>(&delta.sender_leaf_before)?)?;
            expect_root(after_sender, delta.sender_proof.compute_root::<Hasher>(&delta.sender.hash())?)?;
            expect_root(after_sender, delta.root_from_new_sender)?;
            expect_root(
                after_sender,
                delta.receiver_proof.compute_root::<Hasher>(&delta.receiver_leaf_before)?,
            )?;
            expect_root(
                after_receiver,
                delta.receiver_proof.compute_root::<Hasher>(&delta.receiver.hash())?,
            )?;
            expect_root(after_receiver, delta.root_from_new_receiver)?;
        }

        expect_root(self.new_root, self.intermediate_roots[2 * n])
    }
}

fn expect_root(expected: FieldElement, actual: FieldElement) -> Result<()> {
    if expected != actual {
        return Err(RollupError::RootMismatch { expected, actual });
    }
    Ok(())
}

/// Applies an ordered batch of signed transactions to a copy of the state.
///
/// The input state is never touched: callers receive the post-state and
/// commit it themselves, so a failing transaction anywhere in the batch
/// leaves nothing behind.
#[derive(Debug)]
pub struct StateTransitionBuilder<'a, S: SignatureScheme + ?Sized> {
    scheme: &'a S,
    tx_batch_depth: usize,
    receiver_policy: ReceiverPolicy,
}

impl<'a, S: SignatureScheme + ?Sized> StateTransitionBuilder<'a, S> {
    /// Builder for batches of `2^tx_batch_depth` transactions
    pub const fn new(scheme: &'a S, tx_batch_depth: usize) -> Self {
        Self {
            scheme,
            tx_batch_depth,
            receiver_policy: ReceiverPolicy::RequireRegistered,
        }
    }

    /// Set the policy for transfers to unregistered indices
    pub const fn receiver_policy(mut self, policy: ReceiverPolicy) -> Self {
        self.receiver_policy = policy;
        self
    }

    /// Apply `txs` in order. Returns the post-state and the transition record.
    pub fn build(&self, state: &State, txs: Vec<Transaction>) -> Result<(State, StateTransition)> {
        let tx_tree = TransactionTree::new(txs, self.tx_batch_depth)?;
        let tx_proofs = (0..tx_tree.len())
            .map(|i| tx_tree.proof(i))
            .collect::<Result<Vec<_>>>()?;

        let prev_root = state.root();
        let mut shadow = state.clone();
        let mut intermediate_roots = Vec::with_capacity(2 * tx_tree.len() + 1);
        intermediate_roots.push(prev_root);
        let mut deltas = Vec::with_capacity(tx_tree.len());

        for (i, tx) in tx_tree.txs().iter().enumerate() {
            let delta = self.apply_tx(&mut shadow, tx)?;
            debug!(
                tx = i,
                from = tx.from_index,
                to = tx.to_index,
                amount = %tx.amount,
                "transaction applied"
            );
            intermediate_roots.push(delta.root_from_new_sender);
            intermediate_roots.push(delta.root_from_new_receiver);
            deltas.push(delta);
        }

        let transition = StateTransition {
            prev_root,
            new_root: shadow.root(),
            tx_tree,
            tx_proofs,
            intermediate_roots,
            deltas,
        };
        info!(
            txs = transition.deltas.len(),
            tx_root = %transition.tx_root(),
            new_root = %transition.new_root,
            "state transition built"
        );
        Ok((shadow, transition))
    }

    fn apply_tx(&self, shadow: &mut State, tx: &Transaction) -> Result<Delta> {
        let sender = shadow
            .account(tx.from_index)
            .cloned()
            .ok_or(RollupError::UnknownAccount { index: tx.from_index })?;

        if sender.pubkey != tx.from {
            return Err(RollupError::AccountMismatch { index: tx.from_index });
        }
        if !tx.check_signature(self.scheme) {
            return Err(RollupError::SignatureInvalid { index: tx.from_index });
        }
        if tx.nonce != sender.nonce {
            return Err(RollupError::NonceMismatch {
                index: tx.from_index,
                expected: sender.nonce,
                actual: tx.nonce,
            });
        }
        if sender.balance < tx.amount {
            return Err(RollupError::InsufficientBalance {
                index: tx.from_index,
                required: tx.amount,
                available: sender.balance,
            });
        }
        if tx.token_type != sender.token_type {
            return Err(RollupError::TokenMismatch {
                index: tx.from_index,
                account: sender.token_type,
                tx: tx.token_type,
            });
        }

        let balance_from = sender.balance;
        let sender_leaf_before = sender.hash();
        let mut new_sender = sender;
        new_sender.debit(tx.amount)?;
        let root_from_new_sender = shadow.set_account(new_sender.clone())?;
        let sender_proof = shadow.proof(tx.from_index)?;

        let receiver = self.resolve_receiver(shadow, tx)?;
        let receiver_leaf_before = shadow.tree().get_leaf(tx.to_index)?;
        let (balance_to, nonce_to, token_type_to) = (receiver.balance, receiver.nonce, receiver.token_type);

        let mut new_receiver = receiver;
        if !tx.is_withdrawal() {
            if new_receiver.token_type == 0 {
                new_receiver.token_type = tx.token_type;
            } else if new_receiver.token_type != tx.token_type {
                return Err(RollupError::TokenMismatch {
                    index: tx.to_index,
                    account: new_receiver.token_type,
                    tx: tx.token_type,
                });
            }
            new_receiver.credit(tx.amount)?;
        }
        let root_from_new_receiver = shadow.set_account(new_receiver.clone())?;
        let receiver_proof = shadow.proof(tx.to_index)?;

        Ok(Delta {
            sender_proof,
            receiver_proof,
            root_from_new_sender,
            root_from_new_receiver,
            balance_from,
            balance_to,
            nonce_to,
            token_type_to,
            sender_leaf_before,
            receiver_leaf_before,
            sender: new_sender,
            receiver: new_receiver,
        })
    }

    fn resolve_receiver(&self, shadow: &State, tx: &Transaction) -> Result<AccountLeaf> {
        match shadow.account(tx.to_index) {
            Some(account) if account.pubkey == tx.to => Ok(account.clone()),
            Some(_) => Err(RollupError::AccountMismatch { index: tx.to_index }),
            // Withdrawals only target a registered zero-key account.
            None => match self.receiver_policy {
                ReceiverPolicy::RegisterOnTransfer if !tx.is_withdrawal() => {
                    Ok(AccountLeaf::new(tx.to_index, tx.to, 0, 0))
                }
                _ => Err(RollupError::UnknownAccount { index: tx.to_index }),
            },
        }
    }
}
